//! Relay settings, read from the environment like the agent's own.

use std::fmt::{self, Debug};
use std::net::SocketAddr;

use thin_agent::config::{ConfigError, Vars};

/// Default listen address.
pub const DEFAULT_BIND: &str = "0.0.0.0:5001";

/// Settings of the relay server.
#[derive(Clone)]
pub struct WebhookConfig {
    /// `WEBHOOK_BIND`.
    pub bind: SocketAddr,
    /// `TWILIO_AUTH_TOKEN`, the key callbacks are signed with.
    pub auth_token: Option<String>,
    /// `WEBHOOK_VALIDATE_SIGNATURE`.
    pub validate_signature: bool,
    /// `WEBHOOK_PUBLIC_URL`, the base URL Twilio is configured with.
    pub public_url: Option<String>,
}

impl WebhookConfig {
    /// Reads the relay settings.
    ///
    /// The auth token is required unless signature validation is turned
    /// off.
    pub fn from_vars<F: Fn(&str) -> Option<String>>(
        vars: &Vars<F>,
    ) -> Result<Self, ConfigError> {
        let bind = vars.parse_or("WEBHOOK_BIND", SocketAddr::from(([0, 0, 0, 0], 5001)))?;
        let validate_signature = vars.flag_or("WEBHOOK_VALIDATE_SIGNATURE", true)?;
        let auth_token = vars.get("TWILIO_AUTH_TOKEN");
        if validate_signature && auth_token.is_none() {
            return Err(ConfigError::Missing("TWILIO_AUTH_TOKEN".to_owned()));
        }
        Ok(Self {
            bind,
            auth_token,
            validate_signature,
            public_url: vars.get("WEBHOOK_PUBLIC_URL"),
        })
    }
}

impl Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("bind", &self.bind)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("validate_signature", &self.validate_signature)
            .field("public_url", &self.public_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vars<impl Fn(&str) -> Option<String>> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Vars::new(move |key: &str| map.get(key).cloned())
    }

    #[test]
    fn test_token_required_when_validating() {
        let err = WebhookConfig::from_vars(&vars(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("TWILIO_AUTH_TOKEN".to_owned()));

        let config = WebhookConfig::from_vars(&vars(&[(
            "WEBHOOK_VALIDATE_SIGNATURE",
            "false",
        )]))
        .unwrap();
        assert!(!config.validate_signature);
        assert_eq!(config.bind.to_string(), DEFAULT_BIND);
    }

    #[test]
    fn test_overrides() {
        let config = WebhookConfig::from_vars(&vars(&[
            ("TWILIO_AUTH_TOKEN", "tok"),
            ("WEBHOOK_BIND", "127.0.0.1:8080"),
            ("WEBHOOK_PUBLIC_URL", "https://relay.example.com"),
        ]))
        .unwrap();
        assert!(config.validate_signature);
        assert_eq!(config.bind, SocketAddr::from(([127, 0, 0, 1], 8080)));
        assert_eq!(config.public_url.as_deref(), Some("https://relay.example.com"));
        assert!(!format!("{config:?}").contains("tok\""));

        let err = WebhookConfig::from_vars(&vars(&[
            ("TWILIO_AUTH_TOKEN", "tok"),
            ("WEBHOOK_BIND", "localhost"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
