//! The parts of Twilio's messaging webhook protocol the relay speaks.

use std::collections::BTreeMap;
use std::fmt::{self, Debug};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

/// Checks that callbacks were signed with the account's auth token.
///
/// The signature is the base64 HMAC-SHA1 of the full request URL followed
/// by every form field, sorted by name, as name and value concatenated.
#[derive(Clone)]
pub struct SignatureValidator {
    auth_token: String,
}

impl SignatureValidator {
    /// Creates a validator for the given auth token.
    #[inline]
    pub fn new<S: Into<String>>(auth_token: S) -> Self {
        Self {
            auth_token: auth_token.into(),
        }
    }

    /// Computes the signature Twilio sends for `url` and `params`.
    pub fn sign(&self, url: &str, params: &BTreeMap<String, String>) -> String {
        BASE64.encode(self.mac(url, params).finalize().into_bytes())
    }

    /// Returns `true` if `signature` matches the request.
    pub fn validate(
        &self,
        url: &str,
        params: &BTreeMap<String, String>,
        signature: &str,
    ) -> bool {
        let Ok(signature) = BASE64.decode(signature.trim()) else {
            return false;
        };
        self.mac(url, params).verify_slice(&signature).is_ok()
    }

    fn mac(&self, url: &str, params: &BTreeMap<String, String>) -> HmacSha1 {
        let mut mac = match HmacSha1::new_from_slice(self.auth_token.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => unreachable!("HMAC accepts keys of any length"),
        };
        mac.update(url.as_bytes());
        for (key, value) in params {
            mac.update(key.as_bytes());
            mac.update(value.as_bytes());
        }
        mac
    }
}

impl Debug for SignatureValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureValidator")
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

/// Renders a TwiML document answering with a single message.
pub fn message_response(text: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Response><Message>{}</Message></Response>"#,
        escape_xml(text)
    )
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Strips the channel prefix of a WhatsApp address.
#[inline]
pub fn sender_number(from: &str) -> &str {
    from.strip_prefix("whatsapp:").unwrap_or(from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_hmac_sha1_vector() {
        let validator = SignatureValidator::new("key");
        let signature = validator
            .sign("The quick brown fox jumps over the lazy dog", &BTreeMap::new());
        assert_eq!(signature, "3nybhbi3iqa8ino29wqQcBydtNk=");
    }

    #[test]
    fn test_signature_sorts_fields() {
        let validator = SignatureValidator::new("12345");
        let url = "https://mycompany.com/myapp.php?foo=1&bar=2";
        let params = params(&[
            ("To", "+18005551212"),
            ("From", "+12349013030"),
            ("Digits", "1234"),
            ("Caller", "+12349013030"),
            ("CallSid", "CA1234567890ABCDE"),
        ]);
        assert_eq!(validator.sign(url, &params), "0/KCTR6DLpKmkAf8muzZqo1nDgQ=");
        assert!(validator.validate(url, &params, "0/KCTR6DLpKmkAf8muzZqo1nDgQ="));
        assert!(!validator.validate(url, &params, "1/KCTR6DLpKmkAf8muzZqo1nDgQ="));
        assert!(!validator.validate(url, &params, "not base64!"));
        assert!(!validator.validate("https://mycompany.com/myapp.php", &params, "0/KCTR6DLpKmkAf8muzZqo1nDgQ="));
    }

    #[test]
    fn test_message_response_escapes() {
        assert_eq!(
            message_response("Fish & Chips <2 for $5>"),
            r#"<?xml version="1.0" encoding="UTF-8"?><Response><Message>Fish &amp; Chips &lt;2 for $5&gt;</Message></Response>"#
        );
    }

    #[test]
    fn test_sender_number() {
        assert_eq!(sender_number("whatsapp:+14155238886"), "+14155238886");
        assert_eq!(sender_number("+14155238886"), "+14155238886");
    }
}
