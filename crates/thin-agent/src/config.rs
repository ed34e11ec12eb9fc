//! Settings read from the environment.
//!
//! Every binary of the workspace is configured through environment
//! variables. A `.env` file in the working directory is loaded first when
//! present, variables already set win over it.

use std::fmt::{self, Debug, Display};
use std::str::FromStr;
use std::time::Duration;

use thin_agent_openai_model::{OpenAIConfigBuilder, OpenAIProvider};
use thiserror::Error;

/// A variable is missing or cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("environment variable {0} is not set")]
    Missing(String),
    /// A variable holds something unusable.
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        /// Name of the variable.
        key: String,
        /// What it holds.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Typed access to a variable source.
///
/// Blank values are treated as unset.
pub struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    /// Wraps a lookup function, `std::env::var` in production.
    #[inline]
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }

    /// Returns the trimmed value of `key`, if set.
    pub fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    /// Returns the value of the first variable of `keys` that is set.
    pub fn first_of(&self, keys: &[&str]) -> Result<String, ConfigError> {
        keys.iter()
            .find_map(|key| self.get(key))
            .ok_or_else(|| ConfigError::Missing(keys.join(" or ")))
    }

    /// Parses `key`, falling back to `default` when unset.
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|err: T::Err| ConfigError::Invalid {
                key: key.to_owned(),
                reason: err.to_string(),
                value,
            }),
        }
    }

    /// Reads a boolean flag: `1`, `true`, `yes` or `on` and their opposites.
    pub fn flag_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        let Some(value) = self.get(key) else {
            return Ok(default);
        };
        match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                key: key.to_owned(),
                value,
                reason: "expected a boolean".to_owned(),
            }),
        }
    }

    /// Reads a number of seconds.
    pub fn secs_or(&self, key: &str, default: u64) -> Result<Duration, ConfigError> {
        self.parse_or(key, default).map(Duration::from_secs)
    }
}

/// Loads `.env` if present and returns a lookup over the process
/// environment.
pub fn env_lookup() -> impl Fn(&str) -> Option<String> {
    if let Ok(path) = dotenvy::dotenv() {
        debug!("loaded {}", path.display());
    }
    |key: &str| std::env::var(key).ok()
}

/// Connection to the hosted model.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelConfig {
    /// API key, from `GOOGLE_API_KEY` or `OPENAI_API_KEY`.
    pub api_key: String,
    /// `OPENAI_BASE_URL`, Gemini's compatible endpoint if unset.
    pub base_url: Option<String>,
    /// `OPENAI_MODEL`, `gemini-2.0-flash-001` if unset.
    pub model: Option<String>,
}

impl ModelConfig {
    /// Reads the model settings.
    pub fn from_vars<F: Fn(&str) -> Option<String>>(
        vars: &Vars<F>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: vars.first_of(&["GOOGLE_API_KEY", "OPENAI_API_KEY"])?,
            base_url: vars.get("OPENAI_BASE_URL"),
            model: vars.get("OPENAI_MODEL"),
        })
    }

    /// Creates the provider these settings describe.
    pub fn provider(&self) -> OpenAIProvider {
        let mut builder = OpenAIConfigBuilder::with_api_key(&self.api_key);
        if let Some(base_url) = &self.base_url {
            builder = builder.with_base_url(base_url);
        }
        if let Some(model) = &self.model {
            builder = builder.with_model(model);
        }
        OpenAIProvider::new(builder.build())
    }
}

impl Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// Settings of the HTTP fetch tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HttpConfig {
    /// `HTTP_TIMEOUT_SECS`, 30 seconds by default.
    pub timeout: Duration,
}

impl HttpConfig {
    /// Reads the HTTP tool settings.
    pub fn from_vars<F: Fn(&str) -> Option<String>>(
        vars: &Vars<F>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            timeout: vars.secs_or("HTTP_TIMEOUT_SECS", 30)?,
        })
    }
}

/// Database location and pool sizing.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// `DATABASE_URL`; when set the `DB_*` parameters are ignored.
    pub url: Option<String>,
    /// `DB_HOST`.
    pub host: String,
    /// `DB_PORT`.
    pub port: u16,
    /// `DB_NAME`.
    pub name: String,
    /// `DB_USER`.
    pub user: String,
    /// `DB_PASSWORD`.
    pub password: Option<String>,
    /// `DB_MAX_CONNECTIONS`.
    pub max_connections: u32,
    /// `DB_TIMEOUT_SECS`, how long to wait for a pooled connection.
    pub acquire_timeout: Duration,
    /// `SQL_READ_ONLY`, refuse statements that do not return rows.
    pub read_only: bool,
}

impl DatabaseConfig {
    /// Reads the database settings.
    pub fn from_vars<F: Fn(&str) -> Option<String>>(
        vars: &Vars<F>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            url: vars.get("DATABASE_URL"),
            host: vars.get("DB_HOST").unwrap_or_else(|| "localhost".to_owned()),
            port: vars.parse_or("DB_PORT", 5432)?,
            name: vars.get("DB_NAME").unwrap_or_else(|| "postgres".to_owned()),
            user: vars.get("DB_USER").unwrap_or_else(|| "postgres".to_owned()),
            password: vars.get("DB_PASSWORD"),
            max_connections: vars.parse_or("DB_MAX_CONNECTIONS", 5)?,
            acquire_timeout: vars.secs_or("DB_TIMEOUT_SECS", 30)?,
            read_only: vars.flag_or("SQL_READ_ONLY", false)?,
        })
    }
}

impl Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // URLs may embed credentials.
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("read_only", &self.read_only)
            .finish()
    }
}
