use std::time::Duration;

use serde::Deserialize;

use crate::error::SqlBridgeError;

const DEFAULT_MAX_CONNECTIONS: usize = 10;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Options for a `ConnectionPool`.
///
/// Deserialises from JSON such as `{"max_connections": 4, "acquire_timeout_ms": 2500}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolOptions {
    pub max_connections: usize,
    #[serde(rename = "acquire_timeout_ms", with = "millis")]
    pub acquire_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

impl PoolOptions {
    #[must_use]
    pub fn new(max_connections: usize) -> Self {
        Self {
            max_connections,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    /// Parse options from a JSON document.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::ConfigError` for malformed JSON or unknown keys.
    pub fn from_json(text: &str) -> Result<Self, SqlBridgeError> {
        let options: Self = serde_json::from_str(text)
            .map_err(|e| SqlBridgeError::ConfigError(format!("invalid pool options: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    /// # Errors
    /// Returns `SqlBridgeError::ConfigError` when `max_connections` is zero.
    pub fn validate(&self) -> Result<(), SqlBridgeError> {
        if self.max_connections == 0 {
            return Err(SqlBridgeError::ConfigError(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fluent builder for pool options.
#[derive(Debug, Clone, Default)]
pub struct PoolOptionsBuilder {
    opts: PoolOptions,
}

impl PoolOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn max_connections(mut self, max_connections: usize) -> Self {
        self.opts.max_connections = max_connections;
        self
    }

    #[must_use]
    pub fn acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.opts.acquire_timeout = acquire_timeout;
        self
    }

    #[must_use]
    pub fn finish(self) -> PoolOptions {
        self.opts
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
