use std::time::Duration;

use rusqlite::Connection;

use crate::connection_string::ConnectionString;
use crate::error::SqlBridgeError;

/// Options for opening a `SQLite` database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteOptions {
    pub db_path: String,
    pub busy_timeout: Option<Duration>,
    /// `PRAGMA journal_mode` to apply after opening, e.g. `WAL`.
    pub journal_mode: Option<String>,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            busy_timeout: None,
            journal_mode: None,
        }
    }

    /// Read the database path and the `busy_timeout` (milliseconds) and `journal_mode`
    /// options from `sqlite3://host/path?busy_timeout=5000&journal_mode=WAL`.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::ConfigError` for a missing path or a non-numeric timeout.
    pub fn from_connection_string(cs: &ConnectionString) -> Result<Self, SqlBridgeError> {
        if cs.database_name().is_empty() {
            return Err(SqlBridgeError::ConfigError(format!(
                "no database path in {cs}"
            )));
        }
        let mut builder = SqliteOptionsBuilder::new(cs.database_name().to_string());
        if let Some(ms) = cs.option("busy_timeout") {
            let ms: u64 = ms.parse().map_err(|_| {
                SqlBridgeError::ConfigError(format!("busy_timeout must be milliseconds, got '{ms}'"))
            })?;
            builder = builder.busy_timeout(Duration::from_millis(ms));
        }
        if let Some(mode) = cs.option("journal_mode") {
            builder = builder.journal_mode(mode);
        }
        Ok(builder.finish())
    }

    /// Open the database and apply the session settings.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::SqliteError` if the file cannot be opened or a pragma fails.
    pub fn open(&self) -> Result<Connection, SqlBridgeError> {
        let conn = Connection::open(&self.db_path)?;
        if let Some(timeout) = self.busy_timeout {
            conn.busy_timeout(timeout)?;
        }
        if let Some(mode) = &self.journal_mode {
            let applied: String = conn.pragma_update_and_check(None, "journal_mode", mode, |row| {
                row.get(0)
            })?;
            tracing::debug!("sqlite journal_mode = {applied}");
        }
        Ok(conn)
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn journal_mode(mut self, mode: &str) -> Self {
        self.opts.journal_mode = Some(mode.to_string());
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }
}
