use thiserror::Error;

#[cfg(feature = "postgres")]
use postgres;
#[cfg(feature = "sqlite")]
use rusqlite;

/// Misuse of the connection-level transaction state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransactionStateError {
    #[error("Transaction isn't started")]
    NoActiveTransaction,

    #[error("Transaction already started")]
    TransactionAlreadyActive,
}

/// Operations invalid for the current query lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryStateError {
    #[error("Query is not open")]
    QueryNotOpen,

    #[error("Query is not prepared")]
    QueryNotPrepared,

    #[error("Query has no result column '{0}'")]
    UnknownField(String),

    #[error("Query has no parameter '{0}'")]
    UnknownParameter(String),
}

#[derive(Debug, Error)]
pub enum SqlBridgeError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    PostgresError(#[from] postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("Invalid connection string '{0}'")]
    InvalidConnectionString(String),

    #[error("Unsupported database driver '{0}'")]
    UnsupportedDriver(String),

    #[error(transparent)]
    TransactionState(#[from] TransactionStateError),

    #[error(transparent)]
    QueryState(#[from] QueryStateError),

    #[error("Unsupported parameter type ({type_name}) for parameter '{name}'")]
    UnsupportedParameterType { name: String, type_name: String },

    #[error("Operation '{operation}' is not supported for {dialect}")]
    UnsupportedDialectOperation { operation: String, dialect: String },

    /// Error text from the backend, prefixed by the failing operation.
    #[error("Exception in {operation}: {message}")]
    DriverError { operation: String, message: String },

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Timed out after {0:?} waiting for a pooled connection")]
    PoolTimeout(std::time::Duration),
}

impl SqlBridgeError {
    /// Wrap any error as a `DriverError` tagged with the operation that failed.
    #[must_use]
    pub fn driver(operation: &str, err: impl std::fmt::Display) -> Self {
        SqlBridgeError::DriverError {
            operation: operation.to_string(),
            message: err.to_string(),
        }
    }

    /// Re-tag an error with the operation name, keeping state errors intact.
    ///
    /// Transaction/query state errors, marshalling gaps and pool errors are part of the
    /// caller-visible taxonomy and pass through unchanged.
    #[must_use]
    pub fn in_operation(self, operation: &str) -> Self {
        match self {
            SqlBridgeError::DriverError { .. }
            | SqlBridgeError::TransactionState(_)
            | SqlBridgeError::QueryState(_)
            | SqlBridgeError::ParameterError(_)
            | SqlBridgeError::UnsupportedParameterType { .. }
            | SqlBridgeError::UnsupportedDialectOperation { .. }
            | SqlBridgeError::UnsupportedDriver(_)
            | SqlBridgeError::PoolTimeout(_)
            | SqlBridgeError::ConnectionError(_) => self,
            other => SqlBridgeError::driver(operation, other),
        }
    }

    #[must_use]
    pub fn is_transaction_state(&self) -> bool {
        matches!(self, SqlBridgeError::TransactionState(_))
    }

    #[must_use]
    pub fn is_query_state(&self) -> bool {
        matches!(self, SqlBridgeError::QueryState(_))
    }
}
