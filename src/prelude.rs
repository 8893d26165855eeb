//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::bulk::{BulkQuery, DEFAULT_GROUP_SIZE};
pub use crate::connection::{Connection, QueryStatistics, escape_sql_string};
pub use crate::connection_string::ConnectionString;
pub use crate::driver::{Driver, register_driver};
pub use crate::error::{QueryStateError, SqlBridgeError, TransactionStateError};
pub use crate::field::{Alignment, Field};
pub use crate::params::QueryParameter;
pub use crate::pool::{ConnectionPool, PoolOptions, PoolOptionsBuilder, PooledConnection};
pub use crate::query::{Query, QueryState};
pub use crate::types::{ConnectionType, Money, ObjectType, Variant, VariantType};

#[cfg(feature = "postgres")]
pub use crate::postgres::PostgresDriver;
#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteDriver;
