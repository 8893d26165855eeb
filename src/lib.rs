//! Blocking, dialect-agnostic database access.
//!
//! A [`Connection`] wraps one session of a vendor [`driver::Driver`]; [`Query`] runs
//! statements with `:name` parameters through it; [`ConnectionPool`] shares connections
//! between threads; [`bulk::BulkQuery`] batches multi-row inserts and deletes.

pub mod bulk;
pub mod connection;
pub mod connection_string;
pub mod driver;
pub mod error;
pub mod field;
pub mod params;
pub mod pool;
pub mod prelude;
pub mod query;
pub mod translation;
pub mod types;
pub mod wire;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use connection::Connection;
pub use connection_string::ConnectionString;
pub use error::{QueryStateError, SqlBridgeError, TransactionStateError};
pub use pool::{ConnectionPool, PoolOptions, PoolOptionsBuilder, PooledConnection};
pub use query::{Query, QueryState};
pub use types::{ConnectionType, Money, ObjectType, Variant, VariantType};
