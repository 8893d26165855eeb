// PostgreSQL module - the driver built on the blocking `postgres` client
//
// - config: `postgres::Config` from a connection string
// - params: pre-encoded binary parameters
// - query: column metadata and binary value extraction
// - catalog: object-list queries
// - driver: the `Driver` implementation

pub mod catalog;
pub mod config;
pub mod driver;
pub mod params;
pub mod query;

pub use config::pg_config_from_connection_string;
pub use driver::PostgresDriver;
pub use params::{Params, WireValue};
pub use query::postgres_extract_value;
