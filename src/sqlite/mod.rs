// SQLite module - the rusqlite-backed driver
//
// - config: connection options read from the connection string
// - params: parameter conversion from `Variant` to rusqlite values
// - query: declared-type mapping and value extraction
// - driver: the `Driver` implementation

pub mod config;
pub mod driver;
pub mod params;
pub mod query;

pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use driver::SqliteDriver;
pub use params::variant_to_sqlite_value;
pub use query::sqlite_value_to_variant;
