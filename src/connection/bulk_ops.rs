use crate::bulk::{BulkQuery, DEFAULT_GROUP_SIZE};
use crate::error::SqlBridgeError;
use crate::types::Variant;

use super::Connection;

impl Connection {
    /// Insert `rows` in multi-row groups and return the generated keys in row order.
    ///
    /// Runs inside a transaction started here unless the caller already holds one
    /// (SQLite never gets the implicit transaction). Without `key_column` no ids are
    /// returned.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::ParameterError` for a row whose length differs from
    /// `columns`, or the failing group's driver error.
    pub fn bulk_insert(
        &self,
        table: &str,
        key_column: Option<&str>,
        columns: &[&str],
        rows: &[Vec<Variant>],
        group_size: usize,
    ) -> Result<Vec<i64>, SqlBridgeError> {
        self.open()?;
        self.with_ambient_transaction(|| {
            let mut bulk = BulkQuery::new(self, table, key_column, columns, group_size)?;
            bulk.insert_rows(rows)
        })
    }

    /// Delete the rows whose `key_column` is in `keys`. Absent keys are not an error.
    ///
    /// # Errors
    /// Returns the failing group's driver error.
    pub fn bulk_delete(
        &self,
        table: &str,
        key_column: &str,
        keys: &[Variant],
    ) -> Result<u64, SqlBridgeError> {
        self.open()?;
        self.with_ambient_transaction(|| {
            let mut bulk =
                BulkQuery::new(self, table, Some(key_column), &[], DEFAULT_GROUP_SIZE)?;
            bulk.delete_rows(keys)
        })
    }
}
