use std::collections::{HashMap, VecDeque};

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tracing::debug;

use crate::connection_string::ConnectionString;
use crate::driver::{BindSlot, Driver, ExecuteStatus, StatementHandle};
use crate::error::SqlBridgeError;
use crate::field::{ColumnInfo, Field};
use crate::types::{ConnectionType, ObjectType};

use super::config::SqliteOptions;
use super::params::variant_to_sqlite_value;
use super::query::{declared_variant_type, sqlite_value_to_variant};

#[derive(Debug, Default)]
struct SqliteStatement {
    /// SQL given to `prepare`; unprepared statements run the text passed to `execute`.
    prepared_sql: Option<String>,
    values: Vec<Value>,
    columns: Vec<ColumnInfo>,
    rows: VecDeque<Vec<Value>>,
    changes: u64,
    last_error: String,
}

/// Driver backed by rusqlite.
///
/// Result rows are read into memory on execute, so a statement never holds a borrow of the
/// connection between calls.
#[derive(Debug, Default)]
pub struct SqliteDriver {
    conn: Option<Connection>,
    statements: HashMap<StatementHandle, SqliteStatement>,
    next_handle: u64,
}

fn not_open() -> SqlBridgeError {
    SqlBridgeError::ConnectionError("SQLite database is not open".to_string())
}

fn unknown_statement(stmt: StatementHandle) -> SqlBridgeError {
    SqlBridgeError::driver("statement", format!("unknown statement handle {stmt}"))
}

fn describe(stmt: &rusqlite::Statement<'_>) -> Vec<ColumnInfo> {
    stmt.columns()
        .iter()
        .map(|col| {
            let variant_type = declared_variant_type(col.decl_type());
            ColumnInfo {
                name: col.name().to_string(),
                native_type: 0,
                variant_type,
                byte_size: 0,
                scale: 0,
            }
        })
        .collect()
}

impl SqliteDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn run(
        conn: &Connection,
        entry: &mut SqliteStatement,
        sql: &str,
    ) -> Result<(), SqlBridgeError> {
        let mut prepared = conn.prepare_cached(sql)?;
        entry.rows.clear();
        if prepared.column_count() == 0 {
            let changed = prepared.execute(params_from_iter(entry.values.iter()))?;
            entry.changes = u64::try_from(changed).unwrap_or(u64::MAX);
            entry.columns.clear();
            return Ok(());
        }
        entry.columns = describe(&prepared);
        let read_only = prepared.readonly();
        let width = entry.columns.len();
        let mut rows = prepared.query(params_from_iter(entry.values.iter()))?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(row.get::<_, Value>(i)?);
            }
            entry.rows.push_back(values);
        }
        drop(rows);
        // changes() still holds the last DML count after a plain SELECT
        entry.changes = if read_only {
            u64::try_from(entry.rows.len()).unwrap_or(u64::MAX)
        } else {
            conn.changes()
        };
        Ok(())
    }
}

impl Driver for SqliteDriver {
    fn connection_type(&self) -> ConnectionType {
        ConnectionType::Sqlite
    }

    fn description(&self) -> String {
        format!("SQLite3 {}", rusqlite::version())
    }

    fn open(&mut self, connection_string: &ConnectionString) -> Result<(), SqlBridgeError> {
        let options = SqliteOptions::from_connection_string(connection_string)?;
        self.conn = Some(options.open()?);
        debug!("sqlite opened {}", options.db_path);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SqlBridgeError> {
        self.statements.clear();
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, err)| SqlBridgeError::SqliteError(err))?;
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.conn.is_some()
    }

    fn begin_transaction(&mut self) -> Result<(), SqlBridgeError> {
        let conn = self.conn.as_ref().ok_or_else(not_open)?;
        conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(())
    }

    fn end_transaction(&mut self, commit: bool) -> Result<(), SqlBridgeError> {
        let conn = self.conn.as_ref().ok_or_else(not_open)?;
        conn.execute_batch(if commit { "COMMIT" } else { "ROLLBACK" })?;
        Ok(())
    }

    fn alloc_stmt(&mut self) -> Result<StatementHandle, SqlBridgeError> {
        if self.conn.is_none() {
            return Err(not_open());
        }
        self.next_handle += 1;
        let handle = StatementHandle(self.next_handle);
        self.statements.insert(handle, SqliteStatement::default());
        Ok(handle)
    }

    fn free_stmt(&mut self, stmt: StatementHandle) -> Result<(), SqlBridgeError> {
        self.statements.remove(&stmt);
        Ok(())
    }

    fn close_stmt(&mut self, stmt: StatementHandle) -> Result<(), SqlBridgeError> {
        if let Some(entry) = self.statements.get_mut(&stmt) {
            entry.rows.clear();
        }
        Ok(())
    }

    fn prepare(&mut self, stmt: StatementHandle, sql: &str) -> Result<(), SqlBridgeError> {
        let conn = self.conn.as_ref().ok_or_else(not_open)?;
        let entry = self
            .statements
            .get_mut(&stmt)
            .ok_or_else(|| unknown_statement(stmt))?;
        match conn.prepare_cached(sql) {
            Ok(prepared) => {
                entry.columns = describe(&prepared);
                entry.prepared_sql = Some(sql.to_string());
                Ok(())
            }
            Err(err) => {
                entry.last_error = err.to_string();
                Err(err.into())
            }
        }
    }

    fn bind_parameters(
        &mut self,
        stmt: StatementHandle,
        params: &[BindSlot<'_>],
    ) -> Result<(), SqlBridgeError> {
        let entry = self
            .statements
            .get_mut(&stmt)
            .ok_or_else(|| unknown_statement(stmt))?;
        entry.values = params
            .iter()
            .map(|slot| variant_to_sqlite_value(slot.name, slot.value))
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    fn execute(
        &mut self,
        stmt: StatementHandle,
        sql: &str,
    ) -> Result<ExecuteStatus, SqlBridgeError> {
        let conn = self.conn.as_ref().ok_or_else(not_open)?;
        let entry = self
            .statements
            .get_mut(&stmt)
            .ok_or_else(|| unknown_statement(stmt))?;
        let text = entry.prepared_sql.clone().unwrap_or_else(|| sql.to_string());
        match Self::run(conn, entry, &text) {
            Ok(()) => Ok(ExecuteStatus::Done),
            Err(err) => {
                entry.last_error = err.to_string();
                Err(err)
            }
        }
    }

    fn col_count(&mut self, stmt: StatementHandle) -> Result<usize, SqlBridgeError> {
        self.statements
            .get(&stmt)
            .map(|entry| entry.columns.len())
            .ok_or_else(|| unknown_statement(stmt))
    }

    fn describe_columns(
        &mut self,
        stmt: StatementHandle,
    ) -> Result<Vec<ColumnInfo>, SqlBridgeError> {
        self.statements
            .get(&stmt)
            .map(|entry| entry.columns.clone())
            .ok_or_else(|| unknown_statement(stmt))
    }

    fn fetch(
        &mut self,
        stmt: StatementHandle,
        fields: &mut [Field],
    ) -> Result<bool, SqlBridgeError> {
        let entry = self
            .statements
            .get_mut(&stmt)
            .ok_or_else(|| unknown_statement(stmt))?;
        let Some(row) = entry.rows.pop_front() else {
            return Ok(false);
        };
        for (field, value) in fields.iter_mut().zip(row) {
            let declared = field.data_type();
            field.set_value(sqlite_value_to_variant(value, declared));
        }
        Ok(true)
    }

    fn rows_affected(&self, stmt: StatementHandle) -> u64 {
        self.statements.get(&stmt).map_or(0, |entry| entry.changes)
    }

    fn error_text(&self, stmt: StatementHandle) -> String {
        self.statements
            .get(&stmt)
            .map(|entry| entry.last_error.clone())
            .unwrap_or_default()
    }

    fn object_list(&mut self, kind: ObjectType) -> Result<Vec<String>, SqlBridgeError> {
        let conn = self.conn.as_ref().ok_or_else(not_open)?;
        let sql = match kind {
            ObjectType::Tables => "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            ObjectType::Views => "SELECT name FROM sqlite_master WHERE type='view'",
            ObjectType::Databases => "SELECT name FROM pragma_database_list",
            ObjectType::Procedures | ObjectType::Functions => return Ok(Vec::new()),
        };
        let mut stmt = conn.prepare(sql)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    fn param_mark(&self, index: u32) -> String {
        format!("?{index}")
    }
}
