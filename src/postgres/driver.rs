use std::collections::{HashMap, VecDeque};

use postgres::{Client, NoTls, Row, Statement};
use tracing::debug;

use crate::connection_string::ConnectionString;
use crate::driver::{BindSlot, Driver, ExecuteStatus, StatementHandle};
use crate::error::SqlBridgeError;
use crate::field::{ColumnInfo, Field};
use crate::types::{ConnectionType, ObjectType};
use crate::wire::TimestampFormat;

use super::catalog::object_list_sql;
use super::config::pg_config_from_connection_string;
use super::params::Params;
use super::query::{describe_columns, fill_fields};

#[derive(Default)]
struct PgStatement {
    prepared_sql: Option<String>,
    /// Server-side statement, reused while the bound parameter types stay the same.
    statement: Option<Statement>,
    params: Params,
    columns: Vec<ColumnInfo>,
    rows: VecDeque<Row>,
    changes: u64,
    last_error: String,
}

/// Driver backed by the blocking `postgres` client.
///
/// Parameters are sent pre-encoded in the binary layouts of [`crate::wire`], and result
/// columns are decoded from their raw binary payload by type OID.
#[derive(Default)]
pub struct PostgresDriver {
    client: Option<Client>,
    timestamps: TimestampFormat,
    server_version: String,
    statements: HashMap<StatementHandle, PgStatement>,
    next_handle: u64,
}

fn not_open() -> SqlBridgeError {
    SqlBridgeError::ConnectionError("PostgreSQL connection is not open".to_string())
}

fn unknown_statement(stmt: StatementHandle) -> SqlBridgeError {
    SqlBridgeError::driver("statement", format!("unknown statement handle {stmt}"))
}

/// Server message without the client library's prefix.
fn error_message(err: &postgres::Error) -> String {
    err.as_db_error()
        .map_or_else(|| err.to_string(), |db| db.message().to_string())
}

impl PostgresDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How the connected server encodes timestamps.
    #[must_use]
    pub fn timestamp_format(&self) -> TimestampFormat {
        self.timestamps
    }

    fn run(
        client: &mut Client,
        entry: &mut PgStatement,
        sql: &str,
    ) -> Result<(), postgres::Error> {
        let statement = match entry.statement.take() {
            Some(statement) if statement.params() == entry.params.types.as_slice() => statement,
            _ => {
                debug!("preparing with parameter types {:?}", entry.params.types);
                client.prepare_typed(sql, &entry.params.types)?
            }
        };
        let refs = entry.params.as_refs();
        entry.rows.clear();
        if statement.columns().is_empty() {
            entry.changes = client.execute(&statement, &refs)?;
            entry.columns.clear();
        } else {
            let rows = client.query(&statement, &refs)?;
            entry.changes = u64::try_from(rows.len()).unwrap_or(u64::MAX);
            entry.columns = describe_columns(statement.columns());
            entry.rows = rows.into();
        }
        if entry.prepared_sql.is_some() {
            entry.statement = Some(statement);
        }
        Ok(())
    }
}

impl Driver for PostgresDriver {
    fn connection_type(&self) -> ConnectionType {
        ConnectionType::Postgres
    }

    fn description(&self) -> String {
        if self.server_version.is_empty() {
            "PostgreSQL".to_string()
        } else {
            format!("PostgreSQL {}", self.server_version)
        }
    }

    fn open(&mut self, connection_string: &ConnectionString) -> Result<(), SqlBridgeError> {
        let config = pg_config_from_connection_string(connection_string)?;
        let mut client = config.connect(NoTls)?;
        let setting: String = client.query_one("SHOW integer_datetimes", &[])?.get(0);
        self.timestamps = TimestampFormat::from_integer_datetimes(&setting);
        self.server_version = client.query_one("SHOW server_version", &[])?.get(0);
        debug!(
            "postgres connected, server {} ({:?} timestamps)",
            self.server_version, self.timestamps
        );
        self.client = Some(client);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SqlBridgeError> {
        self.statements.clear();
        if let Some(client) = self.client.take() {
            client.close()?;
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.client.as_ref().is_some_and(|c| !c.is_closed())
    }

    fn begin_transaction(&mut self) -> Result<(), SqlBridgeError> {
        let client = self.client.as_mut().ok_or_else(not_open)?;
        client.batch_execute("BEGIN")?;
        Ok(())
    }

    fn end_transaction(&mut self, commit: bool) -> Result<(), SqlBridgeError> {
        let client = self.client.as_mut().ok_or_else(not_open)?;
        client.batch_execute(if commit { "COMMIT" } else { "ROLLBACK" })?;
        Ok(())
    }

    fn alloc_stmt(&mut self) -> Result<StatementHandle, SqlBridgeError> {
        if self.client.is_none() {
            return Err(not_open());
        }
        self.next_handle += 1;
        let handle = StatementHandle(self.next_handle);
        self.statements.insert(handle, PgStatement::default());
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
        let client = self.client.as_mut().ok_or_else(not_open)?;
        let entry = self
            .statements
            .get_mut(&stmt)
            .ok_or_else(|| unknown_statement(stmt))?;
        match client.prepare(sql) {
            Ok(statement) => {
                entry.columns = describe_columns(statement.columns());
                entry.prepared_sql = Some(sql.to_string());
                entry.statement = Some(statement);
                Ok(())
            }
            Err(err) => {
                entry.last_error = error_message(&err);
                Err(err.into())
            }
        }
    }

    fn bind_parameters(
        &mut self,
        stmt: StatementHandle,
        params: &[BindSlot<'_>],
    ) -> Result<(), SqlBridgeError> {
        let timestamps = self.timestamps;
        let entry = self
            .statements
            .get_mut(&stmt)
            .ok_or_else(|| unknown_statement(stmt))?;
        entry.params = Params::convert(params, timestamps)?;
        Ok(())
    }

    fn execute(
        &mut self,
        stmt: StatementHandle,
        sql: &str,
    ) -> Result<ExecuteStatus, SqlBridgeError> {
        let client = self.client.as_mut().ok_or_else(not_open)?;
        let entry = self
            .statements
            .get_mut(&stmt)
            .ok_or_else(|| unknown_statement(stmt))?;
        let text = entry.prepared_sql.clone().unwrap_or_else(|| sql.to_string());
        match Self::run(client, entry, &text) {
            Ok(()) => Ok(ExecuteStatus::Done),
            Err(err) => {
                entry.last_error = error_message(&err);
                Err(err.into())
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
        let timestamps = self.timestamps;
        let entry = self
            .statements
            .get_mut(&stmt)
            .ok_or_else(|| unknown_statement(stmt))?;
        let Some(row) = entry.rows.pop_front() else {
            return Ok(false);
        };
        fill_fields(&row, fields, timestamps)?;
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
        let client = self.client.as_mut().ok_or_else(not_open)?;
        let rows = client.query(object_list_sql(kind).as_str(), &[])?;
        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    fn param_mark(&self, index: u32) -> String {
        format!("${index}")
    }
}
