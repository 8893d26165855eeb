//! Statement lifecycle: allocate, prepare, bind, execute, fetch, close.

use std::panic::Location;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::connection::{Connection, ConnectionState, QueryId, add_statistics};
use crate::driver::{BindSlot, ExecuteStatus, StatementHandle};
use crate::error::{QueryStateError, SqlBridgeError};
use crate::field::Field;
use crate::params::{ParameterList, QueryParameter};
use crate::types::Variant;

/// Deferred parameters are streamed to the driver in chunks of this size.
pub const DATA_CHUNK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryState {
    #[default]
    Closed,
    Allocated,
    Prepared,
    Active,
    Eof,
}

/// A SQL statement bound to a connection.
///
/// ```rust,no_run
/// use sqlbridge::prelude::*;
///
/// let conn = Connection::new("sqlite3://localhost/:memory:".parse()?)?;
/// let mut query = Query::new(&conn, "select name from users where id = :id");
/// query.bind("id", 42)?;
/// query.open()?;
/// while !query.eof() {
///     println!("{}", query.field_by_name("name")?.value());
///     query.next()?;
/// }
/// query.close();
/// # Ok::<(), SqlBridgeError>(())
/// ```
pub struct Query<'c> {
    connection: &'c Connection,
    id: QueryId,
    sql: String,
    statement_sql: String,
    params: ParameterList,
    fields: Vec<Field>,
    state: QueryState,
    prepared: bool,
    auto_prepare: bool,
    rows_affected: u64,
    location: &'static Location<'static>,
    duration: Duration,
    total_duration: Duration,
    total_calls: u64,
}

impl std::fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("id", &self.id)
            .field("sql", &self.sql)
            .field("state", &self.state)
            .field("prepared", &self.prepared)
            .finish_non_exhaustive()
    }
}

fn is_large_value(value: &Variant) -> bool {
    matches!(
        value,
        Variant::String(_) | Variant::Text(_) | Variant::Buffer(_)
    )
}

impl<'c> Query<'c> {
    /// Create a closed query. Execution statistics are filed under the caller's location.
    #[must_use]
    #[track_caller]
    pub fn new(connection: &'c Connection, sql: &str) -> Self {
        let mut query = Self {
            connection,
            id: connection.next_query_id(),
            sql: String::new(),
            statement_sql: String::new(),
            params: ParameterList::default(),
            fields: Vec::new(),
            state: QueryState::Closed,
            prepared: false,
            auto_prepare: true,
            rows_affected: 0,
            location: Location::caller(),
            duration: Duration::ZERO,
            total_duration: Duration::ZERO,
            total_calls: 0,
        };
        query.set_sql(sql);
        query
    }

    /// Prepare automatically on `open` (the default).
    #[must_use]
    pub fn with_auto_prepare(mut self, auto_prepare: bool) -> Self {
        self.auto_prepare = auto_prepare;
        self
    }

    #[must_use]
    pub fn connection(&self) -> &'c Connection {
        self.connection
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// SQL as sent to the driver, with positional parameter marks.
    #[must_use]
    pub fn statement_sql(&self) -> &str {
        &self.statement_sql
    }

    /// Replace the SQL text. An allocated statement is closed and field metadata is cleared;
    /// values of parameters that still occur are kept.
    pub fn set_sql(&mut self, sql: &str) {
        if self.state != QueryState::Closed {
            self.close();
        }
        let expanded = self.connection.expand_sql(sql);
        self.sql = sql.to_string();
        self.statement_sql = expanded.sql;
        self.params.rebind(&expanded.parameters);
        self.fields.clear();
        self.prepared = false;
    }

    /// Wall time of the last `open`.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    #[must_use]
    pub fn state(&self) -> QueryState {
        self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self.state, QueryState::Active | QueryState::Eof)
    }

    /// True when there is no current row.
    #[must_use]
    pub fn eof(&self) -> bool {
        self.state != QueryState::Active
    }

    #[must_use]
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    #[must_use]
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    #[must_use]
    pub fn params(&self) -> &ParameterList {
        &self.params
    }

    #[must_use]
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// # Errors
    /// Returns `QueryStateError::UnknownParameter` if the SQL has no such placeholder.
    pub fn param(&mut self, name: &str) -> Result<&mut QueryParameter, SqlBridgeError> {
        self.params.param_mut(name)
    }

    pub fn param_at(&mut self, index: usize) -> Option<&mut QueryParameter> {
        self.params.by_index_mut(index)
    }

    /// Set a parameter value by name.
    ///
    /// # Errors
    /// Returns `QueryStateError::UnknownParameter` if the SQL has no such placeholder.
    pub fn bind(
        &mut self,
        name: &str,
        value: impl Into<Variant>,
    ) -> Result<&mut Self, SqlBridgeError> {
        self.params.param_mut(name)?.set_value(value);
        Ok(self)
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// # Errors
    /// Returns `QueryStateError::UnknownField` if the result has no such column.
    pub fn field_by_name(&self, name: &str) -> Result<&Field, SqlBridgeError> {
        self.fields
            .iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| QueryStateError::UnknownField(name.to_string()).into())
    }

    /// The driver's last error text for this statement, empty when not allocated.
    #[must_use]
    pub fn error_text(&self) -> String {
        let conn = self.connection.lock();
        conn.linked
            .get(&self.id)
            .map(|stmt| conn.driver.error_text(*stmt))
            .unwrap_or_default()
    }

    /// Drop local state after the connection force-closed the statement.
    fn reset(&mut self) {
        self.state = QueryState::Closed;
        self.prepared = false;
    }

    /// Move accumulated timings into the connection's statistics.
    fn store_statistics(&mut self, conn: &mut ConnectionState) {
        if self.total_calls == 0 {
            return;
        }
        let location = format!("{}:{}", self.location.file(), self.location.line());
        add_statistics(
            &mut conn.statistics,
            location,
            self.total_duration,
            self.total_calls,
            &self.sql,
        );
        self.total_duration = Duration::ZERO;
        self.total_calls = 0;
    }

    /// Return the statement handle, allocating and linking one if needed.
    fn attach(&mut self, conn: &mut ConnectionState) -> Result<StatementHandle, SqlBridgeError> {
        if let Some(stmt) = conn.linked.get(&self.id) {
            return Ok(*stmt);
        }
        if self.state != QueryState::Closed {
            debug!("{} was closed by its connection", self.id);
            self.reset();
        }
        let stmt = conn
            .driver
            .alloc_stmt()
            .map_err(|err| err.in_operation("queryAllocStmt"))?;
        conn.linked.insert(self.id, stmt);
        self.state = QueryState::Allocated;
        Ok(stmt)
    }

    fn prepare_locked(
        &mut self,
        conn: &mut ConnectionState,
        stmt: StatementHandle,
    ) -> Result<(), SqlBridgeError> {
        conn.driver
            .prepare(stmt, &self.statement_sql)
            .map_err(|err| err.in_operation("queryPrepare"))?;
        self.prepared = true;
        self.state = QueryState::Prepared;
        Ok(())
    }

    /// Discard pending rows but keep the statement for another `open`.
    fn close_cursor(&mut self) {
        let connection = self.connection;
        let mut guard = connection.lock();
        let conn = &mut *guard;
        if let Some(stmt) = conn.linked.get(&self.id).copied() {
            if let Err(err) = conn.driver.close_stmt(stmt) {
                warn!("{}: Exception in queryCloseStmt: {err}", self.id);
            }
        }
        self.state = if self.prepared {
            QueryState::Prepared
        } else {
            QueryState::Allocated
        };
    }

    /// Allocate and prepare the statement without executing it.
    ///
    /// # Errors
    /// Returns the driver's error tagged `queryAllocStmt` or `queryPrepare`.
    pub fn prepare(&mut self) -> Result<(), SqlBridgeError> {
        if self.is_active() {
            self.close_cursor();
        }
        self.connection.open()?;
        let connection = self.connection;
        let mut guard = connection.lock();
        let conn = &mut *guard;
        let stmt = self.attach(conn)?;
        if !self.prepared {
            self.prepare_locked(conn, stmt)?;
        }
        Ok(())
    }

    /// Bind parameters and execute. When the statement returns rows the query becomes active
    /// and the first row is loaded; otherwise it stays allocated.
    ///
    /// # Errors
    /// Returns the driver's error tagged with the failing step (`queryAllocStmt`,
    /// `queryPrepare`, `queryBindParameters`, `queryExecute`, `queryFetch`), or
    /// `SqlBridgeError::UnsupportedParameterType` for a parameter the driver cannot send.
    pub fn open(&mut self) -> Result<(), SqlBridgeError> {
        if self.is_active() {
            self.close_cursor();
        }
        self.connection.open()?;

        debug!("{}: opening {}", self.id, self.statement_sql);
        let started = Instant::now();
        let result = self.open_locked();
        self.duration = started.elapsed();
        self.total_duration += self.duration;
        self.total_calls += 1;
        debug!("{}: duration {:.3} sec", self.id, self.duration.as_secs_f64());
        if let Err(err) = &result {
            debug!("{}: failed: {err}", self.id);
        }
        result
    }

    fn open_locked(&mut self) -> Result<(), SqlBridgeError> {
        let connection = self.connection;
        let mut guard = connection.lock();
        let conn = &mut *guard;
        let stmt = self.attach(conn)?;

        if self.auto_prepare && !self.prepared {
            self.prepare_locked(conn, stmt)?;
        }

        self.bind_parameters(conn, stmt)?;

        let mut status = conn
            .driver
            .execute(stmt, &self.statement_sql)
            .map_err(|err| err.in_operation("queryExecute"))?;
        while let ExecuteStatus::NeedData(position) = status {
            status = self.send_deferred(conn, stmt, position)?;
        }
        self.rows_affected = conn.driver.rows_affected(stmt);

        let column_count = conn
            .driver
            .col_count(stmt)
            .map_err(|err| err.in_operation("queryColCount"))?;
        if column_count == 0 {
            return Ok(());
        }

        if self.fields.len() != column_count {
            let columns = conn
                .driver
                .describe_columns(stmt)
                .map_err(|err| err.in_operation("queryColAttributes"))?;
            self.fields = columns
                .into_iter()
                .enumerate()
                .map(|(index, info)| Field::from_column(index, info))
                .collect();
        }

        self.state = QueryState::Active;
        let has_row = conn
            .driver
            .fetch(stmt, &mut self.fields)
            .map_err(|err| err.in_operation("queryFetch"))?;
        if !has_row {
            self.state = QueryState::Eof;
        }
        Ok(())
    }

    fn bind_parameters(
        &self,
        conn: &mut ConnectionState,
        stmt: StatementHandle,
    ) -> Result<(), SqlBridgeError> {
        let threshold = conn.driver.inline_threshold();
        let slots: Vec<BindSlot<'_>> = self
            .params
            .bind_slots()
            .into_iter()
            .map(|(position, param)| BindSlot {
                position,
                name: param.name(),
                value: param.value(),
                deferred: threshold.is_some_and(|limit| {
                    is_large_value(param.value()) && param.value().data_size() >= limit
                }),
            })
            .collect();
        conn.driver
            .bind_parameters(stmt, &slots)
            .map_err(|err| err.in_operation("queryBindParameters"))
    }

    fn send_deferred(
        &self,
        conn: &mut ConnectionState,
        stmt: StatementHandle,
        position: u32,
    ) -> Result<ExecuteStatus, SqlBridgeError> {
        let param = self
            .params
            .iter()
            .find(|p| p.bind_positions().contains(&position))
            .ok_or_else(|| {
                SqlBridgeError::ParameterError(format!(
                    "driver requested data for unbound position {position}"
                ))
            })?;
        let payload = param.value().raw_bytes();
        for chunk in payload.chunks(DATA_CHUNK_SIZE) {
            conn.driver
                .put_data(stmt, chunk)
                .map_err(|err| err.in_operation("queryPutData"))?;
        }
        conn.driver
            .param_data(stmt)
            .map_err(|err| err.in_operation("queryParamData"))
    }

    /// Advance to the next row. Returns `false` once the result set is exhausted.
    ///
    /// # Errors
    /// Returns `QueryStateError::QueryNotOpen` unless the query is active, or the driver's
    /// error tagged `queryFetch`.
    pub fn next(&mut self) -> Result<bool, SqlBridgeError> {
        match self.state {
            QueryState::Active => {}
            QueryState::Eof => return Ok(false),
            _ => return Err(QueryStateError::QueryNotOpen.into()),
        }
        let connection = self.connection;
        let mut guard = connection.lock();
        let conn = &mut *guard;
        let Some(stmt) = conn.linked.get(&self.id).copied() else {
            drop(guard);
            self.reset();
            return Err(QueryStateError::QueryNotOpen.into());
        };
        let has_row = conn
            .driver
            .fetch(stmt, &mut self.fields)
            .map_err(|err| err.in_operation("queryFetch"))?;
        if !has_row {
            self.state = QueryState::Eof;
        }
        Ok(has_row)
    }

    /// Same as [`Query::next`].
    ///
    /// # Errors
    /// See [`Query::next`].
    pub fn fetch(&mut self) -> Result<bool, SqlBridgeError> {
        self.next()
    }

    /// Open then close; returns the number of affected rows.
    ///
    /// # Errors
    /// Returns the error from `open`. The statement is closed either way.
    pub fn exec(&mut self) -> Result<u64, SqlBridgeError> {
        let result = self.open();
        self.close();
        result.map(|()| self.rows_affected)
    }

    /// Replace the SQL text and execute it.
    ///
    /// # Errors
    /// See [`Query::exec`].
    pub fn exec_sql(&mut self, sql: &str) -> Result<u64, SqlBridgeError> {
        self.set_sql(sql);
        self.exec()
    }

    /// First column of the first row, or `Variant::Null` when no row is returned.
    ///
    /// # Errors
    /// See [`Query::open`].
    pub fn scalar(&mut self) -> Result<Variant, SqlBridgeError> {
        let result = self.open().map(|()| {
            if self.state == QueryState::Active {
                self.fields
                    .first()
                    .map(|f| f.value().clone())
                    .unwrap_or_default()
            } else {
                Variant::Null
            }
        });
        self.close();
        result
    }

    /// Free the statement and detach from the connection. Safe to call in any state.
    pub fn close(&mut self) {
        let connection = self.connection;
        let mut guard = connection.lock();
        let conn = &mut *guard;
        if let Some(stmt) = conn.linked.remove(&self.id) {
            if let Err(err) = conn.driver.free_stmt(stmt) {
                warn!("{}: Exception in queryFreeStmt: {err}", self.id);
            }
        }
        self.store_statistics(conn);
        drop(guard);
        self.reset();
    }
}

impl Drop for Query<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
