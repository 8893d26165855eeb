//! One physical session plus its transaction flag and linked queries.

mod batch;
mod bulk_ops;
mod statistics;
mod tx;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::connection_string::ConnectionString;
use crate::driver::{Driver, StatementHandle, driver_factory};
use crate::error::SqlBridgeError;
use crate::translation::{ExpandedSql, expand_named_parameters};
use crate::types::{ConnectionType, ObjectType};

pub use batch::{escape_sql_string, split_statements};
pub use statistics::{QueryStatistics, StatisticsMap};
pub(crate) use statistics::add_statistics;

/// Identifier of a `Query` within its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(u64);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "query#{}", self.0)
    }
}

pub(crate) struct ConnectionState {
    pub(crate) driver: Box<dyn Driver>,
    pub(crate) in_transaction: bool,
    pub(crate) linked: HashMap<QueryId, StatementHandle>,
    pub(crate) statistics: StatisticsMap,
}

impl ConnectionState {
    /// Free every linked statement. Failures are logged; the links are always dropped.
    fn disconnect_all_queries(&mut self) {
        for (query, stmt) in self.linked.drain() {
            if let Err(err) = self.driver.free_stmt(stmt) {
                warn!("Exception in disconnectAllQueries: {query} ({stmt}): {err}");
            }
        }
    }

    fn rollback_if_open(&mut self) {
        if self.in_transaction {
            if let Err(err) = self.driver.end_transaction(false) {
                warn!("Exception in rollbackTransaction: {err}");
            }
            self.in_transaction = false;
        }
    }
}

/// A database connection.
///
/// Methods take `&self`; the session, transaction flag and linked-query map sit behind one
/// mutex so the pool and the queries of the current borrower never interleave driver calls.
///
/// ```rust,no_run
/// use sqlbridge::prelude::*;
///
/// let conn = Connection::new("sqlite3://localhost/:memory:".parse()?)?;
/// conn.open()?;
/// conn.begin_transaction()?;
/// Query::new(&conn, "create table t(id integer primary key, name text)").exec()?;
/// conn.commit()?;
/// # Ok::<(), SqlBridgeError>(())
/// ```
pub struct Connection {
    connection_string: ConnectionString,
    connection_type: ConnectionType,
    state: Mutex<ConnectionState>,
    next_query_id: AtomicU64,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("connection_string", &self.connection_string.to_redacted_string())
            .field("connection_type", &self.connection_type)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Create an unopened connection using the registered driver for the string's scheme.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::UnsupportedDriver` if no driver is registered for the scheme.
    pub fn new(connection_string: ConnectionString) -> Result<Self, SqlBridgeError> {
        let factory = driver_factory(connection_string.driver_name())?;
        Ok(Self::with_driver(connection_string, factory()))
    }

    /// Create an unopened connection around an explicit driver instance.
    #[must_use]
    pub fn with_driver(connection_string: ConnectionString, driver: Box<dyn Driver>) -> Self {
        Self {
            connection_type: driver.connection_type(),
            connection_string,
            state: Mutex::new(ConnectionState {
                driver,
                in_transaction: false,
                linked: HashMap::new(),
                statistics: StatisticsMap::new(),
            }),
            next_query_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn connection_string(&self) -> &ConnectionString {
        &self.connection_string
    }

    #[must_use]
    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    #[must_use]
    pub fn driver_description(&self) -> String {
        self.lock().driver.description()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.lock().driver.is_active()
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.lock().in_transaction
    }

    /// Number of queries currently holding a statement on this connection.
    #[must_use]
    pub fn linked_query_count(&self) -> usize {
        self.lock().linked.len()
    }

    /// Execution statistics of closed queries, keyed by the `file:line` that created them.
    /// Cleared whenever a new session is opened.
    #[must_use]
    pub fn statistics(&self) -> StatisticsMap {
        self.lock().statistics.clone()
    }

    pub fn clear_statistics(&self) {
        self.lock().statistics.clear();
    }

    /// Establish the session. Does nothing when already open.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::ConnectionError` carrying the driver's error text.
    pub fn open(&self) -> Result<(), SqlBridgeError> {
        let mut state = self.lock();
        if state.driver.is_active() {
            return Ok(());
        }
        state.driver.open(&self.connection_string).map_err(|err| {
            SqlBridgeError::ConnectionError(format!("Exception in openDatabase: {err}"))
        })?;
        state.in_transaction = false;
        state.statistics.clear();
        debug!(
            "opened {}",
            self.connection_string.to_redacted_string()
        );
        Ok(())
    }

    /// Close the current session and open a new one for another connection string.
    ///
    /// The driver is replaced when the new string names a different driver.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::UnsupportedDriver` for an unknown driver, or
    /// `SqlBridgeError::ConnectionError` if the new session cannot be opened.
    pub fn open_with(&mut self, connection_string: ConnectionString) -> Result<(), SqlBridgeError> {
        self.close();
        if connection_string.driver_name() != self.connection_string.driver_name() {
            let driver = driver_factory(connection_string.driver_name())?();
            self.connection_type = driver.connection_type();
            let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
            state.driver = driver;
        }
        self.connection_string = connection_string;
        self.open()
    }

    /// Roll back, force-close every linked query, then release the session.
    ///
    /// Never fails: driver errors during teardown are logged so the session is always released.
    pub fn close(&self) {
        let mut state = self.lock();
        state.rollback_if_open();
        state.disconnect_all_queries();
        if state.driver.is_active() {
            if let Err(err) = state.driver.close() {
                warn!("Exception in closeDatabase: {err}");
            }
            debug!(
                "closed {}",
                self.connection_string.to_redacted_string()
            );
        }
    }

    /// Reset for the next pool borrower: roll back and drop the previous borrower's queries.
    pub(crate) fn reset_session(&self) {
        let mut state = self.lock();
        state.rollback_if_open();
        state.disconnect_all_queries();
    }

    /// Enumerate catalog objects of one kind.
    ///
    /// # Errors
    /// Returns `SqlBridgeError` if the connection cannot be opened or the catalog query fails.
    pub fn object_list(&self, kind: ObjectType) -> Result<Vec<String>, SqlBridgeError> {
        self.open()?;
        self.lock()
            .driver
            .object_list(kind)
            .map_err(|err| err.in_operation("objectList"))
    }

    pub(crate) fn next_query_id(&self) -> QueryId {
        QueryId(self.next_query_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Expand `:name` placeholders with this connection's parameter marks.
    pub(crate) fn expand_sql(&self, sql: &str) -> ExpandedSql {
        let state = self.lock();
        expand_named_parameters(sql, |n| state.driver.param_mark(n))
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
