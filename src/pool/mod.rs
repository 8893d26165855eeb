//! Blocking connection pool.
//!
//! Connections are created lazily up to `max_connections`. A borrower that finds the pool
//! exhausted waits on a condition variable until a connection is returned or the acquire
//! timeout expires.

mod config;

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::{debug, warn};

use crate::connection::Connection;
use crate::connection_string::ConnectionString;
use crate::driver::{DriverFactory, driver_factory};
use crate::error::SqlBridgeError;

pub use config::{PoolOptions, PoolOptionsBuilder};

struct PoolSlots {
    idle: Vec<Connection>,
    /// Connections created and not yet destroyed, idle or borrowed.
    live: usize,
}

struct PoolInner {
    connection_string: ConnectionString,
    factory: DriverFactory,
    options: PoolOptions,
    slots: Mutex<PoolSlots>,
    available: Condvar,
}

impl PoolInner {
    fn lock_slots(&self) -> MutexGuard<'_, PoolSlots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connect(&self) -> Result<Connection, SqlBridgeError> {
        let conn = Connection::with_driver(self.connection_string.clone(), (self.factory)());
        conn.open()?;
        debug!(
            "pool opened connection to {}",
            self.connection_string.to_redacted_string()
        );
        Ok(conn)
    }

    fn release_slot(&self) {
        let mut slots = self.lock_slots();
        slots.live = slots.live.saturating_sub(1);
        drop(slots);
        self.available.notify_one();
    }
}

/// A shared set of connections to one database.
///
/// ```rust,no_run
/// use sqlbridge::prelude::*;
///
/// let pool = ConnectionPool::new(
///     "postgresql://app@localhost/orders".parse()?,
///     PoolOptionsBuilder::new().max_connections(4).finish(),
/// )?;
/// let conn = pool.get_connection()?;
/// let mut query = Query::new(&conn, "select count(*) from orders");
/// println!("{}", query.scalar()?);
/// # Ok::<(), SqlBridgeError>(())
/// ```
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field(
                "connection_string",
                &self.inner.connection_string.to_redacted_string(),
            )
            .field("options", &self.inner.options)
            .field("size", &self.size())
            .field("idle", &self.idle())
            .finish()
    }
}

impl ConnectionPool {
    /// # Errors
    /// Returns `SqlBridgeError::UnsupportedDriver` if no driver is registered for the
    /// connection string, or `SqlBridgeError::ConfigError` for invalid options.
    pub fn new(
        connection_string: ConnectionString,
        options: PoolOptions,
    ) -> Result<Self, SqlBridgeError> {
        options.validate()?;
        let factory = driver_factory(connection_string.driver_name())?;
        Ok(Self {
            inner: Arc::new(PoolInner {
                connection_string,
                factory,
                options,
                slots: Mutex::new(PoolSlots {
                    idle: Vec::new(),
                    live: 0,
                }),
                available: Condvar::new(),
            }),
        })
    }

    #[must_use]
    pub fn connection_string(&self) -> &ConnectionString {
        &self.inner.connection_string
    }

    #[must_use]
    pub fn options(&self) -> &PoolOptions {
        &self.inner.options
    }

    /// Live connections, idle or borrowed.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.lock_slots().live
    }

    #[must_use]
    pub fn idle(&self) -> usize {
        self.inner.lock_slots().idle.len()
    }

    /// Borrow a connection, waiting up to the acquire timeout when the pool is exhausted.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::PoolTimeout` if none became available in time, or the
    /// connection error when a new connection could not be opened.
    pub fn get_connection(&self) -> Result<PooledConnection, SqlBridgeError> {
        let inner = &self.inner;
        let timeout = inner.options.acquire_timeout;
        let deadline = Instant::now() + timeout;
        let mut slots = inner.lock_slots();
        loop {
            if let Some(conn) = slots.idle.pop() {
                return Ok(PooledConnection::new(conn, Arc::clone(inner)));
            }
            if slots.live < inner.options.max_connections {
                slots.live += 1;
                drop(slots);
                return match inner.connect() {
                    Ok(conn) => Ok(PooledConnection::new(conn, Arc::clone(inner))),
                    Err(err) => {
                        inner.release_slot();
                        Err(err)
                    }
                };
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(SqlBridgeError::PoolTimeout(timeout));
            }
            let (guard, _) = inner
                .available
                .wait_timeout(slots, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            slots = guard;
        }
    }
}

/// A borrowed connection; dropping it returns the connection to the pool.
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<PoolInner>,
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("conn", &self.conn)
            .finish_non_exhaustive()
    }
}

impl PooledConnection {
    fn new(conn: Connection, pool: Arc<PoolInner>) -> Self {
        Self {
            conn: Some(conn),
            pool,
        }
    }

    /// Close the connection and free its pool slot instead of returning it.
    pub fn destroy(mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close();
            drop(conn);
            self.pool.release_slot();
        }
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn
            .as_ref()
            .expect("pooled connection is present until dropped")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if conn.in_transaction() {
            warn!("rolling back transaction left open by pool borrower");
        }
        conn.reset_session();
        if !conn.is_open() {
            drop(conn);
            self.pool.release_slot();
            return;
        }
        let mut slots = self.pool.lock_slots();
        slots.idle.push(conn);
        drop(slots);
        self.pool.available.notify_one();
    }
}
