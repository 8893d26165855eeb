//! The contract every vendor driver implements.
//!
//! Only `Connection` and `Query` call into a driver. Statement handles are owned by the
//! driver; callers keep the opaque [`StatementHandle`] and nothing else.

mod registry;

use std::fmt;

use crate::connection_string::ConnectionString;
use crate::error::SqlBridgeError;
use crate::field::{ColumnInfo, Field};
use crate::types::{ConnectionType, ObjectType, Variant};

pub use registry::{DriverFactory, driver_factory, register_driver, registered_drivers};

/// Opaque identifier of a driver-side statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StatementHandle(pub u64);

impl fmt::Display for StatementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stmt#{}", self.0)
    }
}

/// Outcome of `execute` and `param_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteStatus {
    Done,
    /// The driver wants the payload of the deferred parameter at this bind position.
    NeedData(u32),
}

/// One bind position handed to `bind_parameters`.
#[derive(Debug, Clone, Copy)]
pub struct BindSlot<'a> {
    pub position: u32,
    pub name: &'a str,
    pub value: &'a Variant,
    /// Sent after execute through `put_data` instead of inline.
    pub deferred: bool,
}

fn not_supported(connection_type: ConnectionType, operation: &str) -> SqlBridgeError {
    SqlBridgeError::UnsupportedDialectOperation {
        operation: operation.to_string(),
        dialect: connection_type.to_string(),
    }
}

/// Vendor driver operations.
///
/// Errors are returned raw; callers tag them with the operation name.
pub trait Driver: Send {
    fn connection_type(&self) -> ConnectionType;

    fn description(&self) -> String {
        self.connection_type().to_string()
    }

    fn open(&mut self, connection_string: &ConnectionString) -> Result<(), SqlBridgeError>;

    fn close(&mut self) -> Result<(), SqlBridgeError>;

    fn is_active(&self) -> bool;

    fn begin_transaction(&mut self) -> Result<(), SqlBridgeError>;

    fn end_transaction(&mut self, commit: bool) -> Result<(), SqlBridgeError>;

    fn alloc_stmt(&mut self) -> Result<StatementHandle, SqlBridgeError>;

    /// Release the statement; the handle is invalid afterwards.
    fn free_stmt(&mut self, stmt: StatementHandle) -> Result<(), SqlBridgeError>;

    /// Discard any pending result rows, keeping the statement (and its prepared form).
    fn close_stmt(&mut self, stmt: StatementHandle) -> Result<(), SqlBridgeError>;

    fn prepare(&mut self, stmt: StatementHandle, sql: &str) -> Result<(), SqlBridgeError>;

    fn bind_parameters(
        &mut self,
        stmt: StatementHandle,
        params: &[BindSlot<'_>],
    ) -> Result<(), SqlBridgeError>;

    /// Run the statement; `sql` is used when the statement was not prepared.
    fn execute(&mut self, stmt: StatementHandle, sql: &str)
    -> Result<ExecuteStatus, SqlBridgeError>;

    /// Stream one chunk of the deferred parameter named by the last `NeedData`.
    fn put_data(&mut self, _stmt: StatementHandle, _chunk: &[u8]) -> Result<(), SqlBridgeError> {
        Err(not_supported(self.connection_type(), "queryPutData"))
    }

    /// Signal that the current deferred parameter is complete.
    fn param_data(&mut self, _stmt: StatementHandle) -> Result<ExecuteStatus, SqlBridgeError> {
        Err(not_supported(self.connection_type(), "queryParamData"))
    }

    fn col_count(&mut self, stmt: StatementHandle) -> Result<usize, SqlBridgeError>;

    fn describe_columns(&mut self, stmt: StatementHandle)
    -> Result<Vec<ColumnInfo>, SqlBridgeError>;

    /// Load the next row into `fields`; `false` once the cursor is exhausted.
    fn fetch(&mut self, stmt: StatementHandle, fields: &mut [Field])
    -> Result<bool, SqlBridgeError>;

    fn rows_affected(&self, _stmt: StatementHandle) -> u64 {
        0
    }

    /// Last error reported for the statement.
    fn error_text(&self, stmt: StatementHandle) -> String;

    fn object_list(&mut self, kind: ObjectType) -> Result<Vec<String>, SqlBridgeError>;

    /// Positional placeholder for 1-based bind position `index`.
    fn param_mark(&self, _index: u32) -> String {
        "?".to_string()
    }

    /// String/blob parameters at least this long are sent through `put_data`.
    fn inline_threshold(&self) -> Option<usize> {
        None
    }
}
