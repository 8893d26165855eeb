use tracing::{debug, warn};

use crate::error::{SqlBridgeError, TransactionStateError};
use crate::types::ConnectionType;

use super::Connection;

impl Connection {
    /// Start a transaction on the open session.
    ///
    /// # Errors
    /// Returns `TransactionStateError::TransactionAlreadyActive` if one is already running,
    /// or the driver's error tagged `beginTransaction`.
    pub fn begin_transaction(&self) -> Result<(), SqlBridgeError> {
        self.open()?;
        let mut state = self.lock();
        if state.in_transaction {
            return Err(TransactionStateError::TransactionAlreadyActive.into());
        }
        state
            .driver
            .begin_transaction()
            .map_err(|err| err.in_operation("beginTransaction"))?;
        state.in_transaction = true;
        debug!("transaction started");
        Ok(())
    }

    /// # Errors
    /// Returns `TransactionStateError::NoActiveTransaction` without a running transaction,
    /// or the driver's error tagged `endTransaction`. The transaction stays open when the
    /// commit itself fails so the caller can still roll back.
    pub fn commit(&self) -> Result<(), SqlBridgeError> {
        let mut state = self.lock();
        if !state.in_transaction {
            return Err(TransactionStateError::NoActiveTransaction.into());
        }
        state
            .driver
            .end_transaction(true)
            .map_err(|err| err.in_operation("endTransaction"))?;
        state.in_transaction = false;
        debug!("transaction committed");
        Ok(())
    }

    /// # Errors
    /// Returns `TransactionStateError::NoActiveTransaction` without a running transaction,
    /// or the driver's error tagged `endTransaction`. The flag is cleared either way.
    pub fn rollback(&self) -> Result<(), SqlBridgeError> {
        let mut state = self.lock();
        if !state.in_transaction {
            return Err(TransactionStateError::NoActiveTransaction.into());
        }
        state.in_transaction = false;
        state
            .driver
            .end_transaction(false)
            .map_err(|err| err.in_operation("endTransaction"))?;
        debug!("transaction rolled back");
        Ok(())
    }

    /// Run `body` inside a transaction started here, committing on success.
    ///
    /// When the caller already holds a transaction, `body` runs inside it and nothing is
    /// committed or rolled back. SQLite runs without the implicit transaction. A failed
    /// commit is rolled back before its error is returned.
    pub(crate) fn with_ambient_transaction<T>(
        &self,
        body: impl FnOnce() -> Result<T, SqlBridgeError>,
    ) -> Result<T, SqlBridgeError> {
        let owned = !self.in_transaction()
            && self.connection_type() != ConnectionType::Sqlite;
        if owned {
            self.begin_transaction()?;
        }
        match body() {
            Ok(value) => {
                if owned {
                    if let Err(commit_err) = self.commit() {
                        if let Err(rollback_err) = self.rollback() {
                            warn!("Exception in rollbackTransaction: {rollback_err}");
                        }
                        return Err(commit_err);
                    }
                }
                Ok(value)
            }
            Err(err) => {
                if owned {
                    if let Err(rollback_err) = self.rollback() {
                        warn!("Exception in rollbackTransaction: {rollback_err}");
                    }
                }
                Err(err)
            }
        }
    }
}
