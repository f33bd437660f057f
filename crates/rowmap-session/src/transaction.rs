//! Transaction-scoped connection leasing.
//!
//! One [`TransactionManager`] exists per session and binds one logical
//! transaction to at most one physical connection. `begin` only records a
//! marker; the connection is borrowed lazily from the pool on the first
//! [`TransactionManager::connection`] call, with auto-commit disabled, and
//! every later call inside the same transaction returns that same bound
//! connection. Commit/rollback hand the connection back to the pool.
//!
//! The manager is an explicit per-session object: sessions are used by one
//! execution context at a time, so there is no ambient thread-local binding.

use std::sync::Arc;

use rowmap_core::{Connection, Error, Result};
use rowmap_pool::{ConnectionPool, PooledConnection};

/// Lifecycle of the logical transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// No transaction. `begin` is allowed.
    Idle,
    /// Between `begin` and commit/rollback; possibly not yet bound.
    Active,
    /// Terminal: committed. Reset with `clear`.
    Committed,
    /// Terminal: rolled back. Reset with `clear`.
    RolledBack,
}

/// Binds one logical transaction to one pooled connection.
pub struct TransactionManager {
    pool: Arc<ConnectionPool>,
    status: TransactionStatus,
    bound: Option<PooledConnection>,
}

impl TransactionManager {
    /// Create an idle manager over the shared pool.
    #[must_use]
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            pool,
            status: TransactionStatus::Idle,
            bound: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    /// Whether a transaction is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    /// Whether the active transaction has borrowed its connection yet.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// Start a transaction. No physical connection is taken yet.
    pub fn begin(&mut self) -> Result<()> {
        match self.status {
            TransactionStatus::Idle => {
                self.status = TransactionStatus::Active;
                tracing::debug!("Transaction started");
                Ok(())
            }
            TransactionStatus::Active => Err(Error::TransactionState(
                "transaction is already in progress",
            )),
            TransactionStatus::Committed | TransactionStatus::RolledBack => Err(
                Error::TransactionState("transaction already completed; clear it first"),
            ),
        }
    }

    /// The transaction's connection, borrowing one from the pool and
    /// disabling auto-commit on first use.
    pub fn connection(&mut self) -> Result<&mut dyn Connection> {
        if self.status != TransactionStatus::Active {
            return Err(Error::TransactionState("transaction is not active"));
        }
        if self.bound.is_none() {
            let mut conn = self.pool.acquire()?;
            conn.set_auto_commit(false).map_err(Error::connection)?;
            tracing::debug!("Bound a pooled connection to the transaction");
            self.bound = Some(conn);
        }
        match self.bound.as_mut() {
            Some(conn) => Ok(&mut **conn),
            None => Err(Error::TransactionState("transaction is not active")),
        }
    }

    /// Commit the transaction and release its connection.
    ///
    /// The owning session flushes its pending actions before calling this,
    /// so every staged write lands inside the transaction. Fails with a
    /// transaction-state error when no connection is bound.
    pub fn commit(&mut self) -> Result<()> {
        match self.bound.take() {
            Some(mut conn) => {
                conn.commit().map_err(Error::connection)?;
                // Leave the connection in auto-commit mode for its next
                // lease; pool peers expect a clean connection.
                conn.set_auto_commit(true).map_err(Error::connection)?;
                self.status = TransactionStatus::Committed;
                tracing::debug!("Transaction committed");
                Ok(())
            }
            None => Err(Error::TransactionState("transaction is not active")),
        }
    }

    /// Roll the transaction back and release its connection.
    pub fn rollback(&mut self) -> Result<()> {
        match self.bound.take() {
            Some(mut conn) => {
                conn.rollback().map_err(Error::connection)?;
                conn.set_auto_commit(true).map_err(Error::connection)?;
                self.status = TransactionStatus::RolledBack;
                tracing::debug!("Transaction rolled back");
                Ok(())
            }
            None => Err(Error::TransactionState("transaction is not active")),
        }
    }

    /// Reset to idle, discarding any state. Idempotent.
    pub fn clear(&mut self) {
        self.bound = None;
        self.status = TransactionStatus::Idle;
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("status", &self.status)
            .field("bound", &self.bound.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowmap_memory::MemoryDriver;

    fn manager(pool_size: usize) -> (TransactionManager, MemoryDriver) {
        let driver = MemoryDriver::new();
        let pool = ConnectionPool::new(pool_size, &driver).unwrap();
        (TransactionManager::new(pool), driver)
    }

    #[test]
    fn test_begin_then_connection_binds_lazily() {
        let (mut tm, _driver) = manager(1);
        tm.begin().unwrap();
        assert!(tm.is_active());
        assert!(!tm.is_bound());

        tm.connection().unwrap();
        assert!(tm.is_bound());
    }

    #[test]
    fn test_begin_twice_fails() {
        let (mut tm, _driver) = manager(1);
        tm.begin().unwrap();
        assert!(matches!(tm.begin(), Err(Error::TransactionState(_))));
    }

    #[test]
    fn test_connection_without_begin_fails() {
        let (mut tm, _driver) = manager(1);
        assert!(matches!(
            tm.connection().map(|_| ()),
            Err(Error::TransactionState(_))
        ));
    }

    #[test]
    fn test_same_connection_for_whole_transaction() {
        let (mut tm, _driver) = manager(2);
        tm.begin().unwrap();
        tm.connection().unwrap();
        tm.connection().unwrap();
        // Only one pool slot was consumed despite two calls.
        assert_eq!(tm.pool.available(), 1);
    }

    #[test]
    fn test_commit_requires_bound_connection() {
        let (mut tm, _driver) = manager(1);
        assert!(matches!(tm.commit(), Err(Error::TransactionState(_))));

        tm.begin().unwrap();
        // Active but never bound: still a state error.
        assert!(matches!(tm.commit(), Err(Error::TransactionState(_))));
    }

    #[test]
    fn test_commit_releases_connection_and_terminates() {
        let (mut tm, _driver) = manager(1);
        tm.begin().unwrap();
        tm.connection().unwrap();
        assert_eq!(tm.pool.available(), 0);

        tm.commit().unwrap();
        assert_eq!(tm.status(), TransactionStatus::Committed);
        assert_eq!(tm.pool.available(), 1);

        // Terminal state: begin fails until cleared.
        assert!(matches!(tm.begin(), Err(Error::TransactionState(_))));
        tm.clear();
        tm.begin().unwrap();
    }

    #[test]
    fn test_rollback_requires_bound_connection() {
        let (mut tm, _driver) = manager(1);
        assert!(matches!(tm.rollback(), Err(Error::TransactionState(_))));
    }

    #[test]
    fn test_rollback_releases_and_terminates() {
        let (mut tm, _driver) = manager(1);
        tm.begin().unwrap();
        tm.connection().unwrap();
        tm.rollback().unwrap();
        assert_eq!(tm.status(), TransactionStatus::RolledBack);
        assert_eq!(tm.pool.available(), 1);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (mut tm, _driver) = manager(1);
        tm.clear();
        tm.clear();
        assert_eq!(tm.status(), TransactionStatus::Idle);
    }
}
