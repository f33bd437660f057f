//! The storage driver abstraction.
//!
//! The runtime treats the SQL layer as an opaque collaborator: a [`Driver`]
//! opens physical [`Connection`]s, and a connection prepares-and-executes
//! parameterized statements, manages its auto-commit flag, and commits or
//! rolls back. Driver crates implement these traits; everything above the
//! pool consumes them as trait objects.
//!
//! All calls block the caller until the driver returns. There are no
//! suspension points anywhere in this runtime.

use thiserror::Error;

use crate::row::Row;
use crate::value::Value;

/// A failure inside a driver, preserved as the underlying cause when the
/// runtime re-wraps it into its own error taxonomy.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DriverError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl DriverError {
    /// Create a driver error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a driver error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The driver's own message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Outcome of a driver call.
pub type DriverResult<T> = Result<T, DriverError>;

/// A connection source: opens physical connections on demand.
///
/// Implementations must be shareable across threads; the connection pool
/// holds one driver and opens its entire fixed set of connections through it
/// at construction time.
pub trait Driver: Send + Sync {
    /// Identifier of this driver (e.g. `"memory"`), used in configuration
    /// and diagnostics.
    fn name(&self) -> &str;

    /// Open a new physical connection.
    fn connect(&self) -> DriverResult<Box<dyn Connection>>;
}

/// A physical database connection.
///
/// Statement preparation is folded into `execute`/`query`: the driver
/// prepares the given SQL, binds `params` in order, and runs it. Connections
/// start in auto-commit mode.
pub trait Connection: Send {
    /// Execute a statement that returns no rows (INSERT/UPDATE/DELETE/DDL).
    /// Returns the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> DriverResult<u64>;

    /// Execute a statement that returns rows (SELECT).
    fn query(&mut self, sql: &str, params: &[Value]) -> DriverResult<Vec<Row>>;

    /// Toggle auto-commit. Disabling it opens a transaction scope on this
    /// connection; re-enabling it implicitly commits.
    fn set_auto_commit(&mut self, auto_commit: bool) -> DriverResult<()>;

    /// Current auto-commit flag.
    fn auto_commit(&self) -> bool;

    /// Commit the current transaction scope.
    fn commit(&mut self) -> DriverResult<()>;

    /// Roll back the current transaction scope.
    fn rollback(&mut self) -> DriverResult<()>;

    /// Terminate the physical connection.
    fn close(&mut self) -> DriverResult<()>;
}
