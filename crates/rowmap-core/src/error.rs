//! Error taxonomy for the persistence runtime.
//!
//! Low-level driver failures are caught at the pool/persister boundary and
//! re-wrapped here with the original [`DriverError`] preserved as the source.
//! Session-level operations wrap persister errors into
//! [`Error::SessionOperation`], annotated with the entity type and key or
//! field involved. Programming errors (closed-session access, double-begin,
//! commit without a bound connection, bad `find_one_by` cardinality) surface
//! immediately and are never retried.

use thiserror::Error;

use crate::connection::DriverError;

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// All failures the runtime reports.
#[derive(Debug, Error)]
pub enum Error {
    /// Could not take a connection from the pool (shutdown while waiting,
    /// or the pool was already shut down).
    #[error("could not acquire a connection from the pool: {reason}")]
    PoolAcquisition {
        /// Why the acquisition failed.
        reason: String,
    },

    /// A physical connection could not be opened or operated on.
    #[error("connection failure")]
    Connection {
        /// The driver failure.
        #[source]
        source: DriverError,
    },

    /// A statement could not be prepared or executed.
    #[error("could not execute statement `{sql}`")]
    Statement {
        /// The SQL text that failed.
        sql: String,
        /// The driver failure.
        #[source]
        source: DriverError,
    },

    /// `persist` was called for a key that is already managed.
    #[error("entity {entity} with key {key} is already present in the session")]
    DuplicateEntity {
        /// Entity type name.
        entity: &'static str,
        /// Rendered primary-key value.
        key: String,
    },

    /// A field name did not resolve against the entity's descriptor.
    #[error("no field named `{field}` on entity {entity}")]
    FieldNotFound {
        /// Entity type name.
        entity: &'static str,
        /// The field name that was requested.
        field: String,
    },

    /// The entity's descriptor declares no id column.
    #[error("entity {entity} declares no id column")]
    IdNotFound {
        /// Entity type name.
        entity: &'static str,
    },

    /// `remove` was called for an entity the session does not manage.
    #[error("cannot remove entity {entity} with key {key}: it is not present in the current session")]
    NotManaged {
        /// Entity type name.
        entity: &'static str,
        /// Rendered primary-key value.
        key: String,
    },

    /// A single-row lookup matched an unexpected number of rows.
    #[error("expected exactly {expected} result, got {actual}")]
    UnexpectedRowCount {
        /// How many rows the operation requires.
        expected: usize,
        /// How many rows the query produced.
        actual: usize,
    },

    /// A session-level read/write failed; the persister-level cause is
    /// preserved underneath.
    #[error("{detail}")]
    SessionOperation {
        /// What the session was doing, with entity/key/field context.
        detail: String,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// Any operation other than the first `close` on a closed session.
    #[error("session is closed; open a new one")]
    SessionClosed,

    /// Begin/commit/rollback called in a state that does not allow it.
    #[error("{0}")]
    TransactionState(&'static str),

    /// A required configuration property is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Wrap a lower-level error as a session operation failure.
    #[must_use]
    pub fn session_operation(detail: impl Into<String>, source: Error) -> Self {
        Error::SessionOperation {
            detail: detail.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a driver failure as a connection error.
    #[must_use]
    pub fn connection(source: DriverError) -> Self {
        Error::Connection { source }
    }

    /// Wrap a driver failure as a statement error, keeping the SQL text.
    #[must_use]
    pub fn statement(sql: impl Into<String>, source: DriverError) -> Self {
        Error::Statement {
            sql: sql.into(),
            source,
        }
    }
}
