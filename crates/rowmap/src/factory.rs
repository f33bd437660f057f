//! Session factory: one shared pool, many sessions.

use std::sync::Arc;

use rowmap_core::{Driver, Result};
use rowmap_pool::ConnectionPool;
use rowmap_session::Session;

use crate::config::Config;

/// Builds the shared connection pool from a validated [`Config`] and hands
/// out independent [`Session`]s over it.
///
/// The factory (and its pool) may be shared across threads; each session it
/// opens belongs to a single execution context.
pub struct SessionFactory {
    pool: Arc<ConnectionPool>,
}

impl SessionFactory {
    /// Validate the configuration and eagerly initialize the pool through
    /// the given driver.
    pub fn new(config: &Config, driver: &dyn Driver) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            driver = driver.name(),
            pool_size = config.pool_size,
            "Building session factory"
        );
        let pool = ConnectionPool::new(config.pool_size, driver)?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn with_pool(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Open a new session over the shared pool.
    #[must_use]
    pub fn open_session(&self) -> Session {
        Session::new(Arc::clone(&self.pool))
    }

    /// The shared connection pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Shut the pool down; sessions already holding connections fail on
    /// their next lease.
    pub fn close(&self) {
        self.pool.shutdown();
    }
}

impl std::fmt::Debug for SessionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFactory")
            .field("pool", &self.pool)
            .finish()
    }
}
