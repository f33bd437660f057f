//! Blocking connection pooling for Rowmap.
//!
//! [`ConnectionPool`] owns a fixed set of physical connections, all opened
//! eagerly at construction. [`ConnectionPool::acquire`] blocks the calling
//! thread until a connection is free and returns a [`PooledConnection`]
//! guard whose drop puts the connection back instead of closing it. The pool
//! is the one component of the runtime that is legitimately shared across
//! threads; everything else is single-context by design.
//!
//! There is no timeout or cancellation: a blocked `acquire` only unblocks
//! when a connection is released or the pool is shut down, in which case it
//! fails with a pool-acquisition error.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use rowmap_core::{Connection, Driver, Error, Result};

struct PoolState {
    idle: VecDeque<Box<dyn Connection>>,
    shut_down: bool,
}

/// A bounded, blocking pool of reusable physical connections.
pub struct ConnectionPool {
    state: Mutex<PoolState>,
    available: Condvar,
    size: usize,
    driver_name: String,
}

impl ConnectionPool {
    /// Eagerly open `size` physical connections through `driver`.
    ///
    /// Any connector failure during initialization is fatal: already-opened
    /// connections are closed and the error is surfaced as a connection
    /// failure.
    pub fn new(size: usize, driver: &dyn Driver) -> Result<Arc<Self>> {
        tracing::info!(driver = driver.name(), size, "Initializing connection pool");

        let mut idle = VecDeque::with_capacity(size);
        for _ in 0..size {
            match driver.connect() {
                Ok(conn) => idle.push_back(conn),
                Err(source) => {
                    for mut conn in idle {
                        let _ = conn.close();
                    }
                    return Err(Error::connection(source));
                }
            }
        }

        Ok(Arc::new(Self {
            state: Mutex::new(PoolState {
                idle,
                shut_down: false,
            }),
            available: Condvar::new(),
            size,
            driver_name: driver.name().to_string(),
        }))
    }

    /// Take a connection, blocking until one is available.
    ///
    /// Waiters are served first-blocked-first-served; each release wakes
    /// exactly one waiter. Fails with a pool-acquisition error if the pool
    /// is shut down while waiting (or already was).
    pub fn acquire(self: &Arc<Self>) -> Result<PooledConnection> {
        let mut state = self.state.lock();
        loop {
            if state.shut_down {
                return Err(Error::PoolAcquisition {
                    reason: "pool is shut down".to_string(),
                });
            }
            if let Some(conn) = state.idle.pop_front() {
                tracing::debug!(
                    driver = %self.driver_name,
                    idle = state.idle.len(),
                    "Connection acquired from pool"
                );
                return Ok(PooledConnection {
                    conn: Some(conn),
                    pool: Arc::clone(self),
                });
            }
            tracing::debug!(driver = %self.driver_name, "Pool exhausted, waiting");
            self.available.wait(&mut state);
        }
    }

    /// Shut the pool down: close idle connections and fail all current and
    /// future waiters. Connections currently leased out are closed as they
    /// come back.
    pub fn shutdown(&self) {
        let mut state = self.state.lock();
        state.shut_down = true;
        while let Some(mut conn) = state.idle.pop_front() {
            let _ = conn.close();
        }
        drop(state);
        self.available.notify_all();
        tracing::info!(driver = %self.driver_name, "Connection pool shut down");
    }

    /// The fixed pool size.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of idle connections right now.
    #[must_use]
    pub fn available(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Whether the pool has been shut down.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }

    fn release(&self, mut conn: Box<dyn Connection>) {
        let mut state = self.state.lock();
        if state.shut_down {
            drop(state);
            let _ = conn.close();
            return;
        }
        state.idle.push_back(conn);
        drop(state);
        self.available.notify_one();
        tracing::debug!(driver = %self.driver_name, "Connection returned to pool");
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("driver", &self.driver_name)
            .field("size", &self.size)
            .field("available", &self.available())
            .finish()
    }
}

/// A leased physical connection.
///
/// Derefs to the underlying driver connection; dropping the guard returns
/// the connection to the pool rather than terminating it. Ownership is
/// exclusive while the guard lives.
pub struct PooledConnection {
    conn: Option<Box<dyn Connection>>,
    pool: Arc<ConnectionPool>,
}

impl Deref for PooledConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        match &self.conn {
            Some(conn) => conn.as_ref(),
            None => unreachable!("connection only vacated on drop"),
        }
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.conn {
            Some(conn) => conn.as_mut(),
            None => unreachable!("connection only vacated on drop"),
        }
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection").finish_non_exhaustive()
    }
}
