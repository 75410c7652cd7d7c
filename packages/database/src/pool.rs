//! Round-robin pool of `DuckDB` connections.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use duckdb::Connection;

use crate::DbError;

/// Simple round-robin pool of `DuckDB` connections.
///
/// `duckdb::Connection` is `Send` but not `Sync`, so each connection is
/// wrapped in a `Mutex`. The pool hands out connections round-robin via
/// an atomic counter, allowing concurrent queries on different
/// connections. All connections share one database instance.
pub struct DuckDbPool {
    connections: Vec<Mutex<Connection>>,
    next: AtomicUsize,
}

impl DuckDbPool {
    /// Opens `size` read-only connections to the `DuckDB` file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the file cannot be opened.
    pub fn open_read_only(path: &Path, size: usize) -> Result<Self, DbError> {
        let conn = crate::store::open_read_only(path)?;
        Self::from_connection(conn, size)
    }

    /// Builds a pool of `size` handles sharing the database behind `conn`.
    ///
    /// Used by tests with an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if a connection cannot be cloned.
    pub fn from_connection(conn: Connection, size: usize) -> Result<Self, DbError> {
        let mut connections = Vec::with_capacity(size.max(1));
        for _ in 1..size.max(1) {
            connections.push(Mutex::new(conn.try_clone()?));
        }
        connections.push(Mutex::new(conn));

        log::debug!("Opened DuckDB pool with {} connections", connections.len());

        Ok(Self {
            connections,
            next: AtomicUsize::new(0),
        })
    }

    /// Number of connections in the pool.
    #[must_use]
    pub fn size(&self) -> usize {
        self.connections.len()
    }

    /// Acquires the next connection from the pool (round-robin).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::PoolPoisoned`] if the connection's `Mutex` is
    /// poisoned.
    pub fn acquire(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.connections.len();
        self.connections[idx]
            .lock()
            .map_err(|_| DbError::PoolPoisoned)
    }
}
