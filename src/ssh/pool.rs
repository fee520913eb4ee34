//! Bounded pool of reusable SSH sessions.
//!
//! The pool pre-allocates a fixed number of [`Session`] slots, all
//! disconnected; connections are opened lazily on first use. Acquisition is
//! a semaphore permit plus a slot pop, and the slot travels back through an
//! RAII guard, so a caller that errors or panics can never leak a slot.
//!
//! Acquisition has no timeout: when every slot is busy, `with_session`
//! waits until one is returned.

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;

use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::debug;

use crate::config::PoolConfig;
use crate::ports::Connector;
use crate::ssh::session::Session;

/// Fixed-size pool of SSH sessions to one head node.
pub struct ConnectionPool<C: Connector> {
    available: Mutex<Vec<Arc<Session<C>>>>,
    permits: Semaphore,
    capacity: usize,
}

impl<C: Connector> ConnectionPool<C> {
    /// Create a pool with `config.max_connections` disconnected slots.
    ///
    /// Performs no network I/O; connections are established on first use.
    #[must_use]
    pub fn new(mut config: PoolConfig, connector: C) -> Self {
        config.max_connections = config.max_connections.max(1);
        let capacity = config.max_connections;

        let config = Arc::new(config);
        let connector = Arc::new(connector);
        let sessions = (0..capacity)
            .map(|id| Arc::new(Session::new(id, config.clone(), connector.clone())))
            .collect();

        debug!(slots = capacity, host = %config.host, "Connection pool created");

        Self {
            available: Mutex::new(sessions),
            permits: Semaphore::new(capacity),
            capacity,
        }
    }

    /// Total number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently free.
    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Acquire a session, run `f` on it, and return the slot to the pool.
    ///
    /// Waits without a deadline when the pool is exhausted. The slot is
    /// returned when `f` completes, whether it succeeds, fails or panics.
    pub async fn with_session<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce(Arc<Session<C>>) -> Fut,
        Fut: Future<Output = T>,
    {
        let guard = self.acquire().await;
        f(guard.session()).await
    }

    async fn acquire(&self) -> SlotGuard<'_, C> {
        let permit = self
            .permits
            .acquire()
            .await
            .expect("pool semaphore closed");

        let session = self
            .available
            .lock()
            .expect("pool slot mutex poisoned")
            .pop()
            .expect("semaphore permit issued without a free slot");

        debug!(slot = session.id(), "Pool slot acquired");

        SlotGuard {
            available: &self.available,
            session: Some(session),
            _permit: permit,
        }
    }
}

/// RAII slot ownership: `Drop` pushes the session back before the permit is
/// released, so a woken waiter always finds a free slot.
struct SlotGuard<'a, C: Connector> {
    available: &'a Mutex<Vec<Arc<Session<C>>>>,
    session: Option<Arc<Session<C>>>,
    _permit: SemaphorePermit<'a>,
}

impl<C: Connector> SlotGuard<'_, C> {
    fn session(&self) -> Arc<Session<C>> {
        Arc::clone(self.session.as_ref().expect("slot guard already emptied"))
    }
}

impl<C: Connector> Drop for SlotGuard<'_, C> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(slot = session.id(), "Pool slot returned");
            self.available
                .lock()
                .expect("pool slot mutex poisoned")
                .push(session);
        }
    }
}
