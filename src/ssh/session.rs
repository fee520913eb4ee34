//! One pool slot: a lazily-connected, reusable SSH session.
//!
//! A `Session` owns at most one live connection at a time. Callers run work
//! through [`Session::with_client`], which holds the session mutex for the
//! whole call. That single lock gives three guarantees: commands on one
//! session never overlap, reconnection is race-free, and the idle watchdog
//! can never tear down a connection mid-command.

use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::ports::{Connection, Connector};
use crate::ssh::exec::ExecResult;

struct SessionState<T> {
    conn: Option<Arc<T>>,
    /// Bumped on every reconnect. A watchdog only acts if the generation it
    /// was spawned for is still current, so a watchdog outliving its
    /// connection cannot tear down a replacement.
    generation: u64,
    last_activity: Instant,
}

/// A single slot of the connection pool.
pub struct Session<C: Connector> {
    id: usize,
    config: Arc<PoolConfig>,
    connector: Arc<C>,
    state: Arc<Mutex<SessionState<C::Conn>>>,
}

impl<C: Connector> Session<C> {
    pub(crate) fn new(id: usize, config: Arc<PoolConfig>, connector: Arc<C>) -> Self {
        Self {
            id,
            config,
            connector,
            state: Arc::new(Mutex::new(SessionState {
                conn: None,
                generation: 0,
                last_activity: Instant::now(),
            })),
        }
    }

    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Run `f` against this session's connection, connecting first if needed.
    ///
    /// The session mutex is held for the entire call, so at most one caller
    /// (or the watchdog) touches the connection at a time. A connection that
    /// fails the liveness probe is closed and replaced transparently.
    ///
    /// # Errors
    ///
    /// Returns an error if a fresh connection cannot be established, or
    /// whatever error `f` itself produces.
    pub async fn with_client<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Arc<C::Conn>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut state = self.state.lock().await;

        let mut reusable = None;
        if let Some(conn) = &state.conn {
            if conn.is_connected().await {
                reusable = Some(Arc::clone(conn));
            }
        }

        let conn = if let Some(conn) = reusable {
            debug!(slot = self.id, "Reusing pooled SSH connection");
            conn
        } else {
            if let Some(stale) = state.conn.take() {
                debug!(slot = self.id, "Discarding stale SSH connection");
                let _ = stale.close().await;
            }

            let conn = Arc::new(self.connector.connect(&self.config).await?);
            state.conn = Some(Arc::clone(&conn));
            state.generation += 1;
            state.last_activity = Instant::now();
            info!(
                slot = self.id,
                host = %self.config.host,
                generation = state.generation,
                "Opened SSH connection for pool slot"
            );

            self.spawn_watchdog(state.generation);
            conn
        };

        let result = f(conn).await;
        state.last_activity = Instant::now();
        result
    }

    /// Run a command on this session's connection.
    ///
    /// A non-zero exit status is a normal outcome, reported in the result.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting or starting the command fails.
    pub async fn exec(&self, command: &str) -> Result<ExecResult> {
        self.with_client(|conn| async move { conn.exec(command).await })
            .await
    }

    /// Run a command and require a zero exit status.
    ///
    /// # Errors
    ///
    /// In addition to the [`Session::exec`] errors, a non-zero exit status
    /// becomes [`PoolError::CommandFailed`] carrying the user, host, literal
    /// command and captured output.
    pub async fn exec_checked(&self, command: &str) -> Result<ExecResult> {
        let result = self.exec(command).await?;
        if result.success() {
            Ok(result)
        } else {
            Err(PoolError::CommandFailed {
                user: self.config.user.clone(),
                host: self.config.host.clone(),
                command: command.to_string(),
                exit_code: result.exit_code,
                output: result.combined.join("\n"),
            })
        }
    }

    fn spawn_watchdog(&self, generation: u64) {
        tokio::spawn(watchdog(
            Arc::downgrade(&self.state),
            generation,
            self.config.idle_timeout(),
            self.id,
        ));
    }
}

/// Idle watchdog for one connection generation.
///
/// Holds only a weak reference to the session state so it never keeps a
/// dropped pool alive. Sleeps until the idle deadline, then re-checks under
/// the session mutex; activity since the last check just moves the deadline.
async fn watchdog<T: Connection>(
    state: Weak<Mutex<SessionState<T>>>,
    generation: u64,
    idle_timeout: Duration,
    slot: usize,
) {
    let mut wait = idle_timeout;
    loop {
        tokio::time::sleep(wait).await;

        let Some(state) = state.upgrade() else {
            return;
        };
        let mut state = state.lock().await;

        if state.generation != generation {
            // The connection this watchdog guarded was already replaced.
            return;
        }
        let Some(conn) = state.conn.clone() else {
            return;
        };

        let quiet = state.last_activity.elapsed();
        if quiet >= idle_timeout {
            state.conn = None;
            drop(state);
            debug!(slot, "Idle timeout reached, closing pooled SSH connection");
            let _ = conn.close().await;
            return;
        }
        wait = idle_timeout - quiet;
    }
}
