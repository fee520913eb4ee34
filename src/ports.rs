//! Abstractions over the SSH transport.
//!
//! The pool and session layers are generic over these traits so their
//! semantics can be exercised with in-memory fakes, while production code
//! plugs in the russh-backed adapter from `ssh::connector`.

use async_trait::async_trait;

use crate::config::PoolConfig;
use crate::error::Result;
use crate::ssh::ExecResult;

/// Factory for authenticated connections to the head node.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Conn: Connection;

    /// Establish and authenticate a new connection.
    async fn connect(&self, config: &PoolConfig) -> Result<Self::Conn>;
}

/// A live, authenticated connection capable of running commands.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Run a command on the remote host and capture its output.
    ///
    /// A non-zero exit status is not an error; it is reported through
    /// [`ExecResult::exit_code`].
    async fn exec(&self, command: &str) -> Result<ExecResult>;

    /// Probe whether the connection is still usable.
    async fn is_connected(&self) -> bool;

    /// Gracefully close the connection. Best effort.
    async fn close(&self) -> Result<()>;
}
