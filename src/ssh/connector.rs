//! russh adapter for the connector ports.

use async_trait::async_trait;

use crate::config::PoolConfig;
use crate::error::Result;
use crate::ports::{Connection, Connector};
use crate::ssh::client::SshClient;
use crate::ssh::exec::ExecResult;
use crate::ssh::pool::ConnectionPool;

/// Pool of real SSH connections, the type callers normally use.
pub type SshPool = ConnectionPool<SshConnector>;

/// Connector producing russh-backed [`SshClient`] connections.
#[derive(Debug, Default, Clone, Copy)]
pub struct SshConnector;

impl SshConnector {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Conn = SshClient;

    async fn connect(&self, config: &PoolConfig) -> Result<Self::Conn> {
        SshClient::connect(config).await
    }
}

#[async_trait]
impl Connection for SshClient {
    async fn exec(&self, command: &str) -> Result<ExecResult> {
        self.exec(command).await
    }

    async fn is_connected(&self) -> bool {
        self.is_connected().await
    }

    async fn close(&self) -> Result<()> {
        self.close().await
    }
}
