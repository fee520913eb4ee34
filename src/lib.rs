//! Bounded pool of reusable SSH sessions for a cluster head node.
//!
//! Callers hand this crate fully-built scheduler command lines (`sbatch`,
//! `squeue`, `scancel` and friends); the crate owns connection lifecycle,
//! per-session mutual exclusion, bounded acquisition and line-accurate
//! capture of interleaved stdout/stderr.
//!
//! ```no_run
//! use headnode_pool::{SshConnector, SshPool, load_config};
//!
//! # async fn run() -> headnode_pool::Result<()> {
//! let config = load_config(std::path::Path::new("headnode.toml"))?;
//! let pool = SshPool::new(config, SshConnector::new());
//!
//! let result = pool
//!     .with_session(|session| async move { session.exec("squeue -u alice").await })
//!     .await?;
//! for line in &result.stdout {
//!     println!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod ports;
pub mod ssh;

pub use config::{PoolConfig, load_config, validate_config};
pub use error::{PoolError, Result};
pub use ports::{Connection, Connector};
pub use ssh::{
    CapturedLines, ConnectionPool, ConsoleCapture, ExecResult, Session, SshClient, SshConnector,
    SshPool, StreamReader,
};
