mod capture;
mod client;
mod connector;
mod exec;
mod pool;
mod session;

pub use capture::{CapturedLines, ConsoleCapture, LineSink, StreamReader, line_sink};
pub use client::{ConnectLog, PromptPolicy, SshClient};
pub use connector::{SshConnector, SshPool};
pub use exec::ExecResult;
pub use pool::ConnectionPool;
pub use session::Session;
