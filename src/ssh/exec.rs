//! Exec-channel driver: runs one command over an open SSH channel and
//! captures its output.

use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use tokio::io::AsyncWriteExt;

use crate::error::{PoolError, Result};
use crate::ssh::capture::ConsoleCapture;

/// Byte capacity of the in-memory pipes between the channel loop and the
/// line readers. Reads drain concurrently, so this only bounds burstiness.
const PIPE_CAPACITY: usize = 64 * 1024;

/// Outcome of a finished remote command.
///
/// A non-zero exit status is a normal outcome here. Use
/// [`Session::exec_checked`](crate::ssh::Session::exec_checked) to turn it
/// into an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    /// Arrival-ordered merge of stdout and stderr.
    pub combined: Vec<String>,
    pub exit_code: u32,
}

impl ExecResult {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `command` on an already-open session channel and collect its output.
pub(crate) async fn run_channel(mut channel: Channel<Msg>, command: &str) -> Result<ExecResult> {
    channel
        .exec(true, command)
        .await
        .map_err(|e| PoolError::Exec {
            reason: format!("Failed to start command: {e}"),
        })?;

    let (out_rx, mut out_tx) = tokio::io::simplex(PIPE_CAPACITY);
    let (err_rx, mut err_tx) = tokio::io::simplex(PIPE_CAPACITY);
    let capture = ConsoleCapture::start(out_rx, err_rx);

    let mut exit_code = 0u32;

    loop {
        match channel.wait().await {
            Some(ChannelMsg::Data { data }) => {
                out_tx.write_all(&data).await?;
            }
            Some(ChannelMsg::ExtendedData { data, ext }) if ext == 1 => {
                err_tx.write_all(&data).await?;
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                // Eof may arrive before or after ExitStatus; keep draining
                // until the channel closes.
                exit_code = exit_status;
            }
            Some(_) => {}
            None => break,
        }
    }

    // Closing the pipe writers signals EOF to the line readers.
    drop(out_tx);
    drop(err_tx);

    let lines = capture.wait_for_finish().await?;

    let _ = channel.close().await;

    Ok(ExecResult {
        stdout: lines.stdout,
        stderr: lines.stderr,
        combined: lines.combined,
        exit_code,
    })
}
