//! Line-oriented capture of remote command output.
//!
//! A remote command produces two byte streams (stdout and stderr). Each is
//! read by a [`StreamReader`] task that splits it into lines and appends them
//! to shared sinks. [`ConsoleCapture`] pairs two readers so that callers get
//! the per-stream sequences plus an arrival-ordered merge of both.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Shared append-only line buffer fed by a [`StreamReader`].
pub type LineSink = Arc<Mutex<Vec<String>>>;

/// Create an empty [`LineSink`].
#[must_use]
pub fn line_sink() -> LineSink {
    Arc::new(Mutex::new(Vec::new()))
}

/// Background task that reads one stream line-by-line into shared sinks.
///
/// Lines from a single stream are appended in read order and never dropped.
/// The task ends when the stream reaches EOF.
pub struct StreamReader {
    handle: JoinHandle<io::Result<()>>,
}

impl StreamReader {
    /// Spawn a reader task over `stream`, appending each line to every sink.
    pub fn spawn<R>(stream: R, sinks: Vec<LineSink>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            while let Some(line) = lines.next_line().await? {
                for sink in &sinks {
                    sink.lock().await.push(line.clone());
                }
            }
            Ok(())
        });

        Self { handle }
    }

    /// Wait for the stream to reach EOF and the task to finish.
    pub async fn join(self) -> io::Result<()> {
        self.handle.await.map_err(io::Error::other)?
    }
}

/// Captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedLines {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    /// Arrival-ordered merge of stdout and stderr. The relative order of
    /// lines from different streams is not deterministic.
    pub combined: Vec<String>,
}

/// Two paired stream readers capturing a command's stdout and stderr.
pub struct ConsoleCapture {
    out: LineSink,
    err: LineSink,
    combined: LineSink,
    stdout_reader: StreamReader,
    stderr_reader: StreamReader,
}

impl ConsoleCapture {
    /// Start capturing: stdout feeds `{stdout, combined}`, stderr feeds
    /// `{stderr, combined}`.
    pub fn start<O, E>(stdout: O, stderr: E) -> Self
    where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let out = line_sink();
        let err = line_sink();
        let combined = line_sink();

        let stdout_reader = StreamReader::spawn(stdout, vec![out.clone(), combined.clone()]);
        let stderr_reader = StreamReader::spawn(stderr, vec![err.clone(), combined.clone()]);

        Self {
            out,
            err,
            combined,
            stdout_reader,
            stderr_reader,
        }
    }

    /// Wait for both streams to reach EOF, then take the captured lines.
    pub async fn wait_for_finish(self) -> io::Result<CapturedLines> {
        self.stdout_reader.join().await?;
        self.stderr_reader.join().await?;

        let stdout = std::mem::take(&mut *self.out.lock().await);
        let stderr = std::mem::take(&mut *self.err.lock().await);
        let combined = std::mem::take(&mut *self.combined.lock().await);

        Ok(CapturedLines {
            stdout,
            stderr,
            combined,
        })
    }
}
