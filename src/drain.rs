//! Concurrent consumer of an engine's output stream.
//!
//! Engines print a lot during perft (one divide line per root move, `info`
//! strings, banners). If nobody reads the pipe while the harness is busy
//! sleeping or timing, the engine blocks on a full pipe buffer and never
//! finishes. [`OutputDrain`] reads the stream on a dedicated thread for the
//! lifetime of the process and hands the collected lines back only once the
//! stream is closed.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Line the engine prints in response to `isready`.
pub const READY_SENTINEL: &str = "readyok";

/// Ordered lines printed by one engine process, without line terminators.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapturedOutput(Vec<String>);

impl CapturedOutput {
    /// All lines in the order they were printed.
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.0
    }

    /// Number of captured lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the engine printed nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Up to `count` last lines, used for diagnostics.
    #[must_use]
    pub fn tail(&self, count: usize) -> &[String] {
        &self.0[self.0.len().saturating_sub(count)..]
    }
}

impl From<Vec<String>> for CapturedOutput {
    fn from(lines: Vec<String>) -> Self {
        Self(lines)
    }
}

impl From<&str> for CapturedOutput {
    fn from(text: &str) -> Self {
        Self(text.lines().map(str::to_string).collect())
    }
}

impl fmt::Display for CapturedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.0 {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Result of [`OutputDrain::wait_ready`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyWait {
    /// The sentinel was seen.
    Ready,
    /// The engine is still running but silent.
    TimedOut,
    /// The engine closed its output without printing the sentinel.
    StreamClosed,
}

/// Background reader owning the output buffer of one process. It is the only
/// writer of that buffer; [`OutputDrain::join`] is the only way to get it.
#[derive(Debug)]
pub struct OutputDrain {
    handle: JoinHandle<io::Result<CapturedOutput>>,
    ready: Receiver<()>,
}

impl OutputDrain {
    /// Starts reading `stream` line by line on a new thread until it reaches
    /// end-of-stream. `engine` is used for the thread name and logs.
    pub fn spawn<R: Read + Send + 'static>(stream: R, engine: &str) -> io::Result<Self> {
        let (ready_tx, ready) = mpsc::sync_channel(1);
        let label = engine.to_string();
        let handle = thread::Builder::new()
            .name(format!("{engine}-drain"))
            .spawn(move || read_lines(BufReader::new(stream), &label, &ready_tx))?;
        Ok(Self { handle, ready })
    }

    /// Blocks until the engine printed [`READY_SENTINEL`], the stream ended
    /// or `timeout` expired.
    pub fn wait_ready(&self, timeout: Duration) -> ReadyWait {
        match self.ready.recv_timeout(timeout) {
            Ok(()) => ReadyWait::Ready,
            Err(RecvTimeoutError::Timeout) => ReadyWait::TimedOut,
            // The reader thread is gone: end of stream without the sentinel.
            Err(RecvTimeoutError::Disconnected) => ReadyWait::StreamClosed,
        }
    }

    /// Waits for the stream to close and returns everything read from it.
    ///
    /// This blocks until the process closed its output, so it must only be
    /// called after the process exited or was killed.
    pub fn join(self) -> io::Result<CapturedOutput> {
        match self.handle.join() {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

fn read_lines<R: BufRead>(
    mut reader: R,
    engine: &str,
    ready: &SyncSender<()>,
) -> io::Result<CapturedOutput> {
    let mut lines = Vec::new();
    let mut buffer = Vec::new();
    let mut signalled = false;
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            break;
        }
        // Engines are not obliged to print valid UTF-8.
        let line = String::from_utf8_lossy(&buffer)
            .trim_end_matches(['\n', '\r'])
            .to_string();
        tracing::trace!(engine, "{line}");
        if !signalled && line.trim() == READY_SENTINEL {
            signalled = true;
            // Nobody listening is fine: fixed-delay mode never asks.
            let _ = ready.try_send(());
        }
        lines.push(line);
    }
    tracing::debug!(engine, lines = lines.len(), "output stream closed");
    Ok(CapturedOutput(lines))
}
