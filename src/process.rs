//! Lifetime of one engine subprocess: launch, line-oriented writes, shutdown.
//!
//! The engine's standard output is handed to an [`OutputDrain`] right after
//! launch; standard error is discarded since nothing in the protocol subset
//! relies on it and an unread pipe could stall the engine.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::drain::{CapturedOutput, OutputDrain, ReadyWait};
use crate::error::{HarnessError, Stage};

/// Granularity of exit polling. Bounds the error of the measured duration.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How to start an engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineCommand {
    /// Label used in reports and logs, e.g. "candidate".
    pub name: String,
    /// Path to the executable (or a name looked up in `PATH`).
    pub program: PathBuf,
    /// Extra arguments. Engines are normally started without any.
    pub args: Vec<String>,
}

impl EngineCommand {
    /// Engine started without arguments.
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: vec![],
        }
    }

    /// Appends arguments passed to the engine on launch.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// When and how the engine process terminated.
#[derive(Clone, Copy, Debug)]
pub struct Exit {
    /// Exit status reported by the OS.
    pub status: ExitStatus,
    /// First moment the harness observed the exit.
    pub at: Instant,
}

/// A running engine with its input pipe and output drain.
///
/// Dropping the handle kills and reaps the process if it is still running, so
/// a failed exchange never leaks an engine into subsequent test cases.
#[derive(Debug)]
pub struct EngineProcess {
    name: String,
    child: Child,
    stdin: Option<ChildStdin>,
    drain: Option<OutputDrain>,
    /// Set once the process has been reaped.
    status: Option<ExitStatus>,
}

impl EngineProcess {
    /// Starts the engine and its output drain.
    pub fn launch(engine: &EngineCommand) -> Result<Self, HarnessError> {
        let mut child = Command::new(&engine.program)
            .args(&engine.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| HarnessError::Spawn {
                program: engine.program.clone(),
                source,
            })?;
        tracing::debug!(engine = %engine.name, pid = child.id(), "launched");
        let stdin = child.stdin.take();
        let drain = match child.stdout.take() {
            Some(stdout) => OutputDrain::spawn(stdout, &engine.name),
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "engine stdout is not captured",
            )),
        };
        let mut process = Self {
            name: engine.name.clone(),
            child,
            stdin,
            drain: None,
            status: None,
        };
        // On failure the process is killed by `Drop`.
        process.drain = Some(drain?);
        Ok(process)
    }

    /// Engine label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Writes `text` followed by a newline and flushes immediately.
    pub fn write_line(&mut self, text: &str) -> Result<(), HarnessError> {
        tracing::debug!(engine = %self.name, "> {text}");
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(HarnessError::PipeClosed {
                engine: self.name.clone(),
                source: io::Error::new(io::ErrorKind::BrokenPipe, "input already closed"),
            });
        };
        writeln!(stdin, "{text}")
            .and_then(|()| stdin.flush())
            .map_err(|e| HarnessError::from_write(&self.name, e))
    }

    /// Waits until the engine prints `readyok`, bounded by `timeout`.
    ///
    /// An engine that closes its output first is reaped and reported as
    /// [`HarnessError::Exited`] right away instead of timing out.
    pub fn wait_ready(&mut self, timeout: Duration) -> Result<(), HarnessError> {
        let outcome = self
            .drain
            .as_ref()
            .map_or(ReadyWait::StreamClosed, |drain| drain.wait_ready(timeout));
        match outcome {
            ReadyWait::Ready => Ok(()),
            ReadyWait::TimedOut => {
                self.kill()?;
                Err(HarnessError::Timeout {
                    engine: self.name.clone(),
                    stage: Stage::Readiness,
                    limit: timeout,
                })
            },
            ReadyWait::StreamClosed => Err(self.exited()?),
        }
    }

    /// Sends `quit`, closes the input and blocks until the engine exits. If it
    /// is still running after `grace`, it is killed and
    /// [`HarnessError::Timeout`] is returned.
    ///
    /// An engine that is already gone when `quit` is written is not an error
    /// here: its exit status and output tell what happened.
    pub fn terminate(&mut self, grace: Duration) -> Result<Exit, HarnessError> {
        match self.write_line("quit") {
            Err(HarnessError::PipeClosed { .. }) => {
                tracing::debug!(engine = %self.name, "input closed before quit");
            },
            other => other?,
        }
        // Closing stdin also stops engines that read until end-of-input.
        drop(self.stdin.take());
        self.wait_for_exit(grace)
    }

    /// Reaps the engine after its output closed and collects what it printed.
    fn exited(&mut self) -> Result<HarnessError, HarnessError> {
        let status = self.reap()?;
        let output = match self.drain.take() {
            Some(drain) => drain.join()?,
            None => CapturedOutput::default(),
        };
        tracing::debug!(engine = %self.name, %status, "output closed early");
        Ok(HarnessError::Exited {
            engine: self.name.clone(),
            status,
            output,
        })
    }

    fn wait_for_exit(&mut self, grace: Duration) -> Result<Exit, HarnessError> {
        let deadline = Instant::now() + grace;
        loop {
            if let Some(status) = self.child.try_wait()? {
                let at = Instant::now();
                self.status = Some(status);
                tracing::debug!(engine = %self.name, %status, "exited");
                return Ok(Exit { status, at });
            }
            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(engine = %self.name, ?grace, "engine did not exit, killing it");
                self.kill()?;
                return Err(HarnessError::Timeout {
                    engine: self.name.clone(),
                    stage: Stage::Exit,
                    limit: grace,
                });
            }
            thread::sleep(EXIT_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Forcibly stops the engine and reaps it.
    pub fn kill(&mut self) -> Result<(), HarnessError> {
        self.reap().map(|_| ())
    }

    /// Kills the engine unless it was already reaped and returns its exit
    /// status. A process that exited on its own keeps its original status.
    fn reap(&mut self) -> Result<ExitStatus, HarnessError> {
        drop(self.stdin.take());
        if let Some(status) = self.status {
            return Ok(status);
        }
        match self.child.kill() {
            Ok(()) => {},
            // Already exited on its own.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {},
            Err(e) => return Err(e.into()),
        }
        let status = self.child.wait()?;
        self.status = Some(status);
        tracing::debug!(engine = %self.name, %status, "killed");
        Ok(status)
    }

    /// Joins the output drain and returns everything the engine printed.
    ///
    /// Kills the engine first if it has not exited yet: the drain only
    /// finishes once the output stream is closed.
    pub fn into_output(mut self) -> Result<CapturedOutput, HarnessError> {
        if self.status.is_none() {
            self.kill()?;
        }
        match self.drain.take() {
            Some(drain) => Ok(drain.join()?),
            None => Ok(CapturedOutput::default()),
        }
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        if let Err(e) = self.kill() {
            tracing::warn!(engine = %self.name, "failed to stop engine: {e}");
        }
    }
}
