//! Failures that can happen while driving an engine through one perft
//! exchange.
//!
//! Only [`HarnessError::Spawn`] is fatal to a run: if an engine binary cannot
//! be started at all, no meaningful report can be produced. Everything else is
//! recorded against the test case that triggered it and the run moves on.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use crate::drain::CapturedOutput;

/// Protocol stage which was waited on for too long.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Readiness,
    Exit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Readiness => "become ready",
            Self::Exit => "exit",
        })
    }
}

/// Error taxonomy of the harness.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The engine executable could not be started (missing, not executable).
    #[error("failed to launch {}: {source}", .program.display())]
    Spawn {
        /// Path of the executable.
        program: PathBuf,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// The engine exited or closed its input before a command was delivered.
    #[error("{engine} closed its input: {source}")]
    PipeClosed {
        /// Engine label.
        engine: String,
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
    /// No node count could be found in the engine output.
    #[error("no node count found in {} lines of output", .output.len())]
    Parse {
        /// Everything the engine printed, for diagnosis.
        output: CapturedOutput,
    },
    /// The engine did not reach the expected stage within the bound and was
    /// killed.
    #[error("TIMEOUT: {engine} did not {stage} within {limit:?}")]
    Timeout {
        /// Engine label.
        engine: String,
        /// What the harness was waiting for.
        stage: Stage,
        /// The bound that expired.
        limit: Duration,
    },
    /// The engine terminated abnormally, or closed its output, before
    /// reporting a total.
    #[error("{engine} terminated ({status}) before reporting a node count")]
    Exited {
        /// Engine label.
        engine: String,
        /// Exit status reported by the OS.
        status: ExitStatus,
        /// Everything the engine printed, for diagnosis.
        output: CapturedOutput,
    },
    /// Any other I/O failure while talking to the engine.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl HarnessError {
    /// Fatal errors abort the whole run instead of failing one test case.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Spawn { .. })
    }

    /// Short tag used in the per-case report line.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "SPAWN",
            Self::PipeClosed { .. } => "PIPE_CLOSED",
            Self::Parse { .. } => "PARSE",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Exited { .. } => "EXITED",
            Self::Io(_) => "IO",
        }
    }

    /// Output captured before the failure, if the error carries any.
    #[must_use]
    pub const fn output(&self) -> Option<&CapturedOutput> {
        match self {
            Self::Parse { output } | Self::Exited { output, .. } => Some(output),
            _ => None,
        }
    }

    /// Classifies a failed write to the engine input.
    pub(crate) fn from_write(engine: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::BrokenPipe {
            Self::PipeClosed {
                engine: engine.to_string(),
                source,
            }
        } else {
            Self::Io(source)
        }
    }
}
