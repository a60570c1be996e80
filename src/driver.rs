//! One perft exchange with one engine:
//!
//! 1. launch the engine (its output is drained concurrently),
//! 2. `position <description>`,
//! 3. wait until the engine is ready to search,
//! 4. start the clock, `go perft <depth>`, `quit`,
//! 5. wait (bounded) for the process to exit and stop the clock,
//! 6. join the drain and extract the node count.
//!
//! Exit of the process is the synchronization point: an engine honors `quit`
//! only after finishing the queued search and flushing its output. The
//! measured duration therefore includes process teardown, which is fine for
//! comparing engines against each other but not as an absolute number.

use std::process::ExitStatus;
use std::thread;
use std::time::{Duration, Instant};

use crate::drain::CapturedOutput;
use crate::error::HarnessError;
use crate::extract::{extract, total_line_count, ExtractionPolicy};
use crate::position::Position;
use crate::process::{EngineCommand, EngineProcess};

/// How the driver decides that setup is over and the clock can start.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// Send `isready` and wait for `readyok`, at most for the given time.
    Handshake(Duration),
    /// Sleep for a fixed interval. This is only an approximation: a slow
    /// engine may still be setting up when the clock starts.
    Delay(Duration),
}

/// Knobs of a single exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DriverSettings {
    /// Synchronization before the timed search.
    pub readiness: Readiness,
    /// Grace period for the engine to finish the search and exit after
    /// `quit`.
    pub exit_timeout: Duration,
    /// How the node count is recovered from the output.
    pub extraction: ExtractionPolicy,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            readiness: Readiness::Handshake(Duration::from_secs(10)),
            exit_timeout: Duration::from_secs(120),
            extraction: ExtractionPolicy::Scan,
        }
    }
}

/// Raw outcome of one exchange, before extraction.
#[derive(Clone, Debug)]
pub struct Exchange {
    /// Everything the engine printed.
    pub output: CapturedOutput,
    /// Time between sending `go perft` and observing the process exit.
    pub elapsed: Duration,
    /// How the process ended.
    pub status: ExitStatus,
}

/// Node count and timing reported by one engine for one test case.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Measurement {
    /// Leaf nodes reported by the engine.
    pub nodes: u64,
    /// Search duration, see [`Exchange::elapsed`].
    pub elapsed: Duration,
}

/// Runs the protocol sequence and returns the captured output with the
/// elapsed time. The engine is always stopped when this returns.
pub fn exchange(
    engine: &EngineCommand,
    position: &Position,
    depth: u32,
    settings: &DriverSettings,
) -> Result<Exchange, HarnessError> {
    let mut process = EngineProcess::launch(engine)?;
    process.write_line(&position.to_command())?;
    match settings.readiness {
        Readiness::Handshake(timeout) => {
            process.write_line("isready")?;
            process.wait_ready(timeout)?;
        },
        Readiness::Delay(delay) => thread::sleep(delay),
    }

    let start = Instant::now();
    process.write_line(&format!("go perft {depth}"))?;
    let exit = process.terminate(settings.exit_timeout)?;
    let elapsed = exit.at.saturating_duration_since(start);
    if !exit.status.success() {
        tracing::warn!(engine = %engine.name, status = %exit.status, "abnormal exit");
    }

    let output = process.into_output()?;
    Ok(Exchange {
        output,
        elapsed,
        status: exit.status,
    })
}

/// [`exchange`] followed by node count extraction.
pub fn run_perft(
    engine: &EngineCommand,
    position: &Position,
    depth: u32,
    settings: &DriverSettings,
) -> Result<Measurement, HarnessError> {
    let Exchange {
        output,
        elapsed,
        status,
    } = exchange(engine, position, depth, settings)?;
    // Whatever a crashed engine printed last is not a total unless it says so.
    if !status.success() && total_line_count(output.lines()).is_none() {
        return Err(HarnessError::Exited {
            engine: engine.name.clone(),
            status,
            output,
        });
    }
    let nodes = extract(&output, settings.extraction)?;
    tracing::debug!(
        engine = %engine.name,
        nodes,
        elapsed = ?elapsed,
        "perft {depth} done"
    );
    Ok(Measurement { nodes, elapsed })
}
