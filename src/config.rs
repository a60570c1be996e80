//! Command-line configuration of a harness run.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use clap::{Parser, ValueEnum};

use crate::driver::{DriverSettings, Readiness};
use crate::extract::ExtractionPolicy;
use crate::position::{read_positions_file, Position, DEFAULT_DEPTHS};
use crate::process::EngineCommand;
use crate::runner::TestCase;

/// Synchronization used before the timed search starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SyncMode {
    /// Send `isready` and wait for `readyok`.
    ReadyOk,
    /// Sleep for `--settle-ms`.
    Delay,
}

/// Compares perft node counts of a candidate chess engine against a reference
/// engine over a matrix of positions and depths.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Engine under test.
    #[arg(long)]
    pub candidate: PathBuf,
    /// Trusted engine whose counts are the ground truth.
    #[arg(long, default_value = "stockfish")]
    pub reference: PathBuf,
    /// Argument passed to the candidate engine (repeatable).
    #[arg(long = "candidate-arg", allow_hyphen_values = true)]
    pub candidate_args: Vec<String>,
    /// Argument passed to the reference engine (repeatable).
    #[arg(long = "reference-arg", allow_hyphen_values = true)]
    pub reference_args: Vec<String>,
    /// Perft depths, e.g. `--depth 1,2,3`.
    #[arg(long = "depth", value_delimiter = ',', default_values_t = DEFAULT_DEPTHS)]
    pub depths: Vec<u32>,
    /// Position to test: `startpos`, `fen <FEN>` or a bare FEN (repeatable).
    #[arg(long = "position")]
    pub positions: Vec<Position>,
    /// File with one position per line. Defaults to a built-in suite when no
    /// positions are given at all.
    #[arg(long)]
    pub positions_file: Option<PathBuf>,
    /// How to wait for the engine to finish setting up the position.
    #[arg(long, value_enum, default_value_t = SyncMode::ReadyOk)]
    pub sync: SyncMode,
    /// Fixed settling delay used with `--sync delay`.
    #[arg(long, default_value_t = 250)]
    pub settle_ms: u64,
    /// Bound on waiting for `readyok` with `--sync ready-ok`.
    #[arg(long, default_value_t = 10)]
    pub ready_timeout_secs: u64,
    /// Time an engine gets to finish the search and exit before it is killed.
    #[arg(long, default_value_t = 120)]
    pub timeout_secs: u64,
    /// How the node count is found in the engine output.
    #[arg(long, value_enum, default_value_t = ExtractionPolicy::Scan)]
    pub extract: ExtractionPolicy,
    /// Run both engines of a test case concurrently. Faster, but the timings
    /// are less comparable.
    #[arg(long)]
    pub parallel: bool,
}

/// Fully resolved run configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Engine under test.
    pub candidate: EngineCommand,
    /// Ground truth engine.
    pub reference: EngineCommand,
    /// Test matrix in report order.
    pub cases: Vec<TestCase>,
    /// Per-exchange settings.
    pub settings: DriverSettings,
    /// Whether both engines of a case run concurrently.
    pub parallel: bool,
}

impl TryFrom<Args> for Config {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> anyhow::Result<Self> {
        if args.depths.is_empty() {
            bail!("at least one depth is required");
        }
        let mut positions = args.positions;
        if let Some(path) = &args.positions_file {
            positions.extend(read_positions_file(path)?);
        }
        if positions.is_empty() {
            positions = Position::defaults()?;
        }
        let readiness = match args.sync {
            SyncMode::ReadyOk => Readiness::Handshake(Duration::from_secs(args.ready_timeout_secs)),
            SyncMode::Delay => Readiness::Delay(Duration::from_millis(args.settle_ms)),
        };
        Ok(Self {
            candidate: EngineCommand::new("candidate", args.candidate)
                .with_args(args.candidate_args),
            reference: EngineCommand::new("reference", args.reference)
                .with_args(args.reference_args),
            cases: TestCase::matrix(&positions, &args.depths),
            settings: DriverSettings {
                readiness,
                exit_timeout: Duration::from_secs(args.timeout_secs),
                extraction: args.extract,
            },
            parallel: args.parallel,
        })
    }
}
