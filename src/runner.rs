//! Walks the position × depth matrix and compares the candidate engine
//! against the reference engine.
//!
//! Every test case produces exactly one report line, whatever happens to the
//! engines: a match, a mismatch or an error. The only exception is an engine
//! that cannot be launched at all, which aborts the run.

use std::fmt;
use std::io::Write;
use std::thread;
use std::time::Duration;

use itertools::iproduct;

use crate::driver::{run_perft, DriverSettings, Measurement};
use crate::error::HarnessError;
use crate::position::Position;
use crate::process::EngineCommand;

/// One cell of the test matrix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCase {
    /// 1-based index of the position in the suite, for reports.
    pub index: usize,
    /// Position the engines search from.
    pub position: Position,
    /// Perft depth.
    pub depth: u32,
}

impl TestCase {
    /// Cartesian product of positions and depths, position-major.
    #[must_use]
    pub fn matrix(positions: &[Position], depths: &[u32]) -> Vec<Self> {
        iproduct!(positions.iter().enumerate(), depths)
            .map(|((index, position), &depth)| Self {
                index: index + 1,
                position: position.clone(),
                depth,
            })
            .collect()
    }
}

/// Which side of the comparison an engine is on.
#[allow(missing_docs)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Candidate,
    Reference,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Candidate => "candidate",
            Self::Reference => "reference",
        })
    }
}

/// Result of running one engine on one test case.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunResult {
    /// Which engine produced it.
    pub role: Role,
    /// Reported node count.
    pub nodes: u64,
    /// Measured search duration.
    pub elapsed: Duration,
}

impl RunResult {
    const fn new(role: Role, measurement: Measurement) -> Self {
        Self {
            role,
            nodes: measurement.nodes,
            elapsed: measurement.elapsed,
        }
    }
}

/// Both engines answered; `matched` tells whether they agree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComparisonOutcome {
    /// The compared test case.
    pub case: TestCase,
    /// Candidate engine result.
    pub candidate: RunResult,
    /// Reference engine result.
    pub reference: RunResult,
    /// `candidate.nodes == reference.nodes`.
    pub matched: bool,
}

impl ComparisonOutcome {
    /// Compares two completed runs.
    #[must_use]
    pub fn new(case: TestCase, candidate: RunResult, reference: RunResult) -> Self {
        let matched = candidate.nodes == reference.nodes;
        Self {
            case,
            candidate,
            reference,
            matched,
        }
    }
}

/// Final state of one test case.
#[derive(Debug)]
pub enum CaseReport {
    /// Both engines produced a count.
    Compared(ComparisonOutcome),
    /// At least one engine failed. The run of the other engine is kept when
    /// it succeeded since it is still a valid timing sample.
    Errored {
        /// The failed test case.
        case: TestCase,
        /// Engine that failed first (candidate before reference).
        role: Role,
        /// What went wrong.
        error: HarnessError,
        /// Results of the engines that did answer.
        completed: Vec<RunResult>,
    },
}

impl CaseReport {
    /// Whether the engines agreed.
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self, Self::Compared(outcome) if outcome.matched)
    }

    /// The test case this report is about.
    #[must_use]
    pub const fn case(&self) -> &TestCase {
        match self {
            Self::Compared(outcome) => &outcome.case,
            Self::Errored { case, .. } => case,
        }
    }

    fn results(&self) -> Vec<RunResult> {
        match self {
            Self::Compared(outcome) => vec![outcome.candidate, outcome.reference],
            Self::Errored { completed, .. } => completed.clone(),
        }
    }
}

/// Report line of a test case.
impl fmt::Display for CaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let case = self.case();
        write!(f, "[Position index {}] depth {}: ", case.index, case.depth)?;
        match self {
            Self::Compared(outcome) if outcome.matched => write!(
                f,
                "OK ({}) time [candidate = {:.3}s, reference = {:.3}s]",
                outcome.candidate.nodes,
                outcome.candidate.elapsed.as_secs_f64(),
                outcome.reference.elapsed.as_secs_f64()
            ),
            Self::Compared(outcome) => write!(
                f,
                "FAILED ({} instead of {}) [{}]",
                outcome.candidate.nodes, outcome.reference.nodes, case.position
            ),
            Self::Errored { role, error, .. } => write!(
                f,
                "ERROR {} {role}: {error} [{}]",
                error.kind(),
                case.position
            ),
        }
    }
}

/// Timing sums per engine, turned into means at the end of the run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregateStats {
    candidate_total: Duration,
    candidate_samples: u32,
    reference_total: Duration,
    reference_samples: u32,
}

impl AggregateStats {
    /// Adds one timing sample.
    pub fn record(&mut self, result: &RunResult) {
        match result.role {
            Role::Candidate => {
                self.candidate_total += result.elapsed;
                self.candidate_samples += 1;
            },
            Role::Reference => {
                self.reference_total += result.elapsed;
                self.reference_samples += 1;
            },
        }
    }

    /// Mean duration of the given engine over the cases it completed.
    #[must_use]
    pub fn mean(&self, role: Role) -> Option<Duration> {
        let (total, samples) = match role {
            Role::Candidate => (self.candidate_total, self.candidate_samples),
            Role::Reference => (self.reference_total, self.reference_samples),
        };
        total.checked_div(samples)
    }

    /// Number of timing samples of the given engine.
    #[must_use]
    pub const fn samples(&self, role: Role) -> u32 {
        match role {
            Role::Candidate => self.candidate_samples,
            Role::Reference => self.reference_samples,
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Default)]
pub struct Summary {
    /// One report per test case, in matrix order.
    pub reports: Vec<CaseReport>,
    /// Timing statistics.
    pub stats: AggregateStats,
}

impl Summary {
    /// Number of cases where the engines agreed.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.reports.iter().filter(|report| report.passed()).count()
    }

    /// Whether every case matched.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.passed() == self.reports.len()
    }
}

/// Closing line of the report.
impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mean = |role| {
            self.stats
                .mean(role)
                .map_or_else(|| "n/a".to_string(), |d| format!("{:.3}s", d.as_secs_f64()))
        };
        write!(
            f,
            "Passed {}/{} cases. Average time spent: candidate = {}, reference = {}",
            self.passed(),
            self.reports.len(),
            mean(Role::Candidate),
            mean(Role::Reference)
        )
    }
}

/// Runs candidate and reference over a list of test cases.
#[derive(Clone, Debug)]
pub struct Runner {
    candidate: EngineCommand,
    reference: EngineCommand,
    settings: DriverSettings,
    parallel: bool,
}

impl Runner {
    /// Creates a runner which runs the two engines one after another.
    #[must_use]
    pub fn new(
        candidate: EngineCommand,
        reference: EngineCommand,
        settings: DriverSettings,
    ) -> Self {
        Self {
            candidate,
            reference,
            settings,
            parallel: false,
        }
    }

    /// Runs both engines of a test case at the same time. Shortens the run
    /// but the engines compete for CPU, which skews the timings.
    #[must_use]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Runs every test case, writing a report line to `out` as soon as a case
    /// is done and the summary line at the end.
    ///
    /// Returns an error only if an engine cannot be launched or `out` cannot
    /// be written to.
    pub fn run(&self, cases: &[TestCase], out: &mut dyn Write) -> Result<Summary, HarnessError> {
        let mut summary = Summary::default();
        for case in cases {
            let report = self.run_case(case)?;
            for result in report.results() {
                summary.stats.record(&result);
            }
            if let CaseReport::Errored { role, error, .. } = &report {
                tracing::warn!(%role, "position {} depth {}: {error}", case.index, case.depth);
                if let Some(output) = error.output() {
                    for line in output.tail(20) {
                        tracing::warn!(%role, "| {line}");
                    }
                }
            }
            writeln!(out, "{report}")?;
            summary.reports.push(report);
        }
        writeln!(out, "{summary}")?;
        Ok(summary)
    }

    /// Runs both engines on one test case and compares their counts.
    pub fn run_case(&self, case: &TestCase) -> Result<CaseReport, HarnessError> {
        tracing::debug!(
            index = case.index,
            depth = case.depth,
            position = %case.position,
            "running test case"
        );
        let (candidate, reference) = if self.parallel {
            thread::scope(|scope| {
                let candidate = scope.spawn(|| self.perft(&self.candidate, case));
                let reference = self.perft(&self.reference, case);
                match candidate.join() {
                    Ok(candidate) => (candidate, reference),
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            })
        } else {
            let candidate = self.perft(&self.candidate, case);
            (candidate, self.perft(&self.reference, case))
        };
        compose(case, candidate, reference)
    }

    fn perft(&self, engine: &EngineCommand, case: &TestCase) -> Result<Measurement, HarnessError> {
        run_perft(engine, &case.position, case.depth, &self.settings)
    }
}

fn compose(
    case: &TestCase,
    candidate: Result<Measurement, HarnessError>,
    reference: Result<Measurement, HarnessError>,
) -> Result<CaseReport, HarnessError> {
    let candidate = candidate.map(|m| RunResult::new(Role::Candidate, m));
    let reference = reference.map(|m| RunResult::new(Role::Reference, m));
    let (candidate, reference) = match (candidate, reference) {
        (Err(error), _) | (_, Err(error)) if error.is_fatal() => return Err(error),
        pair => pair,
    };
    let report = match (candidate, reference) {
        (Ok(candidate), Ok(reference)) => {
            CaseReport::Compared(ComparisonOutcome::new(case.clone(), candidate, reference))
        },
        (Err(error), Ok(reference)) => CaseReport::Errored {
            case: case.clone(),
            role: Role::Candidate,
            error,
            completed: vec![reference],
        },
        (Ok(candidate), Err(error)) => CaseReport::Errored {
            case: case.clone(),
            role: Role::Reference,
            error,
            completed: vec![candidate],
        },
        (Err(error), Err(other)) => {
            tracing::warn!(role = %Role::Reference, "{other}");
            CaseReport::Errored {
                case: case.clone(),
                role: Role::Candidate,
                error,
                completed: vec![],
            }
        },
    };
    Ok(report)
}
