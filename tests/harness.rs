//! Drives the library against the `perft-oracle` binary, with and without
//! injected faults.

use std::time::{Duration, Instant};

use perft_diff::driver::{exchange, run_perft, DriverSettings, Readiness};
use perft_diff::error::Stage;
use perft_diff::extract::ExtractionPolicy;
use perft_diff::position::Position;
use perft_diff::process::EngineCommand;
use perft_diff::runner::{CaseReport, Role, Runner, TestCase};
use perft_diff::HarnessError;
use pretty_assertions::assert_eq;
use shakmaty::{perft, Chess};

const ORACLE: &str = env!("CARGO_BIN_EXE_perft-oracle");

fn oracle(name: &str, args: &[&str]) -> EngineCommand {
    EngineCommand::new(name, ORACLE).with_args(args.iter().copied())
}

fn settings() -> DriverSettings {
    DriverSettings {
        readiness: Readiness::Handshake(Duration::from_secs(10)),
        exit_timeout: Duration::from_secs(30),
        extraction: ExtractionPolicy::Scan,
    }
}

fn run(candidate: EngineCommand, cases: &[TestCase]) -> (String, Vec<CaseReport>) {
    let mut out = Vec::new();
    let summary = Runner::new(candidate, oracle("reference", &[]), settings())
        .run(cases, &mut out)
        .unwrap();
    (String::from_utf8(out).unwrap(), summary.reports)
}

#[test]
fn startpos_counts_match_move_generator() {
    for depth in 1..=3 {
        let measurement = run_perft(
            &oracle("candidate", &[]),
            &Position::StartPos,
            depth,
            &settings(),
        )
        .unwrap();
        assert_eq!(measurement.nodes, perft(&Chess::default(), depth));
    }
}

#[test]
fn depth_zero_is_one_node() {
    let measurement = run_perft(
        &oracle("candidate", &[]),
        &Position::StartPos,
        0,
        &settings(),
    )
    .unwrap();
    assert_eq!(measurement.nodes, 1);
}

#[test]
fn exchange_captures_divide_output() {
    let exchange = exchange(
        &oracle("candidate", &[]),
        &"8/8/8/8/8/8/8/K6k w - - 0 1".parse().unwrap(),
        1,
        &settings(),
    )
    .unwrap();
    let lines = exchange.output.lines();
    assert_eq!(lines.first().map(String::as_str), Some("readyok"));
    assert!(lines.iter().any(|line| line == "Nodes searched: 3"));
}

#[test]
fn positional_extraction_on_stockfish_layout() {
    let measurement = run_perft(
        &oracle("candidate", &[]),
        &Position::StartPos,
        2,
        &DriverSettings {
            extraction: ExtractionPolicy::Positional,
            ..settings()
        },
    )
    .unwrap();
    assert_eq!(measurement.nodes, 400);
}

#[test]
fn delay_synchronization() {
    let measurement = run_perft(
        &oracle("candidate", &["--no-ready"]),
        &Position::StartPos,
        2,
        &DriverSettings {
            readiness: Readiness::Delay(Duration::from_millis(20)),
            ..settings()
        },
    )
    .unwrap();
    assert_eq!(measurement.nodes, 400);
}

#[test]
fn missing_readyok_times_out() {
    let error = run_perft(
        &oracle("candidate", &["--no-ready"]),
        &Position::StartPos,
        1,
        &DriverSettings {
            readiness: Readiness::Handshake(Duration::from_millis(300)),
            ..settings()
        },
    )
    .unwrap_err();
    assert!(
        matches!(
            error,
            HarnessError::Timeout {
                stage: Stage::Readiness,
                ..
            }
        ),
        "{error:?}"
    );
}

#[test]
fn engine_that_never_exits_is_killed() {
    let error = run_perft(
        &oracle("candidate", &["--hang-on-exit"]),
        &Position::StartPos,
        1,
        &DriverSettings {
            exit_timeout: Duration::from_secs(1),
            ..settings()
        },
    )
    .unwrap_err();
    assert!(
        matches!(
            error,
            HarnessError::Timeout {
                stage: Stage::Exit,
                ..
            }
        ),
        "{error:?}"
    );
    assert_eq!(error.kind(), "TIMEOUT");
}

#[test]
fn passing_run() {
    let cases = TestCase::matrix(&[Position::StartPos], &[1, 2, 3]);
    let (out, reports) = run(oracle("candidate", &[]), &cases);
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(lines.len(), cases.len() + 1);
    assert!(lines[2].starts_with("[Position index 1] depth 3: OK (8902) time [candidate = "));
    assert!(lines[3].starts_with("Passed 3/3 cases. Average time spent: candidate = "));
    assert!(reports.iter().all(CaseReport::passed));
}

#[test]
fn mismatch_is_reported_with_both_counts() {
    let cases = TestCase::matrix(&[Position::StartPos], &[3]);
    let (out, reports) = run(oracle("candidate", &["--skew", "1"]), &cases);
    assert_eq!(
        out.lines().next(),
        Some("[Position index 1] depth 3: FAILED (8903 instead of 8902) [startpos]")
    );
    assert!(out.contains("Passed 0/1 cases."));
    assert!(!reports[0].passed());
}

#[test]
fn unparseable_output_does_not_stop_the_run() {
    let cases = TestCase::matrix(&[Position::StartPos], &[1, 2]);
    // Divide lines are printed as usual, only the total is garbled.
    let (out, reports) = run(oracle("candidate", &["--garble"]), &cases);
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("[Position index 1] depth 1: ERROR PARSE candidate: "));
    assert!(lines[1].starts_with("[Position index 1] depth 2: ERROR PARSE candidate: "));
    match &reports[0] {
        CaseReport::Errored {
            role, completed, ..
        } => {
            assert_eq!(*role, Role::Candidate);
            assert_eq!(completed.len(), 1);
            assert_eq!(completed[0].role, Role::Reference);
            assert_eq!(completed[0].nodes, 20);
        },
        CaseReport::Compared(_) => panic!("expected an error"),
    }
    // Reference timings are still sampled, the candidate has none.
    assert!(lines[2].contains("candidate = n/a"));
}

#[test]
fn engine_crashing_mid_search_is_an_error() {
    let error = run_perft(
        &oracle("candidate", &["--crash-at", "perft"]),
        &Position::StartPos,
        3,
        &settings(),
    )
    .unwrap_err();
    match error {
        HarnessError::Exited { status, output, .. } => {
            assert_eq!(status.code(), Some(3));
            // Divide lines were printed but never taken for the total.
            assert!(output.lines().iter().any(|line| line == "e2e4: 600"));
        },
        other => panic!("expected an early exit, got {other:?}"),
    }
}

#[test]
fn crashed_candidate_is_not_reported_as_mismatch() {
    let cases = TestCase::matrix(&[Position::StartPos], &[2, 3]);
    let (out, reports) = run(oracle("candidate", &["--crash-at", "perft"]), &cases);
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("[Position index 1] depth 2: ERROR EXITED candidate: "));
    assert!(lines[1].starts_with("[Position index 1] depth 3: ERROR EXITED candidate: "));
    assert!(!out.contains("FAILED"));
    assert!(reports.iter().all(|report| !report.passed()));
}

#[test]
fn engine_dying_before_ready_fails_fast() {
    let started = Instant::now();
    let error = run_perft(
        &oracle("candidate", &["--crash-at", "isready"]),
        &Position::StartPos,
        1,
        &DriverSettings {
            readiness: Readiness::Handshake(Duration::from_secs(30)),
            ..settings()
        },
    )
    .unwrap_err();
    match error {
        HarnessError::Exited { status, .. } => assert_eq!(status.code(), Some(3)),
        other => panic!("expected an early exit, got {other:?}"),
    }
    assert!(started.elapsed() < Duration::from_secs(20));
}

#[test]
fn engine_gone_before_search_fails_only_its_cases() {
    let cases = TestCase::matrix(&[Position::StartPos], &[1, 2]);
    let mut out = Vec::new();
    let summary = Runner::new(
        oracle("candidate", &["--crash-at", "position"]),
        oracle("reference", &[]),
        DriverSettings {
            readiness: Readiness::Delay(Duration::from_millis(300)),
            ..settings()
        },
    )
    .run(&cases, &mut out)
    .unwrap();
    let out = String::from_utf8(out).unwrap();
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("[Position index 1] depth 1: ERROR PIPE_CLOSED candidate: "));
    assert!(lines[1].starts_with("[Position index 1] depth 2: ERROR PIPE_CLOSED candidate: "));
    assert!(lines[2].starts_with("Passed 0/2 cases."));
    assert_eq!(summary.stats.samples(Role::Candidate), 0);
    assert_eq!(summary.stats.samples(Role::Reference), 2);
}

#[test]
fn missing_engine_aborts_the_run() {
    let cases = TestCase::matrix(&[Position::StartPos], &[1]);
    let mut out = Vec::new();
    let error = Runner::new(
        EngineCommand::new("candidate", "/nonexistent/engine"),
        oracle("reference", &[]),
        settings(),
    )
    .run(&cases, &mut out)
    .unwrap_err();
    assert!(error.is_fatal());
    assert!(matches!(error, HarnessError::Spawn { .. }), "{error:?}");
    assert!(out.is_empty());
}

#[test]
fn parallel_run_matches_sequential_counts() {
    let positions = Position::defaults().unwrap();
    let cases = TestCase::matrix(&positions, &[1, 2]);
    let mut out = Vec::new();
    let summary = Runner::new(oracle("candidate", &[]), oracle("reference", &[]), settings())
        .parallel(true)
        .run(&cases, &mut out)
        .unwrap();
    assert!(summary.all_passed());
    assert_eq!(summary.passed(), positions.len() * 2);
    assert_eq!(summary.stats.samples(Role::Candidate), 12);
    assert_eq!(summary.stats.samples(Role::Reference), 12);
    let indices: Vec<_> = summary.reports.iter().map(|r| r.case().index).collect();
    assert_eq!(indices, vec![1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6]);
}
