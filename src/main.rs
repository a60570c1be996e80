use std::io;
use std::process::ExitCode;

use clap::Parser;
use perft_diff::config::{Args, Config};
use perft_diff::runner::Runner;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "perft_diff=info".into()),
        )
        .init();

    match run(Args::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(2)
        },
    }
}

/// Returns whether the engines agreed on every test case.
fn run(args: Args) -> anyhow::Result<bool> {
    let config = Config::try_from(args)?;
    tracing::info!("perft-diff {}", perft_diff::harness_version());
    tracing::info!(
        candidate = %config.candidate.program.display(),
        reference = %config.reference.program.display(),
        cases = config.cases.len(),
        "starting run"
    );
    let runner = Runner::new(config.candidate, config.reference, config.settings)
        .parallel(config.parallel);
    let summary = runner.run(&config.cases, &mut io::stdout().lock())?;
    Ok(summary.all_passed())
}
