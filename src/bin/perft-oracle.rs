use std::io;
use std::process::ExitCode;

use clap::Parser;
use perft_diff::oracle::{CrashPoint, Oracle, OracleOptions, Shutdown};

/// Exit status of a simulated crash.
const CRASH_EXIT_CODE: u8 = 3;

/// Minimal UCI engine answering `go perft` with node counts from a trusted move
/// generator. The fault flags make it usable as a misbehaving engine.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Offset added to every reported node total.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    skew: i64,
    /// Report a total that is not a number.
    #[arg(long)]
    garble: bool,
    /// Never answer `isready`.
    #[arg(long)]
    no_ready: bool,
    /// Exit with status 3 at the given point of the exchange.
    #[arg(long, value_enum)]
    crash_at: Option<CrashPoint>,
    /// Keep running after `quit` or end of input.
    #[arg(long)]
    hang_on_exit: bool,
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    let options = OracleOptions {
        skew: args.skew,
        garble: args.garble,
        ignore_isready: args.no_ready,
        crash_at: args.crash_at,
    };
    let shutdown = Oracle::new(&mut io::stdin().lock(), &mut io::stdout().lock(), options)
        .uci_loop()?;
    if shutdown == Shutdown::Crash {
        return Ok(ExitCode::from(CRASH_EXIT_CODE));
    }
    if args.hang_on_exit {
        loop {
            std::thread::park();
        }
    }
    if shutdown == Shutdown::EndOfInput {
        eprintln!("input closed without quit");
    }
    Ok(ExitCode::SUCCESS)
}
