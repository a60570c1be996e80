//! Reference engine backed by [`shakmaty`]'s move generator. It speaks just
//! enough of the [Universal Chess Interface] (UCI) to be used as either side of
//! a comparison: `uci`, `isready`, `position`, `go perft` and `quit`.
//!
//! The output of `go perft` follows Stockfish: one `<move>: <count>` line per
//! legal move, a blank line, `Nodes searched: <total>` and another blank line.
//!
//! [`OracleOptions`] can make the oracle misbehave on purpose (wrong totals,
//! unparseable output, ignoring `isready`, dying halfway), which is how the
//! harness itself is tested end to end.
//!
//! [Universal Chess Interface]: https://www.chessprogramming.org/UCI

use std::io::{BufRead, Write};

use anyhow::{anyhow, bail};
use clap::ValueEnum;
use shakmaty::fen::Fen;
use shakmaty::{perft, CastlingMode, Chess, Position};

use crate::oracle::uci::Command;

mod uci;

/// Deliberate deviations from correct behavior.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OracleOptions {
    /// Added to every reported total.
    pub skew: i64,
    /// Print the divide lines but replace the total by a word.
    pub garble: bool,
    /// Do not answer `isready`.
    pub ignore_isready: bool,
    /// Stop abruptly at this point of the exchange.
    pub crash_at: Option<CrashPoint>,
}

/// Where a crashing oracle gives up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CrashPoint {
    /// On receiving `position`.
    Position,
    /// On receiving `isready`, without answering.
    #[value(name = "isready")]
    IsReady,
    /// After printing the divide lines of `go perft`, before the total.
    Perft,
}

/// How the command loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shutdown {
    /// `quit` was received.
    Quit,
    /// The input stream was closed.
    EndOfInput,
    /// A [`CrashPoint`] was reached.
    Crash,
}

/// Connects the command stream to the move generator.
pub struct Oracle<'a, R: BufRead, W: Write> {
    position: Chess,
    options: OracleOptions,
    input: &'a mut R,
    output: &'a mut W,
}

impl<'a, R: BufRead, W: Write> Oracle<'a, R, W> {
    /// Creates an oracle in the starting position reading commands from
    /// `input` and answering to `output`.
    #[must_use]
    pub fn new(input: &'a mut R, output: &'a mut W, options: OracleOptions) -> Self {
        Self {
            position: Chess::default(),
            options,
            input,
            output,
        }
    }

    /// Executes commands until `quit` or end of input.
    ///
    /// Malformed commands are answered with an `info string` and skipped.
    pub fn uci_loop(&mut self) -> anyhow::Result<Shutdown> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(Shutdown::EndOfInput);
            }
            let command = Command::parse(&line);
            if self.crashes_on(&command) {
                self.output.flush()?;
                return Ok(Shutdown::Crash);
            }
            match command {
                Command::Uci => self.handle_uci()?,
                Command::IsReady => {
                    if !self.options.ignore_isready {
                        writeln!(self.output, "readyok")?;
                    }
                },
                Command::SetPosition { fen, moves } => {
                    if let Err(e) = self.handle_position(fen.as_deref(), &moves) {
                        writeln!(self.output, "info string {e}")?;
                    }
                },
                Command::NewGame => self.position = Chess::default(),
                Command::Go { perft: Some(depth) } => {
                    self.handle_perft(depth)?;
                    if self.options.crash_at == Some(CrashPoint::Perft) {
                        self.output.flush()?;
                        return Ok(Shutdown::Crash);
                    }
                },
                Command::Go { perft: None } | Command::Stop => {},
                Command::Quit => return Ok(Shutdown::Quit),
                Command::Unknown(command) if command.trim().is_empty() => {},
                Command::Unknown(command) => {
                    writeln!(self.output, "info string Unsupported command: {command}")?;
                },
            }
            self.output.flush()?;
        }
    }

    fn crashes_on(&self, command: &Command) -> bool {
        matches!(
            (self.options.crash_at, command),
            (Some(CrashPoint::Position), Command::SetPosition { .. })
                | (Some(CrashPoint::IsReady), Command::IsReady)
        )
    }

    /// Responds to the `uci` handshake command by identifying the engine.
    fn handle_uci(&mut self) -> anyhow::Result<()> {
        writeln!(self.output, "id name perft-oracle {}", crate::harness_version())?;
        writeln!(self.output, "uciok")?;
        Ok(())
    }

    /// Changes the position to the one specified in the command. On error the
    /// current position is kept.
    fn handle_position(&mut self, fen: Option<&str>, moves: &[String]) -> anyhow::Result<()> {
        let mut position = match fen {
            None => Chess::default(),
            Some(fen) => {
                let setup: Fen = fen.parse().map_err(|e| anyhow!("invalid FEN: {e}"))?;
                setup
                    .into_position(CastlingMode::Standard)
                    .map_err(|e| anyhow!("illegal position: {e}"))?
            },
        };
        for text in moves {
            let Some(next_move) = position
                .legal_moves()
                .into_iter()
                .find(|m| m.to_uci(CastlingMode::Standard).to_string() == *text)
            else {
                bail!("illegal move: {text}");
            };
            position.play_unchecked(&next_move);
        }
        self.position = position;
        Ok(())
    }

    /// Prints the node count of every legal move followed by the total.
    fn handle_perft(&mut self, depth: u32) -> anyhow::Result<()> {
        let total: u64 = if depth == 0 {
            1
        } else {
            let mut total = 0;
            for root_move in &self.position.legal_moves() {
                let mut child = self.position.clone();
                child.play_unchecked(root_move);
                let nodes = perft(&child, depth - 1);
                writeln!(
                    self.output,
                    "{}: {nodes}",
                    root_move.to_uci(CastlingMode::Standard)
                )?;
                total += nodes;
            }
            total
        };
        if self.options.crash_at == Some(CrashPoint::Perft) {
            return Ok(());
        }
        writeln!(self.output)?;
        if self.options.garble {
            writeln!(self.output, "Nodes searched: lots")?;
        } else {
            let reported = total.saturating_add_signed(self.options.skew);
            writeln!(self.output, "Nodes searched: {reported}")?;
        }
        writeln!(self.output)?;
        Ok(())
    }
}
