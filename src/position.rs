//! Position descriptions sent to the engines with the `position` command.
//!
//! A description is either the standard starting position or a position in
//! [Forsyth-Edwards Notation] (FEN). FENs are validated when they are read so
//! that a typo in the suite is reported once at startup instead of as a
//! confusing engine disagreement later.
//!
//! [Forsyth-Edwards Notation]: https://www.chessprogramming.org/Forsyth-Edwards_Notation

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, bail, Context};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess};

/// Positions used when no suite is configured. Mostly the well-known perft
/// positions that exercise castling, en passant and promotions.
pub const DEFAULT_POSITIONS: [&str; 6] = [
    "startpos",
    "fen 4r1k1/p1p2pp1/1q1p3p/1P3P2/1P6/2n1Q3/PB4PP/4R1K1 w - - 0 1",
    "fen r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
    "fen r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    "fen rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    "fen r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
];

/// Search depths used when none are configured.
pub const DEFAULT_DEPTHS: [u32; 4] = [3, 4, 5, 6];

/// Board state an engine is asked to search from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Position {
    /// The standard starting position.
    StartPos,
    /// Arbitrary position, stored as the FEN text it was given in.
    Fen(String),
}

impl Position {
    /// Full `position ...` command for this description.
    #[must_use]
    pub fn to_command(&self) -> String {
        format!("position {self}")
    }

    /// Built-in suite, see [`DEFAULT_POSITIONS`].
    pub fn defaults() -> anyhow::Result<Vec<Self>> {
        DEFAULT_POSITIONS.iter().map(|desc| desc.parse()).collect()
    }

    fn from_fen(fen: &str) -> anyhow::Result<Self> {
        let fen = fen.split_whitespace().collect::<Vec<_>>().join(" ");
        let setup: Fen = fen
            .parse()
            .map_err(|e| anyhow!("invalid FEN {fen:?}: {e}"))?;
        if let Err(e) = setup.into_position::<Chess>(CastlingMode::Standard) {
            bail!("illegal position {fen:?}: {e}");
        }
        Ok(Self::Fen(fen))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartPos => f.write_str("startpos"),
            Self::Fen(fen) => write!(f, "fen {fen}"),
        }
    }
}

impl FromStr for Position {
    type Err = anyhow::Error;

    /// Accepts `startpos`, `fen <FEN>`, the same prefixed with `position`, or
    /// a bare FEN.
    fn from_str(input: &str) -> anyhow::Result<Self> {
        let input = input.trim();
        let input = input.strip_prefix("position ").map_or(input, str::trim_start);
        if input.is_empty() {
            bail!("empty position description");
        }
        if input == "startpos" {
            return Ok(Self::StartPos);
        }
        if input.starts_with("startpos ") {
            bail!("moves after startpos are not supported: {input:?}");
        }
        Self::from_fen(input.strip_prefix("fen ").unwrap_or(input))
    }
}

/// Reads one position per line. Blank lines and lines starting with `#` are
/// skipped; anything after `;` (EPD operations such as `;D1 20`) is ignored.
pub fn read_positions_file(path: &Path) -> anyhow::Result<Vec<Position>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_positions(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn parse_positions(contents: &str) -> anyhow::Result<Vec<Position>> {
    let mut positions = vec![];
    for (number, line) in contents.lines().enumerate() {
        let line = line.split(';').next().unwrap_or_default().trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let position = line
            .parse()
            .with_context(|| format!("line {}", number + 1))?;
        positions.push(position);
    }
    if positions.is_empty() {
        bail!("no positions found");
    }
    Ok(positions)
}
