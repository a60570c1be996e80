//! Parser for the part of the UCI protocol the oracle understands.

#[derive(Debug, PartialEq, Eq)]
pub(super) enum Command {
    Uci,
    IsReady,
    SetPosition {
        fen: Option<String>,
        moves: Vec<String>,
    },
    NewGame,
    Go {
        perft: Option<u32>,
    },
    Stop,
    Quit,
    Unknown(String),
}

fn parse_go(parts: &[&str]) -> Command {
    let mut perft = None;
    let mut i = 1;
    while i < parts.len() {
        if parts[i] == "perft" && i + 1 < parts.len() {
            perft = parts[i + 1].parse().ok();
        }
        i += 2;
    }
    if perft.is_none() {
        return Command::Unknown(parts.join(" "));
    }
    Command::Go { perft }
}

fn parse_setposition(parts: &[&str]) -> Command {
    let fen_index = parts.iter().position(|&x| x == "fen");
    let moves_index = parts.iter().position(|&x| x == "moves");
    let fen = fen_index.map(|index| parts[index + 1..moves_index.unwrap_or(parts.len())].join(" "));
    if fen.is_none() && parts.get(1) != Some(&"startpos") {
        return Command::Unknown(parts.join(" "));
    }
    let moves = moves_index.map_or_else(Vec::new, |index| {
        parts[index + 1..].iter().map(|s| (*s).to_string()).collect()
    });
    Command::SetPosition { fen, moves }
}

impl Command {
    pub(super) fn parse(input: &str) -> Self {
        let parts: Vec<&str> = input.split_whitespace().collect();

        if parts.is_empty() {
            return Self::Unknown(input.to_string());
        }

        match parts[0] {
            "uci" => Self::Uci,
            "isready" => Self::IsReady,
            "position" => parse_setposition(&parts),
            "ucinewgame" => Self::NewGame,
            "go" => parse_go(&parts),
            "stop" => Self::Stop,
            "quit" => Self::Quit,
            _ => Self::Unknown(input.trim().to_string()),
        }
    }
}
