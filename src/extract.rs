//! Recovers the total node count from free-form perft output.
//!
//! Engines do not agree on a format. Stockfish prints divide lines followed by
//! a blank line, `Nodes searched: 8902` and another blank line; others print
//! `Nodes searched : 8902` between blank lines, or append a punctuation mark
//! right after the number. In every observed format the total is the last
//! whitespace-separated token on one of the final lines, possibly followed by
//! a single punctuation character.

use clap::ValueEnum;

use crate::drain::CapturedOutput;
use crate::error::HarnessError;

/// Which lines are considered to carry the total.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ExtractionPolicy {
    /// Walk the output from the end and take the first trailing integer on a
    /// line mentioning "nodes". Only engines that never mention "nodes" get
    /// the last two non-blank lines considered instead, minus divide lines
    /// and UCI protocol lines.
    #[default]
    Scan,
    /// Second-to-last line, falling back to the last line. Matches the
    /// output layout of the engines the harness was first tuned against.
    Positional,
}

/// Returns the node count reported in `output`.
///
/// Fails with [`HarnessError::Parse`] carrying the full output when no
/// candidate line ends with an integer.
pub fn extract(output: &CapturedOutput, policy: ExtractionPolicy) -> Result<u64, HarnessError> {
    let lines = output.lines();
    let nodes = match policy {
        ExtractionPolicy::Scan => scan(lines),
        ExtractionPolicy::Positional => lines
            .len()
            .checked_sub(2)
            .and_then(|index| trailing_count(&lines[index]))
            .or_else(|| lines.last().and_then(|line| trailing_count(line))),
    };
    nodes.ok_or_else(|| HarnessError::Parse {
        output: output.clone(),
    })
}

fn scan(lines: &[String]) -> Option<u64> {
    if lines.iter().any(|line| mentions_nodes(line)) {
        return total_line_count(lines);
    }
    lines
        .iter()
        .rev()
        .filter(|line| !line.trim().is_empty())
        .take(2)
        .filter(|line| !is_divide_line(line) && !is_protocol_line(line))
        .find_map(|line| trailing_count(line))
}

/// Count on the last line that mentions "nodes" and ends with an integer.
///
/// Lines mentioning "nodes" are where every known engine reports the total,
/// so this is what an abnormally terminated engine is still trusted with.
#[must_use]
pub fn total_line_count(lines: &[String]) -> Option<u64> {
    lines
        .iter()
        .rev()
        .filter(|line| mentions_nodes(line))
        .find_map(|line| trailing_count(line))
}

fn mentions_nodes(line: &str) -> bool {
    line.to_ascii_lowercase().contains("nodes")
}

/// `<move>: <count>`, e.g. `e2e4: 20` or `a7a8q: 3`.
fn is_divide_line(line: &str) -> bool {
    let Some(head) = line.split_whitespace().next() else {
        return false;
    };
    let Some(uci) = head.strip_suffix(':') else {
        return false;
    };
    let bytes = uci.as_bytes();
    let square =
        |file: u8, rank: u8| (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank);
    match bytes {
        [f1, r1, f2, r2] => square(*f1, *r1) && square(*f2, *r2),
        [f1, r1, f2, r2, promotion] => {
            square(*f1, *r1) && square(*f2, *r2) && b"qrbn".contains(promotion)
        },
        _ => false,
    }
}

fn is_protocol_line(line: &str) -> bool {
    matches!(
        line.split_whitespace().next(),
        Some("id" | "info" | "option" | "uciok" | "readyok" | "bestmove")
    )
}

/// Parses the last token of `line` as an integer, either as-is or with exactly
/// one trailing ASCII punctuation character removed.
#[must_use]
pub fn trailing_count(line: &str) -> Option<u64> {
    let token = line.split_whitespace().next_back()?;
    if let Ok(count) = token.parse() {
        return Some(count);
    }
    let mut chars = token.chars();
    match chars.next_back() {
        Some(last) if last.is_ascii_punctuation() => chars.as_str().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn output(text: &str) -> CapturedOutput {
        CapturedOutput::from(text)
    }

    const STOCKFISH: &str = "Stockfish 16 by the Stockfish developers (see AUTHORS file)
info string NNUE evaluation using nn-5af11540bbfe.nnue enabled
a2a3: 380
b2b3: 420
g1h3: 459

Nodes searched: 8902
";

    const BLANK_FRAMED: &str = "
Nodes searched : 197281
";

    #[test]
    fn trailing_token() {
        assert_eq!(trailing_count("Nodes searched: 8902"), Some(8902));
        assert_eq!(trailing_count("Nodes searched : 8902."), Some(8902));
        assert_eq!(trailing_count("D7;"), None);
        assert_eq!(trailing_count("total 7!"), Some(7));
        assert_eq!(trailing_count("  42  "), Some(42));
    }

    #[test]
    fn trailing_token_strips_exactly_one_character() {
        assert_eq!(trailing_count("8902.."), None);
        assert_eq!(trailing_count("8902a"), None);
        assert_eq!(trailing_count("-5"), None);
        assert_eq!(trailing_count(""), None);
        assert_eq!(trailing_count("   "), None);
        assert_eq!(trailing_count("."), None);
    }

    #[test]
    fn stockfish_layout() {
        for policy in [ExtractionPolicy::Scan, ExtractionPolicy::Positional] {
            assert_eq!(extract(&output(STOCKFISH), policy).unwrap(), 8902);
        }
    }

    #[test]
    fn blank_framed_layout() {
        let mut text = BLANK_FRAMED.to_string();
        text.push('\n');
        for policy in [ExtractionPolicy::Scan, ExtractionPolicy::Positional] {
            assert_eq!(extract(&output(&text), policy).unwrap(), 197_281);
        }
    }

    #[test]
    fn positional_falls_back_to_last_line() {
        let captured = output("readyok\nNodes searched: 20");
        assert_eq!(
            extract(&captured, ExtractionPolicy::Positional).unwrap(),
            20
        );
        let single = output("20");
        assert_eq!(extract(&single, ExtractionPolicy::Positional).unwrap(), 20);
    }

    #[test]
    fn positional_ignores_earlier_lines() {
        let captured = output("Nodes searched: 20\ninfo string done\nbye");
        let error = extract(&captured, ExtractionPolicy::Positional).unwrap_err();
        assert_eq!(error.kind(), "PARSE");
        assert_eq!(extract(&captured, ExtractionPolicy::Scan).unwrap(), 20);
    }

    #[test]
    fn scan_prefers_total_over_divide_lines() {
        let captured = output("a2a3: 380\nNodes searched: 8902\na2a4: 420\n");
        assert_eq!(extract(&captured, ExtractionPolicy::Scan).unwrap(), 8902);
    }

    #[test]
    fn scan_without_nodes_keyword() {
        let captured = output("readyok\n\n400\n\n");
        assert_eq!(extract(&captured, ExtractionPolicy::Scan).unwrap(), 400);
    }

    #[test]
    fn scan_ignores_divide_lines_when_total_is_garbled() {
        let captured = output("a2a3: 380\nb2b3: 420\n\nNodes searched: lots\n\n");
        for policy in [ExtractionPolicy::Scan, ExtractionPolicy::Positional] {
            assert_eq!(extract(&captured, policy).unwrap_err().kind(), "PARSE");
        }
    }

    #[test]
    fn scan_ignores_truncated_divide_output() {
        let captured = output("readyok\na2a3: 380\nb2b3: 420\na7a8q: 3\n");
        assert_eq!(
            extract(&captured, ExtractionPolicy::Scan).unwrap_err().kind(),
            "PARSE"
        );
    }

    #[test]
    fn scan_ignores_protocol_lines() {
        let captured = output("id name Foo 2\nreadyok\n");
        assert!(extract(&captured, ExtractionPolicy::Scan).is_err());
        let captured = output("info depth 3 score cp 20\n\n");
        assert!(extract(&captured, ExtractionPolicy::Scan).is_err());
    }

    #[test]
    fn scan_fallback_looks_at_final_lines_only() {
        let captured = output("perft 3\n8902\ndone\nbye\n");
        assert!(extract(&captured, ExtractionPolicy::Scan).is_err());
        let captured = output("perft 3\ntotal 8902\ndone\n");
        assert_eq!(extract(&captured, ExtractionPolicy::Scan).unwrap(), 8902);
    }

    #[test]
    fn divide_line_shapes() {
        assert!(is_divide_line("e2e4: 20"));
        assert!(is_divide_line("a7a8q: 3"));
        assert!(!is_divide_line("e2e4 20"));
        assert!(!is_divide_line("Nodes: 20"));
        assert!(!is_divide_line("i2e4: 20"));
        assert!(!is_divide_line("a7a8k: 3"));
        assert!(!is_divide_line(""));
    }

    #[test]
    fn total_line_only() {
        let lines: Vec<String> = ["a2a3: 380", "Nodes searched: 8902", "b2b3: 420"]
            .map(String::from)
            .to_vec();
        assert_eq!(total_line_count(&lines), Some(8902));
        assert_eq!(total_line_count(&lines[..1]), None);
    }

    #[test]
    fn malformed_output_keeps_raw_lines() {
        let captured = output("readyok\nNodes searched: many\n");
        for policy in [ExtractionPolicy::Scan, ExtractionPolicy::Positional] {
            match extract(&captured, policy) {
                Err(HarnessError::Parse { output }) => assert_eq!(output, captured),
                other => panic!("expected parse error, got {other:?}"),
            }
        }
    }

    #[test]
    fn empty_output() {
        for policy in [ExtractionPolicy::Scan, ExtractionPolicy::Positional] {
            assert!(extract(&CapturedOutput::default(), policy).is_err());
        }
    }
}
