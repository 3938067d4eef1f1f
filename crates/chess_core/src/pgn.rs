//! Movetext import and export.
//!
//! Import extracts the main line only: tags other than `FEN` are kept as-is,
//! comments, variations and NAGs are skipped. Moves may be SAN or UCI.

use crate::board::{Position, STARTPOS_FEN};
use crate::error::PgnError;
use crate::san::{move_to_san, parse_san};
use crate::types::{Color, Move};
use crate::uci::parse_uci_move;

#[derive(Clone, Debug, PartialEq)]
pub struct MoveText {
    pub tags: Vec<(String, String)>,
    pub start: Position,
    pub moves: Vec<Move>,
    /// Position after each move, parallel to `moves`.
    pub positions: Vec<Position>,
    pub result: Option<String>,
}

impl MoveText {
    pub fn final_position(&self) -> &Position {
        self.positions.last().unwrap_or(&self.start)
    }
}

const RESULTS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

pub fn parse_movetext(text: &str) -> Result<MoveText, PgnError> {
    let mut tags = Vec::new();
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '[' => {
                let mut body = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    body.push(c);
                }
                if let Some((name, value)) = body.trim().split_once(char::is_whitespace) {
                    tags.push((name.to_string(), value.trim().trim_matches('"').to_string()));
                }
            }
            '{' => {
                if !chars.by_ref().any(|c| c == '}') {
                    return Err(PgnError::Unbalanced);
                }
            }
            ';' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' => {
                let mut depth = 1;
                while depth > 0 {
                    match chars.next() {
                        Some('(') => depth += 1,
                        Some(')') => depth -= 1,
                        Some('{') => {
                            if !chars.by_ref().any(|c| c == '}') {
                                return Err(PgnError::Unbalanced);
                            }
                        }
                        Some(_) => {}
                        None => return Err(PgnError::Unbalanced),
                    }
                }
            }
            ')' | '}' => return Err(PgnError::Unbalanced),
            c if c.is_whitespace() => {}
            c => {
                let mut tok = String::from(c);
                while let Some(&n) = chars.peek() {
                    if n.is_whitespace() || matches!(n, '{' | '(' | ')' | ';' | '[') {
                        break;
                    }
                    tok.push(n);
                    chars.next();
                }
                tokens.push(tok);
            }
        }
    }

    let start = match tags.iter().find(|(k, _)| k == "FEN") {
        Some((_, fen)) => Position::from_fen(fen)?,
        None => Position::startpos(),
    };

    let mut pos = start.clone();
    let mut moves = Vec::new();
    let mut positions = Vec::new();
    let mut result = None;
    for tok in tokens {
        if RESULTS.contains(&tok.as_str()) {
            result = Some(tok);
            continue;
        }
        if tok.starts_with('$') {
            continue;
        }
        // "12." "12..." and "12.e4" all carry a move number prefix.
        let body = tok.trim_start_matches(|c: char| c.is_ascii_digit());
        let body = if body.len() != tok.len() && body.starts_with('.') {
            body.trim_start_matches('.')
        } else {
            tok.as_str()
        };
        if body.is_empty() {
            continue;
        }
        let mv = parse_san(&pos, body)
            .or_else(|| parse_uci_move(&pos, body))
            .ok_or_else(|| PgnError::Move {
                ply: moves.len() + 1,
                token: body.to_string(),
            })?;
        pos = pos.apply(mv).map_err(|_| PgnError::Move {
            ply: moves.len() + 1,
            token: body.to_string(),
        })?;
        moves.push(mv);
        positions.push(pos.clone());
    }

    Ok(MoveText {
        tags,
        start,
        moves,
        positions,
        result,
    })
}

/// Writes numbered SAN movetext, with `SetUp`/`FEN` tags when `start` is not
/// the standard initial position.
pub fn write_movetext(start: &Position, moves: &[Move], result: Option<&str>) -> String {
    let mut out = String::new();
    let fen = start.to_fen();
    if fen != STARTPOS_FEN {
        out.push_str(&format!("[SetUp \"1\"]\n[FEN \"{fen}\"]\n\n"));
    }

    let mut pos = start.clone();
    let mut parts: Vec<String> = Vec::with_capacity(moves.len() + moves.len() / 2 + 1);
    for (i, mv) in moves.iter().enumerate() {
        match pos.side_to_move {
            Color::White => parts.push(format!("{}.", pos.fullmove_number)),
            Color::Black if i == 0 => parts.push(format!("{}...", pos.fullmove_number)),
            Color::Black => {}
        }
        parts.push(move_to_san(&pos, mv));
        match pos.apply(*mv) {
            Ok(next) => pos = next,
            Err(_) => break,
        }
    }
    if let Some(r) = result {
        parts.push(r.to_string());
    }
    out.push_str(&parts.join(" "));
    out
}

#[cfg(test)]
#[path = "pgn_tests.rs"]
mod pgn_tests;
