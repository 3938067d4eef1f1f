use crate::{board::Position, error::IllegalMoveError, movegen::legal_moves, types::*};

/// How castles are written in UCI move text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CastlingNotation {
    /// King origin to king destination (`e1g1`).
    #[default]
    Standard,
    /// King origin to castling rook (`e1h1`), as expected with `UCI_Chess960`.
    KingTakesRook,
}

pub fn move_to_uci(mv: &Move, notation: CastlingNotation) -> String {
    let to = match (notation, mv.is_castle, mv.rook_from) {
        (CastlingNotation::KingTakesRook, true, Some(rook)) => rook,
        _ => mv.to,
    };
    let mut s = String::with_capacity(5);
    s.push_str(&sq_to_coord(mv.from));
    s.push_str(&sq_to_coord(to));
    if let Some(p) = mv.promo {
        s.push(p.to_char());
    }
    s
}

/// Parses a UCI move and matches it against the legal moves so flags are correct.
/// Both castle notations are accepted.
pub fn parse_uci_move(pos: &Position, txt: &str) -> Option<Move> {
    let txt = txt.trim();
    if !(4..=5).contains(&txt.len()) || !txt.is_ascii() {
        return None;
    }
    let from = coord_to_sq(&txt[0..2])?;
    let to = coord_to_sq(&txt[2..4])?;
    let promo = match txt.as_bytes().get(4) {
        Some(&b) => match PieceKind::from_char(b as char)? {
            kind @ (PieceKind::Knight | PieceKind::Bishop | PieceKind::Rook | PieceKind::Queen) => {
                Some(kind)
            }
            _ => return None,
        },
        None => None,
    };

    let legals = legal_moves(pos);
    let king_onto_rook = legals
        .iter()
        .find(|m| m.is_castle && m.from == from && m.rook_from == Some(to));
    if let Some(m) = king_onto_rook {
        return Some(*m);
    }
    let mut candidates = legals
        .into_iter()
        .filter(|m| m.from == from && m.to == to && m.promo == promo);
    let first = candidates.next()?;
    // Prefer the plain king step when a Chess960 castle shares its squares.
    if first.is_castle {
        return Some(candidates.find(|m| !m.is_castle).unwrap_or(first));
    }
    Some(first)
}

/// Resolves a sequence of UCI moves from `start`, returning every position reached.
pub fn play_uci_moves<'a, I>(start: &Position, moves: I) -> Result<Vec<(Move, Position)>, IllegalMoveError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = Vec::new();
    let mut pos = start.clone();
    for txt in moves {
        let mv = parse_uci_move(&pos, txt)
            .ok_or_else(|| IllegalMoveError::Unparsable(txt.to_string()))?;
        pos = pos.apply(mv)?;
        out.push((mv, pos.clone()));
    }
    Ok(out)
}

#[cfg(test)]
#[path = "uci_tests.rs"]
mod uci_tests;
