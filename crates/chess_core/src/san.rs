use crate::{board::Position, movegen::legal_moves, types::*};

fn piece_letter(kind: PieceKind) -> Option<char> {
    match kind {
        PieceKind::Pawn => None,
        other => Some(other.to_char().to_ascii_uppercase()),
    }
}

/// Standard algebraic notation for a legal move, including check and mate suffixes.
pub fn move_to_san(pos: &Position, mv: &Move) -> String {
    let mut s = String::with_capacity(8);
    let Some(moved) = pos.piece_at(mv.from) else {
        return s;
    };

    if mv.is_castle {
        let king_side = mv.rook_from.is_some_and(|r| file_of(r) > file_of(mv.from));
        s.push_str(if king_side { "O-O" } else { "O-O-O" });
    } else {
        match piece_letter(moved.kind) {
            Some(letter) => {
                s.push(letter);
                let rivals: Vec<Move> = legal_moves(pos)
                    .into_iter()
                    .filter(|m| {
                        m.to == mv.to
                            && m.from != mv.from
                            && !m.is_castle
                            && pos.piece_at(m.from).map(|p| p.kind) == Some(moved.kind)
                    })
                    .collect();
                if !rivals.is_empty() {
                    let coord = sq_to_coord(mv.from);
                    let same_file = rivals.iter().any(|m| file_of(m.from) == file_of(mv.from));
                    let same_rank = rivals.iter().any(|m| rank_of(m.from) == rank_of(mv.from));
                    if !same_file {
                        s.push_str(&coord[..1]);
                    } else if !same_rank {
                        s.push_str(&coord[1..]);
                    } else {
                        s.push_str(&coord);
                    }
                }
            }
            None if mv.is_capture => s.push_str(&sq_to_coord(mv.from)[..1]),
            None => {}
        }
        if mv.is_capture {
            s.push('x');
        }
        s.push_str(&sq_to_coord(mv.to));
        if let Some(p) = mv.promo {
            s.push('=');
            s.push(p.to_char().to_ascii_uppercase());
        }
    }

    if let Ok(next) = pos.apply(*mv) {
        if next.in_check(next.side_to_move) {
            s.push(if next.legal_moves().is_empty() { '#' } else { '+' });
        }
    }
    s
}

/// Parses SAN, tolerating annotation suffixes, `0-0` castles and a missing `=`.
pub fn parse_san(pos: &Position, text: &str) -> Option<Move> {
    let t = text.trim_end_matches(['+', '#', '!', '?']);
    let legals = legal_moves(pos);

    let castle_wing = match t {
        "O-O" | "0-0" => Some(true),
        "O-O-O" | "0-0-0" => Some(false),
        _ => None,
    };
    if let Some(king_side) = castle_wing {
        return legals.into_iter().find(|m| {
            m.is_castle && m.rook_from.is_some_and(|r| (file_of(r) > file_of(m.from)) == king_side)
        });
    }

    let mut chars: Vec<char> = t.chars().filter(|c| !matches!(c, 'x' | ':' | '-')).collect();
    let kind = match chars.first().copied() {
        Some(c @ ('N' | 'B' | 'R' | 'Q' | 'K')) => {
            let kind = PieceKind::from_char(c)?;
            chars.remove(0);
            kind
        }
        _ => PieceKind::Pawn,
    };

    let mut promo = None;
    if kind == PieceKind::Pawn {
        if let Some(&last) = chars.last() {
            if matches!(last, 'N' | 'B' | 'R' | 'Q' | 'n' | 'b' | 'r' | 'q') && chars.len() > 2 {
                promo = PieceKind::from_char(last);
                chars.pop();
                if chars.last() == Some(&'=') {
                    chars.pop();
                }
            }
        }
    }

    if chars.len() < 2 {
        return None;
    }
    let dest: String = chars[chars.len() - 2..].iter().collect();
    let to = coord_to_sq(&dest)?;
    let hint = &chars[..chars.len() - 2];
    let mut hint_file = None;
    let mut hint_rank = None;
    for &c in hint {
        match c {
            'a'..='h' => hint_file = Some((c as u8 - b'a') as i8),
            '1'..='8' => hint_rank = Some((c as u8 - b'1') as i8),
            _ => return None,
        }
    }
    // A pawn without a file hint is a push.
    if kind == PieceKind::Pawn && hint_file.is_none() {
        hint_file = Some(file_of(to));
    }

    let mut matches = legals.into_iter().filter(|m| {
        !m.is_castle
            && m.to == to
            && pos.piece_at(m.from).map(|p| p.kind) == Some(kind)
            && hint_file.is_none_or(|f| file_of(m.from) == f)
            && hint_rank.is_none_or(|r| rank_of(m.from) == r)
            && match m.promo {
                Some(p) => p == promo.unwrap_or(PieceKind::Queen),
                None => promo.is_none(),
            }
    });
    let found = matches.next()?;
    // Ambiguous text matches nothing.
    if matches.next().is_some() {
        return None;
    }
    Some(found)
}

#[cfg(test)]
#[path = "san_tests.rs"]
mod san_tests;
