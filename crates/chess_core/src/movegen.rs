use crate::board::{Position, Wing, DIAGONALS, KING_DELTAS, KNIGHT_DELTAS, ORTHOGONALS};
use crate::types::*;

const PROMOTIONS: [PieceKind; 4] = [
    PieceKind::Queen,
    PieceKind::Rook,
    PieceKind::Bishop,
    PieceKind::Knight,
];

/// Generate all legal moves for the side to move.
pub fn legal_moves(pos: &Position) -> Vec<Move> {
    let mut out = Vec::with_capacity(64);
    pseudo_moves(pos, &mut out);

    let mover = pos.side_to_move;
    // Drop anything that leaves the mover's king attacked.
    out.retain(|&mv| {
        let mut next = pos.clone();
        next.play_unchecked(mv);
        !next.in_check(mover)
    });
    out
}

fn pseudo_moves(pos: &Position, out: &mut Vec<Move>) {
    let us = pos.side_to_move;
    for (from, pc) in pos.pieces(us) {
        match pc.kind {
            PieceKind::Pawn => gen_pawn(pos, from, us, out),
            PieceKind::Knight => gen_steps(pos, from, us, &KNIGHT_DELTAS, out),
            PieceKind::Bishop => gen_slider(pos, from, us, &DIAGONALS, out),
            PieceKind::Rook => gen_slider(pos, from, us, &ORTHOGONALS, out),
            PieceKind::Queen => {
                gen_slider(pos, from, us, &DIAGONALS, out);
                gen_slider(pos, from, us, &ORTHOGONALS, out);
            }
            PieceKind::King => {
                gen_steps(pos, from, us, &KING_DELTAS, out);
                gen_castle(pos, from, us, out);
            }
        }
    }
}

fn push_pawn_move(out: &mut Vec<Move>, mut mv: Move, promo_rank: i8) {
    if rank_of(mv.to) == promo_rank {
        for pk in PROMOTIONS {
            mv.promo = Some(pk);
            out.push(mv);
        }
    } else {
        out.push(mv);
    }
}

fn gen_pawn(pos: &Position, from: u8, c: Color, out: &mut Vec<Move>) {
    let f = file_of(from);
    let r = rank_of(from);
    let dir = c.pawn_dir();
    let start_rank: i8 = match c {
        Color::White => 1,
        Color::Black => 6,
    };
    let promo_rank = c.other().back_rank();

    if let Some(to) = sq(f, r + dir) {
        if pos.piece_at(to).is_none() {
            push_pawn_move(out, Move::new(from, to), promo_rank);
            if r == start_rank {
                if let Some(to2) = sq(f, r + 2 * dir) {
                    if pos.piece_at(to2).is_none() {
                        out.push(Move::new(from, to2));
                    }
                }
            }
        }
    }

    for df in [-1, 1] {
        let Some(to) = sq(f + df, r + dir) else {
            continue;
        };
        match pos.piece_at(to) {
            Some(tpc) if tpc.color != c => {
                let mut mv = Move::new(from, to);
                mv.is_capture = true;
                push_pawn_move(out, mv, promo_rank);
            }
            None if pos.en_passant == Some(to) => {
                let mut mv = Move::new(from, to);
                mv.is_capture = true;
                mv.is_en_passant = true;
                out.push(mv);
            }
            _ => {}
        }
    }
}

fn gen_steps(pos: &Position, from: u8, c: Color, deltas: &[(i8, i8)], out: &mut Vec<Move>) {
    let f = file_of(from);
    let r = rank_of(from);
    for (df, dr) in deltas {
        if let Some(to) = sq(f + df, r + dr) {
            match pos.piece_at(to) {
                None => out.push(Move::new(from, to)),
                Some(pc) if pc.color != c => {
                    let mut mv = Move::new(from, to);
                    mv.is_capture = true;
                    out.push(mv);
                }
                _ => {}
            }
        }
    }
}

fn gen_slider(pos: &Position, from: u8, c: Color, dirs: &[(i8, i8)], out: &mut Vec<Move>) {
    let f0 = file_of(from);
    let r0 = rank_of(from);
    for (df, dr) in dirs {
        let mut f = f0 + df;
        let mut r = r0 + dr;
        while let Some(to) = sq(f, r) {
            match pos.piece_at(to) {
                None => out.push(Move::new(from, to)),
                Some(pc) if pc.color != c => {
                    let mut mv = Move::new(from, to);
                    mv.is_capture = true;
                    out.push(mv);
                    break;
                }
                _ => break,
            }
            f += df;
            r += dr;
        }
    }
}

/// Castling for both standard and Chess960 start files.
///
/// Every square between the king and its destination, and between the rook and
/// its destination, must be empty apart from those two pieces. No square on the
/// king's path, start and destination included, may be attacked.
fn gen_castle(pos: &Position, king_from: u8, c: Color, out: &mut Vec<Move>) {
    let rank = c.back_rank();
    if rank_of(king_from) != rank || pos.in_check(c) {
        return;
    }
    let enemy = c.other();
    let kf = file_of(king_from);

    for wing in [Wing::King, Wing::Queen] {
        let Some(rook_file) = pos.castling.get(c, wing) else {
            continue;
        };
        let rf = rook_file as i8;
        let Some(rook_from) = sq(rf, rank) else {
            continue;
        };
        if pos.piece_at(rook_from) != Some(Piece::new(c, PieceKind::Rook)) {
            continue;
        }
        let (ktf, rtf) = wing.destination_files();

        let lo = kf.min(rf).min(ktf).min(rtf);
        let hi = kf.max(rf).max(ktf).max(rtf);
        let blocked = (lo..=hi).filter_map(|f| sq(f, rank)).any(|s| {
            s != king_from && s != rook_from && pos.piece_at(s).is_some()
        });
        if blocked {
            continue;
        }

        let attacked = (kf.min(ktf)..=kf.max(ktf))
            .filter_map(|f| sq(f, rank))
            .any(|s| pos.is_square_attacked(s, enemy));
        if attacked {
            continue;
        }

        let Some(king_to) = sq(ktf, rank) else {
            continue;
        };
        let mut mv = Move::new(king_from, king_to);
        mv.is_castle = true;
        mv.rook_from = Some(rook_from);
        out.push(mv);
    }
}

#[cfg(test)]
#[path = "movegen_tests.rs"]
mod movegen_tests;
