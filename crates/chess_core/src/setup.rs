//! Alternative start positions: Chess960 shuffles and material handicaps.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::board::{Position, Wing};
use crate::types::{coord_to_sq, file_of, Color, PieceKind};

pub const CHESS960_POSITIONS: u16 = 960;
/// Scharnagl index of the standard arrangement.
pub const STANDARD_INDEX: u16 = 518;

const KNIGHT_TABLE: [(usize, usize); 10] = [
    (0, 1),
    (0, 2),
    (0, 3),
    (0, 4),
    (1, 2),
    (1, 3),
    (1, 4),
    (2, 3),
    (2, 4),
    (3, 4),
];

/// Back rank for a Scharnagl index in `0..960`; `None` when out of range.
pub fn chess960_back_rank(index: u16) -> Option<[PieceKind; 8]> {
    if index >= CHESS960_POSITIONS {
        return None;
    }
    let mut rank: [Option<PieceKind>; 8] = [None; 8];
    let mut n = index as usize;

    // Light-squared bishop on b/d/f/h, dark-squared on a/c/e/g.
    rank[2 * (n % 4) + 1] = Some(PieceKind::Bishop);
    n /= 4;
    rank[2 * (n % 4)] = Some(PieceKind::Bishop);
    n /= 4;

    let place_nth_empty = |rank: &mut [Option<PieceKind>; 8], nth: usize, kind: PieceKind| {
        if let Some(f) = (0..8).filter(|&f| rank[f].is_none()).nth(nth) {
            rank[f] = Some(kind);
        }
    };
    place_nth_empty(&mut rank, n % 6, PieceKind::Queen);
    n /= 6;

    let (a, b) = KNIGHT_TABLE[n];
    // Place the later knight first so the earlier index is unaffected.
    place_nth_empty(&mut rank, b, PieceKind::Knight);
    place_nth_empty(&mut rank, a, PieceKind::Knight);

    // The remaining three squares take rook, king, rook in order.
    for kind in [PieceKind::Rook, PieceKind::King, PieceKind::Rook] {
        place_nth_empty(&mut rank, 0, kind);
    }

    let mut out = [PieceKind::Pawn; 8];
    for (slot, piece) in out.iter_mut().zip(rank) {
        *slot = piece?;
    }
    Some(out)
}

pub fn chess960_position(index: u16) -> Option<Position> {
    chess960_back_rank(index).map(Position::from_back_rank)
}

/// A uniformly random Chess960 start, returned with its index.
pub fn random_chess960<R: Rng + ?Sized>(rng: &mut R) -> (u16, Position) {
    let index = rng.gen_range(0..CHESS960_POSITIONS);
    let pos = chess960_position(index).unwrap_or_else(Position::startpos);
    (index, pos)
}

/// Material odds given by White.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Handicap {
    KnightB1,
    KnightG1,
    RookA1,
    RookH1,
    Queen,
    PawnF2,
}

impl Handicap {
    pub const ALL: [Handicap; 6] = [
        Handicap::KnightB1,
        Handicap::KnightG1,
        Handicap::RookA1,
        Handicap::RookH1,
        Handicap::Queen,
        Handicap::PawnF2,
    ];

    pub fn square(self) -> u8 {
        let coord = match self {
            Handicap::KnightB1 => "b1",
            Handicap::KnightG1 => "g1",
            Handicap::RookA1 => "a1",
            Handicap::RookH1 => "h1",
            Handicap::Queen => "d1",
            Handicap::PawnF2 => "f2",
        };
        coord_to_sq(coord).unwrap_or(0)
    }

    /// The standard start with the handicap piece removed. A removed rook
    /// takes its castling right with it.
    pub fn position(self) -> Position {
        let mut pos = Position::startpos();
        let square = self.square();
        pos.set_piece(square, None);
        if matches!(self, Handicap::RookA1 | Handicap::RookH1) {
            for wing in [Wing::King, Wing::Queen] {
                if pos.castling.get(Color::White, wing) == Some(file_of(square) as u8) {
                    pos.castling.set(Color::White, wing, None);
                }
            }
        }
        pos
    }
}

#[cfg(test)]
#[path = "setup_tests.rs"]
mod setup_tests;
