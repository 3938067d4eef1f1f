//! Zobrist keys for repetition detection.
//!
//! A position key XORs together one value per piece on its square, one for
//! black to move, one per castling right still held, and one for the
//! en-passant file. The en-passant file only counts when a pawn of the side to
//! move stands next to the double-stepped pawn, so positions that differ only
//! in an unusable capture right share a key.

use crate::board::{Position, Wing};
use crate::types::{file_of, rank_of, sq, Color, Piece, PieceKind};

pub struct ZobristKeys {
    /// Indexed by [color][piece_kind][square]
    pub pieces: [[[u64; 64]; 6]; 2],
    pub side_to_move: u64,
    /// Indexed by [color * 2 + wing]
    pub castling: [u64; 4],
    pub en_passant: [u64; 8],
}

impl ZobristKeys {
    /// Fixed-seed xorshift64 so keys are identical across runs.
    pub const fn new() -> Self {
        const fn next(mut state: u64) -> u64 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        }

        let mut state = 0x9E37_79B9_7F4A_7C15u64;
        let mut pieces = [[[0u64; 64]; 6]; 2];
        let mut i = 0;
        while i < 2 * 6 * 64 {
            state = next(state);
            pieces[i / 384][(i / 64) % 6][i % 64] = state;
            i += 1;
        }

        state = next(state);
        let side_to_move = state;

        let mut castling = [0u64; 4];
        let mut c = 0;
        while c < 4 {
            state = next(state);
            castling[c] = state;
            c += 1;
        }

        let mut en_passant = [0u64; 8];
        let mut f = 0;
        while f < 8 {
            state = next(state);
            en_passant[f] = state;
            f += 1;
        }

        ZobristKeys {
            pieces,
            side_to_move,
            castling,
            en_passant,
        }
    }

    #[inline(always)]
    pub fn piece_key(&self, piece: Piece, sq: u8) -> u64 {
        self.pieces[piece.color.idx()][piece.kind.idx()][sq as usize]
    }
}

impl Default for ZobristKeys {
    fn default() -> Self {
        Self::new()
    }
}

pub static ZOBRIST: ZobristKeys = ZobristKeys::new();

impl Position {
    pub fn zobrist_key(&self) -> u64 {
        let mut key = 0u64;
        for (s, pc) in self.board.iter().enumerate() {
            if let Some(pc) = pc {
                key ^= ZOBRIST.piece_key(*pc, s as u8);
            }
        }
        if self.side_to_move == Color::Black {
            key ^= ZOBRIST.side_to_move;
        }
        for c in [Color::White, Color::Black] {
            for wing in [Wing::King, Wing::Queen] {
                if self.castling.get(c, wing).is_some() {
                    key ^= ZOBRIST.castling[c.idx() * 2 + wing.idx()];
                }
            }
        }
        if let Some(ep) = self.en_passant {
            if self.en_passant_capturable(ep) {
                key ^= ZOBRIST.en_passant[file_of(ep) as usize];
            }
        }
        key
    }

    fn en_passant_capturable(&self, ep: u8) -> bool {
        let us = self.side_to_move;
        // Our pawns that could capture sit one rank behind the target square.
        let rank = rank_of(ep) - us.pawn_dir();
        [-1, 1].iter().any(|df| {
            sq(file_of(ep) + df, rank)
                .and_then(|s| self.piece_at(s))
                .is_some_and(|pc| pc == Piece::new(us, PieceKind::Pawn))
        })
    }
}

#[cfg(test)]
#[path = "zobrist_tests.rs"]
mod zobrist_tests;
