//! Terminal-state detection over a position and the game history leading to it.

use serde::{Deserialize, Serialize};

use crate::board::Position;
use crate::types::{is_dark, Color, PieceKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawReason {
    FiftyMove,
    ThreefoldRepetition,
    InsufficientMaterial,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoardStatus {
    Ongoing,
    Checkmate { winner: Color },
    Stalemate,
    Draw(DrawReason),
}

impl BoardStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BoardStatus::Ongoing)
    }
}

/// Status of `pos`, where `history` holds every earlier position of the game
/// (it may or may not include `pos` itself as its last element).
///
/// Mate and stalemate take precedence over the draw rules.
pub fn status(pos: &Position, history: &[Position]) -> BoardStatus {
    if pos.legal_moves().is_empty() {
        return if pos.in_check(pos.side_to_move) {
            BoardStatus::Checkmate {
                winner: pos.side_to_move.other(),
            }
        } else {
            BoardStatus::Stalemate
        };
    }
    if pos.is_insufficient_material() {
        return BoardStatus::Draw(DrawReason::InsufficientMaterial);
    }
    if is_threefold(pos, history) {
        return BoardStatus::Draw(DrawReason::ThreefoldRepetition);
    }
    if pos.is_fifty_move_draw() {
        return BoardStatus::Draw(DrawReason::FiftyMove);
    }
    BoardStatus::Ongoing
}

fn is_threefold(pos: &Position, history: &[Position]) -> bool {
    let key = pos.zobrist_key();
    let earlier = match history.last() {
        Some(last) if last == pos => &history[..history.len() - 1],
        _ => history,
    };
    let seen = earlier.iter().filter(|p| p.zobrist_key() == key).count();
    seen + 1 >= 3
}

impl Position {
    pub fn is_fifty_move_draw(&self) -> bool {
        self.halfmove_clock >= 100
    }

    /// K v K, K+minor v K, and bishops-only endings with every bishop on one square color.
    pub fn is_insufficient_material(&self) -> bool {
        let mut minors = 0;
        let mut knights = 0;
        let mut bishop_colors = [false; 2];
        for (s, pc) in self.board.iter().enumerate() {
            let Some(pc) = pc else { continue };
            match pc.kind {
                PieceKind::King => {}
                PieceKind::Pawn | PieceKind::Rook | PieceKind::Queen => return false,
                PieceKind::Knight => {
                    minors += 1;
                    knights += 1;
                }
                PieceKind::Bishop => {
                    minors += 1;
                    bishop_colors[is_dark(s as u8) as usize] = true;
                }
            }
        }
        if minors <= 1 {
            return true;
        }
        knights == 0 && !(bishop_colors[0] && bishop_colors[1])
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
