use thiserror::Error;

use crate::types::PieceKind;

/// Reasons a FEN string is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FenError {
    #[error("expected at least 4 fields, found {0}")]
    MissingFields(usize),
    #[error("invalid board layout: {0}")]
    Board(String),
    #[error("invalid side to move `{0}`")]
    SideToMove(String),
    #[error("invalid castling field `{0}`")]
    Castling(String),
    #[error("invalid en-passant square `{0}`")]
    EnPassant(String),
    #[error("invalid move counter `{0}`")]
    Counter(String),
    #[error("each side needs exactly one king")]
    Kings,
    #[error("pawn on the first or last rank")]
    PawnOnBackRank,
    #[error("the side not to move is in check")]
    OpponentInCheck,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IllegalMoveError {
    #[error("no piece of the side to move on {0}")]
    NoPiece(String),
    #[error("{0} is not a legal move")]
    NotLegal(String),
    #[error("cannot promote to {0:?}")]
    InvalidPromotion(PieceKind),
    #[error("cannot parse move `{0}`")]
    Unparsable(String),
}

/// Movetext import failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PgnError {
    #[error(transparent)]
    Fen(#[from] FenError),
    #[error("illegal or unknown move `{token}` at ply {ply}")]
    Move { ply: usize, token: String },
    #[error("unbalanced comment or variation")]
    Unbalanced,
}
