use chess_core::{FenError, IllegalMoveError, PgnError};
use thiserror::Error;

/// Why a client request was refused. Nothing in the session changes when one
/// of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    IllegalMove(#[from] IllegalMoveError),
    #[error("invalid square `{0}`")]
    InvalidSquare(String),
    #[error("invalid FEN: {0}")]
    Fen(#[from] FenError),
    #[error("invalid movetext: {0}")]
    Pgn(#[from] PgnError),
    #[error("no game has been set up")]
    NotSetUp,
    #[error("the game is over")]
    GameOver,
    #[error("it is the engine's turn")]
    EngineToMove,
    #[error("moves are made by the engines in a match")]
    MatchInProgress,
    #[error("match mode is entered by starting a duel or tournament")]
    MatchOnly,
    #[error("the reference move is not ready yet")]
    GuessNotReady,
    #[error("unknown engine `{0}`")]
    UnknownEngine(String),
    #[error("no engine is configured")]
    NoEngine,
    #[error("invalid match: {0}")]
    InvalidMatch(&'static str),
    #[error("unknown Chess960 index {0}")]
    Chess960Index(u16),
    #[error("cannot resign: {0}")]
    ResignRejected(&'static str),
    #[error("session is closed")]
    Closed,
}
