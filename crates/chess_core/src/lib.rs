//! Chess rules for the arena bridge.
//!
//! Positions are immutable values: [`Position::apply`] returns the successor
//! and never touches `self`. Castling rights are tracked by rook start file,
//! so standard chess and Chess960 share one move generator.

pub mod board;
pub mod error;
pub mod movegen;
pub mod pgn;
pub mod san;
pub mod setup;
pub mod status;
pub mod types;
pub mod uci;
pub mod zobrist;

pub use board::*;
pub use error::*;
pub use movegen::*;
pub use pgn::*;
pub use san::*;
pub use setup::*;
pub use status::*;
pub use types::*;
pub use uci::*;
pub use zobrist::ZOBRIST;
