//! Shared domain types for the UCI arena.
//!
//! - Identifiers for sessions, engine instances and searches
//! - [`EngineIdentity`] describing a configured engine binary
//! - [`SearchInfo`] and [`Score`] parsed from `info` lines
//! - The UCI line codec ([`UciCommand`], [`UciMessage`])
//! - [`GameStatus`] and the JSON client protocol

pub mod engine;
pub mod ids;
pub mod info;
pub mod protocol;
pub mod status;
pub mod uci;

pub use engine::*;
pub use ids::*;
pub use info::*;
pub use protocol::*;
pub use status::*;
pub use uci::*;
