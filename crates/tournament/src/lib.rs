//! Tournament bookkeeping for engine matches.
//!
//! This crate provides:
//! - An explicit [`Schedule`] of pending pairings (duels and round robins)
//! - [`Standings`] with configurable tiebreaks
//! - Elo rating tracking per game
//! - A results file with a plain-text report
//!
//! Nothing here runs games; the server's orchestrator feeds finished results in.

mod elo;
mod results;
mod schedule;
mod standings;

pub use elo::*;
pub use results::*;
pub use schedule::*;
pub use standings::*;
