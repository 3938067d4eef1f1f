//! WebSocket bridge between display clients and UCI engines.
//!
//! - [`session`]: one actor per game, owning position, clock and engines
//! - [`orchestrator`]: duels and round robins over fresh sessions
//! - [`registry`]: live sessions and the idle reaper
//! - [`app`] and [`ws`]: the axum routes

pub mod app;
pub mod clock;
pub mod config;
pub mod error;
pub mod launcher;
pub mod mode;
pub mod orchestrator;
pub mod registry;
pub mod session;
pub mod throttle;
pub mod ws;

pub use app::{create_router, AppState};
pub use config::ServerConfig;
pub use error::SessionError;
pub use launcher::ArenaLauncher;
pub use session::{SessionContext, SessionHandle};
