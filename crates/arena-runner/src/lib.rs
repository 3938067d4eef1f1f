//! Engine Process Manager.
//!
//! Each engine instance is a tokio task that owns the process pipes and walks
//! `Uninitialized -> Idle -> Thinking -> Idle`, or into `Fatal` on timeout,
//! end of output or a protocol violation. Callers talk to it through an
//! [`EngineHandle`] and receive [`EngineEvent`]s on a channel they provide.

mod actor;
mod error;
mod launcher;

pub use actor::{
    EngineEvent, EngineEventKind, EngineHandle, EngineSettings, EngineTimeouts, SearchRequest,
};
pub use error::EngineError;
pub use launcher::{EngineIo, EngineProcess, InProcessLauncher, Launcher, ProcessLauncher};
