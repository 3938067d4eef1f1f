use thiserror::Error;

/// Why an engine instance went `Fatal`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("failed to launch engine: {0}")]
    Launch(String),
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("engine closed its output")]
    Closed,
    #[error("engine i/o failed: {0}")]
    Io(String),
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e.to_string())
    }
}
