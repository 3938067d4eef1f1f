use anyhow::Result;
use arena_core::EngineIdentity;
use arena_runner::{EngineIo, InProcessLauncher, Launcher, ProcessLauncher};
use async_trait::async_trait;
use tokio::io::DuplexStream;
use uci_engine::EngineBehavior;

use crate::config::BUILTIN_COMMAND;

/// Runs engines whose command is [`BUILTIN_COMMAND`] in-process and
/// everything else as a child process.
pub struct ArenaLauncher {
    builtin: InProcessLauncher,
    process: ProcessLauncher,
}

impl ArenaLauncher {
    pub fn new() -> Self {
        let builtin = InProcessLauncher::new(|identity: &EngineIdentity, io: DuplexStream| {
            let behavior = EngineBehavior {
                name: identity.name.clone(),
                ..EngineBehavior::default()
            };
            async move {
                let (r, w) = tokio::io::split(io);
                if let Err(e) = uci_engine::serve(r, w, behavior).await {
                    tracing::debug!(error = %e, "builtin engine stopped");
                }
            }
        });
        Self {
            builtin,
            process: ProcessLauncher,
        }
    }
}

impl Default for ArenaLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Launcher for ArenaLauncher {
    async fn launch(&self, identity: &EngineIdentity) -> Result<EngineIo> {
        if identity.command == BUILTIN_COMMAND {
            self.builtin.launch(identity).await
        } else {
            self.process.launch(identity).await
        }
    }
}
