//! Server configuration, read from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! server with the built-in engine on `127.0.0.1:8080`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use arena_core::{EngineIdentity, TimeControl};
use arena_runner::{EngineSettings, EngineTimeouts};
use serde::{Deserialize, Serialize};
use tournament::Tiebreak;

/// Engine command that runs the bundled engine in-process.
pub const BUILTIN_COMMAND: &str = "builtin";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub engines: Vec<EngineIdentity>,
    /// Name of the engine used when a client does not pick one.
    pub default_engine: Option<String>,
    pub clock: ClockConfig,
    /// Minimum spacing of `search_info` messages per line.
    pub info_interval_ms: u64,
    pub engine: EngineConfig,
    pub session: SessionConfig,
    pub tournament: TournamentConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub tick_ms: u64,
    /// Used by matches started without a time control. Interactive games
    /// are untimed unless `new_game` names a clock.
    pub default_time_control: TimeControl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub handshake_timeout_ms: u64,
    pub ready_timeout_ms: u64,
    pub stop_timeout_ms: u64,
    pub search_grace_ms: u64,
    pub max_restarts: u32,
    /// Subtracted from the mover's clock when building `go wtime btime`.
    pub move_overhead_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub idle_timeout_secs: u64,
    pub gc_interval_secs: u64,
    /// Reissues of an engine move after a crash or an illegal answer.
    pub engine_retries: u32,
    pub analysis_multipv: u32,
    pub guess_depth: u32,
    /// Per-move budget for engines in untimed games.
    pub engine_movetime_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TournamentConfig {
    pub tiebreak: Tiebreak,
    pub max_parallel_games: usize,
    /// Games still running after this many plies are drawn.
    pub max_plies: u32,
    pub results_dir: PathBuf,
    pub duel_white_elo: Option<u32>,
    pub duel_black_elo: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_filter: "info,arena_server=debug".to_string(),
            engines: vec![EngineIdentity::new(uci_engine::ENGINE_NAME, BUILTIN_COMMAND)],
            default_engine: None,
            clock: ClockConfig::default(),
            info_interval_ms: 100,
            engine: EngineConfig::default(),
            session: SessionConfig::default(),
            tournament: TournamentConfig::default(),
        }
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            default_time_control: TimeControl::new(5 * 60_000, 0),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let t = EngineTimeouts::default();
        Self {
            handshake_timeout_ms: t.handshake.as_millis() as u64,
            ready_timeout_ms: t.ready.as_millis() as u64,
            stop_timeout_ms: t.stop.as_millis() as u64,
            search_grace_ms: t.search_grace.as_millis() as u64,
            max_restarts: EngineSettings::default().max_restarts,
            move_overhead_ms: 50,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 600,
            gc_interval_secs: 30,
            engine_retries: 1,
            analysis_multipv: 3,
            guess_depth: 8,
            engine_movetime_ms: 1000,
        }
    }
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            tiebreak: Tiebreak::HeadToHead,
            max_parallel_games: 1,
            max_plies: 400,
            results_dir: PathBuf::from("results"),
            duel_white_elo: Some(1500),
            duel_black_elo: Some(2000),
        }
    }
}

impl EngineConfig {
    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            timeouts: EngineTimeouts {
                handshake: Duration::from_millis(self.handshake_timeout_ms),
                ready: Duration::from_millis(self.ready_timeout_ms),
                stop: Duration::from_millis(self.stop_timeout_ms),
                search_grace: Duration::from_millis(self.search_grace_ms),
            },
            max_restarts: self.max_restarts,
        }
    }
}

impl ServerConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: ServerConfig = toml::from_str(text).context("parsing config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    /// `--config <path>`, then `ARENA_CONFIG`, then defaults.
    pub fn from_args(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        let mut path = None;
        while let Some(arg) = args.next() {
            if arg == "--config" {
                path = Some(args.next().context("--config needs a path")?);
            } else if let Some(p) = arg.strip_prefix("--config=") {
                path = Some(p.to_string());
            }
        }
        match path.or_else(|| std::env::var("ARENA_CONFIG").ok()) {
            Some(p) => Self::load(Path::new(&p)),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.engines.is_empty(), "at least one engine must be configured");
        if let Some(name) = &self.default_engine {
            anyhow::ensure!(
                self.find_engine(name).is_some(),
                "default_engine `{name}` is not in engines"
            );
        }
        anyhow::ensure!(self.clock.tick_ms > 0, "clock.tick_ms must be positive");
        anyhow::ensure!(self.info_interval_ms > 0, "info_interval_ms must be positive");
        anyhow::ensure!(
            self.tournament.max_parallel_games > 0,
            "tournament.max_parallel_games must be positive"
        );
        Ok(())
    }

    pub fn find_engine(&self, name: &str) -> Option<&EngineIdentity> {
        self.engines.iter().find(|e| e.name == name)
    }

    /// The configured default, or the first engine.
    pub fn default_engine(&self) -> Option<&EngineIdentity> {
        match &self.default_engine {
            Some(name) => self.find_engine(name),
            None => self.engines.first(),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.clock.tick_ms)
    }

    pub fn info_interval(&self) -> Duration {
        Duration::from_millis(self.info_interval_ms)
    }
}
