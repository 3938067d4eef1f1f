use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use arena_core::{ClientMessage, EngineIdentity, Outcome, ServerMessage, Setup, TimeControl};
use arena_runner::{EngineIo, InProcessLauncher, Launcher};
use arena_server::orchestrator::{self, MatchEvent, MatchSpec};
use arena_server::registry::Registry;
use arena_server::{ArenaLauncher, ServerConfig, SessionContext};
use async_trait::async_trait;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;
use tournament::{EloTracker, TournamentResults};
use uci_engine::EngineBehavior;

/// Refuses to start engines named `broken`, runs `sleepy*` engines that never
/// answer `go`, and everything else built in.
struct FlakyLauncher {
    inner: ArenaLauncher,
    sleepy: InProcessLauncher,
}

impl FlakyLauncher {
    fn new() -> Self {
        let sleepy = InProcessLauncher::new(|_: &EngineIdentity, io: DuplexStream| {
            let behavior = EngineBehavior {
                hang_on_go: true,
                ..EngineBehavior::default()
            };
            async move {
                let (r, w) = tokio::io::split(io);
                let _ = uci_engine::serve(r, w, behavior).await;
            }
        });
        Self {
            inner: ArenaLauncher::new(),
            sleepy,
        }
    }
}

#[async_trait]
impl Launcher for FlakyLauncher {
    async fn launch(&self, identity: &EngineIdentity) -> Result<EngineIo> {
        if identity.name.starts_with("broken") {
            bail!("no such binary");
        }
        if identity.name.starts_with("sleepy") {
            return self.sleepy.launch(identity).await;
        }
        self.inner.launch(identity).await
    }
}

fn results_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("arena-{name}-{}", std::process::id()))
}

fn context(name: &str) -> SessionContext {
    let mut config = ServerConfig::default();
    config.engines = ["alpha", "beta", "broken", "sleepy-a", "sleepy-b"]
        .into_iter()
        .map(|n| EngineIdentity::new(n, "builtin"))
        .collect();
    config.engine.handshake_timeout_ms = 500;
    config.engine.ready_timeout_ms = 300;
    config.engine.max_restarts = 1;
    config.tournament.max_plies = 8;
    config.tournament.results_dir = results_dir(name);
    SessionContext {
        config: Arc::new(config),
        launcher: Arc::new(FlakyLauncher::new()),
    }
}

fn duel(white: &str, black: &str, games: u32) -> ClientMessage {
    ClientMessage::StartDuel {
        white: white.to_string(),
        black: black.to_string(),
        games,
        white_elo: None,
        black_elo: None,
        clock: Some(TimeControl::new(60_000, 0)),
        setup: Setup::Standard,
    }
}

/// Collects events until the match finishes.
async fn run_to_end(mut rx: mpsc::Receiver<MatchEvent>) -> (Vec<ServerMessage>, usize, TournamentResults) {
    let mut messages = Vec::new();
    let mut started = 0;
    let wait = async {
        while let Some(event) = rx.recv().await {
            match event {
                MatchEvent::GameStarted { .. } => started += 1,
                MatchEvent::Message(msg) => messages.push(msg),
                MatchEvent::Finished(results) => return *results,
            }
        }
        panic!("match ended without results");
    };
    let results = tokio::time::timeout(Duration::from_secs(20), wait).await.unwrap();
    (messages, started, results)
}

#[tokio::test]
async fn test_duel_plays_every_game_and_saves() {
    let ctx = context("duel");
    let spec = MatchSpec::from_message(&ctx.config, &duel("alpha", "beta", 2)).unwrap();
    let registry = Arc::new(Registry::new());
    let (_handle, rx) = orchestrator::start(ctx.clone(), registry.clone(), spec);
    let (messages, started, results) = run_to_end(rx).await;

    assert_eq!(started, 2);
    assert_eq!(registry.len(), 2);
    assert_eq!(results.games.len(), 2);
    assert!(results.games.iter().all(|g| g.outcome == Some(Outcome::Draw)));
    assert_eq!((results.games[0].white.as_str(), results.games[1].white.as_str()), ("alpha", "beta"));
    assert!(results.finished_at.is_some());

    let final_rows = messages
        .iter()
        .find_map(|m| match m {
            ServerMessage::Standings { rows, finished: true } => Some(rows.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(final_rows.len(), 2);
    assert!(final_rows.iter().all(|r| r.score == 1.0 && r.draws == 2));

    let progress: Vec<(u32, u32)> = messages
        .iter()
        .filter_map(|m| match m {
            ServerMessage::MatchProgress { completed, total, .. } => Some((*completed, *total)),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![(1, 2), (2, 2)]);

    let saved = ctx.config.tournament.results_dir.join(results.file_name());
    let loaded = TournamentResults::load(&saved).unwrap();
    assert_eq!(loaded.games.len(), 2);

    let ratings = EloTracker::load(&ctx.config.tournament.results_dir.join(results.ratings_file_name())).unwrap();
    assert_eq!(ratings.history.len(), 2);
    assert_eq!(ratings.games_played["alpha"], 2);
    // The weaker side gains from drawing the stronger one.
    assert!(ratings.rating("alpha") > 1500.0);
    assert!(ratings.rating("beta") < 2000.0);
    let _ = std::fs::remove_dir_all(&ctx.config.tournament.results_dir);
}

#[tokio::test]
async fn test_failed_engine_abandons_pairing() {
    let ctx = context("failed");
    let spec = MatchSpec::from_message(&ctx.config, &duel("broken", "alpha", 3)).unwrap();
    let (_handle, rx) = orchestrator::start(ctx.clone(), Arc::new(Registry::new()), spec);
    let (messages, started, results) = run_to_end(rx).await;

    assert_eq!(started, 1);
    assert_eq!(results.games.len(), 3);
    assert!(results.games.iter().all(|g| g.outcome.is_none()));
    assert_eq!(results.matches()[0].incomplete, 3);
    assert!(messages
        .iter()
        .any(|m| matches!(m, ServerMessage::Notice { message, .. } if message.contains("abandoned"))));
    let _ = std::fs::remove_dir_all(&ctx.config.tournament.results_dir);
}

#[tokio::test]
async fn test_cancel_records_remaining_games() {
    let ctx = context("cancel");
    let msg = ClientMessage::StartTournament {
        engines: vec!["sleepy-a".to_string(), "sleepy-b".to_string()],
        rounds: 4,
        clock: Some(TimeControl::new(60_000, 0)),
        setup: Setup::Standard,
    };
    let spec = MatchSpec::from_message(&ctx.config, &msg).unwrap();
    let (handle, mut rx) = orchestrator::start(ctx.clone(), Arc::new(Registry::new()), spec);

    match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap() {
        Some(MatchEvent::GameStarted { .. }) => handle.cancel(),
        _ => panic!("expected the first game to start"),
    }
    let (_, started, results) = run_to_end(rx).await;

    assert_eq!(started, 0);
    assert_eq!(results.games.len(), 4);
    assert!(results.games[0].session.is_some());
    assert!(results.games[1..].iter().all(|g| g.outcome.is_none() && g.session.is_none()));
    let _ = std::fs::remove_dir_all(&ctx.config.tournament.results_dir);
}
