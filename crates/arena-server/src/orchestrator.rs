//! Duels and round-robin tournaments.
//!
//! Every game of a match runs in its own session with fresh engine
//! instances. The orchestrator task hands out pairings from the schedule,
//! waits for each game report, and keeps standings, Elo and the results
//! file up to date.

use std::collections::HashMap;
use std::sync::Arc;

use arena_core::{
    ClientMessage, EngineIdentity, GameSummary, NoticeLevel, ServerMessage, SessionId, Setup,
    TimeControl,
};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tournament::{
    EloTracker, Pairing, Schedule, Standings, TournamentConfig as ResultsConfig,
    TournamentResults, DEFAULT_ELO,
};
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::error::SessionError;
use crate::registry::Registry;
use crate::session::{GameReport, MatchGame, SessionContext, SessionHandle};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Duel,
    Tournament,
}

/// A fully resolved match request.
#[derive(Debug, Clone)]
pub struct MatchSpec {
    pub kind: MatchKind,
    pub name: String,
    /// Participants with unique names.
    pub engines: Vec<EngineIdentity>,
    pub schedule: Schedule,
    pub setup: Setup,
    pub clock: TimeControl,
    pub rounds: u32,
}

impl MatchSpec {
    /// Resolves a `start_duel` or `start_tournament` message against the
    /// engine catalog.
    pub fn from_message(config: &ServerConfig, msg: &ClientMessage) -> Result<Self, SessionError> {
        let lookup = |name: &str| {
            config
                .find_engine(name)
                .cloned()
                .ok_or_else(|| SessionError::UnknownEngine(name.to_string()))
        };
        let default_clock = config.clock.default_time_control;
        match msg {
            ClientMessage::StartDuel {
                white,
                black,
                games,
                white_elo,
                black_elo,
                clock,
                setup,
            } => {
                if *games == 0 {
                    return Err(SessionError::InvalidMatch("a duel needs at least one game"));
                }
                let strength = |identity: EngineIdentity, elo: Option<u32>| match elo {
                    Some(elo) => identity.limited(elo),
                    None => identity,
                };
                let mut engines = vec![
                    strength(lookup(white.as_str())?, white_elo.or(config.tournament.duel_white_elo)),
                    strength(lookup(black.as_str())?, black_elo.or(config.tournament.duel_black_elo)),
                ];
                disambiguate(&mut engines);
                let schedule = Schedule::duel(&engines[0].name, &engines[1].name, *games);
                Ok(Self {
                    kind: MatchKind::Duel,
                    name: format!("duel {} vs {}", engines[0].name, engines[1].name),
                    engines,
                    schedule,
                    setup: setup.clone(),
                    clock: clock.unwrap_or(default_clock),
                    rounds: *games,
                })
            }
            ClientMessage::StartTournament {
                engines,
                rounds,
                clock,
                setup,
            } => {
                if engines.len() < 2 {
                    return Err(SessionError::InvalidMatch("a tournament needs at least two engines"));
                }
                if *rounds == 0 {
                    return Err(SessionError::InvalidMatch("a tournament needs at least one round"));
                }
                let mut engines = engines.iter().map(|n| lookup(n.as_str())).collect::<Result<Vec<_>, _>>()?;
                disambiguate(&mut engines);
                let names: Vec<String> = engines.iter().map(|e| e.name.clone()).collect();
                Ok(Self {
                    kind: MatchKind::Tournament,
                    name: format!("round robin {}", names.join(" ")),
                    schedule: Schedule::round_robin(&names, *rounds),
                    engines,
                    setup: setup.clone(),
                    clock: clock.unwrap_or(default_clock),
                    rounds: *rounds,
                })
            }
            _ => Err(SessionError::InvalidMatch("not a match request")),
        }
    }

    fn identity(&self, name: &str) -> Option<&EngineIdentity> {
        self.engines.iter().find(|e| e.name == name)
    }
}

/// Renames repeated entries so every participant can be told apart: first by
/// rating, then by position.
fn disambiguate(engines: &mut [EngineIdentity]) {
    fn repeated(engines: &[EngineIdentity]) -> Vec<usize> {
        (0..engines.len())
            .filter(|&i| engines.iter().filter(|e| e.name == engines[i].name).count() > 1)
            .collect()
    }
    for i in repeated(engines) {
        if let Some(rating) = engines[i].rating {
            engines[i].name = format!("{} ({rating})", engines[i].name);
        }
    }
    for i in repeated(engines) {
        engines[i].name = format!("{} #{}", engines[i].name, i + 1);
    }
}

pub enum MatchEvent {
    /// A game session started; clients may follow it.
    GameStarted {
        session: SessionHandle,
        pairing: Pairing,
    },
    Message(ServerMessage),
    Finished(Box<TournamentResults>),
}

/// Cancels a running match. Dropping the handle leaves the match running.
pub struct MatchHandle {
    cancel: watch::Sender<bool>,
}

impl MatchHandle {
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_closed()
    }
}

/// Starts the match task.
pub fn start(
    ctx: SessionContext,
    registry: Arc<Registry>,
    spec: MatchSpec,
) -> (MatchHandle, mpsc::Receiver<MatchEvent>) {
    let (cancel, cancelled) = watch::channel(false);
    let (events, rx) = mpsc::channel(EVENT_BUFFER);
    let span = tracing::info_span!("match", name = %spec.name);
    let orchestrator = Orchestrator::new(ctx, registry, spec, events, cancelled);
    tokio::spawn(orchestrator.run().instrument(span));
    (MatchHandle { cancel }, rx)
}

struct Orchestrator {
    ctx: SessionContext,
    registry: Arc<Registry>,
    spec: MatchSpec,
    events: mpsc::Sender<MatchEvent>,
    cancelled: watch::Receiver<bool>,
    standings: Standings,
    elo: EloTracker,
    results: TournamentResults,
    total: u32,
    running: HashMap<SessionId, SessionHandle>,
}

type Finished = (Pairing, SessionId, Option<GameReport>);

enum Input {
    Joined(Result<Finished, tokio::task::JoinError>),
    Cancel,
    Detached,
}

impl Orchestrator {
    fn new(
        ctx: SessionContext,
        registry: Arc<Registry>,
        spec: MatchSpec,
        events: mpsc::Sender<MatchEvent>,
        cancelled: watch::Receiver<bool>,
    ) -> Self {
        let names: Vec<String> = spec.engines.iter().map(|e| e.name.clone()).collect();
        let tiebreak = ctx.config.tournament.tiebreak;
        let mut elo = EloTracker::new();
        for engine in &spec.engines {
            elo.seed(&engine.name, engine.rating.map_or(DEFAULT_ELO, f64::from));
        }
        let results = TournamentResults::new(
            &spec.name,
            names.clone(),
            ResultsConfig {
                rounds: spec.rounds,
                tiebreak,
                time_control: Some(spec.clock),
                max_plies: ctx.config.tournament.max_plies,
            },
        );
        Self {
            standings: Standings::new(&names, tiebreak),
            elo,
            results,
            total: spec.schedule.total() as u32,
            running: HashMap::new(),
            ctx,
            registry,
            spec,
            events,
            cancelled,
        }
    }

    async fn emit(&self, event: MatchEvent) {
        // A departed client does not stop the match.
        let _ = self.events.send(event).await;
    }

    async fn run(mut self) {
        tracing::info!(games = self.total, kind = ?self.spec.kind, "match started");
        let parallel = self.ctx.config.tournament.max_parallel_games.max(1);
        let mut games: JoinSet<Finished> = JoinSet::new();
        let mut cancelled = false;
        let mut detached = false;

        loop {
            while !cancelled && games.len() < parallel {
                let Some(pairing) = self.spec.schedule.next_pairing() else {
                    break;
                };
                self.launch(pairing, &mut games).await;
            }
            if games.is_empty() {
                break;
            }
            let input = tokio::select! {
                Some(joined) = games.join_next() => Input::Joined(joined),
                changed = self.cancelled.changed(), if !cancelled && !detached => match changed {
                    Ok(()) => Input::Cancel,
                    Err(_) => Input::Detached,
                },
            };
            match input {
                Input::Joined(Ok((pairing, session, report))) => {
                    self.running.remove(&session);
                    self.on_report(pairing, session, report).await;
                }
                Input::Joined(Err(e)) => tracing::error!(error = %e, "game task failed"),
                Input::Detached => detached = true,
                Input::Cancel => {
                    cancelled = true;
                    tracing::info!("match cancelled");
                    for session in self.running.values() {
                        session.abort("match cancelled").await;
                    }
                }
            }
        }

        if cancelled {
            for pairing in self.spec.schedule.pending().to_vec() {
                self.record_incomplete(&pairing);
            }
        }
        self.finish().await;
    }

    async fn launch(&mut self, pairing: Pairing, games: &mut JoinSet<Finished>) {
        let (Some(white), Some(black)) = (
            self.spec.identity(&pairing.white).cloned(),
            self.spec.identity(&pairing.black).cloned(),
        ) else {
            tracing::warn!(white = %pairing.white, black = %pairing.black, "pairing names no participant");
            self.record_incomplete(&pairing);
            return;
        };
        let game = MatchGame {
            white,
            black,
            setup: self.spec.setup.clone(),
            clock: self.spec.clock,
            max_plies: self.ctx.config.tournament.max_plies,
        };
        let (session, report) = match SessionHandle::spawn_match(self.ctx.clone(), game) {
            Ok(started) => started,
            Err(e) => {
                tracing::warn!(error = %e, "cannot start game");
                self.emit(MatchEvent::Message(ServerMessage::notice(NoticeLevel::Error, e.to_string())))
                    .await;
                self.record_incomplete(&pairing);
                return;
            }
        };
        let id = session.id();
        tracing::info!(session = %id, round = pairing.round, white = %pairing.white, black = %pairing.black, "game started");
        self.registry.insert(session.clone());
        self.running.insert(id, session.clone());
        self.emit(MatchEvent::GameStarted {
            session,
            pairing: pairing.clone(),
        })
        .await;
        games.spawn(wait_for(pairing, id, report));
    }

    async fn on_report(&mut self, pairing: Pairing, session: SessionId, report: Option<GameReport>) {
        let outcome = report.as_ref().and_then(|r| r.outcome);
        self.standings.record(&pairing.white, &pairing.black, outcome);
        if let Some(outcome) = outcome {
            self.elo.record_game(&pairing.white, &pairing.black, outcome);
        }
        let summary = GameSummary {
            round: pairing.round,
            white: pairing.white.clone(),
            black: pairing.black.clone(),
            outcome,
            session: Some(session),
            finished_at: Utc::now(),
        };
        tracing::info!(%session, result = outcome.map_or("*", |o| o.as_pgn()), "game finished");
        self.results.add_game(summary.clone());

        let failed = report.and_then(|r| r.failed_engine);
        if let Some(engine) = &failed {
            let dropped = self.spec.schedule.abort_pairing(&pairing.white, &pairing.black);
            tracing::warn!(%engine, dropped = dropped.len(), "engine failed, abandoning pairing");
            self.emit(MatchEvent::Message(ServerMessage::notice(
                NoticeLevel::Warning,
                format!(
                    "{engine} failed; {} remaining game(s) of {} vs {} abandoned",
                    dropped.len(),
                    pairing.white,
                    pairing.black
                ),
            )))
            .await;
            for p in dropped {
                self.record_incomplete(&p);
            }
        }

        self.emit(MatchEvent::Message(ServerMessage::MatchProgress {
            completed: self.results.games.len() as u32,
            total: self.total,
            last: Some(summary),
            current: self.running.keys().next().copied(),
        }))
        .await;
        self.emit(MatchEvent::Message(ServerMessage::Standings {
            rows: self.standings.rows(&self.elo),
            finished: false,
        }))
        .await;
    }

    fn record_incomplete(&mut self, pairing: &Pairing) {
        self.standings.record(&pairing.white, &pairing.black, None);
        self.results.add_game(GameSummary {
            round: pairing.round,
            white: pairing.white.clone(),
            black: pairing.black.clone(),
            outcome: None,
            session: None,
            finished_at: Utc::now(),
        });
    }

    async fn finish(mut self) {
        let rows = self.standings.rows(&self.elo);
        self.results.finish(rows.clone());
        let dir = &self.ctx.config.tournament.results_dir;
        let saved = self.results.save_in(dir).and_then(|path| {
            let ratings = dir.join(self.results.ratings_file_name());
            self.elo.save(&ratings).map(|()| (path, ratings))
        });
        match saved {
            Ok((path, ratings)) => {
                tracing::info!(path = %path.display(), ratings = %ratings.display(), "results saved")
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot save results");
                self.emit(MatchEvent::Message(ServerMessage::notice(
                    NoticeLevel::Warning,
                    format!("results not saved: {e}"),
                )))
                .await;
            }
        }
        tracing::info!(
            "match finished\n{}\n{}",
            self.results.generate_report(),
            self.elo.leaderboard_text()
        );
        self.emit(MatchEvent::Message(ServerMessage::Standings { rows, finished: true }))
            .await;
        let _ = self.events.send(MatchEvent::Finished(Box::new(self.results))).await;
    }
}

async fn wait_for(pairing: Pairing, session: SessionId, report: oneshot::Receiver<GameReport>) -> Finished {
    (pairing, session, report.await.ok())
}
