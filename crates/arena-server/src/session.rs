//! Game session actor.
//!
//! One tokio task per session owns the position history, the mode, the clock
//! and the engine slots. Clients and the orchestrator talk to it through a
//! [`SessionHandle`]; everything it has to say goes out on a broadcast hub.

use std::sync::Arc;
use std::time::Duration;

use arena_core::{
    ClientMessage, EngineIdentity, EngineSlots, GameSnapshot, GameStatus, ImportSource, InstanceId,
    ModeSpec, NoticeLevel, Outcome, SearchId, SearchLimit, ServerMessage, SessionId, Setup,
    TimeControl,
};
use arena_runner::{EngineEvent, EngineEventKind, EngineHandle, Launcher, SearchRequest};
use chess_core::{
    chess960_position, coord_to_sq, move_to_san, move_to_uci, parse_movetext, parse_uci_move,
    random_chess960, status, CastlingNotation, Color, Move, Position, Wing,
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::Instrument;

use crate::clock::Clock;
use crate::config::ServerConfig;
use crate::error::SessionError;
use crate::mode::{line_move, Guess, GuessPhase, Mode};
use crate::throttle::InfoThrottle;

const COMMAND_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 256;
const HUB_CAPACITY: usize = 512;

/// What a session needs from the server.
#[derive(Clone)]
pub struct SessionContext {
    pub config: Arc<ServerConfig>,
    pub launcher: Arc<dyn Launcher>,
}

/// A new subscription together with the state it starts from.
pub struct Attachment {
    pub snapshot: GameSnapshot,
    pub events: broadcast::Receiver<ServerMessage>,
}

/// Published after every loop turn; read by the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub status: GameStatus,
    pub clients: usize,
    pub searching: bool,
    /// The running search is an open-ended analysis nobody waits on.
    pub analyzing: bool,
    pub owned_by_match: bool,
    pub engines: Vec<InstanceId>,
    pub last_activity: Instant,
}

/// A game started by the orchestrator.
#[derive(Debug, Clone)]
pub struct MatchGame {
    pub white: EngineIdentity,
    pub black: EngineIdentity,
    pub setup: Setup,
    pub clock: TimeControl,
    pub max_plies: u32,
}

/// Sent to the orchestrator once a match game ends.
#[derive(Debug, Clone, PartialEq)]
pub struct GameReport {
    pub session: SessionId,
    pub status: GameStatus,
    pub outcome: Option<Outcome>,
    /// Name of the engine whose failure aborted the game.
    pub failed_engine: Option<String>,
    pub movetext: String,
    pub plies: usize,
}

pub enum SessionCommand {
    Client {
        msg: ClientMessage,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Attach {
        reply: oneshot::Sender<Attachment>,
    },
    Abort {
        reason: String,
    },
    Shutdown,
}

#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    commands: mpsc::Sender<SessionCommand>,
    summary: watch::Receiver<SessionSummary>,
}

impl SessionHandle {
    /// Starts an interactive session awaiting setup.
    pub fn spawn(ctx: SessionContext) -> Self {
        let (session, handle) = Session::new(ctx, Mode::Play { engine: None });
        session.start();
        handle
    }

    /// Starts a match game between two engines. The returned receiver yields
    /// the result once the game ends.
    pub fn spawn_match(
        ctx: SessionContext,
        game: MatchGame,
    ) -> Result<(Self, oneshot::Receiver<GameReport>), SessionError> {
        let (mut session, handle) = Session::new(ctx, Mode::Match);
        session.new_game(&game.setup, Some(game.clock))?;
        session.max_plies = Some(game.max_plies);
        session.install(SlotKey::White, game.white);
        session.install(SlotKey::Black, game.black);
        let (tx, rx) = oneshot::channel();
        session.report = Some(tx);
        session.start();
        Ok((handle, rx))
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn summary(&self) -> SessionSummary {
        self.summary.borrow().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Sends a client message and waits for it to be accepted or refused.
    pub async fn request(&self, msg: ClientMessage) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Client { msg, reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Subscribes to the hub. The snapshot and the subscription are taken in
    /// the same actor turn, so no event falls between them.
    pub async fn attach(&self) -> Result<Attachment, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Attach { reply })
            .await
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)
    }

    pub async fn abort(&self, reason: impl Into<String>) {
        let _ = self
            .commands
            .send(SessionCommand::Abort {
                reason: reason.into(),
            })
            .await;
    }

    pub async fn shutdown(&self) {
        let _ = self.commands.send(SessionCommand::Shutdown).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotKey {
    White,
    Black,
    Analysis,
}

impl SlotKey {
    fn for_color(c: Color) -> Self {
        match c {
            Color::White => SlotKey::White,
            Color::Black => SlotKey::Black,
        }
    }
}

struct Slot {
    identity: EngineIdentity,
    handle: EngineHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Purpose {
    Move(Color),
    Analysis,
    GuessReference,
    GuessReply,
}

impl Purpose {
    fn slot(self) -> SlotKey {
        match self {
            Purpose::Move(c) => SlotKey::for_color(c),
            Purpose::Analysis | Purpose::GuessReference | Purpose::GuessReply => SlotKey::Analysis,
        }
    }
}

struct Current {
    slot: SlotKey,
    instance: InstanceId,
    search: SearchId,
    purpose: Purpose,
    retries: u32,
    /// The engine died while this search ran.
    lost: bool,
}

enum Input {
    Command(Option<SessionCommand>),
    Engine(EngineEvent),
    ClockTick,
    InfoFlush,
}

struct Session {
    id: SessionId,
    ctx: SessionContext,
    commands: mpsc::Receiver<SessionCommand>,
    events_tx: mpsc::Sender<EngineEvent>,
    events: mpsc::Receiver<EngineEvent>,
    hub: broadcast::Sender<ServerMessage>,
    summary: watch::Sender<SessionSummary>,

    /// `positions[0]` is the start, one more entry per move.
    positions: Vec<Position>,
    moves: Vec<Move>,
    /// Imported main line, the source of guess references and replies.
    line: Vec<Move>,
    mode: Mode,
    status: GameStatus,
    clock: Option<Clock>,
    chess960: bool,
    armageddon: bool,

    white: Option<Slot>,
    black: Option<Slot>,
    analysis: Option<Slot>,
    /// Client `setoption`s, applied to every engine this session spawns.
    options: Vec<(String, Option<String>)>,
    current: Option<Current>,
    throttle: InfoThrottle,

    max_plies: Option<u32>,
    report: Option<oneshot::Sender<GameReport>>,
    failed_engine: Option<String>,
    last_activity: Instant,
}

fn now_std() -> std::time::Instant {
    Instant::now().into_std()
}

/// True when castling rights point at rooks a standard setup would not have.
fn needs_chess960(pos: &Position) -> bool {
    [Color::White, Color::Black].into_iter().any(|c| {
        let king_on_e = pos
            .king_sq(c)
            .is_some_and(|sq| chess_core::file_of(sq) == 4 && chess_core::rank_of(sq) == c.back_rank());
        [Wing::King, Wing::Queen].into_iter().any(|wing| match pos.castling.get(c, wing) {
            Some(file) => !king_on_e || !matches!((wing, file), (Wing::King, 7) | (Wing::Queen, 0)),
            None => false,
        })
    })
}

impl Session {
    fn new(ctx: SessionContext, mode: Mode) -> (Self, SessionHandle) {
        let id = SessionId::new();
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (events_tx, events) = mpsc::channel(EVENT_BUFFER);
        let (hub, _) = broadcast::channel(HUB_CAPACITY);
        let now = Instant::now();
        let (summary, summary_rx) = watch::channel(SessionSummary {
            status: GameStatus::AwaitingSetup,
            clients: 0,
            searching: false,
            analyzing: false,
            owned_by_match: false,
            engines: Vec::new(),
            last_activity: now,
        });
        let session = Self {
            id,
            ctx,
            commands: cmd_rx,
            events_tx,
            events,
            hub,
            summary,
            positions: vec![Position::startpos()],
            moves: Vec::new(),
            line: Vec::new(),
            mode,
            status: GameStatus::AwaitingSetup,
            clock: None,
            chess960: false,
            armageddon: false,
            white: None,
            black: None,
            analysis: None,
            options: Vec::new(),
            current: None,
            throttle: InfoThrottle::new(),
            max_plies: None,
            report: None,
            failed_engine: None,
            last_activity: now,
        };
        let handle = SessionHandle {
            id,
            commands: cmd_tx,
            summary: summary_rx,
        };
        (session, handle)
    }

    fn start(self) {
        let span = tracing::info_span!("session", session = %self.id);
        tokio::spawn(self.run().instrument(span));
    }

    async fn run(mut self) {
        tracing::info!(mode = ?self.mode.spec(), "session started");
        self.advance();
        self.publish_summary();

        let mut clock_tick = interval(self.ctx.config.tick_interval());
        clock_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut info_tick = interval(self.ctx.config.info_interval());
        info_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let input = tokio::select! {
                cmd = self.commands.recv() => Input::Command(cmd),
                Some(event) = self.events.recv() => Input::Engine(event),
                _ = clock_tick.tick() => Input::ClockTick,
                _ = info_tick.tick() => Input::InfoFlush,
            };
            match input {
                Input::Command(None) | Input::Command(Some(SessionCommand::Shutdown)) => break,
                Input::Command(Some(cmd)) => {
                    self.last_activity = Instant::now();
                    self.on_command(cmd);
                }
                Input::Engine(event) => self.on_engine_event(event),
                Input::ClockTick => self.on_clock_tick(),
                Input::InfoFlush => self.flush_info(),
            }
            self.publish_summary();
        }

        if self.report.is_some() {
            self.abort_game("session closed".to_string());
        }
        for slot in [self.white.take(), self.black.take(), self.analysis.take()]
            .into_iter()
            .flatten()
        {
            slot.handle.shutdown();
        }
        tracing::info!("session closed");
    }

    fn publish(&self, msg: ServerMessage) {
        // No receivers is fine.
        let _ = self.hub.send(msg);
    }

    fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        self.publish(ServerMessage::notice(level, message));
    }

    fn publish_summary(&self) {
        let engines = [&self.white, &self.black, &self.analysis]
            .into_iter()
            .flatten()
            .map(|s| s.handle.instance())
            .collect();
        self.summary.send_replace(SessionSummary {
            status: self.status.clone(),
            clients: self.hub.receiver_count(),
            searching: self.current.is_some(),
            analyzing: self
                .current
                .as_ref()
                .is_some_and(|c| c.purpose == Purpose::Analysis),
            owned_by_match: self.report.is_some(),
            engines,
            last_activity: self.last_activity,
        });
    }

    fn position(&self) -> &Position {
        // `positions` always holds the start position.
        &self.positions[self.positions.len() - 1]
    }

    fn start_position(&self) -> &Position {
        &self.positions[0]
    }

    fn notation(&self) -> CastlingNotation {
        if self.chess960 {
            CastlingNotation::KingTakesRook
        } else {
            CastlingNotation::Standard
        }
    }

    fn result_token(&self) -> &'static str {
        self.status.outcome(self.armageddon).map_or("*", Outcome::as_pgn)
    }

    fn movetext(&self) -> String {
        let result = self.status.is_terminal().then(|| self.result_token());
        chess_core::write_movetext(self.start_position(), &self.moves, result)
    }

    fn slot_name(&self, key: SlotKey) -> Option<String> {
        self.slot(key).as_ref().map(|s| s.identity.name.clone())
    }

    fn snapshot(&self) -> GameSnapshot {
        let pos = self.position();
        GameSnapshot {
            session: self.id,
            fen: pos.to_fen(),
            start_fen: self.start_position().to_fen(),
            moves: self
                .moves
                .iter()
                .map(|m| move_to_uci(m, self.notation()))
                .collect(),
            movetext: self.movetext(),
            side_to_move: pos.side_to_move,
            mode: self.mode.spec(),
            status: self.status.clone(),
            clock: self.clock.as_ref().map(Clock::snapshot),
            engines: EngineSlots {
                white: self.slot_name(SlotKey::White),
                black: self.slot_name(SlotKey::Black),
                analysis: self.slot_name(SlotKey::Analysis),
            },
            chess960: self.chess960,
            armageddon: self.armageddon,
        }
    }

    fn broadcast_snapshot(&self) {
        self.publish(ServerMessage::Snapshot(self.snapshot()));
    }

    // ---- commands ----

    fn on_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::Client { msg, reply } => {
                let result = self.on_client(msg);
                if let Err(e) = &result {
                    tracing::debug!(error = %e, "client request refused");
                }
                let _ = reply.send(result);
            }
            SessionCommand::Attach { reply } => {
                let attachment = Attachment {
                    snapshot: self.snapshot(),
                    events: self.hub.subscribe(),
                };
                let _ = reply.send(attachment);
            }
            SessionCommand::Abort { reason } => {
                if !self.status.is_terminal() {
                    self.abort_game(reason);
                }
            }
            SessionCommand::Shutdown => {}
        }
    }

    fn on_client(&mut self, msg: ClientMessage) -> Result<(), SessionError> {
        match msg {
            ClientMessage::Move {
                from,
                to,
                promotion,
            } => self.client_move(&from, &to, promotion),
            ClientMessage::SetMode { mode } => self.set_mode(mode),
            ClientMessage::SetOption { name, value } => {
                self.set_option(name, value);
                Ok(())
            }
            ClientMessage::SetEngine { color, engine, elo } => self.set_engine(color, &engine, elo),
            ClientMessage::NewGame { setup, clock } => {
                self.reject_in_match()?;
                self.new_game(&setup, clock)?;
                self.advance();
                Ok(())
            }
            ClientMessage::Import { source } => {
                self.reject_in_match()?;
                self.import(source)?;
                self.advance();
                Ok(())
            }
            ClientMessage::Stop => {
                self.reject_in_match()?;
                self.stop_search();
                Ok(())
            }
            ClientMessage::Resign => self.resign(),
            ClientMessage::StartDuel { .. } | ClientMessage::StartTournament { .. } => {
                Err(SessionError::MatchOnly)
            }
        }
    }

    fn reject_in_match(&self) -> Result<(), SessionError> {
        if self.mode == Mode::Match {
            return Err(SessionError::MatchInProgress);
        }
        Ok(())
    }

    fn ensure_playable(&self) -> Result<(), SessionError> {
        match self.status {
            GameStatus::AwaitingSetup => Err(SessionError::NotSetUp),
            ref s if s.is_terminal() => Err(SessionError::GameOver),
            _ => Ok(()),
        }
    }

    fn client_move(
        &mut self,
        from: &str,
        to: &str,
        promotion: Option<chess_core::PieceKind>,
    ) -> Result<(), SessionError> {
        self.ensure_playable()?;
        self.reject_in_match()?;
        let from_sq = coord_to_sq(from).ok_or_else(|| SessionError::InvalidSquare(from.to_string()))?;
        let to_sq = coord_to_sq(to).ok_or_else(|| SessionError::InvalidSquare(to.to_string()))?;
        let stm = self.position().side_to_move;
        if self.mode.engine_controls(stm) {
            return Err(SessionError::EngineToMove);
        }
        let mv = self.position().find_move(from_sq, to_sq, promotion)?;

        if let Mode::Guess(guess) = &mut self.mode {
            if stm != guess.side {
                return Err(SessionError::GuessNotReady);
            }
            let correct = guess.judge(&mv).ok_or(SessionError::GuessNotReady)?;
            self.publish(ServerMessage::GuessResult {
                guess: move_to_uci(&mv, self.notation()),
                correct,
            });
            if !correct {
                return Ok(());
            }
        }

        self.play(mv);
        self.advance();
        Ok(())
    }

    fn set_mode(&mut self, spec: ModeSpec) -> Result<(), SessionError> {
        self.reject_in_match()?;
        let mode = match spec {
            ModeSpec::Match => return Err(SessionError::MatchOnly),
            ModeSpec::Play { engine } => Mode::Play { engine },
            ModeSpec::Analysis => Mode::Analysis,
            ModeSpec::Guess { side } => {
                if !self.line.is_empty() {
                    self.rewind();
                }
                Mode::Guess(Guess::new(side.unwrap_or(self.position().side_to_move)))
            }
        };

        self.stop_search();
        if self.mode == Mode::Analysis && mode != Mode::Analysis {
            if let Some(slot) = &self.analysis {
                slot.handle.set_option("MultiPV", Some("1".to_string()));
            }
        }
        match &mode {
            Mode::Analysis => {
                self.ensure_slot(SlotKey::Analysis)?;
                let multipv = self.ctx.config.session.analysis_multipv.to_string();
                if let Some(slot) = &self.analysis {
                    slot.handle.set_option("MultiPV", Some(multipv));
                }
            }
            Mode::Play { engine: Some(c) } => self.ensure_slot(SlotKey::for_color(*c))?,
            _ => {}
        }
        tracing::info!(mode = ?mode.spec(), "mode changed");
        self.mode = mode;
        self.sync_clock();
        self.broadcast_snapshot();
        self.advance();
        Ok(())
    }

    fn set_option(&mut self, name: String, value: Option<String>) {
        for slot in [&self.white, &self.black, &self.analysis].into_iter().flatten() {
            slot.handle.set_option(name.clone(), value.clone());
        }
        match self.options.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.options.push((name, value)),
        }
    }

    fn set_engine(&mut self, color: Option<Color>, name: &str, elo: Option<u32>) -> Result<(), SessionError> {
        self.reject_in_match()?;
        let identity = self
            .ctx
            .config
            .find_engine(name)
            .ok_or_else(|| SessionError::UnknownEngine(name.to_string()))?;
        let identity = match elo {
            Some(elo) => identity.limited(elo),
            None => identity.clone(),
        };
        let key = color.map_or(SlotKey::Analysis, SlotKey::for_color);
        self.install(key, identity);
        if key == SlotKey::Analysis && self.mode == Mode::Analysis {
            let multipv = self.ctx.config.session.analysis_multipv.to_string();
            if let Some(slot) = &self.analysis {
                slot.handle.set_option("MultiPV", Some(multipv));
            }
        }
        self.broadcast_snapshot();
        self.advance();
        Ok(())
    }

    fn resign(&mut self) -> Result<(), SessionError> {
        if self.mode == Mode::Match {
            return Err(SessionError::ResignRejected("engines are playing"));
        }
        self.ensure_playable()?;
        let loser = self.position().side_to_move;
        self.status = GameStatus::Resigned {
            winner: loser.other(),
        };
        tracing::info!(?loser, "resigned");
        self.finish();
        Ok(())
    }

    // ---- setup ----

    fn setup_position(setup: &Setup) -> Result<(Position, bool, bool), SessionError> {
        Ok(match setup {
            Setup::Standard => (Position::startpos(), false, false),
            Setup::Chess960 { index: Some(i) } => {
                (chess960_position(*i).ok_or(SessionError::Chess960Index(*i))?, true, false)
            }
            Setup::Chess960 { index: None } => {
                let (_, pos) = random_chess960(&mut rand::thread_rng());
                (pos, true, false)
            }
            Setup::Handicap { handicap } => (handicap.position(), false, false),
            Setup::Armageddon => (Position::startpos(), false, true),
            Setup::Fen { fen } => {
                let pos = Position::from_fen(fen)?;
                let chess960 = needs_chess960(&pos);
                (pos, chess960, false)
            }
        })
    }

    fn new_game(&mut self, setup: &Setup, tc: Option<TimeControl>) -> Result<(), SessionError> {
        let (start, chess960, armageddon) = Self::setup_position(setup)?;
        let now = now_std();
        let clock = if armageddon {
            Some(Clock::armageddon(now))
        } else {
            tc.map(|tc| Clock::new(tc, now))
        };
        self.reset(start, Vec::new(), Vec::new(), chess960, clock);
        self.armageddon = armageddon;
        tracing::info!(?setup, timed = self.clock.is_some(), "new game");
        self.broadcast_snapshot();
        Ok(())
    }

    /// Validates `source` completely before touching any state.
    fn import(&mut self, source: ImportSource) -> Result<(), SessionError> {
        let (start, moves, positions) = match source {
            ImportSource::Fen { fen } => (Position::from_fen(&fen)?, Vec::new(), Vec::new()),
            ImportSource::Pgn { text } => {
                let parsed = parse_movetext(&text)?;
                (parsed.start, parsed.moves, parsed.positions)
            }
        };
        let chess960 = needs_chess960(&start);
        self.reset(start, moves.clone(), positions, chess960, None);
        self.armageddon = false;
        self.line = moves;
        if matches!(self.mode, Mode::Guess(_)) {
            self.rewind();
        }
        tracing::info!(plies = self.moves.len(), "imported game");
        self.broadcast_snapshot();
        Ok(())
    }

    fn reset(
        &mut self,
        start: Position,
        moves: Vec<Move>,
        positions: Vec<Position>,
        chess960: bool,
        clock: Option<Clock>,
    ) {
        self.stop_search();
        let was_chess960 = self.chess960;
        self.positions = std::iter::once(start).chain(positions).collect();
        self.moves = moves;
        self.line.clear();
        self.chess960 = chess960;
        self.clock = clock;
        self.status = self.board_status();
        if let Mode::Guess(guess) = &mut self.mode {
            *guess = Guess::new(guess.side);
        }
        for slot in [&self.white, &self.black, &self.analysis].into_iter().flatten() {
            if chess960 || was_chess960 {
                slot.handle
                    .set_option("UCI_Chess960", Some(chess960.to_string()));
            }
            slot.handle.new_game();
        }
        self.sync_clock();
    }

    /// Back to the start of the imported line.
    fn rewind(&mut self) {
        self.stop_search();
        self.positions.truncate(1);
        self.moves.clear();
        self.status = self.board_status();
        self.broadcast_snapshot();
    }

    fn board_status(&self) -> GameStatus {
        status(self.position(), &self.positions).into()
    }

    /// Runs the clock for the side to move in timed modes, stops it otherwise.
    fn sync_clock(&mut self) {
        let now = now_std();
        let active = self.status == GameStatus::Active && self.mode.is_timed();
        let stm = self.position().side_to_move;
        if let Some(clock) = &mut self.clock {
            if active {
                clock.start(stm, now);
            } else {
                clock.stop(now);
            }
        }
    }

    // ---- moves ----

    /// Applies a legal move, then updates status and clock.
    fn play(&mut self, mv: Move) {
        let pos = self.position().clone();
        let next = match pos.apply(mv) {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(error = %e, "refusing to apply move");
                return;
            }
        };
        let san = move_to_san(&pos, &mv);
        let by = pos.side_to_move;
        self.positions.push(next);
        self.moves.push(mv);

        let mut status = self.board_status();
        if status == GameStatus::Active {
            if let Some(limit) = self.max_plies {
                if self.moves.len() >= limit as usize {
                    status = GameStatus::Draw {
                        reason: arena_core::DrawReason::MoveLimit,
                    };
                }
            }
        }
        if self.mode.is_timed() {
            if let Some(clock) = &mut self.clock {
                if let Some(flagged) = clock.press(by, now_std(), status.is_terminal()) {
                    status = GameStatus::FlagFall {
                        winner: flagged.other(),
                    };
                }
            }
        }

        let uci = move_to_uci(&mv, self.notation());
        tracing::debug!(%uci, %san, ?by, "move applied");
        self.publish(ServerMessage::MoveApplied {
            uci,
            san,
            by,
            fen: self.position().to_fen(),
            ply: self.moves.len(),
        });
        if let Some(clock) = &self.clock {
            self.publish(ServerMessage::Clock(clock.snapshot()));
        }
        self.status = status;
        if self.status.is_terminal() {
            self.finish();
        }
    }

    /// Game over: stop everything, announce and report.
    fn finish(&mut self) {
        self.stop_search();
        if let Some(clock) = &mut self.clock {
            clock.stop(now_std());
        }
        let result = self.status.outcome(self.armageddon);
        tracing::info!(status = ?self.status, result = self.result_token(), "game over");
        self.publish(ServerMessage::GameOver {
            status: self.status.clone(),
            result,
            fen: self.position().to_fen(),
            movetext: self.movetext(),
        });
        if let Some(report) = self.report.take() {
            let _ = report.send(GameReport {
                session: self.id,
                status: self.status.clone(),
                outcome: result,
                failed_engine: self.failed_engine.clone(),
                movetext: self.movetext(),
                plies: self.moves.len(),
            });
        }
    }

    fn abort_game(&mut self, reason: String) {
        tracing::warn!(%reason, "game aborted");
        self.status = GameStatus::Aborted { reason };
        self.finish();
    }

    /// Starts whatever the mode needs next. Imported replies are played on the
    /// spot, so this loops until it has to wait for someone.
    fn advance(&mut self) {
        while self.status == GameStatus::Active {
            let stm = self.position().side_to_move;
            let next = line_move(&self.line, self.moves.len());
            let depth = SearchLimit::Depth {
                depth: self.ctx.config.session.guess_depth,
            };
            let result = match self.mode.clone() {
                Mode::Play { .. } | Mode::Match => {
                    if self.mode.engine_controls(stm) {
                        self.start_move_search(stm)
                    } else {
                        Ok(())
                    }
                }
                Mode::Analysis => self.start_search(Purpose::Analysis, SearchLimit::Infinite),
                Mode::Guess(guess) if guess.side == stm => match next {
                    Some(reference) => {
                        self.set_guess_phase(GuessPhase::Ready { reference });
                        Ok(())
                    }
                    None => {
                        self.set_guess_phase(GuessPhase::AwaitingReference);
                        self.start_search(Purpose::GuessReference, depth)
                    }
                },
                Mode::Guess(_) => {
                    self.set_guess_phase(GuessPhase::AwaitingReply);
                    match next {
                        Some(reply) => {
                            self.play(reply);
                            continue;
                        }
                        None => self.start_search(Purpose::GuessReply, depth),
                    }
                }
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, "cannot start engine");
                self.notice(NoticeLevel::Error, e.to_string());
                if self.mode.engine_controls(stm) {
                    self.abort_game(e.to_string());
                }
            }
            break;
        }
    }

    fn set_guess_phase(&mut self, phase: GuessPhase) {
        if let Mode::Guess(guess) = &mut self.mode {
            guess.phase = phase;
        }
    }

    // ---- engines ----

    fn slot(&self, key: SlotKey) -> &Option<Slot> {
        match key {
            SlotKey::White => &self.white,
            SlotKey::Black => &self.black,
            SlotKey::Analysis => &self.analysis,
        }
    }

    fn slot_mut(&mut self, key: SlotKey) -> &mut Option<Slot> {
        match key {
            SlotKey::White => &mut self.white,
            SlotKey::Black => &mut self.black,
            SlotKey::Analysis => &mut self.analysis,
        }
    }

    fn slot_of(&self, instance: InstanceId) -> Option<SlotKey> {
        [SlotKey::White, SlotKey::Black, SlotKey::Analysis]
            .into_iter()
            .find(|k| self.slot(*k).as_ref().is_some_and(|s| s.handle.instance() == instance))
    }

    fn install(&mut self, key: SlotKey, identity: EngineIdentity) {
        let handle = EngineHandle::spawn(
            identity.clone(),
            self.ctx.launcher.clone(),
            self.ctx.config.engine.settings(),
            self.events_tx.clone(),
        );
        if self.chess960 {
            handle.set_option("UCI_Chess960", Some("true".to_string()));
        }
        for (name, value) in &self.options {
            handle.set_option(name.clone(), value.clone());
        }
        tracing::info!(engine = %identity.name, instance = %handle.instance(), slot = ?key, "engine attached");
        if self.current.as_ref().is_some_and(|c| c.slot == key) {
            self.current = None;
            self.throttle.reset(None);
        }
        if let Some(old) = self.slot_mut(key).replace(Slot { identity, handle }) {
            old.handle.shutdown();
        }
    }

    fn ensure_slot(&mut self, key: SlotKey) -> Result<(), SessionError> {
        if self.slot(key).is_none() {
            let identity = self
                .ctx
                .config
                .default_engine()
                .cloned()
                .ok_or(SessionError::NoEngine)?;
            self.install(key, identity);
        }
        Ok(())
    }

    fn search_request(&self, limit: SearchLimit) -> SearchRequest {
        let start = self.start_position();
        SearchRequest {
            start_fen: (*start != Position::startpos()).then(|| start.to_fen()),
            moves: self
                .moves
                .iter()
                .map(|m| move_to_uci(m, self.notation()))
                .collect(),
            side_to_move: self.position().side_to_move,
            limit,
        }
    }

    /// Live clocks minus the move overhead in timed games, otherwise the node
    /// budget of a strength-limited engine or the configured movetime.
    fn move_limit(&mut self, side: Color) -> SearchLimit {
        if self.mode.is_timed() {
            if let Some(clock) = &mut self.clock {
                clock.tick(now_std());
                let overhead = Duration::from_millis(self.ctx.config.engine.move_overhead_ms);
                let budget = |c: Color| clock.remaining(c).saturating_sub(overhead).as_millis().max(1) as u64;
                return SearchLimit::Clock {
                    wtime: budget(Color::White),
                    btime: budget(Color::Black),
                    winc: clock.increment(Color::White).as_millis() as u64,
                    binc: clock.increment(Color::Black).as_millis() as u64,
                };
            }
        }
        let nodes = self
            .slot(SlotKey::for_color(side))
            .as_ref()
            .and_then(|s| s.identity.node_budget());
        match nodes {
            Some(nodes) => SearchLimit::Nodes { nodes },
            None => SearchLimit::MoveTime {
                ms: self.ctx.config.session.engine_movetime_ms,
            },
        }
    }

    fn start_move_search(&mut self, side: Color) -> Result<(), SessionError> {
        self.ensure_slot(SlotKey::for_color(side))?;
        let limit = self.move_limit(side);
        self.start_search(Purpose::Move(side), limit)
    }

    fn start_search(&mut self, purpose: Purpose, limit: SearchLimit) -> Result<(), SessionError> {
        let key = purpose.slot();
        self.ensure_slot(key)?;
        if self.current.as_ref().is_some_and(|c| c.slot != key) {
            self.stop_search();
        }
        let request = self.search_request(limit);
        let slot = self.slot(key).as_ref().ok_or(SessionError::NoEngine)?;
        let search = slot.handle.search(request);
        let instance = slot.handle.instance();
        tracing::debug!(engine = %slot.identity.name, %search, %limit, ?purpose, "search started");
        self.current = Some(Current {
            slot: key,
            instance,
            search,
            purpose,
            retries: 0,
            lost: false,
        });
        self.throttle.reset(Some(search));
        Ok(())
    }

    fn stop_search(&mut self) {
        if let Some(current) = self.current.take() {
            if let Some(slot) = self.slot(current.slot) {
                slot.handle.stop();
            }
        }
        self.throttle.reset(None);
    }

    /// Reissues the current search after a failure, within `engine_retries`.
    fn retry(&mut self, why: &str) {
        let Some(current) = self.current.take() else {
            return;
        };
        self.throttle.reset(None);
        let allowed = match current.purpose {
            Purpose::Analysis => true,
            _ => current.retries < self.ctx.config.session.engine_retries,
        };
        let name = self.slot_name(current.slot).unwrap_or_default();
        if !allowed {
            let reason = format!("{name}: {why}");
            match current.purpose {
                Purpose::Move(_) => {
                    self.failed_engine = Some(name);
                    self.abort_game(reason);
                }
                _ => self.notice(NoticeLevel::Error, reason),
            }
            return;
        }
        tracing::info!(engine = %name, why, retry = current.retries + 1, "reissuing search");
        let limit = match current.purpose {
            Purpose::Move(side) => self.move_limit(side),
            Purpose::Analysis => SearchLimit::Infinite,
            Purpose::GuessReference | Purpose::GuessReply => SearchLimit::Depth {
                depth: self.ctx.config.session.guess_depth,
            },
        };
        if let Err(e) = self.start_search(current.purpose, limit) {
            self.notice(NoticeLevel::Error, e.to_string());
            return;
        }
        if let Some(reissued) = &mut self.current {
            reissued.retries = current.retries + 1;
        }
    }

    fn is_current(&self, instance: InstanceId, search: SearchId) -> bool {
        self.current
            .as_ref()
            .is_some_and(|c| c.instance == instance && c.search == search)
    }

    fn on_engine_event(&mut self, event: EngineEvent) {
        let EngineEvent { instance, kind } = event;
        let Some(key) = self.slot_of(instance) else {
            tracing::trace!(%instance, "event from a detached engine");
            return;
        };
        match kind {
            EngineEventKind::Ready { name } => {
                tracing::debug!(%instance, id_name = ?name, "engine ready");
            }
            EngineEventKind::Info { search, info } => {
                if self.is_current(instance, search) {
                    self.throttle.offer(search, info);
                }
            }
            EngineEventKind::BestMove {
                search,
                best,
                ponder,
            } => {
                if self.is_current(instance, search) {
                    self.on_best_move(search, best, ponder);
                }
            }
            EngineEventKind::Fatal { search, pending, error } => {
                let name = self.slot_name(key).unwrap_or_default();
                self.notice(NoticeLevel::Warning, format!("engine {name} failed: {error}"));
                // A restarted process answers nothing issued before it died.
                if let Some(current) = &mut self.current {
                    if current.instance == instance {
                        tracing::debug!(search = %current.search, ?search, ?pending, "search lost with the engine");
                        current.lost = true;
                        self.throttle.reset(None);
                    }
                }
            }
            EngineEventKind::Restarted { attempt } => {
                tracing::info!(%instance, attempt, "engine back after restart");
                if self.current.as_ref().is_some_and(|c| c.instance == instance && c.lost) {
                    self.retry("engine crashed");
                }
            }
            EngineEventKind::Failed { error } => {
                let name = self.slot_name(key).unwrap_or_default();
                self.notice(NoticeLevel::Error, format!("engine {name} is gone: {error}"));
                let was_current = self.current.as_ref().is_some_and(|c| c.instance == instance);
                if was_current {
                    self.current = None;
                    self.throttle.reset(None);
                }
                *self.slot_mut(key) = None;
                let controls = match key {
                    SlotKey::White => self.mode.engine_controls(Color::White),
                    SlotKey::Black => self.mode.engine_controls(Color::Black),
                    SlotKey::Analysis => false,
                };
                if controls && !self.status.is_terminal() {
                    self.failed_engine = Some(name.clone());
                    self.abort_game(format!("engine {name} failed: {error}"));
                } else {
                    self.broadcast_snapshot();
                }
            }
        }
    }

    fn on_best_move(&mut self, search: SearchId, best: Option<String>, ponder: Option<String>) {
        let Some(purpose) = self.current.as_ref().map(|c| c.purpose) else {
            return;
        };
        // The last info lines of a finished search still go out.
        self.flush_info();
        let parsed = best.as_deref().and_then(|b| parse_uci_move(self.position(), b));
        let Some(mv) = parsed else {
            if purpose == Purpose::Analysis {
                self.current = None;
                return;
            }
            tracing::warn!(best = ?best, "engine answered with an illegal move");
            self.retry("illegal best move");
            return;
        };
        self.current = None;
        self.throttle.reset(None);
        self.publish(ServerMessage::BestMove {
            search,
            uci: move_to_uci(&mv, self.notation()),
            ponder,
        });

        match purpose {
            Purpose::Move(side) => {
                if self.status != GameStatus::Active || self.position().side_to_move != side {
                    return;
                }
                self.play(mv);
                self.advance();
            }
            Purpose::Analysis => {}
            Purpose::GuessReference => {
                if let Mode::Guess(guess) = &mut self.mode {
                    guess.phase = GuessPhase::Ready { reference: mv };
                }
            }
            Purpose::GuessReply => {
                self.play(mv);
                self.advance();
            }
        }
    }

    fn on_clock_tick(&mut self) {
        if self.status != GameStatus::Active || !self.mode.is_timed() {
            return;
        }
        let Some(clock) = &mut self.clock else {
            return;
        };
        if clock.running().is_none() && clock.flagged().is_none() {
            return;
        }
        let flagged = clock.tick(now_std());
        let snapshot = clock.snapshot();
        self.publish(ServerMessage::Clock(snapshot));
        if let Some(side) = flagged {
            tracing::info!(?side, "flag fell");
            self.status = GameStatus::FlagFall {
                winner: side.other(),
            };
            self.finish();
        }
    }

    fn flush_info(&mut self) {
        if let Some((search, lines)) = self.throttle.flush() {
            for info in lines {
                self.publish(ServerMessage::SearchInfo { search, info });
            }
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
