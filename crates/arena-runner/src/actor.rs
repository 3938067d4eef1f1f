use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arena_core::{
    EngineIdentity, InstanceId, SearchId, SearchInfo, SearchLimit, UciCommand, UciMessage,
};
use chess_core::Color;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::Instrument;

use crate::error::EngineError;
use crate::launcher::{EngineIo, EngineProcess, Launcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTimeouts {
    /// `uci` until `uciok`.
    pub handshake: Duration,
    /// `isready` until `readyok`.
    pub ready: Duration,
    /// `stop` until `bestmove`.
    pub stop: Duration,
    /// Added on top of movetime and clock budgets.
    pub search_grace: Duration,
}

impl Default for EngineTimeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(10),
            ready: Duration::from_secs(5),
            stop: Duration::from_secs(3),
            search_grace: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub timeouts: EngineTimeouts,
    /// Consecutive respawn attempts after a fatal error.
    pub max_restarts: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timeouts: EngineTimeouts::default(),
            max_restarts: 2,
        }
    }
}

/// A position to search and how long for.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// `None` for the standard start position.
    pub start_fen: Option<String>,
    pub moves: Vec<String>,
    pub side_to_move: Color,
    pub limit: SearchLimit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub instance: InstanceId,
    pub kind: EngineEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEventKind {
    Ready {
        name: Option<String>,
    },
    Info {
        search: SearchId,
        info: SearchInfo,
    },
    BestMove {
        search: SearchId,
        best: Option<String>,
        ponder: Option<String>,
    },
    /// The process was killed. `search` was running and `pending` was queued
    /// behind it; neither will be answered.
    Fatal {
        search: Option<SearchId>,
        pending: Option<SearchId>,
        error: EngineError,
    },
    Restarted {
        attempt: u32,
    },
    /// Every restart attempt failed; the instance is gone.
    Failed {
        error: EngineError,
    },
}

enum Command {
    Search { id: SearchId, request: SearchRequest },
    Stop,
    NewGame,
    SetOption { name: String, value: Option<String> },
    Shutdown,
}

/// Cheap handle to a running engine instance. Dropping every clone shuts it down.
#[derive(Clone)]
pub struct EngineHandle {
    instance: InstanceId,
    name: Arc<str>,
    commands: mpsc::UnboundedSender<Command>,
    next_search: Arc<AtomicU64>,
}

impl EngineHandle {
    /// Launches `identity` and starts its actor task. Events for this
    /// instance are delivered on `events`.
    pub fn spawn(
        identity: EngineIdentity,
        launcher: Arc<dyn Launcher>,
        settings: EngineSettings,
        events: mpsc::Sender<EngineEvent>,
    ) -> Self {
        let instance = InstanceId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let name: Arc<str> = Arc::from(identity.name.as_str());
        let span = tracing::info_span!("engine", engine = %identity.name, instance = %instance);
        let options = identity
            .uci_options()
            .into_iter()
            .map(|(n, v)| (n, Some(v)))
            .collect();
        let actor = Actor {
            instance,
            identity,
            launcher,
            settings,
            events,
            commands: rx,
            options,
            state: State::Idle,
            pending: None,
            deferred: Vec::new(),
        };
        tokio::spawn(actor.run().instrument(span));
        Self {
            instance,
            name,
            commands: tx,
            next_search: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn instance(&self) -> InstanceId {
        self.instance
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues a search and returns its id. A running search is stopped first.
    pub fn search(&self, request: SearchRequest) -> SearchId {
        let id = SearchId(self.next_search.fetch_add(1, Ordering::Relaxed) + 1);
        self.send(Command::Search { id, request });
        id
    }

    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    pub fn new_game(&self) {
        self.send(Command::NewGame);
    }

    /// Sets an option now and on every respawn.
    pub fn set_option(&self, name: impl Into<String>, value: Option<String>) {
        self.send(Command::SetOption {
            name: name.into(),
            value,
        });
    }

    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    pub fn is_alive(&self) -> bool {
        !self.commands.is_closed()
    }

    fn send(&self, cmd: Command) {
        if self.commands.send(cmd).is_err() {
            tracing::debug!(instance = %self.instance, "engine actor already gone");
        }
    }
}

/// Drops info lines whose depth went backwards for their MultiPV index.
#[derive(Debug, Default)]
pub(crate) struct DepthGate {
    last: HashMap<u32, u32>,
}

impl DepthGate {
    pub(crate) fn admit(&mut self, info: &SearchInfo) -> bool {
        let last = self.last.entry(info.multipv).or_insert(0);
        if info.depth < *last {
            return false;
        }
        *last = info.depth;
        true
    }
}

enum State {
    Idle,
    /// Waiting for `readyok` after option or new-game commands.
    Syncing { deadline: Instant },
    Thinking {
        search: SearchId,
        deadline: Option<Instant>,
        stopping: bool,
        gate: DepthGate,
    },
}

impl State {
    fn deadline(&self) -> Option<Instant> {
        match self {
            State::Idle => None,
            State::Syncing { deadline } => Some(*deadline),
            State::Thinking { deadline, .. } => *deadline,
        }
    }

    fn awaiting(&self) -> &'static str {
        match self {
            State::Idle => "nothing",
            State::Syncing { .. } => "readyok",
            State::Thinking { stopping: true, .. } => "bestmove after stop",
            State::Thinking { .. } => "bestmove",
        }
    }

    fn search(&self) -> Option<SearchId> {
        match self {
            State::Thinking { search, .. } => Some(*search),
            _ => None,
        }
    }
}

struct Conn {
    lines: Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    process: EngineProcess,
}

impl Conn {
    fn new(io: EngineIo) -> Self {
        Self {
            lines: BufReader::new(io.reader).lines(),
            writer: io.writer,
            process: io.process,
        }
    }

    async fn send(&mut self, cmd: &UciCommand) -> Result<(), EngineError> {
        let line = cmd.to_string();
        tracing::trace!(%line, ">>");
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn next_line(&mut self) -> Result<String, EngineError> {
        match self.lines.next_line().await? {
            Some(line) => {
                tracing::trace!(%line, "<<");
                Ok(line)
            }
            None => Err(EngineError::Closed),
        }
    }

    async fn wait_for(&mut self, wanted: UciMessage) -> Result<Option<String>, EngineError> {
        let mut name = None;
        loop {
            match UciMessage::parse(&self.next_line().await?) {
                Ok(UciMessage::IdName(n)) => name = Some(n),
                Ok(msg) if msg == wanted => return Ok(name),
                _ => {}
            }
        }
    }

    async fn quit(mut self) {
        let _ = self.send(&UciCommand::Quit).await;
        if let EngineProcess::Child(child) = &mut self.process {
            let _ = timeout(Duration::from_millis(500), child.wait()).await;
        }
    }
}

impl Drop for Conn {
    fn drop(&mut self) {
        self.process.kill();
    }
}

enum Input {
    Command(Option<Command>),
    Line(Result<String, EngineError>),
    Timeout,
}

enum Flow {
    Continue,
    Exit,
}

struct Actor {
    instance: InstanceId,
    identity: EngineIdentity,
    launcher: Arc<dyn Launcher>,
    settings: EngineSettings,
    events: mpsc::Sender<EngineEvent>,
    commands: mpsc::UnboundedReceiver<Command>,
    /// Replayed after every (re)start.
    options: Vec<(String, Option<String>)>,
    state: State,
    /// Issued once the current search has reported `bestmove`.
    pending: Option<(SearchId, SearchRequest)>,
    /// Commands that must wait until the engine is idle.
    deferred: Vec<UciCommand>,
}

impl Actor {
    async fn run(mut self) {
        let mut conn = match self.start().await {
            Ok(conn) => conn,
            Err(error) => match self.recover(None, None, error).await {
                Some(conn) => conn,
                None => return,
            },
        };

        loop {
            let deadline = self.state.deadline();
            let input = tokio::select! {
                cmd = self.commands.recv() => Input::Command(cmd),
                line = conn.next_line() => Input::Line(line),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => Input::Timeout,
            };
            let result = match input {
                Input::Command(cmd) => self.on_command(&mut conn, cmd).await,
                Input::Line(Ok(line)) => self.on_line(&mut conn, &line).await,
                Input::Line(Err(e)) => Err(e),
                Input::Timeout => Err(EngineError::Timeout(self.state.awaiting())),
            };
            match result {
                Ok(Flow::Continue) => {}
                Ok(Flow::Exit) => {
                    tracing::info!("engine shutting down");
                    conn.quit().await;
                    return;
                }
                Err(error) => {
                    let search = self.state.search();
                    let pending = self.pending.take().map(|(id, _)| id);
                    drop(conn);
                    self.state = State::Idle;
                    self.deferred.clear();
                    conn = match self.recover(search, pending, error).await {
                        Some(conn) => conn,
                        None => return,
                    };
                }
            }
        }
    }

    async fn emit(&self, kind: EngineEventKind) {
        let event = EngineEvent {
            instance: self.instance,
            kind,
        };
        if self.events.send(event).await.is_err() {
            tracing::debug!("event receiver dropped");
        }
    }

    /// Launch, handshake, options, `isready`.
    async fn start(&mut self) -> Result<Conn, EngineError> {
        let io = self
            .launcher
            .launch(&self.identity)
            .await
            .map_err(|e| EngineError::Launch(format!("{e:#}")))?;
        let mut conn = Conn::new(io);
        let t = self.settings.timeouts;

        conn.send(&UciCommand::Uci).await?;
        let id_name = timeout(t.handshake, conn.wait_for(UciMessage::UciOk))
            .await
            .map_err(|_| EngineError::Timeout("uciok"))??;
        for (name, value) in &self.options {
            conn.send(&UciCommand::SetOption {
                name: name.clone(),
                value: value.clone(),
            })
            .await?;
        }
        conn.send(&UciCommand::IsReady).await?;
        timeout(t.ready, conn.wait_for(UciMessage::ReadyOk))
            .await
            .map_err(|_| EngineError::Timeout("readyok"))??;

        tracing::info!(?id_name, "engine ready");
        self.emit(EngineEventKind::Ready { name: id_name }).await;
        Ok(conn)
    }

    async fn recover(
        &mut self,
        search: Option<SearchId>,
        pending: Option<SearchId>,
        error: EngineError,
    ) -> Option<Conn> {
        tracing::warn!(%error, ?search, ?pending, "engine fatal, killing process");
        self.emit(EngineEventKind::Fatal {
            search,
            pending,
            error: error.clone(),
        })
        .await;

        let mut last = error;
        for attempt in 1..=self.settings.max_restarts {
            match self.start().await {
                Ok(conn) => {
                    tracing::info!(attempt, "engine restarted");
                    self.emit(EngineEventKind::Restarted { attempt }).await;
                    return Some(conn);
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "restart failed");
                    last = e;
                }
            }
        }
        tracing::error!(error = %last, "engine failed permanently");
        self.emit(EngineEventKind::Failed { error: last }).await;
        None
    }

    fn search_deadline(&self, request: &SearchRequest) -> Option<Instant> {
        let grace = self.settings.timeouts.search_grace;
        let budget = match request.limit {
            SearchLimit::MoveTime { ms } => Duration::from_millis(ms),
            SearchLimit::Clock { wtime, btime, .. } => Duration::from_millis(match request.side_to_move {
                Color::White => wtime,
                Color::Black => btime,
            }),
            SearchLimit::Depth { .. } | SearchLimit::Nodes { .. } | SearchLimit::Infinite => {
                return None
            }
        };
        Some(Instant::now() + budget + grace)
    }

    async fn issue(&mut self, conn: &mut Conn, id: SearchId, request: SearchRequest) -> Result<(), EngineError> {
        conn.send(&UciCommand::Position {
            fen: request.start_fen.clone(),
            moves: request.moves.clone(),
        })
        .await?;
        conn.send(&UciCommand::Go(request.limit)).await?;
        tracing::debug!(search = %id, limit = %request.limit, "search issued");
        self.state = State::Thinking {
            search: id,
            deadline: self.search_deadline(&request),
            stopping: false,
            gate: DepthGate::default(),
        };
        Ok(())
    }

    async fn send_stop(&mut self, conn: &mut Conn) -> Result<(), EngineError> {
        let stop_timeout = self.settings.timeouts.stop;
        if let State::Thinking {
            stopping, deadline, ..
        } = &mut self.state
        {
            if !*stopping {
                conn.send(&UciCommand::Stop).await?;
                *stopping = true;
                *deadline = Some(Instant::now() + stop_timeout);
            }
        }
        Ok(())
    }

    async fn sync(&mut self, conn: &mut Conn) -> Result<(), EngineError> {
        conn.send(&UciCommand::IsReady).await?;
        self.state = State::Syncing {
            deadline: Instant::now() + self.settings.timeouts.ready,
        };
        Ok(())
    }

    /// Runs what was waiting for the engine to become idle.
    async fn drain(&mut self, conn: &mut Conn) -> Result<(), EngineError> {
        if !self.deferred.is_empty() {
            for cmd in std::mem::take(&mut self.deferred) {
                conn.send(&cmd).await?;
            }
            return self.sync(conn).await;
        }
        if let Some((id, request)) = self.pending.take() {
            self.issue(conn, id, request).await?;
        }
        Ok(())
    }

    async fn on_command(&mut self, conn: &mut Conn, cmd: Option<Command>) -> Result<Flow, EngineError> {
        let Some(cmd) = cmd else {
            return Ok(Flow::Exit);
        };
        match cmd {
            Command::Shutdown => return Ok(Flow::Exit),
            Command::Search { id, request } => match self.state {
                State::Idle => self.issue(conn, id, request).await?,
                State::Syncing { .. } => self.pending = Some((id, request)),
                State::Thinking { .. } => {
                    if let Some((superseded, _)) = self.pending.replace((id, request)) {
                        tracing::debug!(search = %superseded, "pending search superseded");
                    }
                    self.send_stop(conn).await?;
                }
            },
            Command::Stop => {
                self.pending = None;
                self.send_stop(conn).await?;
            }
            Command::NewGame => self.configure(conn, UciCommand::UciNewGame).await?,
            Command::SetOption { name, value } => {
                match self.options.iter_mut().find(|(n, _)| *n == name) {
                    Some(slot) => slot.1 = value.clone(),
                    None => self.options.push((name.clone(), value.clone())),
                }
                self.configure(conn, UciCommand::SetOption { name, value }).await?;
            }
        }
        Ok(Flow::Continue)
    }

    async fn configure(&mut self, conn: &mut Conn, cmd: UciCommand) -> Result<(), EngineError> {
        if matches!(self.state, State::Thinking { .. }) {
            self.deferred.push(cmd);
            return Ok(());
        }
        conn.send(&cmd).await?;
        self.sync(conn).await
    }

    async fn on_line(&mut self, conn: &mut Conn, line: &str) -> Result<Flow, EngineError> {
        let msg = match UciMessage::parse(line) {
            Ok(msg) => msg,
            Err(e) if line.trim_start().starts_with("bestmove") => {
                return Err(EngineError::Protocol(format!("{e}: `{line}`")));
            }
            Err(e) => {
                tracing::debug!(%line, error = %e, "unparsable engine output");
                return Ok(Flow::Continue);
            }
        };
        match msg {
            UciMessage::Info(info) => {
                let admitted = match &mut self.state {
                    State::Thinking { search, gate, .. } => gate.admit(&info).then_some(*search),
                    _ => None,
                };
                if let Some(search) = admitted {
                    self.emit(EngineEventKind::Info { search, info }).await;
                }
            }
            UciMessage::BestMove { best, ponder } => match self.state.search() {
                Some(search) => {
                    tracing::debug!(%search, best = ?best, "bestmove");
                    self.state = State::Idle;
                    self.emit(EngineEventKind::BestMove {
                        search,
                        best,
                        ponder,
                    })
                    .await;
                    self.drain(conn).await?;
                }
                None => tracing::debug!(%line, "stray bestmove"),
            },
            UciMessage::ReadyOk => {
                if matches!(self.state, State::Syncing { .. }) {
                    self.state = State::Idle;
                    self.drain(conn).await?;
                }
            }
            UciMessage::InfoString(text) => tracing::debug!(%text, "info string"),
            _ => {}
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
#[path = "actor_tests.rs"]
mod actor_tests;
