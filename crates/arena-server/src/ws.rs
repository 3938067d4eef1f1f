//! WebSocket endpoint for display clients.
//!
//! A connection is attached to one session at a time. While it runs a match
//! it follows each game's session as the orchestrator starts it.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Query, State},
    response::IntoResponse,
};
use arena_core::{ClientMessage, GameSnapshot, NoticeLevel, ServerMessage, SessionId};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::Instrument;

use crate::app::AppState;
use crate::error::SessionError;
use crate::orchestrator::{self, MatchEvent, MatchHandle, MatchSpec};
use crate::session::{Attachment, SessionHandle};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub session: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.session))
}

/// Finds the requested session or starts a new one. The flag is set when a
/// requested id was not found.
fn resolve(state: &AppState, requested: Option<&str>) -> (SessionHandle, bool) {
    let existing = requested
        .and_then(|id| id.parse::<SessionId>().ok())
        .and_then(|id| state.registry.get(id))
        .filter(|h| !h.is_closed());
    match existing {
        Some(handle) => (handle, false),
        None => {
            let handle = SessionHandle::spawn(state.session_context());
            state.registry.insert(handle.clone());
            (handle, requested.is_some())
        }
    }
}

enum Input {
    Frame(Option<Result<Message, axum::Error>>),
    Session(Result<ServerMessage, broadcast::error::RecvError>),
    Match(Option<MatchEvent>),
}

struct Connection {
    state: AppState,
    sink: SplitSink<WebSocket, Message>,
    session: SessionHandle,
    events: broadcast::Receiver<ServerMessage>,
    running: Option<(MatchHandle, mpsc::Receiver<MatchEvent>)>,
}

async fn handle_socket(socket: WebSocket, state: AppState, requested: Option<String>) {
    let (session, missing) = resolve(&state, requested.as_deref());
    let span = tracing::info_span!("client", session = %session.id());
    async move {
        let (sink, mut stream) = socket.split();
        let Ok(Attachment { snapshot, events }) = session.attach().await else {
            tracing::warn!("session closed before attach");
            return;
        };
        let mut conn = Connection {
            state,
            sink,
            events,
            session,
            running: None,
        };
        tracing::info!("client connected");
        if !conn.greet(snapshot, missing).await {
            return;
        }

        loop {
            let input = tokio::select! {
                frame = stream.next() => Input::Frame(frame),
                event = conn.events.recv() => Input::Session(event),
                event = next_match_event(&mut conn.running) => Input::Match(event),
            };
            let keep_going = match input {
                Input::Frame(Some(Ok(Message::Text(text)))) => conn.on_text(text.as_str()).await,
                Input::Frame(Some(Ok(Message::Close(_)))) | Input::Frame(None) => false,
                Input::Frame(Some(Ok(_))) => true,
                Input::Frame(Some(Err(e))) => {
                    tracing::debug!(error = %e, "socket error");
                    false
                }
                Input::Session(Ok(msg)) => conn.send(&msg).await,
                Input::Session(Err(broadcast::error::RecvError::Lagged(missed))) => {
                    tracing::warn!(missed, "client lagged, resending snapshot");
                    let current = conn.session.clone();
                    conn.reattach(current).await
                }
                Input::Session(Err(broadcast::error::RecvError::Closed)) => {
                    let _ = conn
                        .send(&ServerMessage::notice(NoticeLevel::Info, "session closed"))
                        .await;
                    false
                }
                Input::Match(Some(event)) => conn.on_match_event(event).await,
                Input::Match(None) => {
                    conn.running = None;
                    true
                }
            };
            if !keep_going {
                break;
            }
        }
        tracing::info!("client disconnected");
    }
    .instrument(span)
    .await
}

async fn next_match_event(running: &mut Option<(MatchHandle, mpsc::Receiver<MatchEvent>)>) -> Option<MatchEvent> {
    match running {
        Some((_, rx)) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl Connection {
    /// Sends `msg`; false once the client is gone.
    async fn send(&mut self, msg: &ServerMessage) -> bool {
        let json = match serde_json::to_string(msg) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "cannot encode server message");
                return true;
            }
        };
        self.sink.send(Message::Text(json.into())).await.is_ok()
    }

    async fn notice(&mut self, level: NoticeLevel, message: impl Into<String>) -> bool {
        self.send(&ServerMessage::notice(level, message)).await
    }

    async fn greet(&mut self, snapshot: GameSnapshot, missing: bool) -> bool {
        if !self.send(&ServerMessage::Connected { session: snapshot.session }).await {
            return false;
        }
        if missing && !self.notice(NoticeLevel::Warning, "unknown session, started a new one").await {
            return false;
        }
        self.send(&ServerMessage::Snapshot(snapshot)).await
    }

    /// Switches to `session` with a fresh snapshot.
    async fn reattach(&mut self, session: SessionHandle) -> bool {
        match session.attach().await {
            Ok(attachment) => {
                self.session = session;
                self.events = attachment.events;
                self.send(&ServerMessage::Snapshot(attachment.snapshot)).await
            }
            Err(e) => self.notice(NoticeLevel::Error, e.to_string()).await,
        }
    }

    async fn on_text(&mut self, text: &str) -> bool {
        let msg: ClientMessage = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(error = %e, "unparsable client message");
                return self.notice(NoticeLevel::Error, format!("invalid message: {e}")).await;
            }
        };
        match msg {
            ClientMessage::StartDuel { .. } | ClientMessage::StartTournament { .. } => {
                self.start_match(&msg).await
            }
            ClientMessage::Stop if self.running.is_some() => {
                if let Some((handle, _)) = &self.running {
                    handle.cancel();
                }
                self.notice(NoticeLevel::Info, "stopping match").await
            }
            msg => match self.session.request(msg).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!(error = %e, "request refused");
                    self.notice(NoticeLevel::Warning, e.to_string()).await
                }
            },
        }
    }

    async fn start_match(&mut self, msg: &ClientMessage) -> bool {
        if self.running.is_some() {
            return self
                .notice(NoticeLevel::Warning, SessionError::MatchInProgress.to_string())
                .await;
        }
        let spec = match MatchSpec::from_message(&self.state.config, msg) {
            Ok(spec) => spec,
            Err(e) => return self.notice(NoticeLevel::Warning, e.to_string()).await,
        };
        let games = spec.schedule.total();
        let started = orchestrator::start(self.state.session_context(), self.state.registry.clone(), spec);
        self.running = Some(started);
        self.notice(NoticeLevel::Info, format!("match started, {games} game(s)")).await
    }

    async fn on_match_event(&mut self, event: MatchEvent) -> bool {
        match event {
            MatchEvent::GameStarted { session, pairing } => {
                tracing::debug!(round = pairing.round, white = %pairing.white, black = %pairing.black, "following game");
                self.reattach(session).await
            }
            MatchEvent::Message(msg) => self.send(&msg).await,
            MatchEvent::Finished(results) => {
                self.running = None;
                self.notice(
                    NoticeLevel::Info,
                    format!("match finished, {} game(s) recorded", results.games.len()),
                )
                .await
            }
        }
    }
}
