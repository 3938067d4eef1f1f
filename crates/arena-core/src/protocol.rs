//! JSON messages exchanged with display clients over the websocket.
//!
//! Both directions are internally tagged on `"type"`.

use chess_core::{Color, Handicap, PieceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{SearchId, SessionId};
use crate::info::SearchInfo;
use crate::status::{GameStatus, Outcome};

/// Initial and increment time in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeControl {
    pub initial_ms: u64,
    #[serde(default)]
    pub increment_ms: u64,
}

impl TimeControl {
    pub fn new(initial_ms: u64, increment_ms: u64) -> Self {
        Self {
            initial_ms,
            increment_ms,
        }
    }
}

/// How a new game starts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Setup {
    #[default]
    Standard,
    /// Scharnagl index, random when absent.
    Chess960 { index: Option<u16> },
    Handicap { handicap: Handicap },
    /// White 5:00 against Black 4:00, drawn games go to Black.
    Armageddon,
    Fen { fen: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum ImportSource {
    Fen { fen: String },
    Pgn { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModeSpec {
    /// Human play; `engine` names the color an engine plays, if any.
    Play {
        #[serde(default)]
        engine: Option<Color>,
    },
    Analysis,
    /// Guess the moves of `side` (side to move when absent).
    Guess {
        #[serde(default)]
        side: Option<Color>,
    },
    /// Both sides engines; only entered through a duel or tournament.
    Match,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Move {
        from: String,
        to: String,
        #[serde(default)]
        promotion: Option<PieceKind>,
    },
    SetMode {
        mode: ModeSpec,
    },
    /// Applies to every engine the session controls.
    SetOption {
        name: String,
        #[serde(default)]
        value: Option<String>,
    },
    /// Assigns a configured engine to `color`, or the analysis slot when absent.
    SetEngine {
        #[serde(default)]
        color: Option<Color>,
        engine: String,
        #[serde(default)]
        elo: Option<u32>,
    },
    NewGame {
        #[serde(default)]
        setup: Setup,
        #[serde(default)]
        clock: Option<TimeControl>,
    },
    Import {
        source: ImportSource,
    },
    StartDuel {
        white: String,
        black: String,
        games: u32,
        #[serde(default)]
        white_elo: Option<u32>,
        #[serde(default)]
        black_elo: Option<u32>,
        #[serde(default)]
        clock: Option<TimeControl>,
        #[serde(default)]
        setup: Setup,
    },
    StartTournament {
        engines: Vec<String>,
        #[serde(default = "one")]
        rounds: u32,
        #[serde(default)]
        clock: Option<TimeControl>,
        #[serde(default)]
        setup: Setup,
    },
    Stop,
    Resign,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockSnapshot {
    pub white_ms: u64,
    pub black_ms: u64,
    pub running: Option<Color>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSlots {
    pub white: Option<String>,
    pub black: Option<String>,
    pub analysis: Option<String>,
}

/// Full state, sent on attach and after every structural change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub session: SessionId,
    pub fen: String,
    pub start_fen: String,
    /// Moves played so far in UCI notation.
    pub moves: Vec<String>,
    pub movetext: String,
    pub side_to_move: Color,
    pub mode: ModeSpec,
    pub status: GameStatus,
    pub clock: Option<ClockSnapshot>,
    pub engines: EngineSlots,
    pub chess960: bool,
    pub armageddon: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingRow {
    pub rank: u32,
    pub name: String,
    pub score: f64,
    pub wins: u32,
    pub draws: u32,
    pub losses: u32,
    pub incomplete: u32,
    pub tiebreak: f64,
    pub elo: f64,
}

/// One finished or abandoned game of a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSummary {
    pub round: u32,
    pub white: String,
    pub black: String,
    /// `None` when the game could not be completed.
    pub outcome: Option<Outcome>,
    pub session: Option<SessionId>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        session: SessionId,
    },
    Snapshot(GameSnapshot),
    MoveApplied {
        uci: String,
        san: String,
        by: Color,
        fen: String,
        ply: usize,
    },
    SearchInfo {
        search: SearchId,
        info: SearchInfo,
    },
    BestMove {
        search: SearchId,
        uci: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        ponder: Option<String>,
    },
    Clock(ClockSnapshot),
    GameOver {
        status: GameStatus,
        result: Option<Outcome>,
        fen: String,
        movetext: String,
    },
    GuessResult {
        guess: String,
        correct: bool,
    },
    MatchProgress {
        completed: u32,
        total: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        last: Option<GameSummary>,
        #[serde(skip_serializing_if = "Option::is_none")]
        current: Option<SessionId>,
    },
    Standings {
        rows: Vec<StandingRow>,
        finished: bool,
    },
    Notice {
        level: NoticeLevel,
        message: String,
    },
}

impl ServerMessage {
    pub fn notice(level: NoticeLevel, message: impl Into<String>) -> Self {
        ServerMessage::Notice {
            level,
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod protocol_tests;
