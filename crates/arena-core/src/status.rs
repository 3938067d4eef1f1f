use chess_core::Color;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawReason {
    FiftyMove,
    ThreefoldRepetition,
    InsufficientMaterial,
    Stalemate,
    /// Adjudicated after the configured ply limit.
    MoveLimit,
}

impl From<chess_core::DrawReason> for DrawReason {
    fn from(r: chess_core::DrawReason) -> Self {
        match r {
            chess_core::DrawReason::FiftyMove => DrawReason::FiftyMove,
            chess_core::DrawReason::ThreefoldRepetition => DrawReason::ThreefoldRepetition,
            chess_core::DrawReason::InsufficientMaterial => DrawReason::InsufficientMaterial,
        }
    }
}

/// Lifecycle of a game session. Every variant after `Active` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GameStatus {
    AwaitingSetup,
    Active,
    Checkmate { winner: Color },
    Stalemate,
    Draw { reason: DrawReason },
    Resigned { winner: Color },
    FlagFall { winner: Color },
    Aborted { reason: String },
}

/// Final game result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    WhiteWins,
    BlackWins,
    Draw,
}

impl Outcome {
    pub fn winner(color: Color) -> Self {
        match color {
            Color::White => Outcome::WhiteWins,
            Color::Black => Outcome::BlackWins,
        }
    }

    /// PGN result token.
    pub fn as_pgn(self) -> &'static str {
        match self {
            Outcome::WhiteWins => "1-0",
            Outcome::BlackWins => "0-1",
            Outcome::Draw => "1/2-1/2",
        }
    }
}

impl GameStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GameStatus::AwaitingSetup | GameStatus::Active)
    }

    /// The result, `None` while running or when the game was aborted.
    /// Under armageddon rules a drawn game goes to Black.
    pub fn outcome(&self, armageddon: bool) -> Option<Outcome> {
        match self {
            GameStatus::Checkmate { winner }
            | GameStatus::Resigned { winner }
            | GameStatus::FlagFall { winner } => Some(Outcome::winner(*winner)),
            GameStatus::Stalemate | GameStatus::Draw { .. } if armageddon => {
                Some(Outcome::BlackWins)
            }
            GameStatus::Stalemate | GameStatus::Draw { .. } => Some(Outcome::Draw),
            GameStatus::AwaitingSetup | GameStatus::Active | GameStatus::Aborted { .. } => None,
        }
    }
}

impl From<chess_core::BoardStatus> for GameStatus {
    fn from(s: chess_core::BoardStatus) -> Self {
        match s {
            chess_core::BoardStatus::Ongoing => GameStatus::Active,
            chess_core::BoardStatus::Checkmate { winner } => GameStatus::Checkmate { winner },
            chess_core::BoardStatus::Stalemate => GameStatus::Stalemate,
            chess_core::BoardStatus::Draw(reason) => GameStatus::Draw {
                reason: reason.into(),
            },
        }
    }
}
