//! Elo rating calculation and tracking

use arena_core::Outcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::results::ResultsError;

/// Default starting Elo for new engines
pub const DEFAULT_ELO: f64 = 1500.0;

/// K-factor for Elo updates (higher = more volatile)
pub const K_FACTOR: f64 = 32.0;

/// Elo rating system for tracking engine strength
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EloTracker {
    /// Ratings by engine name
    pub ratings: HashMap<String, f64>,
    /// Number of rated games played by each engine
    pub games_played: HashMap<String, u32>,
    /// One record per rated game, oldest first
    pub history: Vec<GameRecord>,
}

/// Record of a single rated game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub white: String,
    pub black: String,
    pub outcome: Outcome,
    pub timestamp: DateTime<Utc>,
    /// Rating points gained by White (lost by Black)
    pub elo_change: f64,
}

/// Result of a game from one player's point of view
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    Win,
    Loss,
    Draw,
}

impl GameResult {
    /// `outcome` as seen by White (`as_white`) or Black.
    pub fn from_outcome(outcome: Outcome, as_white: bool) -> Self {
        match (outcome, as_white) {
            (Outcome::Draw, _) => GameResult::Draw,
            (Outcome::WhiteWins, true) | (Outcome::BlackWins, false) => GameResult::Win,
            _ => GameResult::Loss,
        }
    }

    pub fn points(self) -> f64 {
        match self {
            GameResult::Win => 1.0,
            GameResult::Draw => 0.5,
            GameResult::Loss => 0.0,
        }
    }
}

/// Aggregate score of one engine against another
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl MatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: GameResult) {
        match result {
            GameResult::Win => self.wins += 1,
            GameResult::Loss => self.losses += 1,
            GameResult::Draw => self.draws += 1,
        }
    }

    pub fn total_games(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    /// Score fraction (1 for win, 0.5 for draw, 0 for loss)
    pub fn score(&self) -> f64 {
        let total = self.total_games() as f64;
        if total == 0.0 {
            return 0.5;
        }
        (self.wins as f64 + 0.5 * self.draws as f64) / total
    }
}

impl Default for EloTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl EloTracker {
    pub fn new() -> Self {
        Self {
            ratings: HashMap::new(),
            games_played: HashMap::new(),
            history: Vec::new(),
        }
    }

    /// Load tracker from a JSON file
    pub fn load(path: &Path) -> Result<Self, ResultsError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ResultsError::io(path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save tracker to a JSON file
    pub fn save(&self, path: &Path) -> Result<(), ResultsError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| ResultsError::io(path, e))
    }

    /// Starting rating for an engine that has not played yet.
    pub fn seed(&mut self, engine: &str, rating: f64) {
        self.ratings.entry(engine.to_string()).or_insert(rating);
    }

    pub fn rating(&self, engine: &str) -> f64 {
        self.ratings.get(engine).copied().unwrap_or(DEFAULT_ELO)
    }

    /// Expected score for `engine1` against `engine2`
    pub fn expected_score(&self, engine1: &str, engine2: &str) -> f64 {
        let r1 = self.rating(engine1);
        let r2 = self.rating(engine2);
        1.0 / (1.0 + 10.0_f64.powf((r2 - r1) / 400.0))
    }

    /// Updates both ratings after one game and returns White's change.
    pub fn record_game(&mut self, white: &str, black: &str, outcome: Outcome) -> f64 {
        let expected = self.expected_score(white, black);
        let actual = GameResult::from_outcome(outcome, true).points();
        let elo_change = K_FACTOR * (actual - expected);

        let rw = self.rating(white);
        let rb = self.rating(black);
        self.ratings.insert(white.to_string(), rw + elo_change);
        self.ratings.insert(black.to_string(), rb - elo_change);

        *self.games_played.entry(white.to_string()).or_insert(0) += 1;
        *self.games_played.entry(black.to_string()).or_insert(0) += 1;

        self.history.push(GameRecord {
            white: white.to_string(),
            black: black.to_string(),
            outcome,
            timestamp: Utc::now(),
            elo_change,
        });
        elo_change
    }

    /// Engines by rating, strongest first
    pub fn leaderboard(&self) -> Vec<(String, f64, u32)> {
        let mut entries: Vec<_> = self
            .ratings
            .iter()
            .map(|(name, &rating)| {
                let games = self.games_played.get(name).copied().unwrap_or(0);
                (name.clone(), rating, games)
            })
            .collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }

    pub fn leaderboard_text(&self) -> String {
        let mut out = String::from("=== Engine Leaderboard ===\n");
        out.push_str(&format!("{:<30} {:>8} {:>8}\n", "Engine", "Elo", "Games"));
        out.push_str(&"-".repeat(50));
        out.push('\n');
        for (name, rating, games) in self.leaderboard() {
            out.push_str(&format!("{:<30} {:>8.1} {:>8}\n", name, rating, games));
        }
        out
    }
}

#[cfg(test)]
#[path = "elo_tests.rs"]
mod elo_tests;
