//! Tournament results storage and reporting

use arena_core::{GameSummary, StandingRow, TimeControl};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::elo::{GameResult, MatchResult};
use crate::standings::Tiebreak;

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid results json: {0}")]
    Json(#[from] serde_json::Error),
}

impl ResultsError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        ResultsError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Complete tournament results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentResults {
    /// Name/description of the tournament
    pub name: String,
    /// Participating engines
    pub participants: Vec<String>,
    /// Every game in the order it finished, incomplete ones included
    pub games: Vec<GameSummary>,
    /// Final table
    pub standings: Vec<StandingRow>,
    /// Configuration used
    pub config: TournamentConfig,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Aggregate of all games between two engines, from `engine1`'s side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchEntry {
    pub engine1: String,
    pub engine2: String,
    pub result: MatchResult,
    pub incomplete: u32,
}

/// Tournament configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentConfig {
    pub rounds: u32,
    pub tiebreak: Tiebreak,
    pub time_control: Option<TimeControl>,
    pub max_plies: u32,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            rounds: 1,
            tiebreak: Tiebreak::default(),
            time_control: None,
            max_plies: 400,
        }
    }
}

impl TournamentResults {
    pub fn new(name: &str, participants: Vec<String>, config: TournamentConfig) -> Self {
        Self {
            name: name.to_string(),
            participants,
            games: Vec::new(),
            standings: Vec::new(),
            config,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn add_game(&mut self, game: GameSummary) {
        self.games.push(game);
    }

    pub fn finish(&mut self, standings: Vec<StandingRow>) {
        self.standings = standings;
        self.finished_at = Some(Utc::now());
    }

    /// Per-pair aggregates, in order of first meeting.
    pub fn matches(&self) -> Vec<MatchEntry> {
        let mut entries: Vec<MatchEntry> = Vec::new();
        for game in &self.games {
            let idx = match entries.iter().position(|e| {
                (e.engine1 == game.white && e.engine2 == game.black)
                    || (e.engine1 == game.black && e.engine2 == game.white)
            }) {
                Some(i) => i,
                None => {
                    entries.push(MatchEntry {
                        engine1: game.white.clone(),
                        engine2: game.black.clone(),
                        result: MatchResult::new(),
                        incomplete: 0,
                    });
                    entries.len() - 1
                }
            };
            let entry = &mut entries[idx];
            match game.outcome {
                Some(outcome) => {
                    let as_white = entry.engine1 == game.white;
                    entry.result.add(GameResult::from_outcome(outcome, as_white));
                }
                None => entry.incomplete += 1,
            }
        }
        entries
    }

    fn file_stem(&self) -> String {
        let slug: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        format!("{}-{}", slug.trim_matches('-'), self.started_at.format("%Y%m%d-%H%M%S"))
    }

    /// File name under the results directory.
    pub fn file_name(&self) -> String {
        format!("{}.json", self.file_stem())
    }

    /// Name of the Elo ledger saved next to the results.
    pub fn ratings_file_name(&self) -> String {
        format!("{}.elo.json", self.file_stem())
    }

    /// Save results to a JSON file
    pub fn save(&self, path: &Path) -> Result<(), ResultsError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| ResultsError::io(path, e))
    }

    /// Saves into `dir` (created when missing) and returns the written path.
    pub fn save_in(&self, dir: &Path) -> Result<PathBuf, ResultsError> {
        std::fs::create_dir_all(dir).map_err(|e| ResultsError::io(dir, e))?;
        let path = dir.join(self.file_name());
        self.save(&path)?;
        Ok(path)
    }

    /// Load results from JSON file
    pub fn load(path: &Path) -> Result<Self, ResultsError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ResultsError::io(path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Generate a text report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();
        report.push_str(&format!("=== Tournament: {} ===\n\n", self.name));
        report.push_str(&format!("Participants: {}\n", self.participants.join(", ")));
        let clock = match self.config.time_control {
            Some(tc) => format!("{}+{}s", tc.initial_ms / 1000, tc.increment_ms / 1000),
            None => "untimed".to_string(),
        };
        report.push_str(&format!(
            "Config: {} round(s), {}, tiebreak {:?}\n\n",
            self.config.rounds, clock, self.config.tiebreak
        ));

        report.push_str("Results:\n");
        report.push_str(&format!(
            "{:<20} vs {:<20} {:>5}-{:<5}-{:<5} {:>5}\n",
            "Engine 1", "Engine 2", "W", "L", "D", "Inc"
        ));
        report.push_str(&"-".repeat(66));
        report.push('\n');

        for entry in self.matches() {
            report.push_str(&format!(
                "{:<20} vs {:<20} {:>5}-{:<5}-{:<5} {:>5}\n",
                entry.engine1,
                entry.engine2,
                entry.result.wins,
                entry.result.losses,
                entry.result.draws,
                entry.incomplete
            ));
        }

        if !self.standings.is_empty() {
            report.push_str("\nStandings:\n");
            for row in &self.standings {
                report.push_str(&format!(
                    "{:>3}. {:<20} {:>5.1} ({:.2}) elo {:.0}\n",
                    row.rank, row.name, row.score, row.tiebreak, row.elo
                ));
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_core::Outcome;

    fn game(round: u32, white: &str, black: &str, outcome: Option<Outcome>) -> GameSummary {
        GameSummary {
            round,
            white: white.to_string(),
            black: black.to_string(),
            outcome,
            session: None,
            finished_at: Utc::now(),
        }
    }

    fn sample() -> TournamentResults {
        let mut results = TournamentResults::new(
            "Duel: A vs B",
            vec!["A".to_string(), "B".to_string()],
            TournamentConfig::default(),
        );
        results.add_game(game(1, "A", "B", Some(Outcome::WhiteWins)));
        results.add_game(game(2, "B", "A", Some(Outcome::WhiteWins)));
        results.add_game(game(3, "A", "B", Some(Outcome::Draw)));
        results.add_game(game(4, "B", "A", None));
        results
    }

    #[test]
    fn test_matches_aggregate_both_colors() {
        let entries = sample().matches();
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!((e.engine1.as_str(), e.engine2.as_str()), ("A", "B"));
        assert_eq!(e.result, MatchResult { wins: 1, losses: 1, draws: 1 });
        assert_eq!(e.incomplete, 1);
    }

    #[test]
    fn test_report_lists_pairs() {
        let report = sample().generate_report();
        assert!(report.contains("=== Tournament: Duel: A vs B ==="));
        assert!(report.contains("untimed"));
        assert!(report.lines().any(|l| l.starts_with("A") && l.contains("vs B")));
    }

    #[test]
    fn test_file_name_is_slugged() {
        let name = sample().file_name();
        assert!(name.starts_with("duel--a-vs-b-"), "{name}");
        assert!(name.ends_with(".json"));
        let ratings = sample().ratings_file_name();
        assert_eq!(ratings.trim_end_matches(".elo.json"), name.trim_end_matches(".json"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("tournament-results-{}", std::process::id()));
        let mut results = sample();
        results.finish(Vec::new());
        let path = results.save_in(&dir).unwrap();
        let loaded = TournamentResults::load(&path).unwrap();
        assert_eq!(loaded.games.len(), 4);
        assert_eq!(loaded.name, results.name);
        assert!(loaded.finished_at.is_some());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let err = TournamentResults::load(Path::new("/nonexistent/results.json")).unwrap_err();
        assert!(err.to_string().starts_with("/nonexistent/results.json"));
    }
}
