//! Score table for a match or tournament.

use std::collections::HashMap;

use arena_core::{Outcome, StandingRow};
use serde::{Deserialize, Serialize};

use crate::elo::{EloTracker, GameResult};

/// Secondary ordering between engines on equal score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tiebreak {
    /// Points scored against the other engines on the same score.
    #[default]
    HeadToHead,
    /// Sum of beaten opponents' scores plus half of drawn opponents' scores.
    SonnebornBerger,
    /// Number of wins.
    Wins,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Recorded {
    white: String,
    black: String,
    /// `None` for an incomplete game.
    outcome: Option<Outcome>,
}

#[derive(Debug, Clone, Default)]
struct Tally {
    score: f64,
    wins: u32,
    draws: u32,
    losses: u32,
    incomplete: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standings {
    tiebreak: Tiebreak,
    participants: Vec<String>,
    games: Vec<Recorded>,
}

impl Standings {
    pub fn new(participants: &[String], tiebreak: Tiebreak) -> Self {
        Self {
            tiebreak,
            participants: participants.to_vec(),
            games: Vec::new(),
        }
    }

    pub fn tiebreak(&self) -> Tiebreak {
        self.tiebreak
    }

    /// Records a finished game, or an incomplete one when `outcome` is `None`.
    pub fn record(&mut self, white: &str, black: &str, outcome: Option<Outcome>) {
        for name in [white, black] {
            if !self.participants.iter().any(|p| p == name) {
                self.participants.push(name.to_string());
            }
        }
        self.games.push(Recorded {
            white: white.to_string(),
            black: black.to_string(),
            outcome,
        });
    }

    pub fn games_recorded(&self) -> usize {
        self.games.len()
    }

    pub fn score(&self, name: &str) -> f64 {
        self.tallies().get(name).map_or(0.0, |t| t.score)
    }

    fn tallies(&self) -> HashMap<&str, Tally> {
        let mut tallies: HashMap<&str, Tally> = self
            .participants
            .iter()
            .map(|p| (p.as_str(), Tally::default()))
            .collect();
        for game in &self.games {
            for (name, as_white) in [(game.white.as_str(), true), (game.black.as_str(), false)] {
                let tally = tallies.entry(name).or_default();
                match game.outcome.map(|o| GameResult::from_outcome(o, as_white)) {
                    None => tally.incomplete += 1,
                    Some(result) => {
                        tally.score += result.points();
                        match result {
                            GameResult::Win => tally.wins += 1,
                            GameResult::Draw => tally.draws += 1,
                            GameResult::Loss => tally.losses += 1,
                        }
                    }
                }
            }
        }
        tallies
    }

    /// Completed games of `name` as (opponent, result).
    fn results_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = (&'a str, GameResult)> + 'a {
        self.games.iter().filter_map(move |g| {
            let outcome = g.outcome?;
            if g.white == name {
                Some((g.black.as_str(), GameResult::from_outcome(outcome, true)))
            } else if g.black == name {
                Some((g.white.as_str(), GameResult::from_outcome(outcome, false)))
            } else {
                None
            }
        })
    }

    fn tiebreak_of(&self, name: &str, tallies: &HashMap<&str, Tally>) -> f64 {
        let score_of = |n: &str| tallies.get(n).map_or(0.0, |t| t.score);
        match self.tiebreak {
            Tiebreak::Wins => tallies.get(name).map_or(0, |t| t.wins) as f64,
            Tiebreak::SonnebornBerger => self
                .results_of(name)
                .map(|(opp, r)| match r {
                    GameResult::Win => score_of(opp),
                    GameResult::Draw => score_of(opp) / 2.0,
                    GameResult::Loss => 0.0,
                })
                .sum(),
            Tiebreak::HeadToHead => {
                let own = score_of(name);
                self.results_of(name)
                    .filter(|(opp, _)| *opp != name && score_of(opp) == own)
                    .map(|(_, r)| r.points())
                    .sum()
            }
        }
    }

    /// Ranked rows: score, then tiebreak, then name. Engines level on both
    /// score and tiebreak share a rank.
    pub fn rows(&self, elo: &EloTracker) -> Vec<StandingRow> {
        let tallies = self.tallies();
        let mut rows: Vec<StandingRow> = self
            .participants
            .iter()
            .map(|name| {
                let t = tallies.get(name.as_str()).cloned().unwrap_or_default();
                StandingRow {
                    rank: 0,
                    name: name.clone(),
                    score: t.score,
                    wins: t.wins,
                    draws: t.draws,
                    losses: t.losses,
                    incomplete: t.incomplete,
                    tiebreak: self.tiebreak_of(name, &tallies),
                    elo: elo.rating(name),
                }
            })
            .collect();
        rows.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.tiebreak.total_cmp(&a.tiebreak))
                .then_with(|| a.name.cmp(&b.name))
        });
        for i in 0..rows.len() {
            rows[i].rank = if i > 0
                && rows[i].score == rows[i - 1].score
                && rows[i].tiebreak == rows[i - 1].tiebreak
            {
                rows[i - 1].rank
            } else {
                i as u32 + 1
            };
        }
        rows
    }
}

#[cfg(test)]
#[path = "standings_tests.rs"]
mod standings_tests;
