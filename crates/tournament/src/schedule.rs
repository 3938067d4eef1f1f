//! Pending pairings plus a cursor.

use serde::{Deserialize, Serialize};

/// One game to be played.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    /// 1-based; a cycle of a round robin or a game number of a duel.
    pub round: u32,
    pub white: String,
    pub black: String,
}

impl Pairing {
    fn new(round: u32, white: &str, black: &str) -> Self {
        Self {
            round,
            white: white.to_string(),
            black: black.to_string(),
        }
    }

    /// True when this game is between `a` and `b`, in either color.
    pub fn involves(&self, a: &str, b: &str) -> bool {
        (self.white == a && self.black == b) || (self.white == b && self.black == a)
    }
}

/// A finite, ordered list of games. Everything before the cursor has been
/// handed out; aborted games are removed from the pending part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pairings: Vec<Pairing>,
    cursor: usize,
}

impl Schedule {
    /// `games` games between two engines, `a` taking White first.
    pub fn duel(a: &str, b: &str, games: u32) -> Self {
        let pairings = (0..games)
            .map(|g| {
                if g % 2 == 0 {
                    Pairing::new(g + 1, a, b)
                } else {
                    Pairing::new(g + 1, b, a)
                }
            })
            .collect();
        Self {
            pairings,
            cursor: 0,
        }
    }

    /// Every engine meets every other once per round, using the circle method.
    /// Colors are swapped on every odd round.
    pub fn round_robin(engines: &[String], rounds: u32) -> Self {
        let mut seats: Vec<Option<&str>> = engines.iter().map(|e| Some(e.as_str())).collect();
        if seats.len() % 2 == 1 {
            seats.push(None);
        }
        let n = seats.len();
        let mut cycle = Vec::new();
        if n >= 2 {
            for slot in 0..n - 1 {
                for i in 0..n / 2 {
                    let (a, b) = (seats[i], seats[n - 1 - i]);
                    if let (Some(a), Some(b)) = (a, b) {
                        // The fixed seat alternates colors.
                        if i == 0 && slot % 2 == 1 {
                            cycle.push((b, a));
                        } else {
                            cycle.push((a, b));
                        }
                    }
                }
                seats[1..].rotate_right(1);
            }
        }

        let mut pairings = Vec::with_capacity(cycle.len() * rounds as usize);
        for round in 0..rounds {
            for &(white, black) in &cycle {
                if round % 2 == 1 {
                    pairings.push(Pairing::new(round + 1, black, white));
                } else {
                    pairings.push(Pairing::new(round + 1, white, black));
                }
            }
        }
        Self {
            pairings,
            cursor: 0,
        }
    }

    /// Hands out the next game.
    pub fn next_pairing(&mut self) -> Option<Pairing> {
        let pairing = self.pairings.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(pairing)
    }

    pub fn peek(&self) -> Option<&Pairing> {
        self.pairings.get(self.cursor)
    }

    /// Games handed out so far.
    pub fn issued(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.pairings.len() - self.cursor
    }

    pub fn total(&self) -> usize {
        self.pairings.len()
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.pairings.len()
    }

    pub fn pending(&self) -> &[Pairing] {
        &self.pairings[self.cursor..]
    }

    /// Drops every pending game between `a` and `b` and returns them.
    pub fn abort_pairing(&mut self, a: &str, b: &str) -> Vec<Pairing> {
        let pending = self.pairings.split_off(self.cursor);
        let (dropped, kept): (Vec<_>, Vec<_>) = pending.into_iter().partition(|p| p.involves(a, b));
        self.pairings.extend(kept);
        dropped
    }
}
