//! Mode state of a session: who moves, and what the engines are for.

use arena_core::ModeSpec;
use chess_core::{Color, Move};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// A human plays; `engine` is the color an engine plays, if any.
    Play { engine: Option<Color> },
    /// Infinite MultiPV search on every position, nobody else moves.
    Analysis,
    Guess(Guess),
    /// Both sides are engines.
    Match,
}

impl Mode {
    pub fn spec(&self) -> ModeSpec {
        match self {
            Mode::Play { engine } => ModeSpec::Play { engine: *engine },
            Mode::Analysis => ModeSpec::Analysis,
            Mode::Guess(g) => ModeSpec::Guess { side: Some(g.side) },
            Mode::Match => ModeSpec::Match,
        }
    }

    /// True when `side` is moved by an engine.
    pub fn engine_controls(&self, side: Color) -> bool {
        match self {
            Mode::Play { engine } => *engine == Some(side),
            Mode::Match => true,
            Mode::Analysis | Mode::Guess(_) => false,
        }
    }

    /// Modes that run the clock.
    pub fn is_timed(&self) -> bool {
        matches!(self, Mode::Play { .. } | Mode::Match)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessPhase {
    /// The reference move is being searched for.
    AwaitingReference,
    /// The guesser may move; `reference` is the move to match.
    Ready { reference: Move },
    /// The guess was right; waiting for the other side's reply.
    AwaitingReply,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guess {
    /// The side whose moves are guessed.
    pub side: Color,
    pub phase: GuessPhase,
    pub correct: u32,
    pub attempts: u32,
}

impl Guess {
    pub fn new(side: Color) -> Self {
        Self {
            side,
            phase: GuessPhase::AwaitingReference,
            correct: 0,
            attempts: 0,
        }
    }

    /// Scores a guess against the ready reference. `None` when no reference
    /// is available yet.
    pub fn judge(&mut self, guess: &Move) -> Option<bool> {
        let GuessPhase::Ready { reference } = self.phase else {
            return None;
        };
        let correct = classify(guess, &reference);
        self.attempts += 1;
        if correct {
            self.correct += 1;
            self.phase = GuessPhase::AwaitingReply;
        }
        Some(correct)
    }
}

/// Same origin, destination and promotion piece.
pub fn classify(guess: &Move, reference: &Move) -> bool {
    guess.from == reference.from && guess.to == reference.to && guess.promo == reference.promo
}

/// Move `ply` (0-based) of an imported line, used as a guess reference or reply.
pub fn line_move(line: &[Move], ply: usize) -> Option<Move> {
    line.get(ply).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::{coord_to_sq, parse_uci_move, PieceKind, Position};

    fn mv(pos: &Position, uci: &str) -> Move {
        parse_uci_move(pos, uci).unwrap()
    }

    #[test]
    fn test_classify_matches_squares_and_promotion() {
        let pos = Position::from_fen("7k/4P3/8/8/8/8/8/K7 w - - 0 1").unwrap();
        let queen = mv(&pos, "e7e8q");
        let knight = mv(&pos, "e7e8n");
        assert!(classify(&queen, &queen));
        assert!(!classify(&knight, &queen));

        let start = Position::startpos();
        assert!(!classify(&mv(&start, "e2e4"), &mv(&start, "e2e3")));
        assert_eq!(queen.promo, Some(PieceKind::Queen));
    }

    #[test]
    fn test_judge_needs_reference() {
        let start = Position::startpos();
        let mut guess = Guess::new(Color::White);
        assert_eq!(guess.judge(&mv(&start, "e2e4")), None);
        assert_eq!(guess.attempts, 0);

        guess.phase = GuessPhase::Ready {
            reference: mv(&start, "d2d4"),
        };
        assert_eq!(guess.judge(&mv(&start, "e2e4")), Some(false));
        assert!(matches!(guess.phase, GuessPhase::Ready { .. }));
        assert_eq!(guess.judge(&mv(&start, "d2d4")), Some(true));
        assert_eq!(guess.phase, GuessPhase::AwaitingReply);
        assert_eq!((guess.correct, guess.attempts), (1, 2));
    }

    #[test]
    fn test_engine_control() {
        assert!(Mode::Match.engine_controls(Color::Black));
        assert!(Mode::Play { engine: Some(Color::Black) }.engine_controls(Color::Black));
        assert!(!Mode::Play { engine: Some(Color::Black) }.engine_controls(Color::White));
        assert!(!Mode::Analysis.engine_controls(Color::White));
        assert!(!Mode::Analysis.is_timed());
        assert_eq!(
            Mode::Guess(Guess::new(Color::Black)).spec(),
            ModeSpec::Guess { side: Some(Color::Black) }
        );
    }

    #[test]
    fn test_line_move() {
        let start = Position::startpos();
        let line = vec![mv(&start, "e2e4")];
        assert_eq!(line_move(&line, 0).map(|m| m.from), coord_to_sq("e2"));
        assert_eq!(line_move(&line, 1), None);
    }
}
