use super::*;
use crate::types::coord_to_sq;

fn play(pos: &Position, uci: &str) -> Position {
    let mv = crate::uci::parse_uci_move(pos, uci).unwrap();
    pos.apply(mv).unwrap()
}

#[test]
fn test_fools_mate_is_checkmate() {
    let mut pos = Position::startpos();
    let mut history = vec![pos.clone()];
    for mv in ["f2f3", "e7e5", "g2g4", "d8h4"] {
        pos = play(&pos, mv);
        history.push(pos.clone());
    }
    assert_eq!(
        status(&pos, &history),
        BoardStatus::Checkmate {
            winner: Color::Black
        }
    );
}

#[test]
fn test_threefold_counts_full_history() {
    let mut pos = Position::startpos();
    let mut history = vec![pos.clone()];
    let shuffle = ["g1f3", "g8f6", "f3g1", "f6g8"];
    for mv in shuffle.iter().chain(shuffle.iter()) {
        assert_eq!(status(&pos, &history), BoardStatus::Ongoing);
        pos = play(&pos, mv);
        history.push(pos.clone());
    }
    // The start position has now occurred three times.
    assert_eq!(
        status(&pos, &history),
        BoardStatus::Draw(DrawReason::ThreefoldRepetition)
    );
}

#[test]
fn test_history_without_current_position() {
    let start = Position::startpos();
    let history = vec![start.clone(), start.clone()];
    assert_eq!(
        status(&start, &history),
        BoardStatus::Draw(DrawReason::ThreefoldRepetition)
    );
    assert_eq!(status(&start, &history[..1]), BoardStatus::Ongoing);
}

#[test]
fn test_mate_beats_fifty_move_rule() {
    let pos = Position::from_fen("7k/6Q1/6K1/8/8/8/8/8 b - - 100 80").unwrap();
    assert!(pos.is_fifty_move_draw());
    assert_eq!(
        status(&pos, &[]),
        BoardStatus::Checkmate {
            winner: Color::White
        }
    );
}

#[test]
fn test_bishops_on_same_color() {
    let same = Position::from_fen("4k3/8/8/2b5/8/8/8/2B1K3 w - - 0 1").unwrap();
    assert!(is_dark(coord_to_sq("c1").unwrap()) && is_dark(coord_to_sq("c5").unwrap()));
    assert!(same.is_insufficient_material());

    let opposite = Position::from_fen("4k3/8/8/8/2b5/8/8/2B1K3 w - - 0 1").unwrap();
    assert!(!opposite.is_insufficient_material());

    let knight = Position::from_fen("4k3/8/8/8/8/8/8/1N2K3 w - - 0 1").unwrap();
    assert!(knight.is_insufficient_material());
}
