use super::*;
use crate::types::coord_to_sq;

#[test]
fn test_plain_movetext() {
    let mt = parse_movetext("1. e4 e5 2. Nf3 Nc6 3. Bb5 a6").unwrap();
    assert_eq!(mt.moves.len(), 6);
    assert_eq!(mt.positions.len(), 6);
    assert_eq!(mt.start, Position::startpos());
    assert_eq!(mt.result, None);
    assert_eq!(
        mt.final_position().to_fen(),
        "r1bqkbnr/1ppp1ppp/p1n5/1B2p3/4P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 0 4"
    );
}

#[test]
fn test_tags_comments_and_variations_are_skipped() {
    let text = r#"[Event "Casual"]
[White "Alice"]

1.e4 {best by test} e5 (1... c5 2. Nf3 (2. c3) d6) 2. Nf3 $1 ; a comment
Nc6 3... 1-0"#;
    let mt = parse_movetext(text).unwrap();
    assert_eq!(mt.moves.len(), 4);
    assert_eq!(mt.result.as_deref(), Some("1-0"));
    assert_eq!(
        mt.tags,
        vec![
            ("Event".to_string(), "Casual".to_string()),
            ("White".to_string(), "Alice".to_string()),
        ]
    );
}

#[test]
fn test_fen_tag_sets_start() {
    let text = "[SetUp \"1\"]\n[FEN \"4k3/8/8/8/8/8/4P3/4K3 b - - 0 1\"]\n\n1... Kd7 2. e4 *";
    let mt = parse_movetext(text).unwrap();
    assert_eq!(mt.start.side_to_move, Color::Black);
    assert_eq!(mt.moves.len(), 2);
    assert_eq!(mt.moves[1].to, coord_to_sq("e4").unwrap());
    assert_eq!(mt.result.as_deref(), Some("*"));
}

#[test]
fn test_uci_tokens_are_accepted() {
    let mt = parse_movetext("e2e4 e7e5 g1f3").unwrap();
    assert_eq!(mt.moves.len(), 3);
}

#[test]
fn test_errors() {
    assert!(matches!(
        parse_movetext("1. e4 e5 2. Ke3"),
        Err(PgnError::Move { ply: 3, .. })
    ));
    assert!(matches!(parse_movetext("1. e4 {open"), Err(PgnError::Unbalanced)));
    assert!(matches!(parse_movetext("1. e4 (1. d4"), Err(PgnError::Unbalanced)));
    assert!(matches!(
        parse_movetext("[FEN \"not a fen\"] 1. e4"),
        Err(PgnError::Fen(_))
    ));
}

#[test]
fn test_write_then_read_back() {
    let mt = parse_movetext("1. e4 d5 2. exd5 Qxd5 3. Nc3 Qa5 4. d4 Nf6").unwrap();
    let text = write_movetext(&mt.start, &mt.moves, Some("*"));
    assert_eq!(text, "1. e4 d5 2. exd5 Qxd5 3. Nc3 Qa5 4. d4 Nf6 *");
    let again = parse_movetext(&text).unwrap();
    assert_eq!(again.moves, mt.moves);
}

#[test]
fn test_write_from_black_to_move() {
    let start = Position::from_fen("4k3/8/8/8/8/8/4P3/4K3 b - - 0 7").unwrap();
    let mt = parse_movetext("[FEN \"4k3/8/8/8/8/8/4P3/4K3 b - - 0 7\"] Kd7 e4").unwrap();
    let text = write_movetext(&start, &mt.moves, None);
    assert!(text.starts_with("[SetUp \"1\"]\n[FEN \"4k3/8/8/8/8/8/4P3/4K3 b - - 0 7\"]"));
    assert!(text.ends_with("7... Kd7 8. e4"), "{text}");
}
