use super::*;

#[test]
fn test_startpos_matches_fen() {
    let pos = Position::from_fen(STARTPOS_FEN).unwrap();
    assert_eq!(pos, Position::startpos());
    assert_eq!(pos.to_fen(), STARTPOS_FEN);
    assert_eq!(pos.castling, CastlingRights::standard());
}

#[test]
fn test_e2e4_updates_counters() {
    let start = Position::startpos();
    let e2 = coord_to_sq("e2").unwrap();
    let e4 = coord_to_sq("e4").unwrap();
    let next = start.apply(start.find_move(e2, e4, None).unwrap()).unwrap();

    assert_eq!(next.side_to_move, Color::Black);
    assert_eq!(next.halfmove_clock, 0);
    assert_eq!(next.fullmove_number, 1);
    assert_eq!(next.en_passant, coord_to_sq("e3"));
    // The original is untouched.
    assert_eq!(start, Position::startpos());
}

#[test]
fn test_knight_move_increments_halfmove_clock() {
    let start = Position::startpos();
    let mv = start
        .find_move(coord_to_sq("g1").unwrap(), coord_to_sq("f3").unwrap(), None)
        .unwrap();
    let next = start.apply(mv).unwrap();
    assert_eq!(next.halfmove_clock, 1);
    let reply = next
        .find_move(coord_to_sq("g8").unwrap(), coord_to_sq("f6").unwrap(), None)
        .unwrap();
    let after = next.apply(reply).unwrap();
    assert_eq!(after.fullmove_number, 2);
}

#[test]
fn test_fen_rejects_malformed_input() {
    assert!(matches!(
        Position::from_fen("8/8/8 w - -"),
        Err(FenError::Board(_))
    ));
    assert!(matches!(
        Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1"),
        Err(FenError::SideToMove(_))
    ));
    assert!(matches!(
        Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w"),
        Err(FenError::MissingFields(2))
    ));
    assert!(matches!(
        Position::from_fen("8/8/8/8/8/8/8/8 w - - 0 1"),
        Err(FenError::Kings)
    ));
    assert!(matches!(
        Position::from_fen("4k3/8/8/8/8/8/8/4K2R w X - 0 1"),
        Err(FenError::Castling(_))
    ));
    assert!(matches!(
        Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - e4 0 1"),
        Err(FenError::EnPassant(_))
    ));
    assert!(matches!(
        Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - - zero 1"),
        Err(FenError::Counter(_))
    ));
    assert!(matches!(
        Position::from_fen("4k3/4R3/8/8/8/8/8/4K3 w - - 0 1"),
        Err(FenError::OpponentInCheck)
    ));
    // The side to move may be in check.
    assert!(Position::from_fen("4k3/8/8/8/8/8/8/4K2r w - - 0 1").is_ok());
}

#[test]
fn test_fen_drops_rights_without_rook() {
    // The a1 rook is missing, so the Q right cannot survive.
    let pos = Position::from_fen("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/1NBQKBNR w KQkq - 0 1").unwrap();
    assert_eq!(pos.castling.get(Color::White, Wing::Queen), None);
    assert_eq!(pos.castling.get(Color::White, Wing::King), Some(7));
    assert!(pos.to_fen().contains(" Kkq "));
}

#[test]
fn test_shredder_castling_round_trip() {
    // Inner rook on b1 holds the queen-side right while a1 also has a rook.
    let pos = Position::from_fen("4k3/8/8/8/8/8/8/RR2K2R w BH - 0 1").unwrap();
    assert_eq!(pos.castling.get(Color::White, Wing::Queen), Some(1));
    assert_eq!(pos.castling.get(Color::White, Wing::King), Some(7));
    let fen = pos.to_fen();
    assert!(fen.contains(" KB "), "{fen}");
    assert_eq!(Position::from_fen(&fen).unwrap(), pos);
}

#[test]
fn test_find_move_promotion_defaults_to_queen() {
    let pos = Position::from_fen("8/4P1k1/8/8/8/8/8/4K3 w - - 0 1").unwrap();
    let e7 = coord_to_sq("e7").unwrap();
    let e8 = coord_to_sq("e8").unwrap();

    let mv = pos.find_move(e7, e8, None).unwrap();
    assert_eq!(mv.promo, Some(PieceKind::Queen));
    let mv = pos.find_move(e7, e8, Some(PieceKind::Knight)).unwrap();
    assert_eq!(mv.promo, Some(PieceKind::Knight));

    assert_eq!(
        pos.find_move(e7, e8, Some(PieceKind::King)),
        Err(IllegalMoveError::InvalidPromotion(PieceKind::King))
    );
    assert_eq!(
        pos.find_move(e7, e8, Some(PieceKind::Pawn)),
        Err(IllegalMoveError::InvalidPromotion(PieceKind::Pawn))
    );
}

#[test]
fn test_find_move_rejects_illegal_intents() {
    let pos = Position::startpos();
    let e2 = coord_to_sq("e2").unwrap();
    let e5 = coord_to_sq("e5").unwrap();
    let e7 = coord_to_sq("e7").unwrap();
    assert!(matches!(
        pos.find_move(e2, e5, None),
        Err(IllegalMoveError::NotLegal(_))
    ));
    assert!(matches!(
        pos.find_move(e7, e5, None),
        Err(IllegalMoveError::NoPiece(_))
    ));
    assert!(matches!(
        pos.find_move(e2, coord_to_sq("e4").unwrap(), Some(PieceKind::Queen)),
        Err(IllegalMoveError::NotLegal(_))
    ));
}

#[test]
fn test_king_onto_rook_means_castle() {
    let pos = Position::from_fen("4k3/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
    let e1 = coord_to_sq("e1").unwrap();
    let mv = pos.find_move(e1, coord_to_sq("h1").unwrap(), None).unwrap();
    assert!(mv.is_castle);
    assert_eq!(mv.to, coord_to_sq("g1").unwrap());
    let mv = pos.find_move(e1, coord_to_sq("c1").unwrap(), None).unwrap();
    assert!(mv.is_castle);
}

#[test]
fn test_rook_capture_removes_castling_right() {
    let pos = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
    let mv = pos
        .find_move(coord_to_sq("a1").unwrap(), coord_to_sq("a8").unwrap(), None)
        .unwrap();
    let next = pos.apply(mv).unwrap();
    assert_eq!(next.castling.get(Color::White, Wing::Queen), None);
    assert_eq!(next.castling.get(Color::Black, Wing::Queen), None);
    assert_eq!(next.castling.get(Color::Black, Wing::King), Some(7));
    assert_eq!(next.to_fen().split(' ').nth(2), Some("Kk"));
}
