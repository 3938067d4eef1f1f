use super::*;
use crate::board::Position;

fn fen(s: &str) -> Position {
    Position::from_fen(s).expect("valid fen")
}

fn count_nodes(pos: &Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    legal_moves(pos)
        .into_iter()
        .map(|mv| count_nodes(&pos.apply(mv).unwrap(), depth - 1))
        .sum()
}

#[test]
fn test_startpos_moves() {
    let pos = Position::startpos();
    let moves = legal_moves(&pos);
    // Starting position has 20 legal moves
    assert_eq!(moves.len(), 20);
}

#[test]
fn test_kiwipete_moves() {
    // Kiwipete position - complex with many move types
    let pos = fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -");
    let moves = legal_moves(&pos);
    assert_eq!(moves.len(), 48);
    assert_eq!(moves.iter().filter(|m| m.is_castle).count(), 2);
}

#[test]
fn test_startpos_depth_three() {
    assert_eq!(count_nodes(&Position::startpos(), 3), 8902);
}

#[test]
fn test_kiwipete_depth_two() {
    let pos = fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -");
    assert_eq!(count_nodes(&pos, 2), 2039);
}

#[test]
fn test_no_move_leaves_king_in_check() {
    let pos = fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -");
    for mv in legal_moves(&pos) {
        let next = pos.apply(mv).unwrap();
        assert!(!next.in_check(Color::White), "{mv:?} leaves the king attacked");
        for reply in legal_moves(&next) {
            let after = next.apply(reply).unwrap();
            assert!(!after.in_check(Color::Black));
        }
    }
}

#[test]
fn test_pinned_piece_cannot_move() {
    // The e2 knight is pinned against the king by the e8 rook.
    let pos = fen("4r1k1/8/8/8/8/8/4N3/4K3 w - - 0 1");
    assert!(legal_moves(&pos).iter().all(|m| m.from != coord_to_sq("e2").unwrap()));
}

#[test]
fn test_en_passant_expires_after_one_ply() {
    let pos = fen("4k3/8/8/8/3p4/8/4P3/4K3 w - - 0 1");
    let pos = pos
        .apply(pos.find_move(12, 28, None).unwrap()) // e2e4
        .unwrap();
    let ep = legal_moves(&pos).into_iter().filter(|m| m.is_en_passant).count();
    assert_eq!(ep, 1);

    // Black waits with the king, white waits too; the right is gone.
    let pos = pos.apply(pos.find_move(60, 59, None).unwrap()).unwrap();
    let pos = pos.apply(pos.find_move(4, 3, None).unwrap()).unwrap();
    assert!(legal_moves(&pos).iter().all(|m| !m.is_en_passant));
}

#[test]
fn test_castling_blocked_through_attacked_square() {
    // Black bishop on c4 covers f1.
    let pos = fen("4k3/8/8/8/2b5/8/8/4K2R w K - 0 1");
    assert!(legal_moves(&pos).iter().all(|m| !m.is_castle));
}

#[test]
fn test_castling_out_of_check_forbidden() {
    let pos = fen("4k3/8/8/8/8/8/4r3/R3K2R w KQ - 0 1");
    assert!(legal_moves(&pos).iter().all(|m| !m.is_castle));
}

#[test]
fn test_chess960_castle_lands_on_standard_squares() {
    // King b1, rooks a1 and h1 (Shredder field).
    let pos = fen("6k1/8/8/8/8/8/8/RK5R w HA - 0 1");
    let castles: Vec<Move> = legal_moves(&pos).into_iter().filter(|m| m.is_castle).collect();
    assert_eq!(castles.len(), 2);

    let long = castles
        .iter()
        .find(|m| m.rook_from == coord_to_sq("a1"))
        .copied()
        .unwrap();
    let next = pos.apply(long).unwrap();
    assert_eq!(next.piece_at(coord_to_sq("c1").unwrap()).unwrap().kind, PieceKind::King);
    assert_eq!(next.piece_at(coord_to_sq("d1").unwrap()).unwrap().kind, PieceKind::Rook);
    assert!(next.piece_at(coord_to_sq("a1").unwrap()).is_none());
    assert!(next.piece_at(coord_to_sq("b1").unwrap()).is_none());

    let short = castles
        .iter()
        .find(|m| m.rook_from == coord_to_sq("h1"))
        .copied()
        .unwrap();
    let next = pos.apply(short).unwrap();
    assert_eq!(next.piece_at(coord_to_sq("g1").unwrap()).unwrap().kind, PieceKind::King);
    assert_eq!(next.piece_at(coord_to_sq("f1").unwrap()).unwrap().kind, PieceKind::Rook);
    assert!(next.castling.is_empty());
}

#[test]
fn test_chess960_king_already_on_destination() {
    // King g1, rook h1: castling only moves the rook to f1.
    let pos = fen("6k1/8/8/8/8/8/8/6KR w H - 0 1");
    let castle = legal_moves(&pos).into_iter().find(|m| m.is_castle).unwrap();
    assert_eq!(castle.from, castle.to);
    let next = pos.apply(castle).unwrap();
    assert_eq!(next.piece_at(coord_to_sq("g1").unwrap()).unwrap().kind, PieceKind::King);
    assert_eq!(next.piece_at(coord_to_sq("f1").unwrap()).unwrap().kind, PieceKind::Rook);
    assert!(next.piece_at(coord_to_sq("h1").unwrap()).is_none());
}

#[test]
fn test_promotions_generated_for_each_piece() {
    let pos = fen("8/4P1k1/8/8/8/8/8/4K3 w - - 0 1");
    let promos: Vec<PieceKind> = legal_moves(&pos).into_iter().filter_map(|m| m.promo).collect();
    assert_eq!(promos.len(), 4);
    assert!(!promos.contains(&PieceKind::King));
    assert!(!promos.contains(&PieceKind::Pawn));
}
