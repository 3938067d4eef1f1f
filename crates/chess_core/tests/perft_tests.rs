use rayon::prelude::*;

use chess_core::{legal_moves, Color, Position};

/// (fen, [(depth, expected nodes)])
const CASES: &[(&str, &[(u32, u64)])] = &[
    (
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
        &[(1, 20), (2, 400), (3, 8902)],
    ),
    (
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        &[(1, 48), (2, 2039)],
    ),
    (
        "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        &[(1, 14), (2, 191), (3, 2812)],
    ),
    (
        "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
        &[(1, 6), (2, 264), (3, 9467)],
    ),
    (
        "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
        &[(1, 44), (2, 1486)],
    ),
    (
        "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
        &[(1, 46), (2, 2079)],
    ),
    // Chess960, Shredder castling field.
    (
        "bqnb1rkr/pp3ppp/3ppn2/2p5/5P2/P2P4/NPP1P1PP/BQ1BNRKR w HFhf - 2 9",
        &[(1, 21), (2, 528)],
    ),
];

fn perft(pos: &Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = legal_moves(pos);
    if depth == 1 {
        return moves.len() as u64;
    }
    moves
        .into_iter()
        .map(|mv| perft(&pos.apply(mv).expect("generated move applies"), depth - 1))
        .sum()
}

#[test]
fn perft_reference_positions() {
    CASES.par_iter().for_each(|(fen, depths)| {
        let pos = Position::from_fen(fen).expect("valid fen");
        for &(depth, expected) in depths.iter() {
            assert_eq!(perft(&pos, depth), expected, "perft({depth}) of {fen}");
        }
    });
}

#[test]
fn legal_moves_never_leave_king_attacked() {
    CASES.par_iter().for_each(|(fen, _)| {
        let pos = Position::from_fen(fen).expect("valid fen");
        let mover: Color = pos.side_to_move;
        for mv in legal_moves(&pos) {
            let next = pos.apply(mv).expect("generated move applies");
            assert!(!next.in_check(mover), "{fen}: {mv:?}");
        }
    });
}

#[test]
fn fen_round_trip_along_games() {
    CASES.par_iter().for_each(|(fen, _)| {
        let mut pos = Position::from_fen(fen).expect("valid fen");
        for _ in 0..12 {
            let exported = pos.to_fen();
            let back = Position::from_fen(&exported).expect("exported fen parses");
            assert_eq!(back, pos, "{exported}");
            let Some(mv) = legal_moves(&pos).into_iter().last() else {
                break;
            };
            pos = pos.apply(mv).expect("generated move applies");
        }
    });
}
