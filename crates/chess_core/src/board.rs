use crate::error::{FenError, IllegalMoveError};
use crate::movegen::legal_moves;
use crate::types::*;
use crate::uci::{move_to_uci, CastlingNotation};

pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Wing {
    King,
    Queen,
}

impl Wing {
    pub fn idx(self) -> usize {
        match self {
            Wing::King => 0,
            Wing::Queen => 1,
        }
    }
    /// Files the king and rook land on after castling to this wing.
    pub fn destination_files(self) -> (i8, i8) {
        match self {
            Wing::King => (6, 5),
            Wing::Queen => (2, 3),
        }
    }
}

/// Castling rights stored as the start file of each castling rook.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CastlingRights {
    rooks: [[Option<u8>; 2]; 2], // [color][wing]
}

impl CastlingRights {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        let mut rights = Self::none();
        for c in [Color::White, Color::Black] {
            rights.set(c, Wing::King, Some(7));
            rights.set(c, Wing::Queen, Some(0));
        }
        rights
    }

    pub fn get(&self, c: Color, wing: Wing) -> Option<u8> {
        self.rooks[c.idx()][wing.idx()]
    }

    pub fn set(&mut self, c: Color, wing: Wing, file: Option<u8>) {
        self.rooks[c.idx()][wing.idx()] = file;
    }

    pub fn clear_color(&mut self, c: Color) {
        self.rooks[c.idx()] = [None, None];
    }

    pub fn is_empty(&self) -> bool {
        self.rooks.iter().flatten().all(Option::is_none)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Position {
    pub board: [Option<Piece>; 64],
    pub side_to_move: Color,
    pub castling: CastlingRights,
    pub en_passant: Option<u8>, // square behind a pawn that just advanced 2
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl Position {
    pub fn empty() -> Self {
        Position {
            board: [None; 64],
            side_to_move: Color::White,
            castling: CastlingRights::none(),
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    pub fn startpos() -> Self {
        use PieceKind::*;
        Self::from_back_rank([Rook, Knight, Bishop, Queen, King, Bishop, Knight, Rook])
    }

    /// Builds a start position from a white back-rank arrangement, mirrored for black.
    /// Castling rights go to the outermost rooks on each side of the king.
    pub fn from_back_rank(back: [PieceKind; 8]) -> Self {
        let mut p = Position::empty();
        for f in 0..8 {
            p.board[8 + f] = Some(Piece::new(Color::White, PieceKind::Pawn));
            p.board[48 + f] = Some(Piece::new(Color::Black, PieceKind::Pawn));
        }
        for (f, &kind) in back.iter().enumerate() {
            p.board[f] = Some(Piece::new(Color::White, kind));
            p.board[56 + f] = Some(Piece::new(Color::Black, kind));
        }
        for c in [Color::White, Color::Black] {
            for wing in [Wing::King, Wing::Queen] {
                let file = p.outermost_rook(c, wing);
                p.castling.set(c, wing, file);
            }
        }
        p
    }

    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(FenError::MissingFields(parts.len()));
        }

        let mut p = Position::empty();
        p.parse_board(parts[0])?;

        p.side_to_move = match parts[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(FenError::SideToMove(other.to_string())),
        };

        let kings = |c: Color| {
            p.board
                .iter()
                .flatten()
                .filter(|pc| pc.color == c && pc.kind == PieceKind::King)
                .count()
        };
        if kings(Color::White) != 1 || kings(Color::Black) != 1 {
            return Err(FenError::Kings);
        }
        let pawn_on_edge = (0..8u8).chain(56..64).any(|s| {
            p.piece_at(s)
                .is_some_and(|pc| pc.kind == PieceKind::Pawn)
        });
        if pawn_on_edge {
            return Err(FenError::PawnOnBackRank);
        }

        p.parse_castling(parts[2])?;

        p.en_passant = match parts[3] {
            "-" => None,
            s => {
                let ep = coord_to_sq(s).ok_or_else(|| FenError::EnPassant(s.to_string()))?;
                let expected_rank = match p.side_to_move {
                    Color::White => 5,
                    Color::Black => 2,
                };
                if rank_of(ep) != expected_rank {
                    return Err(FenError::EnPassant(s.to_string()));
                }
                Some(ep)
            }
        };

        let counter = |s: Option<&&str>, default: u32| -> Result<u32, FenError> {
            match s {
                None => Ok(default),
                Some(s) => s.parse().map_err(|_| FenError::Counter(s.to_string())),
            }
        };
        p.halfmove_clock = counter(parts.get(4), 0)?;
        p.fullmove_number = counter(parts.get(5), 1)?.max(1);

        if p.in_check(p.side_to_move.other()) {
            return Err(FenError::OpponentInCheck);
        }
        Ok(p)
    }

    fn parse_board(&mut self, board_part: &str) -> Result<(), FenError> {
        let ranks: Vec<&str> = board_part.split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::Board(format!("expected 8 ranks, found {}", ranks.len())));
        }
        for (rank_idx, rank_str) in ranks.iter().enumerate() {
            let mut file: i8 = 0;
            let rank: i8 = 7 - rank_idx as i8; // FEN lists rank 8 .. 1
            for ch in rank_str.chars() {
                if let Some(d) = ch.to_digit(10) {
                    file += d as i8;
                } else {
                    let pc = Piece::from_fen_char(ch)
                        .ok_or_else(|| FenError::Board(format!("unknown piece `{ch}`")))?;
                    let s = sq(file, rank)
                        .ok_or_else(|| FenError::Board(format!("rank {} overflows", rank + 1)))?;
                    self.board[s as usize] = Some(pc);
                    file += 1;
                }
                if file > 8 {
                    return Err(FenError::Board(format!("rank {} overflows", rank + 1)));
                }
            }
            if file != 8 {
                return Err(FenError::Board(format!("rank {} is short", rank + 1)));
            }
        }
        Ok(())
    }

    /// Accepts `KQkq`, Shredder file letters and X-FEN. Rights whose rook is gone are dropped.
    fn parse_castling(&mut self, field: &str) -> Result<(), FenError> {
        if field == "-" {
            return Ok(());
        }
        for ch in field.chars() {
            let color = if ch.is_ascii_uppercase() {
                Color::White
            } else {
                Color::Black
            };
            let Some(king) = self.king_sq(color) else {
                continue;
            };
            if rank_of(king) != color.back_rank() {
                continue;
            }
            let (wing, file) = match ch.to_ascii_lowercase() {
                'k' => (Wing::King, self.outermost_rook(color, Wing::King)),
                'q' => (Wing::Queen, self.outermost_rook(color, Wing::Queen)),
                f @ 'a'..='h' => {
                    let file = f as u8 - b'a';
                    let wing = if (file as i8) > file_of(king) {
                        Wing::King
                    } else {
                        Wing::Queen
                    };
                    let home = sq(file as i8, color.back_rank());
                    let has_rook = home
                        .and_then(|s| self.piece_at(s))
                        .is_some_and(|pc| pc == Piece::new(color, PieceKind::Rook));
                    (wing, has_rook.then_some(file))
                }
                _ => return Err(FenError::Castling(field.to_string())),
            };
            if file.is_some() {
                self.castling.set(color, wing, file);
            }
        }
        Ok(())
    }

    /// File of the rook furthest from the king on the given wing of the back rank.
    fn outermost_rook(&self, c: Color, wing: Wing) -> Option<u8> {
        let king = self.king_sq(c)?;
        let rank = c.back_rank();
        if rank_of(king) != rank {
            return None;
        }
        let kf = file_of(king);
        let is_rook = |f: i8| {
            sq(f, rank)
                .and_then(|s| self.piece_at(s))
                .is_some_and(|pc| pc == Piece::new(c, PieceKind::Rook))
        };
        let found = match wing {
            Wing::King => (kf + 1..8).rev().find(|&f| is_rook(f)),
            Wing::Queen => (0..kf).find(|&f| is_rook(f)),
        };
        found.map(|f| f as u8)
    }

    pub fn to_fen(&self) -> String {
        let mut out = String::with_capacity(90);
        for rank in (0..8).rev() {
            let mut empty = 0;
            for file in 0..8 {
                match self.board[(rank * 8 + file) as usize] {
                    Some(pc) => {
                        if empty > 0 {
                            out.push_str(&empty.to_string());
                            empty = 0;
                        }
                        out.push(pc.to_fen_char());
                    }
                    None => empty += 1,
                }
            }
            if empty > 0 {
                out.push_str(&empty.to_string());
            }
            if rank > 0 {
                out.push('/');
            }
        }

        out.push(' ');
        out.push(match self.side_to_move {
            Color::White => 'w',
            Color::Black => 'b',
        });

        out.push(' ');
        let castling = self.castling_field();
        if castling.is_empty() {
            out.push('-');
        } else {
            out.push_str(&castling);
        }

        out.push(' ');
        match self.en_passant {
            Some(s) => out.push_str(&sq_to_coord(s)),
            None => out.push('-'),
        }
        out.push_str(&format!(" {} {}", self.halfmove_clock, self.fullmove_number));
        out
    }

    fn castling_field(&self) -> String {
        let mut s = String::new();
        for c in [Color::White, Color::Black] {
            for wing in [Wing::King, Wing::Queen] {
                let Some(file) = self.castling.get(c, wing) else {
                    continue;
                };
                let ch = if self.outermost_rook(c, wing) == Some(file) {
                    match wing {
                        Wing::King => 'k',
                        Wing::Queen => 'q',
                    }
                } else {
                    (b'a' + file) as char
                };
                s.push(match c {
                    Color::White => ch.to_ascii_uppercase(),
                    Color::Black => ch,
                });
            }
        }
        s
    }

    pub fn king_sq(&self, c: Color) -> Option<u8> {
        (0..64u8).find(|&s| self.board[s as usize] == Some(Piece::new(c, PieceKind::King)))
    }

    pub fn piece_at(&self, sq: u8) -> Option<Piece> {
        self.board[sq as usize]
    }
    pub fn set_piece(&mut self, sq: u8, pc: Option<Piece>) {
        self.board[sq as usize] = pc;
    }

    pub fn pieces(&self, c: Color) -> impl Iterator<Item = (u8, Piece)> + '_ {
        (0..64u8).filter_map(move |s| match self.board[s as usize] {
            Some(pc) if pc.color == c => Some((s, pc)),
            _ => None,
        })
    }

    pub fn in_check(&self, c: Color) -> bool {
        match self.king_sq(c) {
            Some(k) => self.is_square_attacked(k, c.other()),
            None => false,
        }
    }

    pub fn is_square_attacked(&self, target: u8, by: Color) -> bool {
        let tf = file_of(target);
        let tr = rank_of(target);
        let holds = |df: i8, dr: i8, kinds: &[PieceKind]| {
            sq(tf + df, tr + dr)
                .and_then(|s| self.piece_at(s))
                .is_some_and(|pc| pc.color == by && kinds.contains(&pc.kind))
        };

        // A pawn attacks diagonally forward, so look one rank behind the target.
        let back = -by.pawn_dir();
        if holds(-1, back, &[PieceKind::Pawn]) || holds(1, back, &[PieceKind::Pawn]) {
            return true;
        }
        if KNIGHT_DELTAS
            .iter()
            .any(|&(df, dr)| holds(df, dr, &[PieceKind::Knight]))
        {
            return true;
        }
        if KING_DELTAS
            .iter()
            .any(|&(df, dr)| holds(df, dr, &[PieceKind::King]))
        {
            return true;
        }

        let slides = |dirs: &[(i8, i8)], kinds: &[PieceKind]| {
            dirs.iter().any(|&(df, dr)| {
                let (mut f, mut r) = (tf + df, tr + dr);
                while let Some(s) = sq(f, r) {
                    if let Some(pc) = self.piece_at(s) {
                        return pc.color == by && kinds.contains(&pc.kind);
                    }
                    f += df;
                    r += dr;
                }
                false
            })
        };
        slides(&DIAGONALS, &[PieceKind::Bishop, PieceKind::Queen])
            || slides(&ORTHOGONALS, &[PieceKind::Rook, PieceKind::Queen])
    }

    pub fn legal_moves(&self) -> Vec<Move> {
        legal_moves(self)
    }

    /// Plays a move from the legal set, returning the successor position.
    pub fn apply(&self, mv: Move) -> Result<Position, IllegalMoveError> {
        let legal = self
            .legal_moves()
            .into_iter()
            .find(|m| {
                m.from == mv.from
                    && m.to == mv.to
                    && m.promo == mv.promo
                    && m.is_castle == mv.is_castle
            })
            .ok_or_else(|| IllegalMoveError::NotLegal(move_to_uci(&mv, CastlingNotation::Standard)))?;
        let mut next = self.clone();
        next.play_unchecked(legal);
        Ok(next)
    }

    /// Resolves a move intent against the legal set.
    ///
    /// A missing promotion piece defaults to a queen. A king moved onto its own
    /// castling rook is read as a castle.
    pub fn find_move(
        &self,
        from: u8,
        to: u8,
        promo: Option<PieceKind>,
    ) -> Result<Move, IllegalMoveError> {
        if let Some(kind @ (PieceKind::King | PieceKind::Pawn)) = promo {
            return Err(IllegalMoveError::InvalidPromotion(kind));
        }
        let mover = match self.piece_at(from) {
            Some(pc) if pc.color == self.side_to_move => pc,
            _ => return Err(IllegalMoveError::NoPiece(sq_to_coord(from))),
        };
        let not_legal = || {
            let mut txt = format!("{}{}", sq_to_coord(from), sq_to_coord(to));
            if let Some(p) = promo {
                txt.push(p.to_char());
            }
            IllegalMoveError::NotLegal(txt)
        };

        let onto_own_rook = mover.kind == PieceKind::King
            && self.piece_at(to) == Some(Piece::new(mover.color, PieceKind::Rook));
        let moves = self.legal_moves();
        if onto_own_rook {
            return moves
                .into_iter()
                .find(|m| m.is_castle && m.from == from && m.rook_from == Some(to))
                .ok_or_else(not_legal);
        }

        let candidates: Vec<Move> = moves
            .into_iter()
            .filter(|m| m.from == from && m.to == to)
            .collect();
        if candidates.iter().any(Move::is_promotion) {
            let want = promo.unwrap_or(PieceKind::Queen);
            return candidates
                .into_iter()
                .find(|m| m.promo == Some(want))
                .ok_or_else(not_legal);
        }
        if promo.is_some() {
            return Err(not_legal());
        }
        // A Chess960 king step can share from/to with a castle; the plain step wins.
        candidates
            .iter()
            .find(|m| !m.is_castle)
            .or_else(|| candidates.first())
            .copied()
            .ok_or_else(not_legal)
    }

    /// Plays a pseudo-legal move in place. Callers guarantee the move came from movegen.
    pub(crate) fn play_unchecked(&mut self, mv: Move) {
        let Some(moved) = self.piece_at(mv.from) else {
            return;
        };
        let us = moved.color;
        let them = us.other();
        self.en_passant = None;

        if mv.is_castle {
            if let Some(rook_from) = mv.rook_from {
                let wing = if file_of(rook_from) > file_of(mv.from) {
                    Wing::King
                } else {
                    Wing::Queen
                };
                let (_, rook_file) = wing.destination_files();
                self.set_piece(mv.from, None);
                self.set_piece(rook_from, None);
                self.set_piece(mv.to, Some(moved));
                if let Some(rook_to) = sq(rook_file, us.back_rank()) {
                    self.set_piece(rook_to, Some(Piece::new(us, PieceKind::Rook)));
                }
            }
            self.castling.clear_color(us);
            self.halfmove_clock += 1;
            self.finish_turn();
            return;
        }

        let mut captured = self.piece_at(mv.to);
        if mv.is_en_passant {
            if let Some(cs) = sq(file_of(mv.to), rank_of(mv.from)) {
                captured = self.piece_at(cs);
                self.set_piece(cs, None);
            }
        }

        self.set_piece(mv.from, None);
        let placed = match (moved.kind, mv.promo) {
            (PieceKind::Pawn, Some(kind)) => Piece::new(us, kind),
            _ => moved,
        };
        self.set_piece(mv.to, Some(placed));

        // Castling rights: king or rook leaving home, or a rook captured at home.
        if moved.kind == PieceKind::King {
            self.castling.clear_color(us);
        }
        for (color, square) in [(us, mv.from), (them, mv.to)] {
            if rank_of(square) != color.back_rank() {
                continue;
            }
            for wing in [Wing::King, Wing::Queen] {
                if self.castling.get(color, wing) == Some(file_of(square) as u8) {
                    self.castling.set(color, wing, None);
                }
            }
        }

        if moved.kind == PieceKind::Pawn && (rank_of(mv.to) - rank_of(mv.from)).abs() == 2 {
            self.en_passant = sq(file_of(mv.from), (rank_of(mv.from) + rank_of(mv.to)) / 2);
        }

        self.halfmove_clock = if moved.kind == PieceKind::Pawn || captured.is_some() {
            0
        } else {
            self.halfmove_clock + 1
        };
        self.finish_turn();
    }

    fn finish_turn(&mut self) {
        if self.side_to_move == Color::Black {
            self.fullmove_number += 1;
        }
        self.side_to_move = self.side_to_move.other();
    }
}

pub(crate) const KNIGHT_DELTAS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (-1, 2),
    (-2, 1),
    (1, -2),
    (2, -1),
    (-1, -2),
    (-2, -1),
];
pub(crate) const KING_DELTAS: [(i8, i8); 8] = [
    (1, 1),
    (1, 0),
    (1, -1),
    (0, 1),
    (0, -1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];
pub(crate) const DIAGONALS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];
pub(crate) const ORTHOGONALS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

#[cfg(test)]
#[path = "board_tests.rs"]
mod board_tests;
