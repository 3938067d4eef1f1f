//! A deterministic UCI engine.
//!
//! Moves are ranked one ply deep (mate, then material, then UCI text), so the
//! same position always yields the same `bestmove`. [`EngineBehavior`] can make
//! the engine misbehave on purpose, which is how the process manager's failure
//! handling gets exercised.

use std::io;

use arena_core::{Score, SearchInfo, SearchLimit, UciCommand, UciMessage, UciOptionDecl};
use chess_core::{
    move_to_uci, play_uci_moves, CastlingNotation, Color, Move, PieceKind, Position,
};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

pub const ENGINE_NAME: &str = "ArenaUci";
const DEFAULT_DEPTH: u32 = 3;
const MAX_DEPTH: u32 = 32;

/// Knobs for fault injection.
#[derive(Debug, Clone)]
pub struct EngineBehavior {
    pub name: String,
    /// Depth reported for searches without a depth limit.
    pub depth: u32,
    /// Close the pipes instead of answering `go`.
    pub crash_on_go: bool,
    /// Never answer `isready`.
    pub ignore_isready: bool,
    /// Accept `go` but never send `bestmove`, not even after `stop`.
    pub hang_on_go: bool,
}

impl Default for EngineBehavior {
    fn default() -> Self {
        Self {
            name: ENGINE_NAME.to_string(),
            depth: DEFAULT_DEPTH,
            crash_on_go: false,
            ignore_isready: false,
            hang_on_go: false,
        }
    }
}

fn piece_value(kind: PieceKind) -> i32 {
    match kind {
        PieceKind::Pawn => 100,
        PieceKind::Knight => 300,
        PieceKind::Bishop => 320,
        PieceKind::Rook => 500,
        PieceKind::Queen => 900,
        PieceKind::King => 0,
    }
}

fn material(pos: &Position, side: Color) -> i32 {
    let own: i32 = pos.pieces(side).map(|(_, p)| piece_value(p.kind)).sum();
    let theirs: i32 = pos.pieces(side.other()).map(|(_, p)| piece_value(p.kind)).sum();
    own - theirs
}

struct Engine {
    behavior: EngineBehavior,
    pos: Position,
    chess960: bool,
    multipv: u32,
}

impl Engine {
    fn new(behavior: EngineBehavior) -> Self {
        Self {
            behavior,
            pos: Position::startpos(),
            chess960: false,
            multipv: 1,
        }
    }

    fn notation(&self) -> CastlingNotation {
        if self.chess960 {
            CastlingNotation::KingTakesRook
        } else {
            CastlingNotation::Standard
        }
    }

    fn set_option(&mut self, name: &str, value: Option<&str>) {
        match name {
            "UCI_Chess960" => self.chess960 = value == Some("true"),
            "MultiPV" => {
                self.multipv = value.and_then(|v| v.parse().ok()).unwrap_or(1).clamp(1, 16);
            }
            _ => {}
        }
    }

    fn set_position(&mut self, fen: Option<&str>, moves: &[String]) -> Result<(), String> {
        let start = match fen {
            Some(fen) => Position::from_fen(fen).map_err(|e| e.to_string())?,
            None => Position::startpos(),
        };
        let played =
            play_uci_moves(&start, moves.iter().map(String::as_str)).map_err(|e| e.to_string())?;
        self.pos = played.last().map(|(_, p)| p.clone()).unwrap_or(start);
        Ok(())
    }

    /// Legal moves, best first.
    fn ranked(&self) -> Vec<(Move, Score, String)> {
        let mover = self.pos.side_to_move;
        let mut out: Vec<(Move, Score, i32, String)> = self
            .pos
            .legal_moves()
            .into_iter()
            .filter_map(|mv| {
                let next = self.pos.apply(mv).ok()?;
                let uci = move_to_uci(&mv, self.notation());
                if next.in_check(next.side_to_move) && next.legal_moves().is_empty() {
                    return Some((mv, Score::Mate(1), i32::MAX, uci));
                }
                let cp = material(&next, mover) + if next.in_check(next.side_to_move) { 5 } else { 0 };
                Some((mv, Score::Cp(cp), cp, uci))
            })
            .collect();
        out.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.3.cmp(&b.3)));
        out.into_iter().map(|(mv, s, _, u)| (mv, s, u)).collect()
    }

    fn search(&self, limit: SearchLimit) -> (Vec<SearchInfo>, Option<String>) {
        let depth = match limit {
            SearchLimit::Depth { depth } => depth.clamp(1, MAX_DEPTH),
            _ => self.behavior.depth.max(1),
        };
        let ranked = self.ranked();
        let mut infos = Vec::new();
        for d in 1..=depth {
            for (k, (_, score, uci)) in ranked.iter().take(self.multipv as usize).enumerate() {
                let mut info = SearchInfo::at_depth(d);
                info.multipv = k as u32 + 1;
                info.score = Some(*score);
                info.nodes = Some(d as u64 * ranked.len() as u64);
                info.time_ms = Some(0);
                info.pv = vec![uci.clone()];
                infos.push(info);
            }
        }
        (infos, ranked.first().map(|(_, _, uci)| uci.clone()))
    }
}

async fn send<W: AsyncWrite + Unpin>(writer: &mut W, msg: &UciMessage) -> io::Result<()> {
    writer.write_all(format!("{msg}\n").as_bytes()).await
}

/// Speaks UCI over `reader`/`writer` until `quit` or end of input.
pub async fn serve<R, W>(reader: R, mut writer: W, behavior: EngineBehavior) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut engine = Engine::new(behavior);
    // Best move of a running `go infinite`, released by `stop`.
    let mut pending: Option<Option<String>> = None;

    while let Some(line) = lines.next_line().await? {
        let cmd = match UciCommand::parse(&line) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::debug!(%line, error = %e, "ignoring input");
                continue;
            }
        };
        match cmd {
            UciCommand::Uci => {
                send(&mut writer, &UciMessage::IdName(engine.behavior.name.clone())).await?;
                send(&mut writer, &UciMessage::IdAuthor("arena".to_string())).await?;
                for (name, kind, default, range) in [
                    ("MultiPV", "spin", "1", Some((1, 16))),
                    ("UCI_Chess960", "check", "false", None),
                    ("UCI_LimitStrength", "check", "false", None),
                    ("UCI_Elo", "spin", "1500", Some((100, 3000))),
                ] {
                    let decl = UciOptionDecl {
                        name: name.to_string(),
                        kind: kind.to_string(),
                        default: Some(default.to_string()),
                        min: range.map(|r| r.0),
                        max: range.map(|r| r.1),
                    };
                    send(&mut writer, &UciMessage::Option(decl)).await?;
                }
                send(&mut writer, &UciMessage::UciOk).await?;
            }
            UciCommand::IsReady => {
                if !engine.behavior.ignore_isready {
                    send(&mut writer, &UciMessage::ReadyOk).await?;
                }
            }
            UciCommand::SetOption { name, value } => engine.set_option(&name, value.as_deref()),
            UciCommand::UciNewGame => engine.pos = Position::startpos(),
            UciCommand::Position { fen, moves } => {
                if let Err(e) = engine.set_position(fen.as_deref(), &moves) {
                    tracing::warn!(error = %e, "rejected position");
                }
            }
            UciCommand::Go(limit) => {
                if engine.behavior.crash_on_go {
                    return Ok(());
                }
                if engine.behavior.hang_on_go {
                    continue;
                }
                let (infos, best) = engine.search(limit);
                for info in infos {
                    send(&mut writer, &UciMessage::Info(info)).await?;
                }
                if limit == SearchLimit::Infinite {
                    pending = Some(best);
                } else {
                    send(&mut writer, &UciMessage::BestMove { best, ponder: None }).await?;
                }
            }
            UciCommand::Stop => {
                if let Some(best) = pending.take() {
                    send(&mut writer, &UciMessage::BestMove { best, ponder: None }).await?;
                }
            }
            UciCommand::Quit => break,
        }
        writer.flush().await?;
    }
    Ok(())
}
