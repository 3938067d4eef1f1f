//! UCI line codec.
//!
//! [`UciCommand`] is what a GUI writes to an engine, [`UciMessage`] is what an
//! engine writes back. Both sides parse and print, so the same codec drives the
//! process manager and the bundled test engine.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::info::{Bound, Score, SearchInfo, Wdl};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UciParseError {
    #[error("empty line")]
    Empty,
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("`{0}` is missing its argument")]
    MissingArgument(&'static str),
    #[error("invalid number `{value}` for `{field}`")]
    InvalidNumber { field: &'static str, value: String },
    #[error("invalid score `{0}`")]
    InvalidScore(String),
}

/// How long a `go` may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchLimit {
    Depth { depth: u32 },
    MoveTime { ms: u64 },
    Nodes { nodes: u64 },
    Infinite,
    Clock {
        wtime: u64,
        btime: u64,
        winc: u64,
        binc: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    IsReady,
    SetOption { name: String, value: Option<String> },
    UciNewGame,
    /// `fen: None` means `startpos`.
    Position { fen: Option<String>, moves: Vec<String> },
    Go(SearchLimit),
    Stop,
    Quit,
}

fn number<T: std::str::FromStr>(field: &'static str, tok: Option<&str>) -> Result<T, UciParseError> {
    let tok = tok.ok_or(UciParseError::MissingArgument(field))?;
    tok.parse().map_err(|_| UciParseError::InvalidNumber {
        field,
        value: tok.to_string(),
    })
}

impl UciCommand {
    pub fn parse(line: &str) -> Result<Self, UciParseError> {
        let mut toks = line.split_whitespace();
        let head = toks.next().ok_or(UciParseError::Empty)?;
        let rest: Vec<&str> = toks.collect();
        match head {
            "uci" => Ok(UciCommand::Uci),
            "isready" => Ok(UciCommand::IsReady),
            "ucinewgame" => Ok(UciCommand::UciNewGame),
            "stop" => Ok(UciCommand::Stop),
            "quit" => Ok(UciCommand::Quit),
            "setoption" => {
                let name_at = rest
                    .iter()
                    .position(|&t| t == "name")
                    .ok_or(UciParseError::MissingArgument("name"))?;
                let value_at = rest.iter().position(|&t| t == "value");
                let name_end = value_at.unwrap_or(rest.len());
                if name_at + 1 > name_end {
                    return Err(UciParseError::MissingArgument("name"));
                }
                let name = rest[name_at + 1..name_end].join(" ");
                if name.is_empty() {
                    return Err(UciParseError::MissingArgument("name"));
                }
                let value = value_at.map(|v| rest[v + 1..].join(" "));
                Ok(UciCommand::SetOption { name, value })
            }
            "position" => {
                let moves_at = rest.iter().position(|&t| t == "moves");
                let spec = &rest[..moves_at.unwrap_or(rest.len())];
                let fen = match spec.first() {
                    Some(&"startpos") => None,
                    Some(&"fen") if spec.len() > 1 => Some(spec[1..].join(" ")),
                    _ => return Err(UciParseError::MissingArgument("position")),
                };
                let moves = moves_at
                    .map(|m| rest[m + 1..].iter().map(|s| s.to_string()).collect())
                    .unwrap_or_default();
                Ok(UciCommand::Position { fen, moves })
            }
            "go" => parse_go(&rest).map(UciCommand::Go),
            other => Err(UciParseError::Unknown(other.to_string())),
        }
    }
}

fn parse_go(toks: &[&str]) -> Result<SearchLimit, UciParseError> {
    let (mut depth, mut movetime, mut nodes) = (None, None, None);
    let (mut wtime, mut btime, mut winc, mut binc) = (None, None, 0, 0);
    let mut infinite = false;
    let mut it = toks.iter().copied();
    while let Some(tok) = it.next() {
        match tok {
            "infinite" => infinite = true,
            "depth" => depth = Some(number("depth", it.next())?),
            "movetime" => movetime = Some(number("movetime", it.next())?),
            "nodes" => nodes = Some(number("nodes", it.next())?),
            "wtime" => wtime = Some(number::<i64>("wtime", it.next())?.max(0) as u64),
            "btime" => btime = Some(number::<i64>("btime", it.next())?.max(0) as u64),
            "winc" => winc = number("winc", it.next())?,
            "binc" => binc = number("binc", it.next())?,
            "movestogo" | "mate" => {
                it.next();
            }
            _ => {}
        }
    }
    Ok(if infinite {
        SearchLimit::Infinite
    } else if let Some(ms) = movetime {
        SearchLimit::MoveTime { ms }
    } else if let Some(depth) = depth {
        SearchLimit::Depth { depth }
    } else if let Some(nodes) = nodes {
        SearchLimit::Nodes { nodes }
    } else if wtime.is_some() || btime.is_some() {
        SearchLimit::Clock {
            wtime: wtime.unwrap_or(0),
            btime: btime.unwrap_or(0),
            winc,
            binc,
        }
    } else {
        SearchLimit::Infinite
    })
}

impl fmt::Display for SearchLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SearchLimit::Depth { depth } => write!(f, "depth {depth}"),
            SearchLimit::MoveTime { ms } => write!(f, "movetime {ms}"),
            SearchLimit::Nodes { nodes } => write!(f, "nodes {nodes}"),
            SearchLimit::Infinite => f.write_str("infinite"),
            SearchLimit::Clock {
                wtime,
                btime,
                winc,
                binc,
            } => write!(f, "wtime {wtime} btime {btime} winc {winc} binc {binc}"),
        }
    }
}

impl fmt::Display for UciCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UciCommand::Uci => f.write_str("uci"),
            UciCommand::IsReady => f.write_str("isready"),
            UciCommand::SetOption { name, value } => match value {
                Some(v) => write!(f, "setoption name {name} value {v}"),
                None => write!(f, "setoption name {name}"),
            },
            UciCommand::UciNewGame => f.write_str("ucinewgame"),
            UciCommand::Position { fen, moves } => {
                match fen {
                    Some(fen) => write!(f, "position fen {fen}")?,
                    None => f.write_str("position startpos")?,
                }
                if !moves.is_empty() {
                    write!(f, " moves {}", moves.join(" "))?;
                }
                Ok(())
            }
            UciCommand::Go(limit) => write!(f, "go {limit}"),
            UciCommand::Stop => f.write_str("stop"),
            UciCommand::Quit => f.write_str("quit"),
        }
    }
}

/// An `option` declaration from the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UciOptionDecl {
    pub name: String,
    pub kind: String,
    pub default: Option<String>,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UciMessage {
    IdName(String),
    IdAuthor(String),
    UciOk,
    ReadyOk,
    Option(UciOptionDecl),
    Info(SearchInfo),
    InfoString(String),
    /// `best: None` for `(none)` or `0000`.
    BestMove { best: Option<String>, ponder: Option<String> },
    /// Anything else; engines print banners and debug chatter.
    Other(String),
}

const INFO_KEYWORDS: &[&str] = &[
    "depth",
    "seldepth",
    "time",
    "nodes",
    "pv",
    "multipv",
    "score",
    "currmove",
    "currmovenumber",
    "hashfull",
    "nps",
    "tbhits",
    "sbhits",
    "cpuload",
    "string",
    "refutation",
    "currline",
    "wdl",
];

impl UciMessage {
    pub fn parse(line: &str) -> Result<Self, UciParseError> {
        let line = line.trim();
        let mut toks = line.split_whitespace();
        let head = toks.next().ok_or(UciParseError::Empty)?;
        match head {
            "uciok" => Ok(UciMessage::UciOk),
            "readyok" => Ok(UciMessage::ReadyOk),
            "id" => {
                let key = toks.next();
                let value = toks.collect::<Vec<_>>().join(" ");
                match key {
                    Some("name") => Ok(UciMessage::IdName(value)),
                    Some("author") => Ok(UciMessage::IdAuthor(value)),
                    _ => Ok(UciMessage::Other(line.to_string())),
                }
            }
            "bestmove" => {
                let best = toks.next().ok_or(UciParseError::MissingArgument("bestmove"))?;
                let ponder = match toks.next() {
                    Some("ponder") => toks.next().map(str::to_string),
                    _ => None,
                };
                let best = match best {
                    "(none)" | "0000" => None,
                    mv => Some(mv.to_string()),
                };
                Ok(UciMessage::BestMove { best, ponder })
            }
            "option" => parse_option(&toks.collect::<Vec<_>>()).map(UciMessage::Option),
            "info" => parse_info(line, &toks.collect::<Vec<_>>()),
            _ => Ok(UciMessage::Other(line.to_string())),
        }
    }
}

fn parse_option(toks: &[&str]) -> Result<UciOptionDecl, UciParseError> {
    const KEYS: [&str; 6] = ["name", "type", "default", "min", "max", "var"];
    let field = |key: &str| -> Option<String> {
        let at = toks.iter().position(|&t| t == key)?;
        let end = toks[at + 1..]
            .iter()
            .position(|t| KEYS.contains(t))
            .map_or(toks.len(), |p| at + 1 + p);
        Some(toks[at + 1..end].join(" "))
    };
    let name = field("name").ok_or(UciParseError::MissingArgument("name"))?;
    let kind = field("type").ok_or(UciParseError::MissingArgument("type"))?;
    let min = match field("min") {
        Some(v) => Some(number("min", Some(v.as_str()))?),
        None => None,
    };
    let max = match field("max") {
        Some(v) => Some(number("max", Some(v.as_str()))?),
        None => None,
    };
    Ok(UciOptionDecl {
        name,
        kind,
        default: field("default"),
        min,
        max,
    })
}

fn parse_info(line: &str, toks: &[&str]) -> Result<UciMessage, UciParseError> {
    let mut info = SearchInfo::at_depth(0);
    let mut has_depth = false;
    let mut i = 0;
    while i < toks.len() {
        let key = toks[i];
        i += 1;
        match key {
            "depth" => {
                info.depth = number("depth", toks.get(i).copied())?;
                has_depth = true;
                i += 1;
            }
            "seldepth" => {
                info.seldepth = Some(number("seldepth", toks.get(i).copied())?);
                i += 1;
            }
            "multipv" => {
                info.multipv = number("multipv", toks.get(i).copied())?;
                i += 1;
            }
            "nodes" => {
                info.nodes = Some(number("nodes", toks.get(i).copied())?);
                i += 1;
            }
            "nps" => {
                info.nps = Some(number("nps", toks.get(i).copied())?);
                i += 1;
            }
            "time" => {
                info.time_ms = Some(number("time", toks.get(i).copied())?);
                i += 1;
            }
            "hashfull" => {
                info.hashfull = Some(number("hashfull", toks.get(i).copied())?);
                i += 1;
            }
            "score" => {
                let kind = toks.get(i).copied();
                let value = toks.get(i + 1).copied();
                info.score = Some(match kind {
                    Some("cp") => Score::Cp(number("cp", value)?),
                    Some("mate") => Score::Mate(number("mate", value)?),
                    other => return Err(UciParseError::InvalidScore(other.unwrap_or("").to_string())),
                });
                i += 2;
                match toks.get(i).copied() {
                    Some("lowerbound") => {
                        info.bound = Some(Bound::Lower);
                        i += 1;
                    }
                    Some("upperbound") => {
                        info.bound = Some(Bound::Upper);
                        i += 1;
                    }
                    _ => {}
                }
            }
            "wdl" => {
                info.wdl = Some(Wdl {
                    win: number("wdl", toks.get(i).copied())?,
                    draw: number("wdl", toks.get(i + 1).copied())?,
                    loss: number("wdl", toks.get(i + 2).copied())?,
                });
                i += 3;
            }
            "pv" => {
                while i < toks.len() && !INFO_KEYWORDS.contains(&toks[i]) {
                    info.pv.push(toks[i].to_string());
                    i += 1;
                }
            }
            "string" => {
                if has_depth {
                    break;
                }
                let text = line
                    .split_once(" string ")
                    .map(|(_, s)| s.to_string())
                    .unwrap_or_default();
                return Ok(UciMessage::InfoString(text));
            }
            "currmove" | "currmovenumber" | "tbhits" | "sbhits" | "cpuload" => i += 1,
            _ => {}
        }
    }
    if has_depth {
        if info.multipv == 0 {
            info.multipv = 1;
        }
        Ok(UciMessage::Info(info))
    } else {
        Ok(UciMessage::Other(line.to_string()))
    }
}

impl fmt::Display for UciMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UciMessage::IdName(name) => write!(f, "id name {name}"),
            UciMessage::IdAuthor(author) => write!(f, "id author {author}"),
            UciMessage::UciOk => f.write_str("uciok"),
            UciMessage::ReadyOk => f.write_str("readyok"),
            UciMessage::Option(opt) => {
                write!(f, "option name {} type {}", opt.name, opt.kind)?;
                if let Some(d) = &opt.default {
                    write!(f, " default {d}")?;
                }
                if let Some(min) = opt.min {
                    write!(f, " min {min}")?;
                }
                if let Some(max) = opt.max {
                    write!(f, " max {max}")?;
                }
                Ok(())
            }
            UciMessage::Info(info) => {
                write!(f, "info depth {}", info.depth)?;
                if let Some(sd) = info.seldepth {
                    write!(f, " seldepth {sd}")?;
                }
                write!(f, " multipv {}", info.multipv)?;
                match info.score {
                    Some(Score::Cp(cp)) => write!(f, " score cp {cp}")?,
                    Some(Score::Mate(m)) => write!(f, " score mate {m}")?,
                    None => {}
                }
                match info.bound {
                    Some(Bound::Lower) => f.write_str(" lowerbound")?,
                    Some(Bound::Upper) => f.write_str(" upperbound")?,
                    None => {}
                }
                if let Some(w) = info.wdl {
                    write!(f, " wdl {} {} {}", w.win, w.draw, w.loss)?;
                }
                if let Some(n) = info.nodes {
                    write!(f, " nodes {n}")?;
                }
                if let Some(n) = info.nps {
                    write!(f, " nps {n}")?;
                }
                if let Some(t) = info.time_ms {
                    write!(f, " time {t}")?;
                }
                if let Some(h) = info.hashfull {
                    write!(f, " hashfull {h}")?;
                }
                if !info.pv.is_empty() {
                    write!(f, " pv {}", info.pv.join(" "))?;
                }
                Ok(())
            }
            UciMessage::InfoString(s) => write!(f, "info string {s}"),
            UciMessage::BestMove { best, ponder } => {
                write!(f, "bestmove {}", best.as_deref().unwrap_or("0000"))?;
                if let Some(p) = ponder {
                    write!(f, " ponder {p}")?;
                }
                Ok(())
            }
            UciMessage::Other(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
#[path = "uci_tests.rs"]
mod uci_tests;
