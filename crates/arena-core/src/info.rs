use serde::{Deserialize, Serialize};

/// Engine evaluation from the side to move's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Score {
    Cp(i32),
    /// Moves to mate; negative when the side to move is getting mated.
    Mate(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    Lower,
    Upper,
}

/// Win/draw/loss expectation in permille.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wdl {
    pub win: u32,
    pub draw: u32,
    pub loss: u32,
}

/// One parsed `info` line that carried a depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchInfo {
    pub depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seldepth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<Score>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bound: Option<Bound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wdl: Option<Wdl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nps: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<u64>,
    /// 1-based line index; 1 when the engine does not report MultiPV.
    pub multipv: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hashfull: Option<u32>,
    /// Principal variation in UCI notation.
    #[serde(default)]
    pub pv: Vec<String>,
}

impl SearchInfo {
    pub fn at_depth(depth: u32) -> Self {
        Self {
            depth,
            seldepth: None,
            score: None,
            bound: None,
            wdl: None,
            nodes: None,
            nps: None,
            time_ms: None,
            multipv: 1,
            hashfull: None,
            pv: Vec::new(),
        }
    }

    pub fn best_move(&self) -> Option<&str> {
        self.pv.first().map(String::as_str)
    }
}
