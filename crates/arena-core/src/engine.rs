//! Configured engine identities.

use serde::{Deserialize, Serialize};

/// Rating at or above which strength limiting is a no-op.
pub const UNLIMITED_ELO: u32 = 3000;
/// Lowest rating the node budget formula accepts.
pub const MIN_ELO: u32 = 100;

/// A configured engine binary. Immutable once a match has started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineIdentity {
    /// Display name, also the key in standings.
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Approximate playing strength.
    #[serde(default)]
    pub rating: Option<u32>,
    /// Ask the engine to play at `rating` via `UCI_LimitStrength`.
    #[serde(default)]
    pub limit_strength: bool,
    /// Extra `setoption` overrides in the order they are applied.
    #[serde(default)]
    pub options: Vec<(String, String)>,
}

impl EngineIdentity {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            rating: None,
            limit_strength: false,
            options: Vec::new(),
        }
    }

    /// Copy of this identity playing at a fixed rating.
    pub fn limited(&self, elo: u32) -> Self {
        Self {
            rating: Some(elo),
            limit_strength: true,
            ..self.clone()
        }
    }

    /// The `setoption` pairs to send after the handshake.
    pub fn uci_options(&self) -> Vec<(String, String)> {
        let mut out = self.options.clone();
        if let Some(elo) = self.strength_elo() {
            out.push(("UCI_LimitStrength".to_string(), "true".to_string()));
            out.push(("UCI_Elo".to_string(), elo.to_string()));
        }
        out
    }

    /// Node budget per move when strength is limited, `None` when unlimited.
    pub fn node_budget(&self) -> Option<u64> {
        self.strength_elo().and_then(node_budget)
    }

    fn strength_elo(&self) -> Option<u32> {
        match (self.limit_strength, self.rating) {
            (true, Some(elo)) => Some(elo),
            _ => None,
        }
    }
}

/// `10^((elo - 1200) / 600 + 3)` nodes, with `elo` clamped below at [`MIN_ELO`].
pub fn node_budget(elo: u32) -> Option<u64> {
    if elo >= UNLIMITED_ELO {
        return None;
    }
    let elo = elo.max(MIN_ELO) as f64;
    let exponent = (elo - 1200.0) / 600.0 + 3.0;
    Some(10f64.powf(exponent).round().max(1.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_budget_curve() {
        assert_eq!(node_budget(1200), Some(1000));
        assert_eq!(node_budget(1800), Some(10_000));
        assert_eq!(node_budget(2400), Some(100_000));
        // Clamped at the bottom.
        assert_eq!(node_budget(0), node_budget(MIN_ELO));
        assert_eq!(node_budget(UNLIMITED_ELO), None);
        assert_eq!(node_budget(3200), None);
    }

    #[test]
    fn test_uci_options_include_strength() {
        let mut id = EngineIdentity::new("fish", "/usr/bin/fish");
        id.options.push(("Hash".to_string(), "64".to_string()));
        assert_eq!(id.uci_options().len(), 1);
        assert_eq!(id.node_budget(), None);

        let weak = id.limited(1500);
        let opts = weak.uci_options();
        assert_eq!(opts[0], ("Hash".to_string(), "64".to_string()));
        assert!(opts.contains(&("UCI_LimitStrength".to_string(), "true".to_string())));
        assert!(opts.contains(&("UCI_Elo".to_string(), "1500".to_string())));
        assert!(weak.node_budget().is_some());
    }
}
