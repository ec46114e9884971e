use serde::{Deserialize, Serialize};

/// Engine tunables. The engine is fully usable with [`EngineConfig::default`];
/// this only exists for embedders that want to adjust tolerances without
/// recompiling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Tolerance for the probability-sum invariants and for treating a
    /// distribution entry as "certain" (mass within this of 1).
    pub probability_epsilon: f64,
    /// Split ratio used when a move omits one explicitly.
    pub default_split_ratio: f64,
    /// Upper bound on the number of joint-state entries a single blocker
    /// enumeration may produce before it is rejected as `InvalidState`
    /// rather than silently built.
    pub max_blocker_enumeration: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            probability_epsilon: 1e-6,
            default_split_ratio: 0.5,
            max_blocker_enumeration: 64,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
