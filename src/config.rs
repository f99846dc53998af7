use crate::error::FatalError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Engine limits and seeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of snapshots kept in the undo stack.
    /// Oldest snapshots are dropped first.
    pub history_limit: usize,

    /// Largest count accepted by the `repeat` builtin.
    pub max_repeat: i64,

    /// First id handed out by a fresh allocator.
    pub id_seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_limit: 128,
            max_repeat: 16,
            id_seed: 1,
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FatalError> {
        let data = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&data)?;
        if config.history_limit == 0 {
            return Err(FatalError::Invariant(
                "history_limit must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}
