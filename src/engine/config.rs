use serde::{Deserialize, Serialize};

use crate::agent::AgentStats;
use crate::ai::FsmConfig;
use crate::generation::ArenaParams;

/// Top-level configuration for an arena core instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub arena: ArenaParams,
    pub agent: AgentStats,
    pub fsm: FsmConfig,
    pub agent_count: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            arena: ArenaParams::default(),
            agent: AgentStats::default(),
            fsm: FsmConfig::default(),
            agent_count: 4,
        }
    }
}

impl CoreConfig {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_json_roundtrip() {
        let config = CoreConfig::default();
        let json = config.to_json();
        assert!(!json.is_empty());
        let restored = CoreConfig::from_json(&json).unwrap();
        assert_eq!(restored.arena, config.arena);
        assert_eq!(restored.agent, config.agent);
        assert_eq!(restored.agent_count, config.agent_count);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(CoreConfig::from_json("not json").is_none());
    }
}
