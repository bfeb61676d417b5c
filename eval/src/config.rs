//! Game configuration merging.
//!
//! Applies case-specific overrides to the default game configuration.

use anyhow::Result;
use mapworld::io::config::GameConfig;

use crate::case::CaseConfig;

/// Apply case configuration overrides to the base game config.
pub fn apply_case_config(mut base: GameConfig, overrides: &CaseConfig) -> Result<GameConfig> {
    if let Some(max_turns) = overrides.max_turns {
        base.max_turns = max_turns;
    }
    if let Some(reprompt) = overrides.reprompt {
        base.reprompt = reprompt;
    }
    if let Some(detect_loops) = overrides.detect_loops {
        base.detect_loops = detect_loops;
    }
    if let Some(graph_reasoning) = overrides.graph_reasoning {
        base.graph_reasoning = graph_reasoning;
    }
    if let Some(move_regex) = &overrides.move_regex {
        base.move_regex = move_regex.clone();
    }
    if let Some(stop_regex) = &overrides.stop_regex {
        base.stop_regex = stop_regex.clone();
    }
    if let Some(generation) = &overrides.generation {
        base.generation = generation.clone();
    }
    base.validate()?;
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapworld::core::generator::GenerationPolicy;

    #[test]
    fn preserves_base_when_no_override() {
        let base = GameConfig {
            detect_loops: true,
            ..GameConfig::default()
        };
        let merged = apply_case_config(base.clone(), &CaseConfig::default()).expect("merge");
        assert_eq!(merged, base);
    }

    #[test]
    fn applies_overrides() {
        let overrides = CaseConfig {
            max_turns: Some(6),
            reprompt: Some(true),
            generation: Some(GenerationPolicy {
                target_nodes: 5,
                ..GenerationPolicy::default()
            }),
            ..CaseConfig::default()
        };
        let merged = apply_case_config(GameConfig::default(), &overrides).expect("merge");
        assert_eq!(merged.max_turns, 6);
        assert!(merged.reprompt);
        assert!(!merged.detect_loops);
        assert_eq!(merged.generation.target_nodes, 5);
    }

    #[test]
    fn rejects_zero_turns() {
        let overrides = CaseConfig {
            max_turns: Some(0),
            ..CaseConfig::default()
        };
        assert!(apply_case_config(GameConfig::default(), &overrides).is_err());
    }
}
