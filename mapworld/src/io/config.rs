//! Game configuration (`mapworld.toml`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::action::{ActionGrammar, DEFAULT_MOVE_REGEX, DEFAULT_STOP_REGEX};
use crate::core::game_master::EpisodeRules;
use crate::core::generator::GenerationPolicy;
use crate::core::similarity::MAX_REASONING_NODES;

/// Game configuration (TOML).
///
/// Intended to be edited by humans. Missing fields fall back to defaults, so
/// an empty file is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GameConfig {
    /// Successful moves allowed before the episode ends as turn-limited.
    pub max_turns: u32,

    /// Re-issue a rejected turn once (per round) before aborting.
    pub reprompt: bool,

    /// Warn the mover when it walks back and forth.
    pub detect_loops: bool,

    /// Ask the mover to report the map it has explored as a JSON block.
    pub graph_reasoning: bool,

    /// Move pattern; capture group 1 is the direction.
    pub move_regex: String,

    pub stop_regex: String,

    pub generation: GenerationPolicy,

    pub prompts: PromptOverrides,
}

/// Replacement templates; `None` keeps the bundled default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PromptOverrides {
    pub initial: Option<String>,
    pub turn: Option<String>,
    pub reprompt: Option<String>,
    pub loop_warning: Option<String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_turns: 20,
            reprompt: false,
            detect_loops: false,
            graph_reasoning: false,
            move_regex: DEFAULT_MOVE_REGEX.to_string(),
            stop_regex: DEFAULT_STOP_REGEX.to_string(),
            generation: GenerationPolicy::default(),
            prompts: PromptOverrides::default(),
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 {
            return Err(anyhow!("max_turns must be > 0"));
        }
        self.grammar()?;
        self.generation
            .validate()
            .context("invalid [generation] policy")?;
        if self.graph_reasoning && self.generation.target_nodes > MAX_REASONING_NODES {
            return Err(anyhow!(
                "graph_reasoning supports at most {MAX_REASONING_NODES} rooms, generation.target_nodes is {}",
                self.generation.target_nodes
            ));
        }
        Ok(())
    }

    pub fn grammar(&self) -> Result<ActionGrammar> {
        ActionGrammar::new(&self.move_regex, &self.stop_regex).context("invalid action grammar")
    }

    /// Episode rules derived from this config.
    pub fn rules(&self) -> Result<EpisodeRules> {
        Ok(EpisodeRules {
            max_turns: self.max_turns,
            reprompt: self.reprompt,
            detect_loops: self.detect_loops,
            graph_reasoning: self.graph_reasoning,
            grammar: self.grammar()?,
        })
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `GameConfig::default()`.
pub fn load_config(path: &Path) -> Result<GameConfig> {
    if !path.exists() {
        let cfg = GameConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: GameConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &GameConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::generator::CycleRequirement;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, GameConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("mapworld.toml");
        let cfg = GameConfig {
            reprompt: true,
            prompts: PromptOverrides {
                turn: Some("You are in $ROOM$.".to_string()),
                ..PromptOverrides::default()
            },
            ..GameConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("mapworld.toml");
        fs::write(
            &path,
            "max_turns = 5\ndetect_loops = true\n\n[generation]\ntarget_nodes = 6\ncycle = \"force_cycle\"\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.max_turns, 5);
        assert!(cfg.detect_loops);
        assert_eq!(cfg.generation.target_nodes, 6);
        assert_eq!(cfg.generation.cycle, CycleRequirement::ForceCycle);
        assert_eq!(cfg.move_regex, DEFAULT_MOVE_REGEX);
    }

    #[test]
    fn rejects_bad_values() {
        let cfg = GameConfig {
            max_turns: 0,
            ..GameConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = GameConfig {
            move_regex: "GO: \\w+".to_string(),
            ..GameConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn graph_reasoning_limits_world_size() {
        let mut cfg = GameConfig {
            graph_reasoning: true,
            ..GameConfig::default()
        };
        cfg.generation.target_nodes = MAX_REASONING_NODES;
        cfg.validate().expect("largest reasoned world");

        cfg.generation.target_nodes = MAX_REASONING_NODES + 1;
        let err = cfg.validate().expect_err("too many rooms to compare");
        assert!(err.to_string().contains("graph_reasoning"), "{err}");

        cfg.graph_reasoning = false;
        cfg.validate().expect("no comparison without graph reasoning");
    }
}
