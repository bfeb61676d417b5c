//! Case file parsing and validation.
//!
//! A case is a TOML file describing one experiment: game overrides, the world
//! generation policy, how many episodes to play with which player, and the
//! checks every episode is judged against. See `eval/cases/` for examples.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use mapworld::core::generator::GenerationPolicy;
use mapworld::io::config::GameConfig;
use serde::Deserialize;

use crate::config::apply_case_config;
use crate::judge::Check;

/// A parsed case file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CaseFile {
    pub case: CaseMeta,
    #[serde(default)]
    pub config: CaseConfig,
    pub experiment: Experiment,
    #[serde(default)]
    pub checks: Vec<Check>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CaseMeta {
    /// Unique identifier (slug format: `[a-z0-9_-]+`).
    pub id: String,
    pub description: String,
}

/// Game configuration overrides for the case.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CaseConfig {
    pub max_turns: Option<u32>,
    pub reprompt: Option<bool>,
    pub detect_loops: Option<bool>,
    pub graph_reasoning: Option<bool>,
    pub move_regex: Option<String>,
    pub stop_regex: Option<String>,
    /// Replaces the whole generation policy; unset fields take policy defaults.
    pub generation: Option<GenerationPolicy>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Experiment {
    #[serde(default = "default_episodes")]
    pub episodes: u32,
    /// Root seed; every episode derives its own world and player seed from it.
    #[serde(default)]
    pub seed: u64,
    pub player: PlayerSpec,
}

fn default_episodes() -> u32 {
    1
}

/// Which mover plays the episodes.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerSpec {
    /// Always takes a shortest-exploration move, then says DONE.
    Oracle,
    /// Random legal direction each turn; says DONE with `stop_probability`.
    Random {
        #[serde(default)]
        stop_probability: f64,
    },
    /// Replays the same responses in every episode.
    Scripted { responses: Vec<String> },
}

impl PlayerSpec {
    pub fn name(&self) -> &'static str {
        match self {
            PlayerSpec::Oracle => "oracle",
            PlayerSpec::Random { .. } => "random",
            PlayerSpec::Scripted { .. } => "scripted",
        }
    }
}

impl CaseFile {
    /// Load and validate a case file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read case {}", path.display()))?;
        let case: CaseFile =
            toml::from_str(&contents).with_context(|| format!("parse case {}", path.display()))?;
        case.validate()
            .with_context(|| format!("validate case {}", path.display()))?;
        Ok(case)
    }

    #[cfg(test)]
    pub fn parse_str(contents: &str) -> Result<Self> {
        let case: CaseFile = toml::from_str(contents).context("parse case")?;
        case.validate()?;
        Ok(case)
    }

    /// The game configuration this case plays under.
    pub fn game_config(&self) -> Result<GameConfig> {
        apply_case_config(GameConfig::default(), &self.config)
    }

    fn validate(&self) -> Result<()> {
        validate_case_id(&self.case.id)?;
        if self.case.description.trim().is_empty() {
            bail!("case.description must be non-empty");
        }
        if self.experiment.episodes == 0 {
            bail!("experiment.episodes must be > 0");
        }
        match &self.experiment.player {
            PlayerSpec::Oracle => {}
            PlayerSpec::Random { stop_probability } => {
                if !(0.0..=1.0).contains(stop_probability) {
                    bail!("experiment.player.stop_probability must be within [0, 1]");
                }
            }
            PlayerSpec::Scripted { responses } => {
                if responses.is_empty() {
                    bail!("experiment.player.responses must be a non-empty array");
                }
            }
        }
        self.game_config().context("config overrides invalid")?;
        for (index, check) in self.checks.iter().enumerate() {
            check
                .validate()
                .with_context(|| format!("checks[{}] invalid", index))?;
        }
        Ok(())
    }
}

/// Discover and load all case files from a directory.
///
/// Returns cases sorted by id. Errors if duplicate ids are found.
pub fn discover_cases(dir: &Path) -> Result<Vec<CaseFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut cases = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read cases dir {}", dir.display()))? {
        let entry = entry.context("read case entry")?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            continue;
        }
        cases.push(CaseFile::load(&path)?);
    }
    cases.sort_by(|left, right| left.case.id.cmp(&right.case.id));
    for pair in cases.windows(2) {
        if pair[0].case.id == pair[1].case.id {
            return Err(anyhow!("duplicate case.id {}", pair[0].case.id));
        }
    }
    Ok(cases)
}

pub fn validate_case_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("case.id must be non-empty");
    }
    if id.contains('/') || id.contains('\\') {
        bail!("case.id must not contain path separators");
    }
    if id.contains("..") {
        bail!("case.id must not contain '..'");
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        bail!("case.id must use [a-z0-9_-] only");
    }
    Ok(())
}
