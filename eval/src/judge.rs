//! Per-episode checks and their recorded outcomes.
//!
//! Checks are judged against the score report of a finished episode. The
//! outcomes (expected and actual values) are written next to the episode as
//! `checks.json` so reports can compute pass rates per check.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use mapworld::core::scorer::ScoreReport;
use mapworld::core::types::Outcome as EpisodeOutcome;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// How an episode is expected to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedOutcome {
    Success,
    Aborted,
    TurnLimit,
}

impl ExpectedOutcome {
    fn matches(self, outcome: EpisodeOutcome) -> bool {
        matches!(
            (self, outcome),
            (ExpectedOutcome::Success, EpisodeOutcome::Success)
                | (ExpectedOutcome::Aborted, EpisodeOutcome::Aborted(_))
                | (ExpectedOutcome::TurnLimit, EpisodeOutcome::TurnLimitReached)
        )
    }
}

/// Verification check applied to every episode of a case.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Check {
    OutcomeIs { outcome: ExpectedOutcome },
    MinExploration { pct: f64 },
    MinEfficiency { pct: f64 },
    MaxInvalidMoves { count: usize },
}

impl Check {
    pub fn validate(&self) -> Result<()> {
        match self {
            Check::MinExploration { pct } | Check::MinEfficiency { pct } => {
                if !(0.0..=100.0).contains(pct) {
                    bail!("pct must be within [0, 100]");
                }
            }
            Check::OutcomeIs { .. } | Check::MaxInvalidMoves { .. } => {}
        }
        Ok(())
    }
}

/// Collected check outcomes for one episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub checks: Vec<CheckOutcome>,
}

impl Judgment {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(CheckOutcome::passed)
    }
}

/// Result of judging a single check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckOutcome {
    OutcomeIs {
        expected: ExpectedOutcome,
        actual: EpisodeOutcome,
        passed: bool,
    },
    MinExploration {
        pct: f64,
        actual: f64,
        passed: bool,
    },
    MinEfficiency {
        pct: f64,
        actual: f64,
        passed: bool,
    },
    MaxInvalidMoves {
        count: usize,
        actual: usize,
        passed: bool,
    },
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        match self {
            CheckOutcome::OutcomeIs { passed, .. }
            | CheckOutcome::MinExploration { passed, .. }
            | CheckOutcome::MinEfficiency { passed, .. }
            | CheckOutcome::MaxInvalidMoves { passed, .. } => *passed,
        }
    }

    /// Stable label used to group outcomes across episodes.
    pub fn label(&self) -> String {
        match self {
            CheckOutcome::OutcomeIs { expected, .. } => format!("outcome_is({expected:?})"),
            CheckOutcome::MinExploration { pct, .. } => format!("min_exploration({pct})"),
            CheckOutcome::MinEfficiency { pct, .. } => format!("min_efficiency({pct})"),
            CheckOutcome::MaxInvalidMoves { count, .. } => format!("max_invalid_moves({count})"),
        }
    }
}

/// Judge all checks against a scored episode.
#[instrument(skip_all, fields(check_count = checks.len()))]
pub fn judge_episode(checks: &[Check], report: &ScoreReport) -> Judgment {
    let outcomes = checks
        .iter()
        .map(|check| {
            let outcome = match *check {
                Check::OutcomeIs { outcome } => CheckOutcome::OutcomeIs {
                    expected: outcome,
                    actual: report.outcome,
                    passed: outcome.matches(report.outcome),
                },
                Check::MinExploration { pct } => CheckOutcome::MinExploration {
                    pct,
                    actual: report.exploration_pct,
                    passed: report.exploration_pct >= pct,
                },
                Check::MinEfficiency { pct } => CheckOutcome::MinEfficiency {
                    pct,
                    actual: report.efficiency_pct,
                    passed: report.efficiency_pct >= pct,
                },
                Check::MaxInvalidMoves { count } => CheckOutcome::MaxInvalidMoves {
                    count,
                    actual: report.invalid_moves,
                    passed: report.invalid_moves <= count,
                },
            };
            debug!(check = %outcome.label(), passed = outcome.passed(), "check result");
            outcome
        })
        .collect();
    Judgment { checks: outcomes }
}

pub fn write_judgment(path: &Path, judgment: &Judgment) -> Result<()> {
    let contents = serde_json::to_string_pretty(judgment).context("serialize checks")?;
    fs::write(path, format!("{contents}\n"))
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn load_judgment(path: &Path) -> Result<Judgment> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}
