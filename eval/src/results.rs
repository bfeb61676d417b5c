//! Result persistence.
//!
//! Every eval run gets `eval/results/<case>/<eval_run_id>/` holding one
//! `episode-NNN/` directory per episode (the episode store layout plus
//! `checks.json`) and a run-level `meta.json` summarizing all episodes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use mapworld::core::scorer::{MetricValue, ScoreReport};
use mapworld::core::types::Outcome as EpisodeOutcome;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use crate::outcome::Outcome;

/// Summary of one played episode, as listed in the run's `meta.json`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EpisodeSummary {
    pub index: u32,
    pub seed: u64,
    /// Episode directory, relative to the run directory.
    pub dir: String,
    pub outcome: Outcome,
    pub episode_outcome: EpisodeOutcome,
    pub exploration_pct: f64,
    pub efficiency_pct: f64,
    pub bench_score: MetricValue,
    pub valid_moves: usize,
    pub invalid_moves: usize,
}

impl EpisodeSummary {
    pub fn new(index: u32, seed: u64, dir: String, outcome: Outcome, report: &ScoreReport) -> Self {
        Self {
            index,
            seed,
            dir,
            outcome,
            episode_outcome: report.outcome,
            exploration_pct: report.exploration_pct,
            efficiency_pct: report.efficiency_pct,
            bench_score: report.bench_score,
            valid_moves: report.valid_moves,
            invalid_moves: report.invalid_moves,
        }
    }
}

/// Input for recording a completed run.
#[derive(Debug)]
pub struct CaptureInput<'a> {
    pub case_id: &'a str,
    pub case_path: &'a Path,
    pub eval_run_id: &'a str,
    pub seed: u64,
    pub player: &'a str,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub repo_root: &'a Path,
    pub episodes: Vec<EpisodeSummary>,
}

/// Metadata for an eval run, persisted to `meta.json`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EvalMeta {
    pub case_id: String,
    pub eval_run_id: String,
    /// SHA-256 hash of the case file for reproducibility tracking.
    pub case_hash: String,
    /// Git SHA of the repo at time of run.
    pub git_sha: Option<String>,
    pub seed: u64,
    pub player: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_secs: f64,
    pub episodes: Vec<EpisodeSummary>,
    /// Non-fatal errors encountered during capture.
    pub errors: Vec<String>,
}

/// Write the run-level `meta.json` into `run_dir`.
#[instrument(skip_all, fields(case_id = %input.case_id, eval_run_id = %input.eval_run_id))]
pub fn capture_results(run_dir: &Path, input: CaptureInput<'_>) -> Result<EvalMeta> {
    fs::create_dir_all(run_dir)
        .with_context(|| format!("create results dir {}", run_dir.display()))?;

    let mut errors = Vec::new();

    let case_hash = match file_sha256(input.case_path) {
        Ok(hash) => hash,
        Err(err) => {
            errors.push(format!("case hash: {err}"));
            String::new()
        }
    };

    let git_sha = match git_rev_parse(input.repo_root) {
        Ok(sha) => Some(sha),
        Err(err) => {
            errors.push(format!("git sha: {err}"));
            None
        }
    };

    if !errors.is_empty() {
        warn!(errors = ?errors, "result capture had errors");
    }

    let duration = input.finished_at - input.started_at;
    let meta = EvalMeta {
        case_id: input.case_id.to_string(),
        eval_run_id: input.eval_run_id.to_string(),
        case_hash,
        git_sha,
        seed: input.seed,
        player: input.player.to_string(),
        start_time: input.started_at.to_rfc3339(),
        end_time: input.finished_at.to_rfc3339(),
        duration_secs: duration.num_milliseconds() as f64 / 1000.0,
        episodes: input.episodes,
        errors,
    };

    write_meta(&run_dir.join("meta.json"), &meta)?;
    debug!(run_dir = %run_dir.display(), "results captured");
    Ok(meta)
}

pub fn results_dir(base_dir: &Path, case_id: &str, eval_run_id: &str) -> PathBuf {
    base_dir.join(case_id).join(eval_run_id)
}

pub fn episode_dir_name(index: u32) -> String {
    format!("episode-{index:03}")
}

pub fn load_meta(path: &Path) -> Result<EvalMeta> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).context("parse meta")
}

fn write_meta(path: &Path, meta: &EvalMeta) -> Result<()> {
    let contents = serde_json::to_string_pretty(meta).context("serialize meta")?;
    fs::write(path, format!("{contents}\n"))
        .with_context(|| format!("write meta {}", path.display()))?;
    Ok(())
}

fn file_sha256(path: &Path) -> Result<String> {
    let contents = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(contents);
    let digest = hasher.finalize();
    Ok(hex::encode(digest))
}

fn git_rev_parse(repo_root: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_root)
        .output()
        .context("git rev-parse")?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("git rev-parse failed: {}", stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
