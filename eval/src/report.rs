use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::judge::{Judgment, load_judgment};
use crate::outcome::Outcome;
use crate::results::{EpisodeSummary, EvalMeta, load_meta};

/// Running mean that ignores missing samples.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Mean {
    total: f64,
    samples: usize,
}

impl Mean {
    pub fn add(&mut self, value: f64) {
        self.total += value;
        self.samples += 1;
    }

    pub fn value(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.total / self.samples as f64)
    }

    pub fn samples(&self) -> usize {
        self.samples
    }
}

#[derive(Debug, Default)]
pub struct ReportSummary {
    pub runs: usize,
    pub episodes: usize,
    pub success: usize,
    pub fail: usize,
    pub aborted: usize,
    pub turn_limit: usize,
    pub exploration: Mean,
    pub efficiency: Mean,
    /// Only episodes that ended with DONE have a bench score.
    pub bench_score: Mean,
    pub avg_duration_secs: Option<f64>,
    pub check_pass_rates: BTreeMap<String, (usize, usize)>,
}

pub fn load_run_dirs(case_results_dir: &Path) -> Result<Vec<PathBuf>> {
    if !case_results_dir.exists() {
        return Ok(Vec::new());
    }
    let mut dirs = Vec::new();
    for entry in fs::read_dir(case_results_dir)
        .with_context(|| format!("read {}", case_results_dir.display()))?
    {
        let entry = entry.context("read entry")?;
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

pub fn aggregate(case_results_dir: &Path) -> Result<(ReportSummary, Vec<String>)> {
    let mut summary = ReportSummary::default();
    let mut warnings = Vec::new();
    let mut duration = Mean::default();

    for run_dir in load_run_dirs(case_results_dir)? {
        let meta: EvalMeta = match load_meta(&run_dir.join("meta.json")) {
            Ok(meta) => meta,
            Err(err) => {
                warnings.push(format!(
                    "skip {}: meta.json invalid ({err})",
                    run_dir.display()
                ));
                continue;
            }
        };

        summary.runs += 1;
        duration.add(meta.duration_secs);
        for episode in &meta.episodes {
            add_episode(&mut summary, episode);

            let checks_path = run_dir.join(&episode.dir).join("checks.json");
            match load_judgment(&checks_path) {
                Ok(judgment) => update_check_pass_rates(&mut summary.check_pass_rates, &judgment),
                Err(err) => warnings.push(format!(
                    "{}: checks.json invalid ({err})",
                    run_dir.join(&episode.dir).display()
                )),
            }
        }
    }
    summary.avg_duration_secs = duration.value();

    Ok((summary, warnings))
}

fn add_episode(summary: &mut ReportSummary, episode: &EpisodeSummary) {
    summary.episodes += 1;
    match episode.outcome {
        Outcome::Success => summary.success += 1,
        Outcome::Fail => summary.fail += 1,
        Outcome::Aborted => summary.aborted += 1,
        Outcome::TurnLimit => summary.turn_limit += 1,
    }
    summary.exploration.add(episode.exploration_pct);
    summary.efficiency.add(episode.efficiency_pct);
    if let Some(bench) = episode.bench_score.as_number() {
        summary.bench_score.add(bench);
    }
}

fn update_check_pass_rates(stats: &mut BTreeMap<String, (usize, usize)>, judgment: &Judgment) {
    for check in &judgment.checks {
        let entry = stats.entry(check.label()).or_insert((0, 0));
        if check.passed() {
            entry.0 += 1;
        }
        entry.1 += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::{CheckOutcome, write_judgment};
    use mapworld::core::scorer::MetricValue;
    use mapworld::core::types::Outcome as EpisodeOutcome;
    use tempfile::tempdir;

    fn episode(index: u32, outcome: Outcome, exploration: f64, bench: MetricValue) -> EpisodeSummary {
        EpisodeSummary {
            index,
            seed: index as u64,
            dir: format!("episode-{index:03}"),
            outcome,
            episode_outcome: EpisodeOutcome::Success,
            exploration_pct: exploration,
            efficiency_pct: 50.0,
            bench_score: bench,
            valid_moves: 2,
            invalid_moves: 0,
        }
    }

    fn write_run(dir: &Path, duration: f64, episodes: Vec<EpisodeSummary>) {
        fs::create_dir_all(dir).expect("run dir");
        for episode in &episodes {
            let episode_dir = dir.join(&episode.dir);
            fs::create_dir_all(&episode_dir).expect("episode dir");
            let judgment = Judgment {
                checks: vec![CheckOutcome::MinExploration {
                    pct: 100.0,
                    actual: episode.exploration_pct,
                    passed: episode.exploration_pct >= 100.0,
                }],
            };
            write_judgment(&episode_dir.join("checks.json"), &judgment).expect("checks");
        }
        let meta = EvalMeta {
            case_id: "case".to_string(),
            eval_run_id: "run".to_string(),
            case_hash: "hash".to_string(),
            git_sha: None,
            seed: 0,
            player: "oracle".to_string(),
            start_time: "now".to_string(),
            end_time: "later".to_string(),
            duration_secs: duration,
            episodes,
            errors: Vec::new(),
        };
        let contents = serde_json::to_string_pretty(&meta).expect("meta json");
        fs::write(dir.join("meta.json"), format!("{contents}\n")).expect("write meta");
    }

    #[test]
    fn aggregates_runs() {
        let temp = tempdir().expect("tempdir");
        write_run(
            &temp.path().join("run1"),
            5.0,
            vec![
                episode(0, Outcome::Success, 100.0, MetricValue::Number(80.0)),
                episode(1, Outcome::Fail, 50.0, MetricValue::Number(40.0)),
            ],
        );
        write_run(
            &temp.path().join("run2"),
            15.0,
            vec![episode(0, Outcome::TurnLimit, 75.0, MetricValue::NotApplicable)],
        );

        let (summary, warnings) = aggregate(temp.path()).expect("aggregate");
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(summary.runs, 2);
        assert_eq!(summary.episodes, 3);
        assert_eq!(summary.success, 1);
        assert_eq!(summary.fail, 1);
        assert_eq!(summary.turn_limit, 1);
        assert_eq!(summary.exploration.value(), Some(75.0));
        assert_eq!(summary.bench_score.value(), Some(60.0));
        assert_eq!(summary.bench_score.samples(), 2);
        assert_eq!(summary.avg_duration_secs, Some(10.0));

        let key = "min_exploration(100)".to_string();
        assert_eq!(summary.check_pass_rates.get(&key), Some(&(1, 3)));
    }

    #[test]
    fn broken_runs_become_warnings() {
        let temp = tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("broken")).expect("dir");
        fs::write(temp.path().join("broken/meta.json"), "{").expect("meta");
        let (summary, warnings) = aggregate(temp.path()).expect("aggregate");
        assert_eq!(summary.runs, 0);
        assert_eq!(warnings.len(), 1);
        assert_eq!(summary.exploration.value(), None);
    }
}
