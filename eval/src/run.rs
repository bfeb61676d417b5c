//! Case execution orchestration.
//!
//! For each episode: derive a seed, generate a world, pick a start, play it
//! with the case's player, judge the checks and store everything. The
//! run-level metadata is written last.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use mapworld::core::generator::{generate, pick_start};
use mapworld::core::random::RandomSource;
use mapworld::episode::play_instance;
use mapworld::io::config::GameConfig;
use mapworld::io::episode_store::{EpisodeArtifacts, write_episode};
use mapworld::io::instance::InstanceRecord;
use tracing::{debug, info, instrument};

use crate::case::CaseFile;
use crate::judge::{judge_episode, write_judgment};
use crate::outcome::{Outcome, classify_outcome};
use crate::players::Player;
use crate::results::{CaptureInput, EpisodeSummary, capture_results, episode_dir_name, results_dir};

/// Result of running a single case.
#[derive(Debug)]
pub struct RunOutcome {
    /// Unique identifier for this eval run.
    pub eval_run_id: String,
    /// Path to the results directory.
    pub results_dir: PathBuf,
    pub episodes: Vec<EpisodeSummary>,
}

impl RunOutcome {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.episodes.iter().filter(|e| e.outcome == outcome).count()
    }
}

/// Paths a run reads from and writes to.
#[derive(Debug, Clone)]
pub struct RunLocation<'a> {
    pub repo_root: &'a Path,
    pub case_path: &'a Path,
    /// Base of `<case>/<eval_run_id>/` result directories.
    pub results_base: &'a Path,
}

/// Run every episode of a case and record the results.
#[instrument(skip_all, fields(case_id = %case.case.id, episodes = case.experiment.episodes))]
pub fn run_case(location: &RunLocation<'_>, case: &CaseFile) -> Result<RunOutcome> {
    info!("case run started");
    let config = case.game_config()?;

    let started_at = Utc::now();
    let eval_run_id = format!("eval-{}", started_at.format("%Y%m%d_%H%M%S_%3f"));
    let run_dir = results_dir(location.results_base, &case.case.id, &eval_run_id);

    let mut seeds = RandomSource::seeded(case.experiment.seed);
    let mut episodes = Vec::new();
    for index in 0..case.experiment.episodes {
        let seed = seeds.next_seed();
        let summary = play_episode(&run_dir, case, &config, index, seed)
            .with_context(|| format!("episode {index} (seed {seed})"))?;
        episodes.push(summary);
    }
    let finished_at = Utc::now();

    let meta = capture_results(
        &run_dir,
        CaptureInput {
            case_id: &case.case.id,
            case_path: location.case_path,
            eval_run_id: &eval_run_id,
            seed: case.experiment.seed,
            player: case.experiment.player.name(),
            started_at,
            finished_at,
            repo_root: location.repo_root,
            episodes,
        },
    )
    .context("capture results")?;

    info!(eval_run_id = %eval_run_id, "case run finished");
    Ok(RunOutcome {
        eval_run_id,
        results_dir: run_dir,
        episodes: meta.episodes,
    })
}

fn play_episode(
    run_dir: &Path,
    case: &CaseFile,
    config: &GameConfig,
    index: u32,
    seed: u64,
) -> Result<EpisodeSummary> {
    let mut rng = RandomSource::seeded(seed);
    let graph = generate(&config.generation, &mut rng).context("generate world")?;
    let start = pick_start(&graph, &mut rng).ok_or_else(|| anyhow!("generated world is empty"))?;
    let record = InstanceRecord::build(&graph, start, config.generation.ambiguity, config);

    let mut player = Player::new(&case.experiment.player, &graph, rng.next_seed());
    let played = play_instance(&record, config, &mut player).context("play episode")?;

    let judgment = judge_episode(&case.checks, &played.report);
    let outcome = classify_outcome(played.meta.outcome, &judgment);

    let dir_name = episode_dir_name(index);
    let episode_dir = run_dir.join(&dir_name);
    write_episode(
        &episode_dir,
        &EpisodeArtifacts {
            instance: &record,
            log: &played.log,
            report: &played.report,
            meta: played.meta,
        },
    )?;
    write_judgment(&episode_dir.join("checks.json"), &judgment)?;
    debug!(index, seed, ?outcome, "episode recorded");

    Ok(EpisodeSummary::new(index, seed, dir_name, outcome, &played.report))
}
