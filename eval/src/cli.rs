//! CLI command implementations.

use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::case::{CaseFile, discover_cases, validate_case_id};
use crate::outcome::Outcome;
use crate::report::{Mean, aggregate};
use crate::run::{RunLocation, run_case};

/// List all available cases.
pub fn list_cases(repo_root: &Path) -> Result<()> {
    let cases_dir = repo_root.join("eval").join("cases");
    let cases = discover_cases(&cases_dir)?;
    for case in cases {
        println!(
            "{}\t{}\t{}",
            case.case.id,
            case.experiment.player.name(),
            case.case.description
        );
    }
    Ok(())
}

/// Run a case by id (optionally multiple times).
pub fn run_case_by_id(repo_root: &Path, case_id: &str, runs: u32) -> Result<()> {
    validate_case_id(case_id)?;
    let cases_dir = repo_root.join("eval").join("cases");
    let case_path = cases_dir.join(format!("{case_id}.toml"));
    if !case_path.exists() {
        bail!("case {} not found at {}", case_id, case_path.display());
    }
    let case = CaseFile::load(&case_path).context("load case")?;
    debug!(case_id, runs, "case loaded");

    let results_base = repo_root.join("eval").join("results");
    let location = RunLocation {
        repo_root,
        case_path: &case_path,
        results_base: &results_base,
    };

    info!(case_id, runs, "starting runs");
    for run_num in 1..=runs {
        debug!(case_id, run_num, runs, "starting run");
        let outcome = run_case(&location, &case).context("run case")?;
        println!(
            "run: case={} eval_run_id={} episodes={} success={} fail={} aborted={} turn_limit={} results={}",
            case_id,
            outcome.eval_run_id,
            outcome.episodes.len(),
            outcome.count(Outcome::Success),
            outcome.count(Outcome::Fail),
            outcome.count(Outcome::Aborted),
            outcome.count(Outcome::TurnLimit),
            outcome.results_dir.display()
        );
    }
    Ok(())
}

/// Show aggregated results for a case.
pub fn report_case(repo_root: &Path, case_id: &str) -> Result<()> {
    validate_case_id(case_id)?;
    let results_dir = repo_root.join("eval").join("results").join(case_id);
    let (summary, warnings) = aggregate(&results_dir)?;
    println!(
        "report: case={} runs={} episodes={}",
        case_id, summary.runs, summary.episodes
    );
    println!(
        "report: success={} fail={} aborted={} turn_limit={}",
        summary.success, summary.fail, summary.aborted, summary.turn_limit
    );
    print_mean("exploration", &summary.exploration);
    print_mean("efficiency", &summary.efficiency);
    print_mean("bench_score", &summary.bench_score);
    if let Some(avg) = summary.avg_duration_secs {
        println!("report: avg_duration_secs={:.2}", avg);
    }
    for (label, (passed, total)) in summary.check_pass_rates {
        println!("report: check {} {}/{}", label, passed, total);
    }
    for warning in warnings {
        eprintln!("warning: {}", warning);
    }
    Ok(())
}

fn print_mean(name: &str, mean: &Mean) {
    match mean.value() {
        Some(value) => println!("report: avg_{name}={value:.2} (n={})", mean.samples()),
        None => println!("report: avg_{name}=not applicable"),
    }
}

/// Remove stored results for a case.
pub fn clean_case(repo_root: &Path, case_id: &str) -> Result<()> {
    validate_case_id(case_id)?;
    let case_results = repo_root.join("eval").join("results").join(case_id);
    if case_results.exists() {
        std::fs::remove_dir_all(&case_results)
            .with_context(|| format!("remove {}", case_results.display()))?;
    }

    println!("clean: case={} results={}", case_id, case_results.display());
    Ok(())
}
