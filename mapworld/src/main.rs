//! `mapworld` command line: generate worlds, validate them, play and score episodes.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use mapworld::core::generator::{generate, pick_start};
use mapworld::core::random::RandomSource;
use mapworld::core::scorer::score;
use mapworld::core::types::Outcome;
use mapworld::episode::play_instance;
use mapworld::exit_codes;
use mapworld::io::config::load_config;
use mapworld::io::episode_store::{
    EpisodeArtifacts, ScoresFile, load_log, write_episode, write_json,
};
use mapworld::io::instance::{InstanceRecord, load_instance, write_instance};
use mapworld::io::mover::{HumanMover, ScriptedMover};
use mapworld::logging;

#[derive(Parser)]
#[command(
    name = "mapworld",
    version,
    about = "Procedural room-graph worlds and exploration episodes"
)]
struct Cli {
    /// Game configuration (TOML). Defaults apply when the file is missing.
    #[arg(long, global = true, default_value = "mapworld.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a world from the `[generation]` policy and write an instance record.
    Generate {
        /// Seed for a reproducible world; random when omitted.
        #[arg(long)]
        seed: Option<u64>,
        /// Output path for the instance record.
        #[arg(short, long, default_value = "instance.json")]
        out: PathBuf,
    },
    /// Check an instance record against the schema and graph invariants.
    Validate {
        #[arg(short, long, default_value = "instance.json")]
        instance: PathBuf,
    },
    /// Play an episode, interactively or from a script of responses.
    Play {
        #[arg(short, long, default_value = "instance.json")]
        instance: PathBuf,
        /// File with one response per line instead of reading stdin.
        #[arg(long)]
        script: Option<PathBuf>,
        /// Directory to store the episode files in.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Score a stored episode log and print the metrics as JSON.
    Score {
        #[arg(short, long, default_value = "instance.json")]
        instance: PathBuf,
        #[arg(short, long, default_value = "log.json")]
        log: PathBuf,
        /// Also write the metrics to this path.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate { seed, out } => cmd_generate(&cli.config, seed, &out),
        Command::Validate { instance } => cmd_validate(&instance),
        Command::Play {
            instance,
            script,
            out_dir,
        } => cmd_play(&cli.config, &instance, script.as_deref(), out_dir.as_deref()),
        Command::Score { instance, log, out } => cmd_score(&instance, &log, out.as_deref()),
    }
}

fn cmd_generate(config_path: &Path, seed: Option<u64>, out: &Path) -> Result<i32> {
    let config = load_config(config_path)?;
    let mut rng = match seed {
        Some(seed) => RandomSource::seeded(seed),
        None => RandomSource::from_entropy(),
    };
    let graph = generate(&config.generation, &mut rng).context("generate world")?;
    let start = pick_start(&graph, &mut rng).context("generated world has no rooms")?;
    let record = InstanceRecord::build(&graph, start, config.generation.ambiguity, &config);
    write_instance(out, &record)?;
    println!("{}", out.display());
    Ok(exit_codes::OK)
}

fn cmd_validate(instance: &Path) -> Result<i32> {
    load_instance(instance)?;
    println!("ok");
    Ok(exit_codes::OK)
}

fn cmd_play(
    config_path: &Path,
    instance: &Path,
    script: Option<&Path>,
    out_dir: Option<&Path>,
) -> Result<i32> {
    let config = load_config(config_path)?;
    let record = load_instance(instance)?;
    let played = match script {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("read script {}", path.display()))?;
            let mut mover = ScriptedMover::new(contents.lines().filter(|l| !l.trim().is_empty()));
            play_instance(&record, &config, &mut mover)?
        }
        None => play_instance(&record, &config, &mut HumanMover::stdio())?,
    };

    if let Some(dir) = out_dir {
        write_episode(
            dir,
            &EpisodeArtifacts {
                instance: &record,
                log: &played.log,
                report: &played.report,
                meta: played.meta,
            },
        )?;
    }
    let scores = ScoresFile::from(&played.report);
    println!(
        "{}",
        serde_json::to_string_pretty(&scores).context("serialize scores")?
    );

    Ok(match played.meta.outcome {
        Outcome::Aborted(_) => exit_codes::ABORTED,
        Outcome::TurnLimitReached => exit_codes::TURN_LIMIT,
        Outcome::Success | Outcome::Pending => exit_codes::OK,
    })
}

fn cmd_score(instance: &Path, log: &Path, out: Option<&Path>) -> Result<i32> {
    let record = load_instance(instance)?;
    let graph = record.to_graph()?;
    let log = load_log(log)?;
    let report = score(&graph, &log).context("score episode")?;
    let scores = ScoresFile::from(&report);
    if let Some(path) = out {
        write_json(path, &scores)?;
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&scores).context("serialize scores")?
    );
    Ok(exit_codes::OK)
}
