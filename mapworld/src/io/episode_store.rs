//! On-disk layout of a played episode.
//!
//! ```text
//! <dir>/instance.json   the world and rules that were played
//! <dir>/log.json        episode log (rounds of events)
//! <dir>/scores.json     {"metrics": {...}, "efficient_moves": [...]}
//! <dir>/meta.json       outcome, counts and wall-clock duration
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::scorer::{MetricValue, ScoreReport};
use crate::core::types::{EpisodeLog, Outcome};
use crate::io::instance::{InstanceRecord, write_instance};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoresFile {
    pub metrics: BTreeMap<String, MetricValue>,
    pub efficient_moves: Vec<bool>,
}

impl From<&ScoreReport> for ScoresFile {
    fn from(report: &ScoreReport) -> Self {
        Self {
            metrics: report.to_metrics(),
            efficient_moves: report.efficient_moves.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeMeta {
    pub outcome: Outcome,
    pub rounds: usize,
    pub moves: usize,
    pub duration_ms: u64,
}

/// Paths of one episode directory.
#[derive(Debug, Clone)]
pub struct EpisodePaths {
    pub dir: PathBuf,
    pub instance: PathBuf,
    pub log: PathBuf,
    pub scores: PathBuf,
    pub meta: PathBuf,
}

impl EpisodePaths {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            instance: dir.join("instance.json"),
            log: dir.join("log.json"),
            scores: dir.join("scores.json"),
            meta: dir.join("meta.json"),
        }
    }
}

/// Everything persisted for a finished episode.
#[derive(Debug, Clone)]
pub struct EpisodeArtifacts<'a> {
    pub instance: &'a InstanceRecord,
    pub log: &'a EpisodeLog,
    pub report: &'a ScoreReport,
    pub meta: EpisodeMeta,
}

/// Write all episode files, in a fixed order, creating `dir` if needed.
pub fn write_episode(dir: &Path, artifacts: &EpisodeArtifacts<'_>) -> Result<EpisodePaths> {
    let paths = EpisodePaths::new(dir);
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create episode directory {}", paths.dir.display()))?;
    write_instance(&paths.instance, artifacts.instance)?;
    write_json(&paths.log, artifacts.log)?;
    write_json(&paths.scores, &ScoresFile::from(artifacts.report))?;
    write_json(&paths.meta, &artifacts.meta)?;
    Ok(paths)
}

pub fn load_log(path: &Path) -> Result<EpisodeLog> {
    read_json(path)
}

pub fn load_scores(path: &Path) -> Result<ScoresFile> {
    read_json(path)
}

pub fn load_meta(path: &Path) -> Result<EpisodeMeta> {
    read_json(path)
}

/// Serialize `value` to pretty-printed JSON with trailing newline.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut payload = serde_json::to_string_pretty(value).context("serialize json")?;
    payload.push('\n');
    fs::write(path, payload).with_context(|| format!("write {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::node::Node;
    use crate::core::scorer::score;
    use crate::core::types::{ActionKind, LogAction, LogEvent};
    use crate::test_support::{instance, line_graph};

    #[test]
    fn writes_and_reads_back_every_file() {
        let temp = tempfile::tempdir().expect("tempdir");
        let graph = line_graph(3);
        let record = instance(&graph, Node::at(0, 0));
        let mut log = EpisodeLog::new(Node::at(0, 0));
        log.record(
            0,
            LogEvent {
                from: Node::at(0, 0),
                to: Node::at(1, 0),
                action: LogAction {
                    kind: ActionKind::Move,
                    content: "GO: east".to_string(),
                },
            },
        );
        let report = score(&graph, &log).expect("score");
        let meta = EpisodeMeta {
            outcome: log.outcome(),
            rounds: log.rounds.len(),
            moves: 1,
            duration_ms: 4,
        };

        let paths = write_episode(
            &temp.path().join("episode-0"),
            &EpisodeArtifacts {
                instance: &record,
                log: &log,
                report: &report,
                meta,
            },
        )
        .expect("write");

        assert_eq!(load_log(&paths.log).expect("log"), log);
        assert_eq!(load_meta(&paths.meta).expect("meta"), meta);
        let scores = load_scores(&paths.scores).expect("scores");
        assert_eq!(scores.efficient_moves, vec![true]);
        assert_eq!(scores.metrics["bench_score"], MetricValue::NotApplicable);

        let raw = fs::read_to_string(&paths.meta).expect("read meta");
        assert!(raw.ends_with("}\n"));
        assert!(raw.contains("\"status\": \"pending\""));
    }
}
