//! Replay-based scoring of a finished episode.
//!
//! The scorer reads only the graph and the episode log. For every move it
//! asks whether the step starts some shortest walk that covers the whole
//! unexplored frontier, then aggregates exploration and efficiency.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::graph::Graph;
use crate::core::node::Node;
use crate::core::similarity::{MAX_REASONING_NODES, SimpleGraph, similarity};
use crate::core::types::{ActionKind, EpisodeLog, Outcome};

pub const NOT_APPLICABLE: &str = "not applicable";

/// Largest world the scorer accepts. [`best_moves`] is exponential in the
/// frontier size, and a frontier can hold about half the rooms.
pub const MAX_SCORED_NODES: usize = 24;

/// A metric that may be undefined for some outcomes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Number(f64),
    NotApplicable,
}

impl MetricValue {
    pub fn as_number(self) -> Option<f64> {
        match self {
            MetricValue::Number(value) => Some(value),
            MetricValue::NotApplicable => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Number(value)
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Number(value) => serializer.serialize_f64(*value),
            MetricValue::NotApplicable => serializer.serialize_str(NOT_APPLICABLE),
        }
    }
}

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => Ok(MetricValue::Number(value)),
            Raw::Text(text) if text == NOT_APPLICABLE => Ok(MetricValue::NotApplicable),
            Raw::Text(text) => Err(serde::de::Error::custom(format!(
                "expected a number or '{NOT_APPLICABLE}', got '{text}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub efficient_moves: Vec<bool>,
    pub valid_moves: usize,
    pub invalid_moves: usize,
    pub stopped: bool,
    pub outcome: Outcome,
    pub nodes_visited: usize,
    pub nodes_seen: usize,
    pub total_nodes: usize,
    pub efficiency_pct: f64,
    pub exploration_pct: f64,
    pub bench_score: MetricValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_similarity: Option<f64>,
}

impl ScoreReport {
    /// Flat metric map as written to `scores.json`.
    pub fn to_metrics(&self) -> BTreeMap<String, MetricValue> {
        let flag = |b: bool| MetricValue::Number(if b { 1.0 } else { 0.0 });
        let count = |n: usize| MetricValue::Number(n as f64);

        let mut metrics = BTreeMap::new();
        metrics.insert("valid_moves".to_string(), count(self.valid_moves));
        metrics.insert("invalid_moves".to_string(), count(self.invalid_moves));
        metrics.insert("stopped".to_string(), flag(self.stopped));
        metrics.insert(
            "aborted".to_string(),
            flag(matches!(self.outcome, Outcome::Aborted(_))),
        );
        metrics.insert(
            "turn_limit_reached".to_string(),
            flag(self.outcome == Outcome::TurnLimitReached),
        );
        metrics.insert("nodes_visited".to_string(), count(self.nodes_visited));
        metrics.insert("nodes_seen".to_string(), count(self.nodes_seen));
        metrics.insert("total_nodes".to_string(), count(self.total_nodes));
        metrics.insert("efficiency".to_string(), self.efficiency_pct.into());
        metrics.insert("exploration".to_string(), self.exploration_pct.into());
        metrics.insert("bench_score".to_string(), self.bench_score);
        if let Some(value) = self.graph_similarity {
            metrics.insert("graph_similarity".to_string(), value.into());
        }
        metrics
    }
}

/// The log does not describe a walk on the given graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScorerContractViolation {
    #[error("log references node {0} which is not in the graph")]
    UnknownNode(String),
    #[error("move in round {round} starts at {found} but the replay is at {expected}")]
    MoveOutOfPlace {
        round: usize,
        expected: String,
        found: String,
    },
    #[error("move in round {round} from {from} to {to} does not follow an edge")]
    NotAnEdge {
        round: usize,
        from: String,
        to: String,
    },
}

fn require(graph: &Graph, node: &Node) -> Result<(), ScorerContractViolation> {
    if graph.contains(node) {
        Ok(())
    } else {
        Err(ScorerContractViolation::UnknownNode(node.key()))
    }
}

/// Nodes adjacent to `visited` but not in it.
pub fn frontier<'g>(graph: &'g Graph, visited: &BTreeSet<Node>) -> BTreeSet<&'g Node> {
    visited
        .iter()
        .flat_map(|node| graph.neighbors(node))
        .filter(|node| !visited.contains(*node))
        .collect()
}

/// Frontier nodes covered so far, one bit per frontier node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Covered(Vec<u64>);

impl Covered {
    fn empty(bits: usize) -> Self {
        Covered(vec![0; bits.div_ceil(64).max(1)])
    }

    fn with(&self, bit: Option<usize>) -> Self {
        let mut next = self.clone();
        if let Some(bit) = bit {
            next.0[bit / 64] |= 1 << (bit % 64);
        }
        next
    }

    fn count(&self) -> usize {
        self.0.iter().map(|word| word.count_ones() as usize).sum()
    }
}

/// First steps of every shortest walk from `from` that covers the whole
/// frontier of `visited`, moving only through visited or frontier nodes.
///
/// Breadth-first over `(position, covered frontier)` states. The state space
/// is finite and each state is expanded once, so the search terminates, but
/// it holds up to `rooms * 2^frontier` states; worlds are therefore capped at
/// [`MAX_SCORED_NODES`] rooms.
pub fn best_moves(graph: &Graph, visited: &BTreeSet<Node>, from: &Node) -> BTreeSet<Node> {
    let targets = frontier(graph, visited);
    if targets.is_empty() {
        return BTreeSet::new();
    }
    let bit_of: HashMap<&Node, usize> = targets.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    let walkable = |node: &Node| visited.contains(node) || bit_of.contains_key(node);
    let goal = targets.len();

    let mut expanded: HashSet<(&Node, Covered)> = HashSet::new();
    expanded.insert((from, Covered::empty(goal)));

    let mut layer: HashMap<(&Node, Covered), BTreeSet<&Node>> = HashMap::new();
    for next in graph.neighbors(from).filter(|n| walkable(n)) {
        let state = (next, Covered::empty(goal).with(bit_of.get(next).copied()));
        layer.entry(state).or_default().insert(next);
    }

    while !layer.is_empty() {
        let complete: BTreeSet<Node> = layer
            .iter()
            .filter(|((_, covered), _)| covered.count() == goal)
            .flat_map(|(_, firsts)| firsts.iter().map(|n| (*n).clone()))
            .collect();
        if !complete.is_empty() {
            return complete;
        }

        let mut next_layer: HashMap<(&Node, Covered), BTreeSet<&Node>> = HashMap::new();
        for ((node, covered), firsts) in layer {
            if !expanded.insert((node, covered.clone())) {
                continue;
            }
            for next in graph.neighbors(node).filter(|n| walkable(n)) {
                let state = (next, covered.with(bit_of.get(next).copied()));
                if expanded.contains(&state) {
                    continue;
                }
                next_layer.entry(state).or_default().extend(firsts.iter().copied());
            }
        }
        layer = next_layer;
    }
    BTreeSet::new()
}

/// Replay `log` on `graph` and compute the episode metrics.
pub fn score(graph: &Graph, log: &EpisodeLog) -> Result<ScoreReport, ScorerContractViolation> {
    require(graph, &log.start)?;

    let mut position = log.start.clone();
    let mut visited: BTreeSet<Node> = BTreeSet::from([log.start.clone()]);
    let mut seen: BTreeSet<Node> = visited.clone();
    seen.extend(graph.neighbors(&log.start).cloned());
    let mut efficient_moves = Vec::new();

    for (round, events) in log.rounds.iter().enumerate() {
        for event in events {
            require(graph, &event.from)?;
            require(graph, &event.to)?;
            if event.action.kind != ActionKind::Move {
                continue;
            }
            if event.from != position {
                return Err(ScorerContractViolation::MoveOutOfPlace {
                    round,
                    expected: position.key(),
                    found: event.from.key(),
                });
            }
            if !graph.has_edge(&event.from, &event.to) {
                return Err(ScorerContractViolation::NotAnEdge {
                    round,
                    from: event.from.key(),
                    to: event.to.key(),
                });
            }

            let efficient = best_moves(graph, &visited, &event.from).contains(&event.to);
            efficient_moves.push(efficient);

            position = event.to.clone();
            visited.insert(position.clone());
            seen.insert(position.clone());
            seen.extend(graph.neighbors(&position).cloned());
        }
    }

    let outcome = log.outcome();
    let valid_moves = efficient_moves.len();
    let efficient = efficient_moves.iter().filter(|e| **e).count();
    let total_nodes = graph.node_count();

    let exploration_pct = 100.0 * visited.len() as f64 / total_nodes as f64;
    let efficiency_pct = if valid_moves == 0 {
        0.0
    } else {
        100.0 * efficient as f64 / valid_moves as f64
    };
    let bench_score = if outcome == Outcome::Success {
        MetricValue::Number(harmonic(efficiency_pct, exploration_pct))
    } else {
        MetricValue::NotApplicable
    };
    // Worlds beyond the reasoning limit are never compared.
    let graph_similarity = log
        .reported_graph
        .as_ref()
        .filter(|_| total_nodes <= MAX_REASONING_NODES)
        .map(|reported| similarity(&SimpleGraph::from_graph(graph), &SimpleGraph::from_reported(reported)));

    Ok(ScoreReport {
        efficient_moves,
        valid_moves,
        invalid_moves: log.invalid_attempts(),
        stopped: outcome == Outcome::Success,
        outcome,
        nodes_visited: visited.len(),
        nodes_seen: seen.len(),
        total_nodes,
        efficiency_pct,
        exploration_pct,
        bench_score,
        graph_similarity,
    })
}

fn harmonic(efficiency: f64, exploration: f64) -> f64 {
    if efficiency + exploration == 0.0 {
        0.0
    } else {
        2.0 * efficiency * exploration / (efficiency + exploration)
    }
}
