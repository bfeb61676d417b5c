//! Procedural world construction by constrained random walk.
//!
//! A walk starts on a random grid cell and keeps stepping in random
//! directions, adding rooms and corridors, until the target room count is
//! reached. Cycle requirements are enforced during the walk (`ForbidCycle`) or
//! by a repair pass afterwards (`ForceCycle`). Failed attempts are retried up
//! to the policy's bound; every attempt draws from the caller's
//! [`RandomSource`].

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::core::direction::{Coord, Direction};
use crate::core::graph::{Graph, GraphError};
use crate::core::node::Node;
use crate::core::random::RandomSource;
use crate::core::rooms::ROOM_NAMES;
use crate::core::scorer::MAX_SCORED_NODES;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleRequirement {
    ForceCycle,
    ForbidCycle,
    NoConstraint,
}

/// `repeated_labels` room names, each shared by `repetitions` distinct rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ambiguity {
    pub repeated_labels: usize,
    pub repetitions: usize,
}

/// How a world should be generated. Built once per experiment and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationPolicy {
    /// Grid width (x in `0..width`).
    pub width: u32,
    /// Grid height (y in `0..height`).
    pub height: u32,
    pub target_nodes: usize,
    pub cycle: CycleRequirement,
    /// Give every room a label from the room vocabulary.
    pub named: bool,
    /// Reuse labels across rooms. Implies `named`.
    pub ambiguity: Option<Ambiguity>,
    /// Whole-walk retries before giving up.
    pub max_attempts: u32,
    /// Walk budget per attempt, as a multiple of `target_nodes`.
    pub walk_steps_per_node: u32,
}

impl Default for GenerationPolicy {
    fn default() -> Self {
        Self {
            width: 4,
            height: 4,
            target_nodes: 8,
            cycle: CycleRequirement::NoConstraint,
            named: false,
            ambiguity: None,
            max_attempts: 50,
            walk_steps_per_node: 50,
        }
    }
}

impl GenerationPolicy {
    pub fn is_named(&self) -> bool {
        self.named || self.ambiguity.is_some()
    }

    pub fn validate(&self) -> Result<(), GenerationFailure> {
        let invalid = |msg: String| Err(GenerationFailure::InvalidPolicy(msg));
        if self.width == 0 || self.height == 0 {
            return invalid("grid dimensions must be > 0".to_string());
        }
        let cells = self.width as usize * self.height as usize;
        if self.target_nodes == 0 || self.target_nodes > cells {
            return invalid(format!(
                "target_nodes must be in 1..={cells} for a {}x{} grid",
                self.width, self.height
            ));
        }
        if self.target_nodes > MAX_SCORED_NODES {
            return invalid(format!(
                "target_nodes must be at most {MAX_SCORED_NODES} for the world to be scored"
            ));
        }
        if self.max_attempts == 0 {
            return invalid("max_attempts must be > 0".to_string());
        }
        if self.walk_steps_per_node == 0 {
            return invalid("walk_steps_per_node must be > 0".to_string());
        }
        let mut labels_needed = self.target_nodes;
        if let Some(ambiguity) = self.ambiguity {
            if ambiguity.repeated_labels == 0 || ambiguity.repetitions < 2 {
                return invalid(
                    "ambiguity needs repeated_labels >= 1 and repetitions >= 2".to_string(),
                );
            }
            let covered = ambiguity.repeated_labels * ambiguity.repetitions;
            if covered > self.target_nodes {
                return invalid(format!(
                    "ambiguity covers {covered} rooms but only {} exist",
                    self.target_nodes
                ));
            }
            labels_needed = ambiguity.repeated_labels + self.target_nodes - covered;
        }
        if self.is_named() && labels_needed > ROOM_NAMES.len() {
            return invalid(format!(
                "{labels_needed} room names needed but the vocabulary has {}",
                ROOM_NAMES.len()
            ));
        }
        Ok(())
    }
}

/// Why a single walk attempt was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Stalled { nodes: usize },
    RepairFailed,
    UnexpectedCycle,
    Disconnected,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Stalled { nodes } => write!(f, "walk stalled at {nodes} rooms"),
            RejectReason::RepairFailed => f.write_str("cycle repair found no usable edge"),
            RejectReason::UnexpectedCycle => f.write_str("acyclic walk produced a cycle"),
            RejectReason::Disconnected => f.write_str("walk produced a disconnected graph"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationFailure {
    #[error("invalid generation policy: {0}")]
    InvalidPolicy(String),
    #[error("no graph satisfied the policy after {attempts} attempts (last: {last})")]
    RetriesExhausted { attempts: u32, last: RejectReason },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

enum Attempt {
    Built(Graph),
    Rejected(RejectReason),
}

/// Build a connected graph of exactly `policy.target_nodes` rooms.
#[instrument(skip_all, fields(target = policy.target_nodes, cycle = ?policy.cycle))]
pub fn generate(
    policy: &GenerationPolicy,
    rng: &mut RandomSource,
) -> Result<Graph, GenerationFailure> {
    policy.validate()?;

    let mut last = RejectReason::Stalled { nodes: 0 };
    for attempt in 1..=policy.max_attempts {
        match walk(policy, rng)? {
            Attempt::Built(graph) => {
                info!(
                    attempt,
                    nodes = graph.node_count(),
                    edges = graph.edge_count(),
                    "graph generated"
                );
                if policy.is_named() {
                    return name_rooms(&graph, policy, rng);
                }
                return Ok(graph);
            }
            Attempt::Rejected(reason) => {
                debug!(attempt, %reason, "generation attempt rejected");
                last = reason;
            }
        }
    }

    Err(GenerationFailure::RetriesExhausted {
        attempts: policy.max_attempts,
        last,
    })
}

fn walk(policy: &GenerationPolicy, rng: &mut RandomSource) -> Result<Attempt, GenerationFailure> {
    let start = Coord::new(
        rng.below(policy.width as usize) as i32,
        rng.below(policy.height as usize) as i32,
    );
    let mut graph = Graph::new();
    let mut head = Node::Coord(start);
    graph.add_node(head.clone());

    let budget = policy.walk_steps_per_node as usize * policy.target_nodes;
    let mut steps = 0usize;
    while graph.node_count() < policy.target_nodes {
        if steps >= budget {
            return Ok(Attempt::Rejected(RejectReason::Stalled {
                nodes: graph.node_count(),
            }));
        }
        steps += 1;

        let Some(direction) = rng.pick(&Direction::ALL).copied() else {
            continue;
        };
        let candidate = head.coord().offset(direction);
        if !candidate.within(policy.width, policy.height) {
            continue;
        }
        let next = Node::Coord(candidate);

        if graph.add_node(next.clone()) {
            graph.add_edge(&head, &next)?;
        } else if !graph.has_edge(&head, &next) {
            if policy.cycle == CycleRequirement::ForbidCycle
                && graph.would_close_cycle(&head, &next)
            {
                continue;
            }
            graph.add_edge(&head, &next)?;
        }
        head = next;
    }

    match policy.cycle {
        CycleRequirement::ForceCycle if !graph.has_cycle() => {
            if !repair_cycle(&mut graph, rng)? || !graph.has_cycle() {
                return Ok(Attempt::Rejected(RejectReason::RepairFailed));
            }
        }
        CycleRequirement::ForbidCycle if graph.has_cycle() => {
            return Ok(Attempt::Rejected(RejectReason::UnexpectedCycle));
        }
        _ => {}
    }

    if !graph.is_connected() {
        return Ok(Attempt::Rejected(RejectReason::Disconnected));
    }
    Ok(Attempt::Built(graph))
}

/// Add one edge between grid-adjacent rooms that are not yet connected.
///
/// Returns false when no such pair exists.
fn repair_cycle(graph: &mut Graph, rng: &mut RandomSource) -> Result<bool, GraphError> {
    let candidates: Vec<(Node, Node)> = graph
        .nodes()
        .flat_map(|node| {
            [Direction::North, Direction::East]
                .into_iter()
                .map(move |direction| (node, Node::Coord(node.coord().offset(direction))))
        })
        .filter(|(node, neighbour)| graph.contains(neighbour) && !graph.has_edge(node, neighbour))
        .map(|(node, neighbour)| (node.clone(), neighbour))
        .collect();

    let Some((a, b)) = rng.pick(&candidates).cloned() else {
        return Ok(false);
    };
    debug!(from = %a, to = %b, "adding repair edge");
    graph.add_edge(&a, &b)?;
    Ok(true)
}

/// Label every room from the vocabulary, sharing labels per the ambiguity spec.
fn name_rooms(
    graph: &Graph,
    policy: &GenerationPolicy,
    rng: &mut RandomSource,
) -> Result<Graph, GenerationFailure> {
    let mut coords: Vec<Coord> = graph.nodes().map(Node::coord).collect();
    rng.shuffle(&mut coords);
    let mut names: Vec<&str> = ROOM_NAMES.to_vec();
    rng.shuffle(&mut names);

    let mut coords = coords.into_iter();
    let mut names = names.into_iter();
    let exhausted = || GenerationFailure::InvalidPolicy("room vocabulary exhausted".to_string());
    let mut labels: HashMap<Coord, &str> = HashMap::new();

    if let Some(ambiguity) = policy.ambiguity {
        for _ in 0..ambiguity.repeated_labels {
            let name = names.next().ok_or_else(exhausted)?;
            for coord in coords.by_ref().take(ambiguity.repetitions) {
                labels.insert(coord, name);
            }
        }
    }
    for coord in coords {
        labels.insert(coord, names.next().ok_or_else(exhausted)?);
    }

    let named = graph.relabel(|node| {
        let coord = node.coord();
        let label = labels.get(&coord).copied().unwrap_or("Room");
        Node::labeled(label, coord)
    })?;
    Ok(named)
}

/// Uniformly chosen starting room.
pub fn pick_start(graph: &Graph, rng: &mut RandomSource) -> Option<Node> {
    let nodes: Vec<&Node> = graph.nodes().collect();
    rng.pick(&nodes).map(|node| (*node).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn policy(cycle: CycleRequirement) -> GenerationPolicy {
        GenerationPolicy {
            width: 4,
            height: 4,
            target_nodes: 8,
            cycle,
            ..GenerationPolicy::default()
        }
    }

    #[test]
    fn forbid_cycle_yields_trees() {
        for seed in 0..25 {
            let mut rng = RandomSource::seeded(seed);
            let graph = generate(&policy(CycleRequirement::ForbidCycle), &mut rng)
                .expect("generate");
            assert!(!graph.has_cycle(), "seed {seed} produced a cycle");
            assert_eq!(graph.node_count(), 8);
            assert_eq!(graph.edge_count(), 7);
            assert!(graph.is_connected());
        }
    }

    #[test]
    fn force_cycle_yields_cycles() {
        for seed in 0..25 {
            let mut rng = RandomSource::seeded(seed);
            let graph =
                generate(&policy(CycleRequirement::ForceCycle), &mut rng).expect("generate");
            assert!(graph.has_cycle(), "seed {seed} produced a tree");
            assert_eq!(graph.node_count(), 8);
            assert!(graph.is_connected());
        }
    }

    #[test]
    fn nodes_stay_inside_the_grid_and_edges_are_unit_steps() {
        let p = GenerationPolicy {
            width: 3,
            height: 5,
            target_nodes: 10,
            ..GenerationPolicy::default()
        };
        let graph = generate(&p, &mut RandomSource::seeded(3)).expect("generate");
        assert_eq!(graph.node_count(), 10);
        for node in graph.nodes() {
            assert!(node.coord().within(3, 5));
        }
        for (a, b) in graph.edges() {
            assert!(graph.direction_of(a, b).is_some());
        }
    }

    #[test]
    fn same_seed_same_graph() {
        let p = policy(CycleRequirement::NoConstraint);
        let a = generate(&p, &mut RandomSource::seeded(42)).expect("a");
        let b = generate(&p, &mut RandomSource::seeded(42)).expect("b");
        assert_eq!(a, b);
    }

    #[test]
    fn fills_the_whole_grid() {
        let p = GenerationPolicy {
            width: 2,
            height: 2,
            target_nodes: 4,
            cycle: CycleRequirement::ForceCycle,
            ..GenerationPolicy::default()
        };
        let graph = generate(&p, &mut RandomSource::seeded(9)).expect("generate");
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 4);
    }

    #[test]
    fn single_corridor_cannot_hold_a_cycle() {
        let p = GenerationPolicy {
            width: 5,
            height: 1,
            target_nodes: 5,
            cycle: CycleRequirement::ForceCycle,
            max_attempts: 3,
            walk_steps_per_node: 200,
            ..GenerationPolicy::default()
        };
        let err = generate(&p, &mut RandomSource::seeded(1)).expect_err("must fail");
        assert_eq!(
            err,
            GenerationFailure::RetriesExhausted {
                attempts: 3,
                last: RejectReason::RepairFailed
            }
        );
    }

    #[test]
    fn rejects_invalid_policies() {
        let too_many = GenerationPolicy {
            width: 2,
            height: 2,
            target_nodes: 5,
            ..GenerationPolicy::default()
        };
        assert!(matches!(
            generate(&too_many, &mut RandomSource::seeded(0)),
            Err(GenerationFailure::InvalidPolicy(_))
        ));

        let unscorable = GenerationPolicy {
            width: 6,
            height: 6,
            target_nodes: MAX_SCORED_NODES + 1,
            ..GenerationPolicy::default()
        };
        assert!(matches!(
            unscorable.validate(),
            Err(GenerationFailure::InvalidPolicy(msg)) if msg.contains("at most 24")
        ));
        let largest = GenerationPolicy {
            target_nodes: MAX_SCORED_NODES,
            ..unscorable
        };
        assert_eq!(largest.validate(), Ok(()));

        let over_covered = GenerationPolicy {
            ambiguity: Some(Ambiguity {
                repeated_labels: 3,
                repetitions: 3,
            }),
            ..GenerationPolicy::default()
        };
        assert!(matches!(
            over_covered.validate(),
            Err(GenerationFailure::InvalidPolicy(msg)) if msg.contains("ambiguity covers 9")
        ));
    }

    #[test]
    fn named_graphs_get_unique_labels() {
        let p = GenerationPolicy {
            named: true,
            ..policy(CycleRequirement::NoConstraint)
        };
        let graph = generate(&p, &mut RandomSource::seeded(5)).expect("generate");
        let mut labels: Vec<&str> = graph.nodes().filter_map(Node::label).collect();
        assert_eq!(labels.len(), 8);
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), 8);
    }

    #[test]
    fn ambiguity_repeats_exactly_k_labels_r_times() {
        let p = GenerationPolicy {
            ambiguity: Some(Ambiguity {
                repeated_labels: 2,
                repetitions: 3,
            }),
            ..policy(CycleRequirement::NoConstraint)
        };
        let graph = generate(&p, &mut RandomSource::seeded(11)).expect("generate");
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for label in graph.nodes().filter_map(Node::label) {
            *counts.entry(label).or_default() += 1;
        }
        let repeated: Vec<usize> = counts.values().copied().filter(|c| *c > 1).collect();
        assert_eq!(repeated, vec![3, 3]);
        assert_eq!(counts.values().filter(|c| **c == 1).count(), 2);
        assert_eq!(graph.node_count(), 8);
        assert!(graph.is_connected());
    }

    #[test]
    fn start_is_a_node_of_the_graph() {
        let mut rng = RandomSource::seeded(3);
        let graph = generate(&GenerationPolicy::default(), &mut rng).expect("graph");
        let start = pick_start(&graph, &mut rng).expect("start");
        assert!(graph.contains(&start));
        assert!(pick_start(&Graph::new(), &mut rng).is_none());
    }
}
