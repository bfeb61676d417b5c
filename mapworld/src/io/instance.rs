//! Instance records: one playable world plus the rules it is played under.
//!
//! Records are JSON on disk, checked against `schemas/instance/v1.schema.json`
//! and then against the graph invariants (edges are unit grid steps, the
//! direction and move tables agree with the edges, the start is a room).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::validator_for;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::direction::Direction;
use crate::core::game_master::EpisodeRules;
use crate::core::generator::Ambiguity;
use crate::core::graph::Graph;
use crate::core::node::Node;
use crate::core::scorer::MAX_SCORED_NODES;
use crate::core::similarity::MAX_REASONING_NODES;
use crate::io::config::GameConfig;

pub const INSTANCE_SCHEMA: &str = include_str!("../../../schemas/instance/v1.schema.json");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMoves {
    pub node: Node,
    pub node_moves: Vec<(Direction, Node)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub nodes: Vec<Node>,
    /// Both orientations of every edge.
    pub edges: Vec<(Node, Node)>,
    pub directions: Vec<(Node, Vec<Direction>)>,
    pub moves: Vec<NodeMoves>,
    pub start: Node,
    pub cycle: bool,
    /// `(repeated_labels, repetitions)`.
    pub ambiguity: Option<(usize, usize)>,
    pub max_turns: u32,
    pub move_regex: String,
    pub stop_regex: String,
    #[serde(default)]
    pub graph_reasoning: bool,
}

impl InstanceRecord {
    pub fn build(
        graph: &Graph,
        start: Node,
        ambiguity: Option<Ambiguity>,
        config: &GameConfig,
    ) -> Self {
        Self {
            nodes: graph.nodes().cloned().collect(),
            edges: graph
                .edges()
                .map(|(a, b)| (a.clone(), b.clone()))
                .collect(),
            directions: graph
                .nodes()
                .map(|node| (node.clone(), graph.directions_at(node)))
                .collect(),
            moves: graph
                .nodes()
                .map(|node| NodeMoves {
                    node: node.clone(),
                    node_moves: graph
                        .directions_at(node)
                        .into_iter()
                        .filter_map(|d| graph.step(node, d).map(|to| (d, to.clone())))
                        .collect(),
                })
                .collect(),
            start,
            cycle: graph.has_cycle(),
            ambiguity: ambiguity.map(|a| (a.repeated_labels, a.repetitions)),
            max_turns: config.max_turns,
            move_regex: config.move_regex.clone(),
            stop_regex: config.stop_regex.clone(),
            graph_reasoning: config.graph_reasoning,
        }
    }

    /// Rebuild the graph from the node and edge lists.
    pub fn to_graph(&self) -> Result<Graph> {
        let mut graph = Graph::new();
        for node in &self.nodes {
            if !graph.add_node(node.clone()) {
                bail!("duplicate node {node}");
            }
        }
        for (a, b) in &self.edges {
            if graph.has_edge(a, b) {
                continue;
            }
            graph
                .add_edge(a, b)
                .with_context(|| format!("edge {a} - {b}"))?;
        }
        Ok(graph)
    }

    /// Episode rules: grammar and limits come from the record, the reprompt
    /// and loop policies from `config`.
    pub fn rules(&self, config: &GameConfig) -> Result<EpisodeRules> {
        let instance_config = GameConfig {
            max_turns: self.max_turns,
            move_regex: self.move_regex.clone(),
            stop_regex: self.stop_regex.clone(),
            graph_reasoning: self.graph_reasoning,
            ..config.clone()
        };
        instance_config.rules()
    }

    /// Semantic checks beyond the schema. Returns every violation found.
    pub fn invariant_errors(&self) -> Vec<String> {
        let graph = match self.to_graph() {
            Ok(graph) => graph,
            Err(err) => return vec![format!("{err:#}")],
        };
        let mut errors = Vec::new();

        if !graph.contains(&self.start) {
            errors.push(format!("start {} is not a node", self.start));
        }
        if !graph.is_connected() {
            errors.push("graph is not connected".to_string());
        }
        for (a, b) in &self.edges {
            if !self.edges.iter().any(|(x, y)| x == b && y == a) {
                errors.push(format!("edge {a} -> {b} has no reverse"));
            }
        }
        if graph.node_count() > MAX_SCORED_NODES {
            errors.push(format!(
                "worlds are scored up to {MAX_SCORED_NODES} rooms, found {}",
                graph.node_count()
            ));
        }
        if self.graph_reasoning && graph.node_count() > MAX_REASONING_NODES {
            errors.push(format!(
                "graph_reasoning supports at most {MAX_REASONING_NODES} rooms, found {}",
                graph.node_count()
            ));
        }
        if self.cycle != graph.has_cycle() {
            errors.push(format!("cycle flag is {} but the graph disagrees", self.cycle));
        }

        let listed: BTreeMap<&Node, &Vec<Direction>> =
            self.directions.iter().map(|(n, d)| (n, d)).collect();
        for node in graph.nodes() {
            let expected = graph.directions_at(node);
            match listed.get(node) {
                None => errors.push(format!("no directions listed for {node}")),
                Some(found) => {
                    let mut found = (*found).clone();
                    found.sort();
                    if found != expected {
                        errors.push(format!("directions for {node} do not match its edges"));
                    }
                }
            }
        }
        for entry in &self.moves {
            if !graph.contains(&entry.node) {
                errors.push(format!("moves listed for unknown node {}", entry.node));
                continue;
            }
            for (direction, to) in &entry.node_moves {
                if graph.step(&entry.node, *direction) != Some(to) {
                    errors.push(format!(
                        "move {direction} from {} does not lead to {to}",
                        entry.node
                    ));
                }
            }
        }

        if let Err(err) = self.rules(&GameConfig::default()) {
            errors.push(format!("{err:#}"));
        }
        errors
    }
}

/// Load, schema-check and invariant-check an instance record.
pub fn load_instance(path: &Path) -> Result<InstanceRecord> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read instance {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse instance {}", path.display()))?;
    validate_schema(&value).with_context(|| format!("validate {}", path.display()))?;
    let record: InstanceRecord = serde_json::from_value(value)
        .with_context(|| format!("deserialize instance {}", path.display()))?;
    validate_instance(&record).with_context(|| format!("validate {}", path.display()))?;
    debug!(path = %path.display(), nodes = record.nodes.len(), "instance loaded");
    Ok(record)
}

/// Write an instance as pretty JSON with a trailing newline.
pub fn write_instance(path: &Path, record: &InstanceRecord) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(record).context("serialize instance")?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write instance {}", path.display()))
}

pub fn validate_schema(instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(INSTANCE_SCHEMA).context("parse instance schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(instance) {
        let messages = compiled
            .iter_errors(instance)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "instance schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

pub fn validate_instance(record: &InstanceRecord) -> Result<()> {
    let errors = record.invariant_errors();
    if errors.is_empty() {
        return Ok(());
    }
    Err(anyhow!("instance invariants failed: {}", errors.join("; ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{line_graph, named_square_graph, square_graph};

    fn square_instance() -> InstanceRecord {
        InstanceRecord::build(&square_graph(), Node::at(0, 0), None, &GameConfig::default())
    }

    #[test]
    fn built_record_is_valid() {
        let record = square_instance();
        assert!(record.cycle);
        assert_eq!(record.edges.len(), 8);
        assert_eq!(record.invariant_errors(), Vec::<String>::new());
        let value = serde_json::to_value(&record).expect("json");
        validate_schema(&value).expect("schema");
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("instance.json");
        let record = InstanceRecord::build(
            &named_square_graph(),
            Node::labeled("Kitchen", (0, 0).into()),
            Some(Ambiguity {
                repeated_labels: 1,
                repetitions: 2,
            }),
            &GameConfig::default(),
        );
        write_instance(&path, &record).expect("write");
        let loaded = load_instance(&path).expect("load");
        assert_eq!(loaded, record);
        assert_eq!(loaded.to_graph().expect("graph"), named_square_graph());
    }

    #[test]
    fn schema_rejects_malformed_records() {
        let mut value = serde_json::to_value(square_instance()).expect("json");
        value["directions"][0][1] = serde_json::json!(["up"]);
        assert!(validate_schema(&value).is_err());

        let mut value = serde_json::to_value(square_instance()).expect("json");
        value.as_object_mut().expect("object").remove("start");
        assert!(validate_schema(&value).is_err());
    }

    #[test]
    fn invariants_catch_inconsistent_tables() {
        let mut record = square_instance();
        record.start = Node::at(4, 4);
        record.directions[0].1 = vec![Direction::West];
        record.cycle = false;
        let errors = record.invariant_errors();
        assert_eq!(errors.len(), 3, "{errors:?}");

        let mut record = square_instance();
        record.edges.push((Node::at(0, 0), Node::at(1, 1)));
        assert!(validate_instance(&record).is_err());
    }

    #[test]
    fn graph_reasoning_records_are_size_limited() {
        let mut record = InstanceRecord::build(&line_graph(9), Node::at(0, 0), None, &GameConfig::default());
        assert_eq!(record.invariant_errors(), Vec::<String>::new());

        record.graph_reasoning = true;
        let errors = record.invariant_errors();
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].contains("at most 8 rooms"), "{errors:?}");
        assert!(validate_instance(&record).is_err());

        let mut record = square_instance();
        record.graph_reasoning = true;
        assert_eq!(record.invariant_errors(), Vec::<String>::new());
    }

    #[test]
    fn oversized_worlds_are_rejected() {
        let record = InstanceRecord::build(
            &line_graph(MAX_SCORED_NODES as i32 + 1),
            Node::at(0, 0),
            None,
            &GameConfig::default(),
        );
        let errors = record.invariant_errors();
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].contains("up to 24 rooms"), "{errors:?}");
    }

    #[test]
    fn rules_take_limits_from_the_record() {
        let mut record = square_instance();
        record.max_turns = 3;
        let config = GameConfig {
            reprompt: true,
            max_turns: 50,
            ..GameConfig::default()
        };
        let rules = record.rules(&config).expect("rules");
        assert_eq!(rules.max_turns, 3);
        assert!(rules.reprompt);
    }
}
