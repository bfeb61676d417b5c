//! Undirected room graph with compass-labelled edges.
//!
//! Adjacency is stored per node as a `Direction -> Node` map, so every edge is
//! present in both orientations and `step`/`direction_of` are lookups rather
//! than searches. `BTreeMap` keeps iteration order deterministic.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use thiserror::Error;

use crate::core::direction::{Direction, direction_between};
use crate::core::node::Node;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node {0} is not in the graph")]
    MissingNode(Node),
    #[error("nodes {0} and {1} are not one grid step apart")]
    NotAdjacent(Node, Node),
    #[error("{0} already has a {1} neighbour other than {2}")]
    DirectionTaken(Node, Direction, Node),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    adjacency: BTreeMap<Node, BTreeMap<Direction, Node>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. Returns false if it was already present.
    pub fn add_node(&mut self, node: Node) -> bool {
        if self.adjacency.contains_key(&node) {
            return false;
        }
        self.adjacency.insert(node, BTreeMap::new());
        true
    }

    /// Connect two existing nodes that are exactly one grid step apart.
    pub fn add_edge(&mut self, a: &Node, b: &Node) -> Result<(), GraphError> {
        for node in [a, b] {
            if !self.contains(node) {
                return Err(GraphError::MissingNode(node.clone()));
            }
        }
        let direction = direction_between(a.coord(), b.coord())
            .ok_or_else(|| GraphError::NotAdjacent(a.clone(), b.clone()))?;
        for (from, to, dir) in [(a, b, direction), (b, a, direction.opposite())] {
            if let Some(existing) = self.adjacency[from].get(&dir)
                && existing != to
            {
                return Err(GraphError::DirectionTaken(
                    from.clone(),
                    dir,
                    existing.clone(),
                ));
            }
        }
        if let Some(neighbours) = self.adjacency.get_mut(a) {
            neighbours.insert(direction, b.clone());
        }
        if let Some(neighbours) = self.adjacency.get_mut(b) {
            neighbours.insert(direction.opposite(), a.clone());
        }
        Ok(())
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.adjacency.contains_key(node)
    }

    pub fn has_edge(&self, a: &Node, b: &Node) -> bool {
        self.adjacency
            .get(a)
            .is_some_and(|neighbours| neighbours.values().any(|n| n == b))
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeMap::len).sum::<usize>() / 2
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.adjacency.keys()
    }

    /// Every edge in both orientations.
    pub fn edges(&self) -> impl Iterator<Item = (&Node, &Node)> {
        self.adjacency
            .iter()
            .flat_map(|(from, neighbours)| neighbours.values().map(move |to| (from, to)))
    }

    /// Every edge once, smaller endpoint first.
    pub fn undirected_edges(&self) -> impl Iterator<Item = (&Node, &Node)> {
        self.edges().filter(|(a, b)| a < b)
    }

    pub fn neighbors(&self, node: &Node) -> impl Iterator<Item = &Node> {
        self.adjacency
            .get(node)
            .into_iter()
            .flat_map(|neighbours| neighbours.values())
    }

    /// Neighbour reached by moving `direction` from `node`, if that edge exists.
    pub fn step(&self, node: &Node, direction: Direction) -> Option<&Node> {
        self.adjacency.get(node)?.get(&direction)
    }

    /// Admissible moves from `node`, in canonical direction order.
    pub fn directions_at(&self, node: &Node) -> Vec<Direction> {
        self.adjacency
            .get(node)
            .map(|neighbours| neighbours.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Direction of the edge `from -> to`, if the edge exists.
    pub fn direction_of(&self, from: &Node, to: &Node) -> Option<Direction> {
        self.adjacency
            .get(from)?
            .iter()
            .find_map(|(direction, node)| (node == to).then_some(*direction))
    }

    /// True if the undirected graph contains at least one cycle.
    pub fn has_cycle(&self) -> bool {
        let mut forest = DisjointSets::new(self.nodes());
        self.undirected_edges().any(|(a, b)| !forest.union(a, b))
    }

    /// True if adding the edge `a - b` would close a cycle.
    pub fn would_close_cycle(&self, a: &Node, b: &Node) -> bool {
        if !self.contains(a) || !self.contains(b) || self.has_edge(a, b) {
            return false;
        }
        self.reachable_from(a).contains(b)
    }

    pub fn is_connected(&self) -> bool {
        match self.nodes().next() {
            None => true,
            Some(first) => self.reachable_from(first).len() == self.node_count(),
        }
    }

    /// Nodes reachable from `start` (including `start`).
    pub fn reachable_from(&self, start: &Node) -> BTreeSet<&Node> {
        let mut seen = BTreeSet::new();
        let Some((start, _)) = self.adjacency.get_key_value(start) else {
            return seen;
        };
        let mut queue = VecDeque::from([start]);
        seen.insert(start);
        while let Some(node) = queue.pop_front() {
            for next in self.neighbors(node) {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen
    }

    /// Rebuild the graph with every node replaced by `f(node)`.
    ///
    /// `f` must preserve coordinates, so edges stay one grid step long.
    pub fn relabel(&self, mut f: impl FnMut(&Node) -> Node) -> Result<Graph, GraphError> {
        let mapping: HashMap<&Node, Node> = self.nodes().map(|node| (node, f(node))).collect();
        let mut relabeled = Graph::new();
        for node in mapping.values() {
            relabeled.add_node(node.clone());
        }
        for (a, b) in self.undirected_edges() {
            relabeled.add_edge(&mapping[a], &mapping[b])?;
        }
        Ok(relabeled)
    }
}

/// Union-find over graph nodes, used for cycle checks.
struct DisjointSets<'a> {
    index: HashMap<&'a Node, usize>,
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl<'a> DisjointSets<'a> {
    fn new(nodes: impl Iterator<Item = &'a Node>) -> Self {
        let index: HashMap<&Node, usize> = nodes.enumerate().map(|(i, n)| (n, i)).collect();
        let count = index.len();
        Self {
            index,
            parent: (0..count).collect(),
            size: vec![1; count],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    /// Merge the sets holding `a` and `b`; false if they were already joined.
    fn union(&mut self, a: &Node, b: &Node) -> bool {
        let mut a = self.find(self.index[a]);
        let mut b = self.find(self.index[b]);
        if a == b {
            return false;
        }
        if self.size[a] < self.size[b] {
            std::mem::swap(&mut a, &mut b);
        }
        self.parent[b] = a;
        self.size[a] += self.size[b];
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{line_graph, square_graph};

    #[test]
    fn step_and_direction_of_are_inverse_for_every_edge() {
        let graph = square_graph();
        for (a, b) in graph.edges() {
            let direction = graph.direction_of(a, b).expect("edge direction");
            assert!(graph.directions_at(a).contains(&direction));
            assert_eq!(graph.step(a, direction), Some(b));
            assert_eq!(graph.direction_of(b, a), Some(direction.opposite()));
        }
    }

    #[test]
    fn step_returns_none_without_edge() {
        let graph = line_graph(3);
        assert_eq!(graph.step(&Node::at(0, 0), Direction::North), None);
        assert_eq!(graph.step(&Node::at(9, 9), Direction::East), None);
        assert_eq!(
            graph.directions_at(&Node::at(1, 0)),
            vec![Direction::East, Direction::West]
        );
    }

    #[test]
    fn add_edge_rejects_non_adjacent_and_missing_nodes() {
        let mut graph = Graph::new();
        graph.add_node(Node::at(0, 0));
        graph.add_node(Node::at(1, 1));
        assert_eq!(
            graph.add_edge(&Node::at(0, 0), &Node::at(1, 1)),
            Err(GraphError::NotAdjacent(Node::at(0, 0), Node::at(1, 1)))
        );
        assert_eq!(
            graph.add_edge(&Node::at(0, 0), &Node::at(0, 1)),
            Err(GraphError::MissingNode(Node::at(0, 1)))
        );
    }

    #[test]
    fn cycle_detection() {
        assert!(square_graph().has_cycle());
        assert!(!line_graph(4).has_cycle());
        let line = line_graph(3);
        assert!(!line.would_close_cycle(&Node::at(0, 0), &Node::at(1, 0)));
    }

    #[test]
    fn would_close_cycle_on_reconnecting_path() {
        let mut graph = Graph::new();
        for (x, y) in [(0, 0), (1, 0), (1, 1), (0, 1)] {
            graph.add_node(Node::at(x, y));
        }
        graph.add_edge(&Node::at(0, 0), &Node::at(1, 0)).expect("edge");
        graph.add_edge(&Node::at(1, 0), &Node::at(1, 1)).expect("edge");
        graph.add_edge(&Node::at(1, 1), &Node::at(0, 1)).expect("edge");
        assert!(graph.would_close_cycle(&Node::at(0, 1), &Node::at(0, 0)));
        assert!(!graph.has_cycle());
    }

    #[test]
    fn connectivity() {
        let mut graph = line_graph(3);
        assert!(graph.is_connected());
        graph.add_node(Node::at(5, 5));
        assert!(!graph.is_connected());
    }

    #[test]
    fn relabel_preserves_structure() {
        let graph = square_graph();
        let named = graph
            .relabel(|node| Node::labeled(format!("Room {}", node.key()), node.coord()))
            .expect("relabel");
        assert_eq!(named.node_count(), 4);
        assert_eq!(named.edge_count(), 4);
        assert!(named.has_cycle());
        assert!(named.nodes().all(|node| node.label().is_some()));
    }
}
