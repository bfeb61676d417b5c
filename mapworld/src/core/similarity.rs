//! Similarity between the true map and a map reported by the mover.
//!
//! Distance is the exact graph edit distance with unit costs (node insert,
//! delete, relabel; edge insert, delete), found by depth-first branch and
//! bound over partial injective node mappings. The search is exponential in
//! the map size, so worlds scored this way are limited to
//! [`MAX_REASONING_NODES`] rooms and oversized reports are not searched at all.

use std::collections::BTreeMap;

use crate::core::graph::Graph;
use crate::core::types::ReportedGraph;

/// Largest world that may be played with graph reasoning enabled.
pub const MAX_REASONING_NODES: usize = 8;

/// Reported rooms allowed beyond the true room count before a report is
/// scored as completely dissimilar.
pub const MAX_EXTRA_REPORTED_NODES: usize = 4;

/// Labelled undirected graph with case-normalized node labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleGraph {
    labels: Vec<String>,
    adjacent: Vec<Vec<bool>>,
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

impl SimpleGraph {
    fn with_nodes(labels: Vec<String>) -> Self {
        let n = labels.len();
        Self {
            labels,
            adjacent: vec![vec![false; n]; n],
        }
    }

    fn connect(&mut self, a: usize, b: usize) {
        if a != b {
            self.adjacent[a][b] = true;
            self.adjacent[b][a] = true;
        }
    }

    pub fn from_graph(graph: &Graph) -> Self {
        let index: BTreeMap<_, _> = graph.nodes().enumerate().map(|(i, n)| (n, i)).collect();
        let mut simple = Self::with_nodes(graph.nodes().map(|n| normalize(&n.display_name())).collect());
        for (a, b) in graph.undirected_edges() {
            simple.connect(index[a], index[b]);
        }
        simple
    }

    /// Reported labels are deduplicated after normalization; edge endpoints
    /// that were not listed as nodes are added.
    pub fn from_reported(reported: &ReportedGraph) -> Self {
        let mut labels: Vec<String> = Vec::new();
        let mut index: BTreeMap<String, usize> = BTreeMap::new();
        let mut intern = |raw: &str, labels: &mut Vec<String>| {
            let label = normalize(raw);
            *index.entry(label.clone()).or_insert_with(|| {
                labels.push(label);
                labels.len() - 1
            })
        };

        for node in &reported.nodes {
            intern(node, &mut labels);
        }
        let edges: Vec<(usize, usize)> = reported
            .edges
            .iter()
            .map(|(a, b)| (intern(a, &mut labels), intern(b, &mut labels)))
            .collect();

        let mut simple = Self::with_nodes(labels);
        for (a, b) in edges {
            simple.connect(a, b);
        }
        simple
    }

    pub fn node_count(&self) -> usize {
        self.labels.len()
    }

    pub fn edge_count(&self) -> usize {
        (0..self.node_count())
            .map(|a| (a + 1..self.node_count()).filter(|&b| self.adjacent[a][b]).count())
            .sum()
    }
}

struct Search<'a> {
    source: &'a SimpleGraph,
    target: &'a SimpleGraph,
    mapping: Vec<Option<usize>>,
    used: Vec<bool>,
    best: usize,
}

impl Search<'_> {
    fn assignment_cost(&self, i: usize, to: Option<usize>) -> usize {
        let mut cost = match to {
            Some(j) => usize::from(self.source.labels[i] != self.target.labels[j]),
            None => 1,
        };
        for (k, mapped) in self.mapping.iter().enumerate().take(i) {
            let in_source = self.source.adjacent[k][i];
            let in_target = match (mapped, to) {
                (Some(x), Some(y)) => self.target.adjacent[*x][y],
                _ => false,
            };
            cost += usize::from(in_source != in_target);
        }
        cost
    }

    /// Cost of inserting every target node outside the mapping's image, plus
    /// every target edge touching one.
    fn completion_cost(&self) -> usize {
        let n = self.target.node_count();
        let inserted_nodes = self.used.iter().filter(|u| !**u).count();
        let inserted_edges = (0..n)
            .flat_map(|a| (a + 1..n).map(move |b| (a, b)))
            .filter(|&(a, b)| self.target.adjacent[a][b] && (!self.used[a] || !self.used[b]))
            .count();
        inserted_nodes + inserted_edges
    }

    /// Admissible estimate of the cost still to come once source nodes
    /// `0..i` are mapped.
    ///
    /// Nodes: remaining source labels against unused target labels, as
    /// multisets; every unmatched label costs at least one edit. Edges: source
    /// edges touching a remaining node can only match target edges touching an
    /// unused node, so the count difference must be paid.
    fn lower_bound(&self, i: usize) -> usize {
        let mut counts: BTreeMap<&str, isize> = BTreeMap::new();
        for label in &self.source.labels[i..] {
            *counts.entry(label.as_str()).or_default() += 1;
        }
        let mut unused = 0;
        let mut shared = 0;
        for (j, label) in self.target.labels.iter().enumerate() {
            if self.used[j] {
                continue;
            }
            unused += 1;
            if let Some(count) = counts.get_mut(label.as_str())
                && *count > 0
            {
                *count -= 1;
                shared += 1;
            }
        }
        let remaining = self.source.node_count() - i;
        let node_bound = remaining.max(unused) - shared;

        let source_edges = edges_touching(self.source, |a| a >= i);
        let target_edges = edges_touching(self.target, |a| !self.used[a]);
        node_bound + source_edges.abs_diff(target_edges)
    }

    fn descend(&mut self, i: usize, cost: usize) {
        if i == self.source.node_count() {
            self.best = self.best.min(cost + self.completion_cost());
            return;
        }
        if cost + self.lower_bound(i) >= self.best {
            return;
        }

        for j in 0..self.target.node_count() {
            if self.used[j] {
                continue;
            }
            let next = cost + self.assignment_cost(i, Some(j));
            if next >= self.best {
                continue;
            }
            self.used[j] = true;
            self.mapping[i] = Some(j);
            self.descend(i + 1, next);
            self.mapping[i] = None;
            self.used[j] = false;
        }

        let next = cost + self.assignment_cost(i, None);
        if next < self.best {
            self.descend(i + 1, next);
        }
    }
}

/// Undirected edges with at least one endpoint satisfying `open`.
fn edges_touching(graph: &SimpleGraph, open: impl Fn(usize) -> bool) -> usize {
    let n = graph.node_count();
    (0..n)
        .flat_map(|a| (a + 1..n).map(move |b| (a, b)))
        .filter(|&(a, b)| graph.adjacent[a][b] && (open(a) || open(b)))
        .count()
}

/// Minimum number of unit edit operations turning `a` into `b`.
///
/// Symmetric; the smaller graph drives the search.
pub fn graph_edit_distance(a: &SimpleGraph, b: &SimpleGraph) -> usize {
    let (source, target) = if a.node_count() <= b.node_count() {
        (a, b)
    } else {
        (b, a)
    };
    let upper = source.node_count() + source.edge_count() + target.node_count() + target.edge_count();
    let mut search = Search {
        source,
        target,
        mapping: vec![None; source.node_count()],
        used: vec![false; target.node_count()],
        best: upper + 1,
    };
    search.descend(0, 0);
    search.best
}

/// `1 - 2·(sigmoid(0.5·d) - 0.5)`: 1.0 for identical maps, approaching 0 as
/// the edit distance grows.
///
/// A report with more than [`MAX_EXTRA_REPORTED_NODES`] rooms beyond the
/// true map scores 0.0 without searching.
pub fn similarity(true_graph: &SimpleGraph, reported: &SimpleGraph) -> f64 {
    if reported.node_count() > true_graph.node_count() + MAX_EXTRA_REPORTED_NODES {
        return 0.0;
    }
    let distance = graph_edit_distance(true_graph, reported) as f64;
    let sigmoid = 1.0 / (1.0 + (-0.5 * distance).exp());
    1.0 - 2.0 * (sigmoid - 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use crate::test_support::{line_graph, square_graph};

    fn reported(nodes: &[&str], edges: &[(&str, &str)]) -> ReportedGraph {
        ReportedGraph {
            nodes: nodes.iter().map(|n| n.to_string()).collect(),
            edges: edges
                .iter()
                .map(|(a, b)| (a.to_string(), b.to_string()))
                .collect(),
        }
    }

    #[test]
    fn identical_graphs_are_fully_similar() {
        let square = SimpleGraph::from_graph(&square_graph());
        assert_eq!(graph_edit_distance(&square, &square), 0);
        assert_eq!(similarity(&square, &square), 1.0);
    }

    #[test]
    fn labels_are_case_normalized() {
        let a = SimpleGraph::from_reported(&reported(&["Kitchen", "Hall"], &[("Kitchen", "Hall")]));
        let b = SimpleGraph::from_reported(&reported(&[" kitchen", "HALL "], &[("kitchen", "hall")]));
        assert_eq!(graph_edit_distance(&a, &b), 0);
    }

    #[test]
    fn missing_node_and_edge_cost_two() {
        let truth = SimpleGraph::from_graph(&line_graph(3));
        let partial = SimpleGraph::from_reported(&reported(
            &["(0, 0)", "(1, 0)"],
            &[("(0, 0)", "(1, 0)")],
        ));
        assert_eq!(graph_edit_distance(&truth, &partial), 2);
        let expected = 1.0 - 2.0 * (1.0 / (1.0 + (-1.0f64).exp()) - 0.5);
        assert!((similarity(&truth, &partial) - expected).abs() < 1e-12);
    }

    #[test]
    fn relabel_is_a_single_edit() {
        let a = SimpleGraph::from_reported(&reported(&["kitchen", "hall"], &[("kitchen", "hall")]));
        let b = SimpleGraph::from_reported(&reported(&["kitchen", "office"], &[("kitchen", "office")]));
        assert_eq!(graph_edit_distance(&a, &b), 1);
    }

    #[test]
    fn empty_report_costs_every_element() {
        let truth = SimpleGraph::from_graph(&square_graph());
        let empty = SimpleGraph::default();
        assert_eq!(graph_edit_distance(&truth, &empty), 8);
        assert_eq!(graph_edit_distance(&empty, &truth), 8);
        assert!(similarity(&truth, &empty) < 0.1);
    }

    fn chain(len: usize) -> ReportedGraph {
        let names: Vec<String> = (0..len).map(|i| format!("made-up room {i}")).collect();
        ReportedGraph {
            edges: names.windows(2).map(|w| (w[0].clone(), w[1].clone())).collect(),
            nodes: names,
        }
    }

    #[test]
    fn larger_reports_stay_fast_and_exact() {
        let truth = SimpleGraph::from_graph(&line_graph(8));
        let report = SimpleGraph::from_reported(&chain(12));
        let started = Instant::now();
        // 8 relabels, 4 inserted rooms, 4 inserted corridors.
        assert_eq!(graph_edit_distance(&truth, &report), 16);
        assert_eq!(graph_edit_distance(&report, &truth), 16);
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    }

    #[test]
    fn oversized_report_scores_zero_without_searching() {
        let truth = SimpleGraph::from_graph(&line_graph(8));
        let started = Instant::now();
        assert_eq!(similarity(&truth, &SimpleGraph::from_reported(&chain(40))), 0.0);
        assert!(similarity(&truth, &SimpleGraph::from_reported(&chain(12))) > 0.0);
        assert!(started.elapsed() < Duration::from_secs(2), "{:?}", started.elapsed());
    }

    #[test]
    fn edge_endpoints_become_nodes() {
        let g = SimpleGraph::from_reported(&reported(&["a"], &[("a", "b")]));
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 1);
    }
}
