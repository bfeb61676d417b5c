//! Test-only helpers for constructing graphs, instances and scripted episodes.

use std::path::Path;

use crate::core::graph::Graph;
use crate::core::node::Node;
use crate::io::config::GameConfig;
use crate::io::instance::InstanceRecord;

/// The 2x2 square: `(0,0)-(1,0)-(1,1)-(0,1)-(0,0)`.
pub fn square_graph() -> Graph {
    let corners = [
        Node::at(0, 0),
        Node::at(1, 0),
        Node::at(1, 1),
        Node::at(0, 1),
    ];
    let mut graph = Graph::new();
    for corner in &corners {
        graph.add_node(corner.clone());
    }
    for (i, corner) in corners.iter().enumerate() {
        let next = &corners[(i + 1) % corners.len()];
        graph.add_edge(corner, next).expect("square edge");
    }
    graph
}

/// Horizontal corridor `(0,0) - (1,0) - ... - (len-1,0)`.
pub fn line_graph(len: i32) -> Graph {
    let mut graph = Graph::new();
    for x in 0..len {
        graph.add_node(Node::at(x, 0));
    }
    for x in 1..len {
        graph
            .add_edge(&Node::at(x - 1, 0), &Node::at(x, 0))
            .expect("corridor edge");
    }
    graph
}

/// Square graph whose rooms carry labels, one of them shared.
pub fn named_square_graph() -> Graph {
    square_graph()
        .relabel(|node| {
            let label = match (node.coord().x, node.coord().y) {
                (0, 0) => "Kitchen",
                (1, 0) => "Hallway",
                (1, 1) => "Kitchen",
                _ => "Office",
            };
            Node::labeled(label, node.coord())
        })
        .expect("relabel square")
}

/// Instance record for `graph` starting at `start` with default game settings.
pub fn instance(graph: &Graph, start: Node) -> InstanceRecord {
    InstanceRecord::build(graph, start, None, &GameConfig::default())
}

/// Write `record` to `<dir>/instance.json` and return the path.
pub fn write_instance(dir: &Path, record: &InstanceRecord) -> std::path::PathBuf {
    let path = dir.join("instance.json");
    crate::io::instance::write_instance(&path, record).expect("write instance");
    path
}
