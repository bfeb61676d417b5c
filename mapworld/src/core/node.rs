//! Graph node identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::direction::Coord;

/// A room in the world graph.
///
/// Unnamed graphs use bare coordinates. Named graphs attach a room label and
/// keep the originating coordinate, so two rooms sharing a label (ambiguous
/// graphs) remain distinct nodes.
///
/// JSON: coordinate nodes are `[x, y]`, labeled nodes are
/// `{"label": "Kitchen", "at": [x, y]}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Coord(Coord),
    Labeled { label: String, at: Coord },
}

impl Node {
    pub fn at(x: i32, y: i32) -> Self {
        Node::Coord(Coord::new(x, y))
    }

    pub fn labeled(label: impl Into<String>, at: Coord) -> Self {
        Node::Labeled {
            label: label.into(),
            at,
        }
    }

    pub fn coord(&self) -> Coord {
        match self {
            Node::Coord(coord) => *coord,
            Node::Labeled { at, .. } => *at,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            Node::Coord(_) => None,
            Node::Labeled { label, .. } => Some(label),
        }
    }

    /// Name shown to the mover: the bare label for named rooms.
    pub fn display_name(&self) -> String {
        match self {
            Node::Coord(coord) => coord.to_string(),
            Node::Labeled { label, .. } => label.clone(),
        }
    }

    /// Unambiguous key such as `Kitchen_(1,2)`.
    pub fn key(&self) -> String {
        match self {
            Node::Coord(coord) => format!("({},{})", coord.x, coord.y),
            Node::Labeled { label, at } => format!("{}_({},{})", label, at.x, at.y),
        }
    }
}

impl From<Coord> for Node {
    fn from(coord: Coord) -> Self {
        Node::Coord(coord)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
