//! Compass directions and grid coordinates.
//!
//! The delta table is fixed: `north=(0,1)`, `south=(0,-1)`, `east=(1,0)`,
//! `west=(-1,0)`. Every edge in a [`Graph`](crate::core::graph::Graph) joins
//! two coordinates that differ by exactly one of these deltas.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Integer grid coordinate. Serialized as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Coordinate one grid step away in `direction`.
    pub fn offset(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    /// True if the coordinate lies inside a `width x height` grid anchored at the origin.
    pub fn within(self, width: u32, height: u32) -> bool {
        self.x >= 0 && self.y >= 0 && (self.x as u32) < width && (self.y as u32) < height
    }
}

impl From<(i32, i32)> for Coord {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl From<Coord> for (i32, i32) {
    fn from(coord: Coord) -> Self {
        (coord.x, coord.y)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One of the four traversable compass directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Canonical order used whenever directions are listed.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::North => (0, 1),
            Direction::South => (0, -1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }

    /// Parse a direction name, ignoring case and surrounding whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        Direction::ALL
            .into_iter()
            .find(|direction| direction.as_str().eq_ignore_ascii_case(trimmed))
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction that leads from `from` to `to` in one grid step, if any.
pub fn direction_between(from: Coord, to: Coord) -> Option<Direction> {
    Direction::ALL
        .into_iter()
        .find(|direction| from.offset(*direction) == to)
}

/// Join directions as a comma-separated list for prompts.
pub fn format_directions(directions: &[Direction]) -> String {
    directions
        .iter()
        .map(|direction| direction.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_is_an_involution_and_negates_delta() {
        for direction in Direction::ALL {
            assert_eq!(direction.opposite().opposite(), direction);
            let (dx, dy) = direction.delta();
            assert_eq!(direction.opposite().delta(), (-dx, -dy));
        }
    }

    #[test]
    fn direction_between_inverts_offset() {
        let origin = Coord::new(2, 3);
        for direction in Direction::ALL {
            let next = origin.offset(direction);
            assert_eq!(direction_between(origin, next), Some(direction));
            assert_eq!(direction_between(next, origin), Some(direction.opposite()));
        }
        assert_eq!(direction_between(origin, Coord::new(3, 4)), None);
        assert_eq!(direction_between(origin, origin), None);
    }

    #[test]
    fn parse_ignores_case_and_whitespace() {
        assert_eq!(Direction::parse(" North "), Some(Direction::North));
        assert_eq!(Direction::parse("WEST"), Some(Direction::West));
        assert_eq!(Direction::parse("up"), None);
    }

    #[test]
    fn within_checks_grid_bounds() {
        assert!(Coord::new(0, 0).within(3, 2));
        assert!(Coord::new(2, 1).within(3, 2));
        assert!(!Coord::new(3, 1).within(3, 2));
        assert!(!Coord::new(-1, 0).within(3, 2));
    }

    #[test]
    fn coord_serializes_as_pair() {
        let json = serde_json::to_string(&Coord::new(1, -2)).expect("serialize");
        assert_eq!(json, "[1,-2]");
        let back: Coord = serde_json::from_str("[4,5]").expect("deserialize");
        assert_eq!(back, Coord::new(4, 5));
    }
}
