//! Fixed-format extraction of mover actions.
//!
//! A response must contain exactly one match of either the move pattern
//! (`GO: <direction>`, direction in capture group 1) or the stop pattern
//! (`DONE`). Nothing else in the response is interpreted, except the optional
//! graph block of the graph-reasoning variant.

use regex::Regex;
use thiserror::Error;

use crate::core::direction::Direction;
use crate::core::types::{AbortReason, ReportedGraph};

pub const DEFAULT_MOVE_REGEX: &str = r"(?im)^\s*GO:\s*(\w+)\s*$";
pub const DEFAULT_STOP_REGEX: &str = r"(?im)^\s*DONE\s*$";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Go(Direction),
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("no recognised action")]
    Unrecognized,
    #[error("more than one action")]
    Multiple,
    #[error("both a move and a stop")]
    Ambiguous,
    #[error("unknown direction '{0}'")]
    UnknownDirection(String),
}

impl ActionError {
    pub fn abort_reason(&self) -> AbortReason {
        match self {
            ActionError::Ambiguous => AbortReason::AmbiguousAction,
            _ => AbortReason::InvalidFormat,
        }
    }
}

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("invalid {which} regex: {source}")]
    Regex {
        which: &'static str,
        #[source]
        source: regex::Error,
    },
    #[error("move regex must capture the direction in group 1")]
    MissingDirectionGroup,
}

#[derive(Debug, Clone)]
pub struct ActionGrammar {
    move_re: Regex,
    stop_re: Regex,
}

impl ActionGrammar {
    pub fn new(move_regex: &str, stop_regex: &str) -> Result<Self, GrammarError> {
        let move_re = Regex::new(move_regex).map_err(|source| GrammarError::Regex {
            which: "move",
            source,
        })?;
        if move_re.captures_len() < 2 {
            return Err(GrammarError::MissingDirectionGroup);
        }
        let stop_re = Regex::new(stop_regex).map_err(|source| GrammarError::Regex {
            which: "stop",
            source,
        })?;
        Ok(Self { move_re, stop_re })
    }

    pub fn parse(&self, response: &str) -> Result<Action, ActionError> {
        let moves: Vec<_> = self.move_re.captures_iter(response).collect();
        let stops = self.stop_re.find_iter(response).count();

        match (moves.as_slice(), stops) {
            ([], 0) => Err(ActionError::Unrecognized),
            ([_, ..], 1..) => Err(ActionError::Ambiguous),
            ([], 1) => Ok(Action::Done),
            ([caps], 0) => {
                let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                Direction::parse(raw)
                    .map(Action::Go)
                    .ok_or_else(|| ActionError::UnknownDirection(raw.to_string()))
            }
            _ => Err(ActionError::Multiple),
        }
    }
}

impl Default for ActionGrammar {
    fn default() -> Self {
        Self {
            move_re: Regex::new(DEFAULT_MOVE_REGEX).expect("default move regex is valid"),
            stop_re: Regex::new(DEFAULT_STOP_REGEX).expect("default stop regex is valid"),
        }
    }
}

/// Parse the JSON graph block a mover may include (`{"nodes": [...], "edges": [...]}`).
///
/// Every balanced top-level `{...}` span is a candidate; the last one that
/// parses as a graph wins.
pub fn extract_reported_graph(response: &str) -> Option<ReportedGraph> {
    top_level_objects(response)
        .into_iter()
        .rev()
        .find_map(|block| serde_json::from_str(block).ok())
}

/// Balanced `{...}` spans outside any enclosing braces. Braces inside JSON
/// strings do not count; an unclosed span is dropped.
fn top_level_objects(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    spans
}
