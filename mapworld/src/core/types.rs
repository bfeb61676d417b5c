//! Shared episode types.
//!
//! The episode log is the only channel between the game master and the
//! scorer, so its shape is the contract between them. Serialized field and
//! variant names are stable.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::node::Node;

/// Why an episode was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    InvalidFormat,
    IllegalDirection,
    AmbiguousAction,
}

/// Episode outcome. `Pending` until a terminal state is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Success,
    Aborted(AbortReason),
    TurnLimitReached,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pending => f.write_str("pending"),
            Outcome::Success => f.write_str("success"),
            Outcome::Aborted(reason) => write!(f, "aborted ({reason:?})"),
            Outcome::TurnLimitReached => f.write_str("turn limit reached"),
        }
    }
}

/// One successful transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub from: Node,
    pub to: Node,
    pub round: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "move")]
    Move,
    #[serde(rename = "invalid format")]
    InvalidFormat,
    #[serde(rename = "illegal direction")]
    IllegalDirection,
    #[serde(rename = "aborted")]
    Aborted,
    #[serde(rename = "stop")]
    Stop,
    #[serde(rename = "turns_limit")]
    TurnsLimit,
    #[serde(rename = "loop_detected")]
    LoopDetected,
}

impl ActionKind {
    /// True for per-round validation failures.
    pub fn is_invalid_attempt(self) -> bool {
        matches!(self, ActionKind::InvalidFormat | ActionKind::IllegalDirection)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogAction {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub content: String,
}

/// One event in a round. For non-moves `from == to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub from: Node,
    pub to: Node,
    pub action: LogAction,
}

/// Graph the mover reported about the world it explored (graph-reasoning variant).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedGraph {
    pub nodes: Vec<String>,
    #[serde(default)]
    pub edges: Vec<(String, String)>,
}

/// Ordered rounds of events produced by one episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeLog {
    pub start: Node,
    pub rounds: Vec<Vec<LogEvent>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reported_graph: Option<ReportedGraph>,
}

impl EpisodeLog {
    pub fn new(start: Node) -> Self {
        Self {
            start,
            rounds: Vec::new(),
            reported_graph: None,
        }
    }

    /// Append an event to round `round` (0-indexed), opening rounds as needed.
    pub fn record(&mut self, round: u32, event: LogEvent) {
        let index = round as usize;
        while self.rounds.len() <= index {
            self.rounds.push(Vec::new());
        }
        self.rounds[index].push(event);
    }

    pub fn events(&self) -> impl Iterator<Item = &LogEvent> {
        self.rounds.iter().flatten()
    }

    pub fn count(&self, kind: ActionKind) -> usize {
        self.events().filter(|e| e.action.kind == kind).count()
    }

    /// Rejected responses, whether or not they were reprompted.
    pub fn invalid_attempts(&self) -> usize {
        self.events().filter(|e| e.action.kind.is_invalid_attempt()).count()
    }

    /// Terminal outcome implied by the events.
    pub fn outcome(&self) -> Outcome {
        for event in self.events() {
            match event.action.kind {
                ActionKind::Stop => return Outcome::Success,
                ActionKind::TurnsLimit => return Outcome::TurnLimitReached,
                ActionKind::Aborted => {
                    return Outcome::Aborted(abort_reason_from(&event.action.content));
                }
                _ => {}
            }
        }
        Outcome::Pending
    }
}

/// Content written into `"aborted"` events; parsed back by [`EpisodeLog::outcome`].
pub fn abort_content(reason: AbortReason) -> &'static str {
    match reason {
        AbortReason::InvalidFormat => "invalid format",
        AbortReason::IllegalDirection => "illegal direction",
        AbortReason::AmbiguousAction => "ambiguous action",
    }
}

fn abort_reason_from(content: &str) -> AbortReason {
    match content {
        "illegal direction" => AbortReason::IllegalDirection,
        "ambiguous action" => AbortReason::AmbiguousAction,
        _ => AbortReason::InvalidFormat,
    }
}
