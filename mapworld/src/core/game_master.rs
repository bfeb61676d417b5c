//! Episode state machine.
//!
//! One call to [`advance`] consumes one mover response and produces the next
//! state plus the effects the orchestrator must carry out (ask for another
//! move, or report the final outcome). Every validation outcome is recorded in
//! the episode log held by the state; nothing is thrown.

use std::collections::BTreeSet;

use tracing::debug;

use crate::core::action::{Action, ActionGrammar, extract_reported_graph};
use crate::core::graph::Graph;
use crate::core::node::Node;
use crate::core::types::{
    AbortReason, ActionKind, EpisodeLog, LogAction, LogEvent, MoveRecord, Outcome, abort_content,
};

/// Number of trailing positions inspected for back-and-forth movement.
const LOOP_WINDOW: usize = 4;
/// A window with fewer distinct nodes than this is a loop.
const LOOP_MIN_DISTINCT: usize = 3;

/// Per-episode configuration threaded through every transition.
#[derive(Debug, Clone)]
pub struct EpisodeRules {
    pub max_turns: u32,
    pub reprompt: bool,
    pub detect_loops: bool,
    pub graph_reasoning: bool,
    pub grammar: ActionGrammar,
}

impl Default for EpisodeRules {
    fn default() -> Self {
        Self {
            max_turns: 20,
            reprompt: false,
            detect_loops: false,
            graph_reasoning: false,
            grammar: ActionGrammar::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingMove,
    Terminal(Outcome),
}

/// What the next prompt must convey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PromptRequest {
    /// Set when the same round is re-issued after a rejected response.
    pub reprompt: Option<AbortReason>,
    pub loop_warning: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    RequestMove(PromptRequest),
    Finished(Outcome),
}

#[derive(Debug, Clone)]
pub struct EpisodeState {
    pub current: Node,
    /// Every position in order, starting with the start node.
    pub visited: Vec<Node>,
    pub loop_window: Vec<Node>,
    pub round: u32,
    pub reprompt_used_this_round: bool,
    /// The current round opened with a loop warning; reprompts repeat it.
    pub loop_warning: bool,
    pub phase: Phase,
    pub moves: Vec<MoveRecord>,
    pub log: EpisodeLog,
}

#[derive(Debug, Clone)]
pub struct Transition {
    pub state: EpisodeState,
    pub effects: Vec<Effect>,
}

impl EpisodeState {
    pub fn new(start: Node) -> Self {
        Self {
            visited: vec![start.clone()],
            loop_window: vec![start.clone()],
            log: EpisodeLog::new(start.clone()),
            current: start,
            round: 0,
            reprompt_used_this_round: false,
            loop_warning: false,
            phase: Phase::AwaitingMove,
            moves: Vec::new(),
        }
    }

    pub fn opening_effects(&self) -> Vec<Effect> {
        match self.phase {
            Phase::AwaitingMove => vec![Effect::RequestMove(PromptRequest::default())],
            Phase::Terminal(outcome) => vec![Effect::Finished(outcome)],
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self.phase {
            Phase::AwaitingMove => Outcome::Pending,
            Phase::Terminal(outcome) => outcome,
        }
    }

    fn record(&mut self, round: u32, to: Node, kind: ActionKind, content: &str) {
        let event = LogEvent {
            from: self.current.clone(),
            to,
            action: LogAction {
                kind,
                content: content.to_string(),
            },
        };
        self.log.record(round, event);
    }

    fn record_here(&mut self, round: u32, kind: ActionKind, content: &str) {
        let here = self.current.clone();
        self.record(round, here, kind, content);
    }

    fn finish(&mut self, outcome: Outcome) -> Effect {
        self.phase = Phase::Terminal(outcome);
        Effect::Finished(outcome)
    }
}

/// Apply one mover response to `state`.
pub fn advance(
    mut state: EpisodeState,
    response: &str,
    graph: &Graph,
    rules: &EpisodeRules,
) -> Transition {
    if let Phase::Terminal(outcome) = state.phase {
        return Transition {
            state,
            effects: vec![Effect::Finished(outcome)],
        };
    }

    let round = state.round;
    if rules.graph_reasoning {
        match extract_reported_graph(response) {
            Some(reported) => state.log.reported_graph = Some(reported),
            None => debug!(round, "no parsable graph block in response"),
        }
    }

    let effect = match rules.grammar.parse(response) {
        Err(err) => {
            debug!(round, error = %err, "rejected response");
            state.record_here(round, ActionKind::InvalidFormat, response);
            reject(&mut state, round, err.abort_reason(), rules)
        }
        Ok(Action::Done) => {
            state.record_here(round, ActionKind::Stop, response);
            state.finish(Outcome::Success)
        }
        Ok(Action::Go(direction)) => match graph.step(&state.current, direction).cloned() {
            None => {
                debug!(round, %direction, at = %state.current, "illegal direction");
                state.record_here(round, ActionKind::IllegalDirection, response);
                reject(&mut state, round, AbortReason::IllegalDirection, rules)
            }
            Some(next) => apply_move(&mut state, round, next, response, rules),
        },
    };

    Transition {
        state,
        effects: vec![effect],
    }
}

fn reject(state: &mut EpisodeState, round: u32, reason: AbortReason, rules: &EpisodeRules) -> Effect {
    if rules.reprompt && !state.reprompt_used_this_round {
        state.reprompt_used_this_round = true;
        return Effect::RequestMove(PromptRequest {
            reprompt: Some(reason),
            loop_warning: state.loop_warning,
        });
    }
    state.record_here(round, ActionKind::Aborted, abort_content(reason));
    state.finish(Outcome::Aborted(reason))
}

fn apply_move(
    state: &mut EpisodeState,
    round: u32,
    next: Node,
    response: &str,
    rules: &EpisodeRules,
) -> Effect {
    state.record(round, next.clone(), ActionKind::Move, response);
    state.moves.push(MoveRecord {
        from: state.current.clone(),
        to: next.clone(),
        round,
    });
    state.current = next.clone();
    state.visited.push(next.clone());
    state.loop_window.push(next);

    state.loop_warning = rules.detect_loops && is_looping(&state.loop_window);
    if state.loop_warning {
        state.record_here(round, ActionKind::LoopDetected, "");
        state.loop_window = vec![state.current.clone()];
    }

    state.round += 1;
    state.reprompt_used_this_round = false;
    if state.round >= rules.max_turns {
        state.record_here(round, ActionKind::TurnsLimit, "");
        return state.finish(Outcome::TurnLimitReached);
    }

    Effect::RequestMove(PromptRequest {
        reprompt: None,
        loop_warning: state.loop_warning,
    })
}

fn is_looping(window: &[Node]) -> bool {
    if window.len() < LOOP_WINDOW {
        return false;
    }
    let tail: BTreeSet<&Node> = window[window.len() - LOOP_WINDOW..].iter().collect();
    tail.len() < LOOP_MIN_DISTINCT
}
