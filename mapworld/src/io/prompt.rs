//! Prompt text shown to the mover.
//!
//! Templates are plain text with `$NAME$` placeholders. Bundled defaults live
//! in `prompts/`; any of them can be replaced through `[prompts]` in the game
//! config. Rendering only substitutes values, it never interprets the text.

use crate::core::direction::{Direction, format_directions};
use crate::core::game_master::PromptRequest;
use crate::core::node::Node;
use crate::core::types::AbortReason;
use crate::io::config::PromptOverrides;

const INITIAL_TEMPLATE: &str = include_str!("prompts/initial.md");
const TURN_TEMPLATE: &str = include_str!("prompts/turn.md");
const REPROMPT_TEMPLATE: &str = include_str!("prompts/reprompt.md");
const LOOP_WARNING_TEMPLATE: &str = include_str!("prompts/loop_warning.md");
const GRAPH_REASONING_TEMPLATE: &str = include_str!("prompts/graph_reasoning.md");

pub const DEFAULT_GOAL: &str = "Visit every room, then say DONE.";

/// Replace every `placeholder` in `template` with its value, in order.
pub fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.to_string(), |text, (placeholder, value)| {
            text.replace(placeholder, value)
        })
}

/// Everything a mover is told about the current turn.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub round: u32,
    pub position: Node,
    pub room: String,
    pub directions: Vec<Direction>,
    pub max_turns: u32,
    pub request: PromptRequest,
    /// Rendered prompt text.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    pub initial: String,
    pub turn: String,
    pub reprompt: String,
    pub loop_warning: String,
    pub goal: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            initial: INITIAL_TEMPLATE.to_string(),
            turn: TURN_TEMPLATE.to_string(),
            reprompt: REPROMPT_TEMPLATE.to_string(),
            loop_warning: LOOP_WARNING_TEMPLATE.to_string(),
            goal: DEFAULT_GOAL.to_string(),
        }
    }
}

impl PromptTemplates {
    /// Bundled templates with config overrides applied. The graph-reasoning
    /// instruction is appended to the goal.
    pub fn from_overrides(overrides: &PromptOverrides, graph_reasoning: bool) -> Self {
        let defaults = Self::default();
        let pick = |custom: &Option<String>, default: String| custom.clone().unwrap_or(default);
        let mut goal = defaults.goal;
        if graph_reasoning {
            goal = format!("{goal}\n\n{}", GRAPH_REASONING_TEMPLATE.trim_end());
        }
        Self {
            initial: pick(&overrides.initial, defaults.initial),
            turn: pick(&overrides.turn, defaults.turn),
            reprompt: pick(&overrides.reprompt, defaults.reprompt),
            loop_warning: pick(&overrides.loop_warning, defaults.loop_warning),
            goal,
        }
    }

    /// Render the prompt for one move request.
    ///
    /// The opening request of an episode uses the initial template; a rejected
    /// turn uses the reprompt template; a loop warning is prepended to the
    /// regular turn text.
    pub fn render(
        &self,
        first: bool,
        request: PromptRequest,
        room: &str,
        directions: &[Direction],
        max_turns: u32,
    ) -> String {
        let directions = format_directions(directions);
        let max_turns = max_turns.to_string();
        let reason = request.reprompt.map(reprompt_reason).unwrap_or_default();
        let values = [
            ("$GOAL$", self.goal.as_str()),
            ("$MAX_TURNS$", max_turns.as_str()),
            ("$ROOM$", room),
            ("$DIRECTIONS$", directions.as_str()),
            ("$REASON$", reason),
        ];

        let body = if request.reprompt.is_some() {
            &self.reprompt
        } else if first {
            &self.initial
        } else {
            &self.turn
        };
        let mut text = fill_placeholders(body, &values);
        if request.loop_warning {
            text = format!("{}\n\n{text}", fill_placeholders(&self.loop_warning, &values).trim_end());
        }
        text
    }
}

fn reprompt_reason(reason: AbortReason) -> &'static str {
    match reason {
        AbortReason::InvalidFormat => "it did not follow the required format",
        AbortReason::IllegalDirection => "you cannot go that way from here",
        AbortReason::AmbiguousAction => "it contained both a move and DONE",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_every_occurrence() {
        let text = fill_placeholders("$ROOM$ / $ROOM$ / $GOAL$", &[("$ROOM$", "Kitchen")]);
        assert_eq!(text, "Kitchen / Kitchen / $GOAL$");
    }

    #[test]
    fn initial_prompt_mentions_goal_and_limit() {
        let templates = PromptTemplates::default();
        let text = templates.render(
            true,
            PromptRequest::default(),
            "(0, 0)",
            &[Direction::North, Direction::East],
            7,
        );
        assert!(text.contains(DEFAULT_GOAL));
        assert!(text.contains("at most 7 moves"));
        assert!(text.contains("You are in (0, 0). From here you can go: north, east."));
        assert!(!text.contains('$'));
    }

    #[test]
    fn reprompt_and_loop_warning_variants() {
        let templates = PromptTemplates::default();
        let reprompt = templates.render(
            false,
            PromptRequest {
                reprompt: Some(AbortReason::IllegalDirection),
                loop_warning: false,
            },
            "Kitchen",
            &[Direction::South],
            5,
        );
        assert!(reprompt.starts_with("Your last answer was rejected: you cannot go that way"));

        let warned = templates.render(
            false,
            PromptRequest {
                reprompt: None,
                loop_warning: true,
            },
            "Kitchen",
            &[Direction::South],
            5,
        );
        assert!(warned.starts_with("You seem to be walking back and forth"));
        assert!(warned.ends_with("You are in Kitchen. From here you can go: south.\n"));
    }

    #[test]
    fn overrides_replace_bundled_templates() {
        let overrides = PromptOverrides {
            turn: Some("Room: $ROOM$ [$DIRECTIONS$]".to_string()),
            ..PromptOverrides::default()
        };
        let templates = PromptTemplates::from_overrides(&overrides, true);
        let text = templates.render(false, PromptRequest::default(), "Office", &[Direction::West], 3);
        assert_eq!(text, "Room: Office [west]");
        assert!(templates.goal.contains("\"nodes\""));
        assert_eq!(templates.initial, INITIAL_TEMPLATE);
    }
}
