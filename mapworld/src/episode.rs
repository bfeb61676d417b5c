//! Episode orchestration: drive the state machine against a mover.
//!
//! The state machine decides; this module renders prompts, asks the mover,
//! feeds responses back and stops on the first `Finished` effect. Scoring runs
//! only after the log is complete.

use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info, instrument};

use crate::core::game_master::{Effect, EpisodeRules, EpisodeState, advance};
use crate::core::graph::Graph;
use crate::core::node::Node;
use crate::core::scorer::{ScoreReport, score};
use crate::core::types::{EpisodeLog, Outcome};
use crate::io::config::GameConfig;
use crate::io::episode_store::EpisodeMeta;
use crate::io::instance::InstanceRecord;
use crate::io::mover::Mover;
use crate::io::prompt::{PromptContext, PromptTemplates};

/// A finished episode before scoring.
#[derive(Debug, Clone)]
pub struct EpisodeRun {
    pub outcome: Outcome,
    pub state: EpisodeState,
    pub duration: Duration,
}

/// A finished, scored episode ready to be stored.
#[derive(Debug, Clone)]
pub struct PlayedEpisode {
    pub log: EpisodeLog,
    pub report: ScoreReport,
    pub meta: EpisodeMeta,
}

/// Play one episode on `graph` from `start` until a terminal outcome.
///
/// Mover failures are errors; invalid responses are not (they end up in the
/// log and may abort the episode).
#[instrument(skip_all, fields(start = %start, max_turns = rules.max_turns))]
pub fn run_episode<M: Mover>(
    graph: &Graph,
    start: Node,
    rules: &EpisodeRules,
    prompts: &PromptTemplates,
    mover: &mut M,
) -> Result<EpisodeRun> {
    if !graph.contains(&start) {
        bail!("start {start} is not a room of the graph");
    }
    let started = Instant::now();
    let mut state = EpisodeState::new(start);
    let mut effects = state.opening_effects();
    let mut first = true;

    loop {
        let effect = effects
            .first()
            .copied()
            .ok_or_else(|| anyhow!("state machine produced no effect in round {}", state.round))?;
        match effect {
            Effect::Finished(outcome) => {
                info!(
                    %outcome,
                    rounds = state.log.rounds.len(),
                    moves = state.moves.len(),
                    "episode finished"
                );
                return Ok(EpisodeRun {
                    outcome,
                    state,
                    duration: started.elapsed(),
                });
            }
            Effect::RequestMove(request) => {
                let directions = graph.directions_at(&state.current);
                let room = state.current.display_name();
                let text = prompts.render(first, request, &room, &directions, rules.max_turns);
                let ctx = PromptContext {
                    round: state.round,
                    position: state.current.clone(),
                    room,
                    directions,
                    max_turns: rules.max_turns,
                    request,
                    text,
                };
                first = false;

                let response = mover
                    .next_move(&ctx)
                    .with_context(|| format!("mover failed in round {}", ctx.round))?;
                debug!(round = ctx.round, response = %response.trim(), "mover responded");

                let transition = advance(state, &response, graph, rules);
                state = transition.state;
                effects = transition.effects;
            }
        }
    }
}

/// Play and score the episode described by `record`.
#[instrument(skip_all, fields(nodes = record.nodes.len()))]
pub fn play_instance<M: Mover>(
    record: &InstanceRecord,
    config: &GameConfig,
    mover: &mut M,
) -> Result<PlayedEpisode> {
    let graph = record.to_graph().context("rebuild instance graph")?;
    let rules = record.rules(config)?;
    let prompts = PromptTemplates::from_overrides(&config.prompts, rules.graph_reasoning);

    let run = run_episode(&graph, record.start.clone(), &rules, &prompts, mover)?;
    let report = score(&graph, &run.state.log).context("score episode")?;
    let meta = EpisodeMeta {
        outcome: run.outcome,
        rounds: run.state.log.rounds.len(),
        moves: run.state.moves.len(),
        duration_ms: u64::try_from(run.duration.as_millis()).unwrap_or(u64::MAX),
    };
    Ok(PlayedEpisode {
        log: run.state.log,
        report,
        meta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ActionKind;
    use crate::io::mover::ScriptedMover;
    use crate::test_support::{instance, square_graph};

    #[test]
    fn runs_until_done() {
        let graph = square_graph();
        let mut mover = ScriptedMover::new(["GO: east", "GO: north", "DONE"]);
        let run = run_episode(
            &graph,
            Node::at(0, 0),
            &EpisodeRules::default(),
            &PromptTemplates::default(),
            &mut mover,
        )
        .expect("episode");
        assert_eq!(run.outcome, Outcome::Success);
        assert_eq!(run.state.current, Node::at(1, 1));
        assert_eq!(mover.remaining(), 0);
        assert!(mover.prompts()[0].contains("You are in (0, 0). From here you can go: north, east."));
        assert!(mover.prompts()[2].starts_with("You are in (1, 1)."));
    }

    #[test]
    fn reprompt_uses_the_corrective_template() {
        let graph = square_graph();
        let rules = EpisodeRules {
            reprompt: true,
            ..EpisodeRules::default()
        };
        let mut mover = ScriptedMover::new(["go somewhere", "DONE"]);
        let run = run_episode(
            &graph,
            Node::at(0, 0),
            &rules,
            &PromptTemplates::default(),
            &mut mover,
        )
        .expect("episode");
        assert_eq!(run.outcome, Outcome::Success);
        assert!(mover.prompts()[1].starts_with("Your last answer was rejected"));
        assert_eq!(run.state.log.count(ActionKind::InvalidFormat), 1);
    }

    #[test]
    fn exhausted_mover_is_an_error() {
        let graph = square_graph();
        let mut mover = ScriptedMover::new(["GO: east"]);
        let err = run_episode(
            &graph,
            Node::at(0, 0),
            &EpisodeRules::default(),
            &PromptTemplates::default(),
            &mut mover,
        )
        .expect_err("mover runs dry");
        assert!(format!("{err:#}").contains("round 1"));
    }

    #[test]
    fn unknown_start_is_rejected() {
        let graph = square_graph();
        let mut mover = ScriptedMover::new(["DONE"]);
        assert!(
            run_episode(
                &graph,
                Node::at(9, 9),
                &EpisodeRules::default(),
                &PromptTemplates::default(),
                &mut mover,
            )
            .is_err()
        );
    }

    #[test]
    fn play_instance_scores_the_log() {
        let record = instance(&square_graph(), Node::at(0, 0));
        let mut mover = ScriptedMover::new(["GO: north", "GO: east", "GO: south", "DONE"]);
        let played = play_instance(&record, &GameConfig::default(), &mut mover).expect("play");
        assert_eq!(played.meta.outcome, Outcome::Success);
        assert_eq!(played.meta.moves, 3);
        assert_eq!(played.report.exploration_pct, 100.0);
        assert_eq!(played.report.efficient_moves, vec![true, true, true]);
    }
}
