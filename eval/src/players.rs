//! Baseline players for experiments.
//!
//! Both answer in the default action grammar (`GO: <direction>` / `DONE`), so
//! cases that override `move_regex` or `stop_regex` should use a scripted
//! player instead.

use std::collections::BTreeSet;

use anyhow::{Result, anyhow};
use mapworld::core::direction::Direction;
use mapworld::core::graph::Graph;
use mapworld::core::node::Node;
use mapworld::core::random::RandomSource;
use mapworld::core::scorer::best_moves;
use mapworld::io::mover::{Mover, ScriptedMover};
use mapworld::io::prompt::PromptContext;

use crate::case::PlayerSpec;

const DONE: &str = "DONE";

fn go(direction: Direction) -> String {
    format!("GO: {}", direction.as_str())
}

/// Knows the whole map and always takes a move the scorer counts as
/// efficient, then stops once nothing new is reachable.
#[derive(Debug, Clone)]
pub struct OracleMover {
    graph: Graph,
    visited: BTreeSet<Node>,
}

impl OracleMover {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph,
            visited: BTreeSet::new(),
        }
    }
}

impl Mover for OracleMover {
    fn next_move(&mut self, ctx: &PromptContext) -> Result<String> {
        self.visited.insert(ctx.position.clone());
        let best = best_moves(&self.graph, &self.visited, &ctx.position);
        let Some(next) = best.first() else {
            return Ok(DONE.to_string());
        };
        let direction = self
            .graph
            .direction_of(&ctx.position, next)
            .ok_or_else(|| anyhow!("no corridor from {} to {next}", ctx.position))?;
        Ok(go(direction))
    }
}

/// Random walk over the directions offered in each prompt.
#[derive(Debug, Clone)]
pub struct RandomMover {
    rng: RandomSource,
    stop_probability: f64,
}

impl RandomMover {
    pub fn new(seed: u64, stop_probability: f64) -> Self {
        Self {
            rng: RandomSource::seeded(seed),
            stop_probability,
        }
    }
}

impl Mover for RandomMover {
    fn next_move(&mut self, ctx: &PromptContext) -> Result<String> {
        if self.rng.chance(self.stop_probability) {
            return Ok(DONE.to_string());
        }
        Ok(match self.rng.pick(&ctx.directions) {
            Some(direction) => go(*direction),
            None => DONE.to_string(),
        })
    }
}

/// The mover a case asked for, built fresh for every episode.
#[derive(Debug)]
pub enum Player {
    Oracle(OracleMover),
    Random(RandomMover),
    Scripted(ScriptedMover),
}

impl Player {
    pub fn new(spec: &PlayerSpec, graph: &Graph, seed: u64) -> Self {
        match spec {
            PlayerSpec::Oracle => Player::Oracle(OracleMover::new(graph.clone())),
            PlayerSpec::Random { stop_probability } => {
                Player::Random(RandomMover::new(seed, *stop_probability))
            }
            PlayerSpec::Scripted { responses } => {
                Player::Scripted(ScriptedMover::new(responses.iter().cloned()))
            }
        }
    }
}

impl Mover for Player {
    fn next_move(&mut self, ctx: &PromptContext) -> Result<String> {
        match self {
            Player::Oracle(mover) => mover.next_move(ctx),
            Player::Random(mover) => mover.next_move(ctx),
            Player::Scripted(mover) => mover.next_move(ctx),
        }
    }
}
