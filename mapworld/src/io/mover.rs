//! Mover abstraction for the agent that proposes moves.
//!
//! The [`Mover`] trait decouples the episode loop from whoever answers the
//! prompts: a person at the terminal, a model backend, or a scripted list of
//! responses in tests. Each call is synchronous; retries and timeouts belong to
//! the implementation.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::io::prompt::PromptContext;

/// Source of free-text move responses.
pub trait Mover {
    /// Answer the prompt in `ctx` with a response such as `GO: north` or `DONE`.
    fn next_move(&mut self, ctx: &PromptContext) -> Result<String>;
}

/// Mover that replays predetermined responses and records the prompts it saw.
#[derive(Debug, Default)]
pub struct ScriptedMover {
    responses: VecDeque<String>,
    prompts: Vec<String>,
}

impl ScriptedMover {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            prompts: Vec::new(),
        }
    }

    /// Prompts received so far, in order.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn remaining(&self) -> usize {
        self.responses.len()
    }
}

impl Mover for ScriptedMover {
    fn next_move(&mut self, ctx: &PromptContext) -> Result<String> {
        self.prompts.push(ctx.text.clone());
        match self.responses.pop_front() {
            Some(response) => Ok(response),
            None => bail!(
                "scripted mover ran out of responses in round {}",
                ctx.round
            ),
        }
    }
}

/// Mover that shows prompts on `output` and reads one line per turn from `input`.
pub struct HumanMover<R, W> {
    input: R,
    output: W,
}

impl HumanMover<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> HumanMover<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Mover for HumanMover<R, W> {
    fn next_move(&mut self, ctx: &PromptContext) -> Result<String> {
        writeln!(self.output, "{}", ctx.text.trim_end()).context("write prompt")?;
        write!(self.output, "> ").context("write prompt marker")?;
        self.output.flush().context("flush prompt")?;

        let mut line = String::new();
        let read = self.input.read_line(&mut line).context("read response")?;
        if read == 0 {
            bail!("input closed before the episode finished");
        }
        debug!(round = ctx.round, response = line.trim_end(), "human response");
        Ok(line.trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::game_master::PromptRequest;
    use crate::core::node::Node;

    fn ctx(text: &str) -> PromptContext {
        PromptContext {
            round: 0,
            position: Node::at(0, 0),
            room: "(0, 0)".to_string(),
            directions: Vec::new(),
            max_turns: 5,
            request: PromptRequest::default(),
            text: text.to_string(),
        }
    }

    #[test]
    fn scripted_mover_replays_and_records() {
        let mut mover = ScriptedMover::new(["GO: east", "DONE"]);
        assert_eq!(mover.next_move(&ctx("first")).expect("move"), "GO: east");
        assert_eq!(mover.next_move(&ctx("second")).expect("move"), "DONE");
        assert_eq!(mover.prompts(), ["first", "second"]);
        assert!(mover.next_move(&ctx("third")).is_err());
    }

    #[test]
    fn human_mover_reads_one_line_per_turn() {
        let input = io::Cursor::new("GO: north\nDONE\n");
        let mut output = Vec::new();
        {
            let mut mover = HumanMover::new(input, &mut output);
            assert_eq!(mover.next_move(&ctx("Where to?")).expect("move"), "GO: north");
            assert_eq!(mover.next_move(&ctx("And now?")).expect("move"), "DONE");
            assert!(mover.next_move(&ctx("Still there?")).is_err());
        }
        let shown = String::from_utf8(output).expect("utf8");
        assert!(shown.starts_with("Where to?\n> "));
    }
}
