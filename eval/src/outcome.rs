use mapworld::core::types::Outcome as EpisodeOutcome;
use serde::{Deserialize, Serialize};

use crate::judge::Judgment;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Fail,
    Aborted,
    TurnLimit,
}

/// Failed checks win over the episode's own ending; an episode that never
/// reached a terminal state counts as a failure.
pub fn classify_outcome(episode: EpisodeOutcome, judgment: &Judgment) -> Outcome {
    if !judgment.passed() {
        return Outcome::Fail;
    }
    match episode {
        EpisodeOutcome::Success => Outcome::Success,
        EpisodeOutcome::Aborted(_) => Outcome::Aborted,
        EpisodeOutcome::TurnLimitReached => Outcome::TurnLimit,
        EpisodeOutcome::Pending => Outcome::Fail,
    }
}
