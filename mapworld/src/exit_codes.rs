//! Stable exit codes for `mapworld` commands.

/// Command succeeded; for `play`, the episode ended with `DONE`.
pub const OK: i32 = 0;
/// Invalid input, config or instance, or any other error.
pub const INVALID: i32 = 1;
/// `mapworld play` ended with an aborted episode.
pub const ABORTED: i32 = 2;
/// `mapworld play` hit the turn limit before `DONE`.
pub const TURN_LIMIT: i32 = 3;
