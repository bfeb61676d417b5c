//! Graph-world navigation engine.
//!
//! Builds a room graph by constrained random walk, plays a turn-based
//! exploration episode between a mover and the engine, and scores the
//! resulting trajectory. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (generation, direction lookup, the
//!   episode state machine, scoring, graph similarity). No I/O.
//! - **[`io`]**: Side-effecting operations (config, instance and episode files,
//!   movers, prompt text). Isolated to enable scripted movers in tests.
//!
//! [`episode`] coordinates the two to play and score one episode.

pub mod core;
pub mod episode;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
