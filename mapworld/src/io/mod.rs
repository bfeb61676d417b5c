//! Side-effecting helpers: configuration, instance and episode files, movers,
//! prompt text.

pub mod config;
pub mod episode_store;
pub mod instance;
pub mod mover;
pub mod prompt;
