//! Deterministic, pure logic of the navigation engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests;
//! randomness only enters through an explicit `RandomSource`.

pub mod action;
pub mod direction;
pub mod game_master;
pub mod generator;
pub mod graph;
pub mod node;
pub mod random;
pub mod rooms;
pub mod scorer;
pub mod similarity;
pub mod types;
