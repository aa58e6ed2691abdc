//! Companion behavior: a state machine fed by intents, world notices and two periodic ticks.

pub mod actions;
pub mod engine;
pub mod state;

pub use engine::{BehaviorConfig, BehaviorEngine, Command, Surroundings};
pub use state::{BehaviorState, Phase};
