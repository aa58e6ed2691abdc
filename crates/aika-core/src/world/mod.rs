pub mod entity;
pub mod world_state;

pub use entity::Entity;
pub use world_state::{WorldNotice, WorldTracker};
