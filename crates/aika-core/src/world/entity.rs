use std::time::Instant;

use crate::protocol::Vec3;

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Stable per-session handle.
    pub identity_id: u64,
    /// Bound asynchronously from the roster; may be absent or stale.
    pub display_name: Option<String>,
    pub position: Vec3,
    pub last_updated_at: Instant,
}

impl Entity {
    pub fn new(identity_id: u64, position: Vec3, now: Instant) -> Self {
        Self {
            identity_id,
            display_name: None,
            position,
            last_updated_at: now,
        }
    }

    pub fn update_position(&mut self, position: Vec3, now: Instant) {
        self.position = position;
        self.last_updated_at = now;
    }
}
