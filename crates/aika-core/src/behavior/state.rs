use std::collections::HashMap;

use crate::protocol::Vec3;

/// Observable mode of the companion, derived from [`BehaviorState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No target.
    Idle,
    /// Target known, staying put.
    Waiting,
    Following,
    Dead,
}

/// The one mutable record the behavior engine owns. Reset on every new session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BehaviorState {
    pub target: Option<String>,
    pub following: bool,
    pub dead: bool,
    pub spawn: Option<Vec3>,
    /// Target position seen by the previous idle check, keyed by player name.
    pub last_seen: HashMap<String, Vec3>,
}

impl BehaviorState {
    pub fn phase(&self) -> Phase {
        if self.dead {
            return Phase::Dead;
        }
        match (&self.target, self.following) {
            (None, _) => Phase::Idle,
            (Some(_), true) => Phase::Following,
            (Some(_), false) => Phase::Waiting,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Sets a new follow target and starts following it.
    pub fn follow(&mut self, target: impl Into<String>) {
        self.target = Some(target.into());
        self.following = true;
    }
}
