use std::collections::HashMap;
use std::time::Instant;

use crate::protocol::{RosterRecord, Vec3};
use crate::world::entity::Entity;

/// Notices raised for the behavior engine while applying world updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldNotice {
    /// The currently followed player left the session.
    TargetLeft { name: String },
}

/// Known entities and the name -> identity mapping for one session.
///
/// Missing data is never an error: an unknown identity or an unbound name simply means
/// "not yet available".
#[derive(Debug, Default)]
pub struct WorldTracker {
    entities: HashMap<u64, Entity>,
    names: HashMap<String, u64>,
    self_id: Option<u64>,
}

impl WorldTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.entities.clear();
        self.names.clear();
        self.self_id = None;
    }

    /// Our own identity; updates about it are not tracked here.
    pub fn set_self_identity(&mut self, identity_id: u64) {
        self.self_id = Some(identity_id);
        self.entities.remove(&identity_id);
    }

    pub fn self_identity(&self) -> Option<u64> {
        self.self_id
    }

    /// Last-write-wins position update. Returns false for self updates, which are ignored.
    pub fn on_entity_position(&mut self, identity_id: u64, position: Vec3, now: Instant) -> bool {
        if self.self_id == Some(identity_id) {
            return false;
        }
        self.entities
            .entry(identity_id)
            .and_modify(|e| e.update_position(position, now))
            .or_insert_with(|| Entity::new(identity_id, position, now));
        true
    }

    /// Binds names to identities. A "left" record matching `target` yields `TargetLeft`.
    pub fn on_roster(&mut self, records: &[RosterRecord], target: Option<&str>) -> Vec<WorldNotice> {
        let mut notices = Vec::new();
        for record in records {
            let Some(name) = record.username.as_deref() else {
                continue;
            };
            self.names.insert(name.to_string(), record.runtime_id);
            if let Some(entity) = self.entities.get_mut(&record.runtime_id) {
                entity.display_name = Some(name.to_string());
            }
            if record.has_left() && target == Some(name) {
                notices.push(WorldNotice::TargetLeft {
                    name: name.to_string(),
                });
            }
        }
        notices
    }

    pub fn identity_of(&self, name: &str) -> Option<u64> {
        self.names.get(name).copied()
    }

    pub fn entity(&self, identity_id: u64) -> Option<&Entity> {
        self.entities.get(&identity_id)
    }

    /// name -> identity -> entity position; `None` if either link is missing.
    pub fn position_of(&self, name: &str) -> Option<Vec3> {
        let id = self.identity_of(name)?;
        self.entities.get(&id).map(|e| e.position)
    }

    /// Closest tracked entity within `radius` of `origin`.
    pub fn nearest_within(&self, origin: &Vec3, radius: f32) -> Option<(u64, f32)> {
        self.entities
            .values()
            .filter(|e| Some(e.identity_id) != self.self_id)
            .map(|e| (e.identity_id, origin.distance(&e.position)))
            .filter(|(_, d)| *d < radius)
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}
