use std::time::Duration;

use tracing::{debug, info};

use super::actions;
use super::state::{BehaviorState, Phase};
use crate::chat::{Intent, Keyword};
use crate::lines;
use crate::protocol::{MoveMode, OutboundMessage, Vec3};
use crate::session::{Endpoint, SelfState};
use crate::world::{WorldNotice, WorldTracker};

#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorConfig {
    pub follow_interval: Duration,
    pub idle_interval: Duration,
    /// Length of one follow move.
    pub follow_step: f32,
    /// No move is issued when already this close to the target.
    pub follow_min_distance: f32,
    /// Target displacement between idle checks below which we ask if they are still there.
    pub idle_threshold: f32,
    pub fight_radius: f32,
    /// Time between start-break and stop-break when mining.
    pub mine_hold: Duration,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            follow_interval: Duration::from_secs(1),
            idle_interval: Duration::from_secs(30),
            follow_step: 0.1,
            follow_min_distance: 1.0,
            idle_threshold: 0.1,
            fight_radius: 5.0,
            mine_hold: Duration::from_secs(1),
        }
    }
}

/// What the engine asks its driver to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Send(OutboundMessage),
    SendAfter {
        delay: Duration,
        msg: OutboundMessage,
    },
    /// Move the session to `endpoint`; once there, follow `follow` if set.
    Relocate {
        endpoint: Endpoint,
        follow: Option<String>,
    },
}

/// Read-only view of the session the handlers may consult.
#[derive(Debug, Clone, Copy)]
pub struct Surroundings<'a> {
    pub me: SelfState,
    pub world: &'a WorldTracker,
}

/// The companion state machine. Handlers mutate [`BehaviorState`] and return commands;
/// they never perform I/O themselves.
#[derive(Debug)]
pub struct BehaviorEngine {
    bot_name: String,
    config: BehaviorConfig,
    state: BehaviorState,
}

impl BehaviorEngine {
    pub fn new(bot_name: impl Into<String>, config: BehaviorConfig) -> Self {
        Self {
            bot_name: bot_name.into(),
            config,
            state: BehaviorState::default(),
        }
    }

    pub fn state(&self) -> &BehaviorState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn config(&self) -> &BehaviorConfig {
        &self.config
    }

    pub fn target(&self) -> Option<&str> {
        self.state.target.as_deref()
    }

    /// A chat line in our own name.
    pub fn chat(&self, message: impl Into<String>) -> OutboundMessage {
        OutboundMessage::Chat {
            source_name: self.bot_name.clone(),
            message: message.into(),
        }
    }

    fn say(&self, message: impl Into<String>) -> Command {
        Command::Send(self.chat(message))
    }

    /// New session: nothing carries over.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Re-applies the follow target a relocation carried across its own reset.
    pub fn apply_relocation(&mut self, follow: Option<String>) -> Vec<Command> {
        let Some(target) = follow else {
            return Vec::new();
        };
        info!(target = %target, "behavior.relocation.follow");
        let arrived = self.say(lines::arrived(&target));
        self.state.follow(target);
        vec![arrived]
    }

    pub fn on_intent(&mut self, intent: Intent, env: &Surroundings<'_>) -> Vec<Command> {
        debug!(?intent, phase = ?self.phase(), "behavior.intent");
        match intent {
            Intent::Invite { new_target } => {
                let ack = self.say(lines::invited(&new_target));
                self.state.follow(new_target);
                vec![ack]
            }
            Intent::RelocateAndFollow {
                endpoint,
                new_target,
            } => vec![
                self.say(lines::relocating(&endpoint, Some(&new_target))),
                Command::Relocate {
                    endpoint,
                    follow: Some(new_target),
                },
            ],
            Intent::Relocate { endpoint } => vec![
                self.say(lines::relocating(&endpoint, None)),
                Command::Relocate {
                    endpoint,
                    follow: None,
                },
            ],
            Intent::Keyword(keyword) => self.on_keyword(keyword, env),
            Intent::Ambient { line } => vec![self.say(line)],
        }
    }

    fn on_keyword(&mut self, keyword: Keyword, env: &Surroundings<'_>) -> Vec<Command> {
        match keyword {
            Keyword::Follow | Keyword::Come => {
                if self.state.target.is_none() {
                    return Vec::new();
                }
                self.state.following = true;
                let line = if keyword == Keyword::Follow {
                    lines::FOLLOW
                } else {
                    lines::COME
                };
                vec![self.say(line)]
            }
            Keyword::Wait => {
                self.state.following = false;
                vec![self.say(lines::WAIT)]
            }
            Keyword::Farewell => vec![self.say(lines::FAREWELL)],
            Keyword::Thanks => vec![self.say(lines::THANKS)],
            Keyword::Help => vec![self.say(lines::HELP)],
            Keyword::Explore => vec![self.say(lines::EXPLORE)],
            Keyword::Greeting => vec![self.say(lines::GREETING)],
            Keyword::Mine => {
                let mut out = vec![self.say(lines::MINE)];
                out.extend(actions::mine(&env.me, self.config.mine_hold));
                out
            }
            Keyword::Build => vec![self.say(lines::BUILD), actions::build(&env.me)],
            Keyword::Fight => {
                let mut out = vec![self.say(lines::FIGHT)];
                out.extend(actions::fight(&env.me, env.world, self.config.fight_radius));
                out
            }
            Keyword::Craft => vec![self.say(lines::CRAFT), actions::craft(&env.me)],
        }
    }

    pub fn on_world_notice(&mut self, notice: WorldNotice) -> Vec<Command> {
        match notice {
            WorldNotice::TargetLeft { name } => {
                info!(target = %name, "behavior.target.left");
                self.state.following = false;
                vec![self.say(lines::TARGET_LEFT)]
            }
        }
    }

    /// Only the transition into death reacts; repeated zero-health updates are ignored.
    pub fn on_self_health(&mut self, health: f32, me: &SelfState) -> Vec<Command> {
        if health > 0.0 || self.state.dead {
            return Vec::new();
        }
        self.state.dead = true;
        info!(spawn = ?self.state.spawn, "behavior.died");

        let mut out = vec![self.say(lines::DIED)];
        if let Some(spawn) = self.state.spawn {
            out.push(Command::Send(OutboundMessage::Move {
                runtime_id: me.runtime_id,
                position: spawn,
                mode: MoveMode::Teleport,
            }));
        }
        out
    }

    pub fn on_spawn(&mut self, position: Vec3) {
        self.state.spawn = Some(position);
        self.state.dead = false;
    }

    /// One step toward the target while following and not already close.
    pub fn follow_tick(&mut self, env: &Surroundings<'_>) -> Vec<Command> {
        if self.phase() != Phase::Following {
            return Vec::new();
        }
        let Some(target_pos) = self.target().and_then(|t| env.world.position_of(t)) else {
            return Vec::new();
        };
        if env.me.position.distance(&target_pos) <= self.config.follow_min_distance {
            return Vec::new();
        }
        vec![Command::Send(OutboundMessage::Move {
            runtime_id: env.me.runtime_id,
            position: env.me.position.step_toward(&target_pos, self.config.follow_step),
            mode: MoveMode::Normal,
        })]
    }

    /// Compares the target's position with the previous check and prompts if it barely moved.
    pub fn idle_tick(&mut self, world: &WorldTracker) -> Vec<Command> {
        if !self.state.following {
            return Vec::new();
        }
        let Some(target) = self.state.target.clone() else {
            return Vec::new();
        };
        let Some(current) = world.position_of(&target) else {
            return Vec::new();
        };

        let previous = self.state.last_seen.insert(target, current);
        match previous {
            Some(prev) if prev.distance(&current) < self.config.idle_threshold => {
                vec![self.say(lines::STILL_THERE)]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::protocol::RosterRecord;

    fn engine() -> BehaviorEngine {
        BehaviorEngine::new("Aika", BehaviorConfig::default())
    }

    fn me() -> SelfState {
        SelfState {
            runtime_id: 1,
            position: Vec3::new(0.0, 64.0, 0.0),
            yaw: 0.0,
        }
    }

    fn world_with_bob(at: Vec3) -> WorldTracker {
        let mut world = WorldTracker::new();
        world.set_self_identity(1);
        world.on_roster(
            &[RosterRecord {
                runtime_id: 7,
                username: Some("Bob".to_string()),
                flags: 0,
            }],
            None,
        );
        world.on_entity_position(7, at, Instant::now());
        world
    }

    fn chats(cmds: &[Command]) -> Vec<String> {
        cmds.iter()
            .filter_map(|c| match c {
                Command::Send(OutboundMessage::Chat { message, .. }) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    fn keyword(e: &mut BehaviorEngine, kw: Keyword, world: &WorldTracker) -> Vec<Command> {
        let env = Surroundings { me: me(), world };
        e.on_intent(Intent::Keyword(kw), &env)
    }

    #[test]
    fn invite_starts_following_sender() {
        let mut e = engine();
        let world = WorldTracker::new();
        let env = Surroundings { me: me(), world: &world };
        let cmds = e.on_intent(
            Intent::Invite {
                new_target: "Bob".to_string(),
            },
            &env,
        );
        assert_eq!(e.phase(), Phase::Following);
        assert_eq!(e.target(), Some("Bob"));
        assert_eq!(chats(&cmds), vec![lines::invited("Bob")]);
    }

    #[test]
    fn stop_then_follow_toggles_phase() {
        let mut e = engine();
        let world = WorldTracker::new();
        e.state.follow("Bob");

        keyword(&mut e, Keyword::Wait, &world);
        assert_eq!(e.phase(), Phase::Waiting);
        assert_eq!(e.target(), Some("Bob"));

        let cmds = keyword(&mut e, Keyword::Come, &world);
        assert_eq!(e.phase(), Phase::Following);
        assert_eq!(chats(&cmds), vec![lines::COME.to_string()]);
    }

    #[test]
    fn follow_without_target_does_nothing() {
        let mut e = engine();
        let world = WorldTracker::new();
        assert!(keyword(&mut e, Keyword::Follow, &world).is_empty());
        assert_eq!(e.phase(), Phase::Idle);
    }

    #[test]
    fn relocation_intents_hand_off_to_driver() {
        let mut e = engine();
        let world = WorldTracker::new();
        let env = Surroundings { me: me(), world: &world };
        let endpoint = Endpoint::new("10.0.0.5", 19150);
        let cmds = e.on_intent(
            Intent::RelocateAndFollow {
                endpoint: endpoint.clone(),
                new_target: "Bob".to_string(),
            },
            &env,
        );
        assert_eq!(
            cmds.last(),
            Some(&Command::Relocate {
                endpoint,
                follow: Some("Bob".to_string())
            })
        );
        // Nothing changes until the driver reports success.
        assert_eq!(e.phase(), Phase::Idle);
    }

    #[test]
    fn relocation_target_survives_reset() {
        let mut e = engine();
        e.state.follow("Alice");
        e.reset();
        let cmds = e.apply_relocation(Some("Bob".to_string()));
        assert_eq!(e.phase(), Phase::Following);
        assert_eq!(e.target(), Some("Bob"));
        assert_eq!(chats(&cmds), vec![lines::arrived("Bob")]);

        let mut e = engine();
        assert!(e.apply_relocation(None).is_empty());
        assert_eq!(e.phase(), Phase::Idle);
    }

    #[test]
    fn death_reacts_once_and_teleports_to_spawn() {
        let mut e = engine();
        let spawn = Vec3::new(10.0, 70.0, -4.0);
        e.on_spawn(spawn);

        let first = e.on_self_health(0.0, &me());
        assert_eq!(e.phase(), Phase::Dead);
        assert_eq!(chats(&first), vec![lines::DIED.to_string()]);
        assert_eq!(
            first.last(),
            Some(&Command::Send(OutboundMessage::Move {
                runtime_id: 1,
                position: spawn,
                mode: MoveMode::Teleport,
            }))
        );

        assert!(e.on_self_health(-1.0, &me()).is_empty());
        e.on_spawn(spawn);
        assert_ne!(e.phase(), Phase::Dead);
    }

    #[test]
    fn death_without_spawn_only_chats() {
        let mut e = engine();
        let cmds = e.on_self_health(0.0, &me());
        assert_eq!(cmds.len(), 1);
        assert!(e.on_self_health(20.0, &me()).is_empty());
    }

    #[test]
    fn target_left_stops_following_but_keeps_target() {
        let mut e = engine();
        e.state.follow("Bob");
        let cmds = e.on_world_notice(WorldNotice::TargetLeft {
            name: "Bob".to_string(),
        });
        assert_eq!(e.phase(), Phase::Waiting);
        assert_eq!(e.target(), Some("Bob"));
        assert_eq!(chats(&cmds), vec![lines::TARGET_LEFT.to_string()]);
    }

    #[test]
    fn follow_tick_steps_toward_target() {
        let mut e = engine();
        e.state.follow("Bob");
        let world = world_with_bob(Vec3::new(10.0, 64.0, 0.0));
        let env = Surroundings { me: me(), world: &world };

        let cmds = e.follow_tick(&env);
        let [Command::Send(OutboundMessage::Move { position, mode, .. })] = cmds.as_slice() else {
            panic!("expected one move, got {cmds:?}");
        };
        assert_eq!(*mode, MoveMode::Normal);
        assert!((me().position.distance(position) - 0.1).abs() < 1e-5);
        assert!(position.x > 0.0);
    }

    #[test]
    fn follow_tick_holds_when_close_or_unknown() {
        let mut e = engine();
        e.state.follow("Bob");
        let near = world_with_bob(Vec3::new(0.5, 64.0, 0.0));
        assert!(e.follow_tick(&Surroundings { me: me(), world: &near }).is_empty());
        let empty = WorldTracker::new();
        assert!(e.follow_tick(&Surroundings { me: me(), world: &empty }).is_empty());

        e.state.following = false;
        let far = world_with_bob(Vec3::new(10.0, 64.0, 0.0));
        assert!(e.follow_tick(&Surroundings { me: me(), world: &far }).is_empty());
    }

    #[test]
    fn idle_prompt_needs_a_baseline() {
        let mut e = engine();
        e.state.follow("Bob");
        let mut world = world_with_bob(Vec3::new(5.0, 64.0, 5.0));

        // First check only records the baseline.
        assert!(e.idle_tick(&world).is_empty());
        // Stationary: exactly one prompt.
        assert_eq!(chats(&e.idle_tick(&world)), vec![lines::STILL_THERE.to_string()]);

        // Moved: no prompt, baseline updated.
        world.on_entity_position(7, Vec3::new(9.0, 64.0, 5.0), Instant::now());
        assert!(e.idle_tick(&world).is_empty());
        assert_eq!(e.state().last_seen.get("Bob"), Some(&Vec3::new(9.0, 64.0, 5.0)));
    }

    #[test]
    fn actions_follow_their_ack() {
        let mut e = engine();
        let world = world_with_bob(Vec3::new(2.0, 64.0, 0.0));

        let mine = keyword(&mut e, Keyword::Mine, &world);
        assert_eq!(mine.len(), 3);
        assert!(matches!(mine[2], Command::SendAfter { .. }));

        let fight = keyword(&mut e, Keyword::Fight, &world);
        assert!(matches!(
            fight[1],
            Command::Send(OutboundMessage::Attack {
                target_runtime_id: 7,
                ..
            })
        ));

        let lonely = WorldTracker::new();
        assert_eq!(keyword(&mut e, Keyword::Fight, &lonely).len(), 1);
        assert_eq!(keyword(&mut e, Keyword::Build, &world).len(), 2);
        assert_eq!(keyword(&mut e, Keyword::Craft, &world).len(), 2);
    }
}
