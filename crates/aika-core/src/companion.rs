//! The single-task driver: one `select!` loop over session events, both behavior ticks and
//! the scheduled-send queue. Handlers run to completion before the next event is taken.

use std::future::pending;
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep, sleep_until};
use tracing::{debug, info, warn};

use crate::behavior::{BehaviorConfig, BehaviorEngine, Command, Phase, Surroundings};
use crate::chat::{ChatContext, CommandInterpreter};
use crate::error::ConnectionError;
use crate::lines;
use crate::protocol::{InboundMessage, OutboundMessage, Packet};
use crate::session::{Endpoint, SelfState, SessionEvent, SessionManager};
use crate::world::WorldTracker;

const MIN_TICK: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq)]
pub struct CompanionConfig {
    pub bot_name: String,
    /// Announce ourselves this long after each session becomes ready. `None` disables it.
    pub welcome_delay: Option<Duration>,
    /// Pause between acknowledging a relocation and tearing down the current session.
    pub relocation_delay: Duration,
    pub ambient_chance: f64,
    pub behavior: BehaviorConfig,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            bot_name: "Aika".to_string(),
            welcome_delay: Some(Duration::from_secs(2)),
            relocation_delay: Duration::from_secs(2),
            ambient_chance: 0.2,
            behavior: BehaviorConfig::default(),
        }
    }
}

/// Why [`Companion::run`] returned.
#[derive(Debug)]
pub enum RunOutcome {
    /// The session ended on its own (kick, close, transport failure) or was never up.
    Disconnected { reason: String },
    /// A chat-requested relocation exhausted its retries. Nothing is connected.
    RelocationFailed { error: ConnectionError },
}

struct Scheduled {
    at: Instant,
    msg: OutboundMessage,
}

enum Step {
    Event(Option<SessionEvent>),
    Follow,
    Idle,
    Due,
}

pub struct Companion {
    config: CompanionConfig,
    session: SessionManager,
    world: WorldTracker,
    engine: BehaviorEngine,
    interpreter: CommandInterpreter,
    scheduled: Vec<Scheduled>,
}

impl Companion {
    pub fn new(config: CompanionConfig, session: SessionManager) -> Self {
        let engine = BehaviorEngine::new(config.bot_name.clone(), config.behavior.clone());
        let interpreter = CommandInterpreter::new(config.bot_name.clone(), config.ambient_chance);
        Self {
            config,
            session,
            world: WorldTracker::new(),
            engine,
            interpreter,
            scheduled: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.engine.phase()
    }

    pub fn target(&self) -> Option<&str> {
        self.engine.target()
    }

    pub fn engine(&self) -> &BehaviorEngine {
        &self.engine
    }

    pub fn world(&self) -> &WorldTracker {
        &self.world
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.session.active().map(|h| h.endpoint())
    }

    /// Connects (tearing down any previous session) and starts from a clean state.
    pub async fn connect(
        &mut self,
        endpoint: &Endpoint,
        max_retries: u32,
    ) -> Result<(), ConnectionError> {
        let result = self.session.connect(endpoint, max_retries).await;
        self.begin_session();
        result.map(|_| ())
    }

    /// Sends a chat line on the current session right away.
    pub fn say(&self, message: impl Into<String>) {
        self.send(&self.engine.chat(message));
    }

    /// Drives the session until it ends or a relocation fails.
    pub async fn run(&mut self) -> RunOutcome {
        let (mut follow, mut idle) = self.intervals();

        loop {
            let due = self.next_due();
            let step = tokio::select! {
                event = self.session.next_event() => Step::Event(event),
                _ = follow.tick() => Step::Follow,
                _ = idle.tick() => Step::Idle,
                _ = wait_until(due) => Step::Due,
            };

            let commands = match step {
                Step::Event(None) => {
                    return RunOutcome::Disconnected {
                        reason: "not connected".to_string(),
                    };
                }
                Step::Event(Some(SessionEvent::Ended { reason })) => {
                    info!(reason = %reason, "companion.disconnected");
                    self.scheduled.clear();
                    return RunOutcome::Disconnected { reason };
                }
                Step::Event(Some(SessionEvent::Spawned)) => {
                    let me = self.self_state();
                    self.engine.on_spawn(me.position);
                    Vec::new()
                }
                Step::Event(Some(SessionEvent::Packet(packet))) => self.handle_packet(packet),
                Step::Follow => {
                    let env = Surroundings {
                        me: self.self_state(),
                        world: &self.world,
                    };
                    self.engine.follow_tick(&env)
                }
                Step::Idle => self.engine.idle_tick(&self.world),
                Step::Due => {
                    self.flush_due();
                    Vec::new()
                }
            };

            match self.execute(commands).await {
                Ok(false) => {}
                Ok(true) => {
                    // Fresh timers so no stale ticks fire right after the hand-off.
                    (follow, idle) = self.intervals();
                }
                Err(error) => return RunOutcome::RelocationFailed { error },
            }
        }
    }

    fn intervals(&self) -> (Interval, Interval) {
        let now = Instant::now();
        let cfg = self.engine.config();
        // `interval_at` rejects a zero period.
        let follow_every = cfg.follow_interval.max(MIN_TICK);
        let idle_every = cfg.idle_interval.max(MIN_TICK);
        let mut follow = interval_at(now + follow_every, follow_every);
        follow.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut idle = interval_at(now + idle_every, idle_every);
        idle.set_missed_tick_behavior(MissedTickBehavior::Skip);
        (follow, idle)
    }

    fn self_state(&self) -> SelfState {
        self.session
            .active()
            .map(|h| h.self_state())
            .unwrap_or_default()
    }

    /// Resets everything owned per session and seeds it from the new handle, if any.
    fn begin_session(&mut self) {
        self.world.reset();
        self.engine.reset();
        self.scheduled.clear();

        let Some(handle) = self.session.active() else {
            return;
        };
        let me = handle.self_state();
        let generation = handle.generation();
        self.world.set_self_identity(me.runtime_id);
        self.engine.on_spawn(me.position);
        info!(
            generation,
            runtime_id = me.runtime_id,
            endpoint = %handle.endpoint(),
            "companion.session.begin"
        );

        if let Some(delay) = self.config.welcome_delay {
            let welcome = self.engine.chat(lines::welcome(&self.config.bot_name));
            self.schedule(delay, welcome);
        }
    }

    fn handle_packet(&mut self, packet: Packet) -> Vec<Command> {
        let msg = match InboundMessage::decode(&packet) {
            Ok(Some(msg)) => msg,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(kind = %err.kind, error = %err, "companion.packet.malformed");
                return Vec::new();
            }
        };

        match msg {
            InboundMessage::Chat(text) => {
                // System messages carry no sender.
                if text.source_name.is_empty() {
                    return Vec::new();
                }
                let ctx = ChatContext {
                    sender: &text.source_name,
                    target: self.engine.target(),
                };
                let Some(intent) = self.interpreter.parse(ctx, &text.message) else {
                    return Vec::new();
                };
                let env = Surroundings {
                    me: self.self_state(),
                    world: &self.world,
                };
                self.engine.on_intent(intent, &env)
            }
            InboundMessage::EntityMoved(moved) => {
                self.world.on_entity_position(
                    moved.runtime_id,
                    moved.position,
                    std::time::Instant::now(),
                );
                Vec::new()
            }
            InboundMessage::Roster(list) => {
                let notices = self.world.on_roster(&list.records, self.engine.target());
                notices
                    .into_iter()
                    .flat_map(|n| self.engine.on_world_notice(n))
                    .collect()
            }
            InboundMessage::Attributes(attrs) => {
                if self.world.self_identity() != Some(attrs.runtime_id) {
                    return Vec::new();
                }
                match attrs.health() {
                    Some(health) => {
                        let me = self.self_state();
                        self.engine.on_self_health(health, &me)
                    }
                    None => Vec::new(),
                }
            }
            InboundMessage::Respawn(respawn) => {
                self.engine.on_spawn(respawn.position);
                Vec::new()
            }
        }
    }

    /// Runs engine commands in order. `Ok(true)` means the session was relocated; anything
    /// after the relocation belonged to the old session and is dropped.
    async fn execute(&mut self, commands: Vec<Command>) -> Result<bool, ConnectionError> {
        for command in commands {
            match command {
                Command::Send(msg) => self.send(&msg),
                Command::SendAfter { delay, msg } => self.schedule(delay, msg),
                Command::Relocate { endpoint, follow } => {
                    self.relocate(&endpoint, follow).await?;
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    async fn relocate(
        &mut self,
        endpoint: &Endpoint,
        follow: Option<String>,
    ) -> Result<(), ConnectionError> {
        info!(endpoint = %endpoint, follow = ?follow, "companion.relocate.start");
        // Lets the acknowledgement leave before the old session is torn down.
        sleep(self.config.relocation_delay).await;

        let result = self.session.reconnect(endpoint).await;
        self.begin_session();
        if let Err(err) = result {
            warn!(endpoint = %endpoint, error = %err, "companion.relocate.failed");
            return Err(err);
        }

        for cmd in self.engine.apply_relocation(follow) {
            if let Command::Send(msg) = cmd {
                self.send(&msg);
            }
        }
        info!(endpoint = %endpoint, phase = ?self.engine.phase(), "companion.relocate.done");
        Ok(())
    }

    fn send(&self, msg: &OutboundMessage) {
        let Some(handle) = self.session.active() else {
            debug!(kind = msg.kind(), "companion.send.dropped");
            return;
        };
        if let Err(err) = handle.send(msg) {
            warn!(kind = msg.kind(), error = %format!("{err:#}"), "companion.send.failed");
        }
    }

    fn schedule(&mut self, delay: Duration, msg: OutboundMessage) {
        self.scheduled.push(Scheduled {
            at: Instant::now() + delay,
            msg,
        });
    }

    fn next_due(&self) -> Option<Instant> {
        self.scheduled.iter().map(|s| s.at).min()
    }

    fn flush_due(&mut self) {
        let now = Instant::now();
        let (due, later): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.scheduled).into_iter().partition(|s| s.at <= now);
        self.scheduled = later;
        for s in due {
            self.send(&s.msg);
        }
    }
}

async fn wait_until(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => pending().await,
    }
}
