//! `aika.toml`: every key is optional and falls back to the built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use aika_core::CompanionConfig;
use aika_core::behavior::BehaviorConfig;
use aika_core::session::{RetryPolicy, TransportConfig};

pub const CONFIG_FILE: &str = "aika.toml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AikaConfig {
    pub bot: BotSection,
    pub session: SessionSection,
    pub behavior: BehaviorSection,
    pub transport: TransportSection,
    pub auth: AuthSection,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BotSection {
    pub name: String,
    pub welcome: bool,
    pub welcome_delay_ms: u64,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            name: "Aika".to_string(),
            welcome: true,
            welcome_delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSection {
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub attempt_timeout_secs: u64,
    pub relocation_delay_ms: u64,
    /// Reconnect to the starting endpoint after the session drops on its own.
    pub rejoin_on_disconnect: bool,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff_ms: 1_000,
            max_backoff_ms: 10_000,
            attempt_timeout_secs: 60,
            relocation_delay_ms: 2_000,
            rejoin_on_disconnect: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct BehaviorSection {
    pub follow_interval_ms: u64,
    pub idle_interval_secs: u64,
    pub follow_step: f32,
    pub follow_min_distance: f32,
    pub idle_threshold: f32,
    pub fight_radius: f32,
    pub mine_hold_ms: u64,
    pub ambient_chance: f64,
}

impl Default for BehaviorSection {
    fn default() -> Self {
        Self {
            follow_interval_ms: 1_000,
            idle_interval_secs: 30,
            follow_step: 0.1,
            follow_min_distance: 1.0,
            idle_threshold: 0.1,
            fight_radius: 5.0,
            mine_hold_ms: 1_000,
            ambient_chance: 0.2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportSection {
    /// Address of the protocol bridge sidecar.
    pub bridge_addr: String,
    pub protocol_version: String,
    pub skip_ping: bool,
    pub offline: bool,
}

impl Default for TransportSection {
    fn default() -> Self {
        let t = TransportConfig::default();
        Self {
            bridge_addr: "127.0.0.1:19180".to_string(),
            protocol_version: t.protocol_version,
            skip_ping: t.skip_ping,
            offline: t.offline,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthSection {
    /// JSON token cache written by the login helper.
    pub token_file: Option<PathBuf>,
    /// Inline token; normally supplied through `AIKA_SESSION_TOKEN` instead.
    pub token: Option<String>,
}

impl AikaConfig {
    /// Rejects values the driver cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let b = &self.behavior;
        anyhow::ensure!(
            b.follow_interval_ms > 0,
            "behavior.follow_interval_ms must be greater than zero"
        );
        anyhow::ensure!(
            b.idle_interval_secs > 0,
            "behavior.idle_interval_secs must be greater than zero"
        );
        anyhow::ensure!(
            b.ambient_chance.is_finite() && (0.0..=1.0).contains(&b.ambient_chance),
            "behavior.ambient_chance must be between 0 and 1, got {}",
            b.ambient_chance
        );
        anyhow::ensure!(
            self.session.attempt_timeout_secs > 0,
            "session.attempt_timeout_secs must be greater than zero"
        );
        Ok(())
    }

    /// Applies `AIKA_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        if let Some(name) = get("AIKA_BOT_NAME") {
            self.bot.name = name;
        }
        if let Some(addr) = get("AIKA_BRIDGE_ADDR") {
            self.transport.bridge_addr = addr;
        }
        if let Some(token) = get("AIKA_SESSION_TOKEN") {
            self.auth.token = Some(token);
        }
        if let Some(path) = get("AIKA_TOKEN_FILE") {
            self.auth.token_file = Some(PathBuf::from(path));
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.session.max_retries,
            base_backoff: Duration::from_millis(self.session.base_backoff_ms),
            max_backoff: Duration::from_millis(self.session.max_backoff_ms),
            attempt_timeout: Duration::from_secs(self.session.attempt_timeout_secs),
        }
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            username: self.bot.name.clone(),
            protocol_version: self.transport.protocol_version.clone(),
            skip_ping: self.transport.skip_ping,
            offline: self.transport.offline,
        }
    }

    pub fn companion_config(&self) -> CompanionConfig {
        let b = &self.behavior;
        CompanionConfig {
            bot_name: self.bot.name.clone(),
            welcome_delay: self
                .bot
                .welcome
                .then(|| Duration::from_millis(self.bot.welcome_delay_ms)),
            relocation_delay: Duration::from_millis(self.session.relocation_delay_ms),
            ambient_chance: b.ambient_chance,
            behavior: BehaviorConfig {
                follow_interval: Duration::from_millis(b.follow_interval_ms),
                idle_interval: Duration::from_secs(b.idle_interval_secs),
                follow_step: b.follow_step,
                follow_min_distance: b.follow_min_distance,
                idle_threshold: b.idle_threshold,
                fight_radius: b.fight_radius,
                mine_hold: Duration::from_millis(b.mine_hold_ms),
            },
        }
    }
}
