//! Session configuration.

use std::env;

use combat_core::CombatConfig;

/// Settings shared by every component of one participant's session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Authority applies requests without a confirmation prompt.
    pub auto_approve: bool,
    /// Capacity of each local event topic.
    pub event_buffer_size: usize,
    /// Capacity of the in-process message bus.
    pub bus_buffer_size: usize,
    pub combat: CombatConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_approve: false,
            event_buffer_size: 100,
            bus_buffer_size: 64,
            combat: CombatConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `COMBAT_AUTO_APPROVE` - Skip authority confirmation prompts (default: false)
    /// - `COMBAT_EVENT_BUFFER` - Capacity per event topic (default: 100)
    /// - `COMBAT_BUS_BUFFER` - Message bus capacity (default: 64)
    /// - `COMBAT_DAZED_PENALTY` - Attack dice removed while dazed (default: 2)
    /// - `COMBAT_FEAR_PENALTY` - Damage modifier while afraid (default: -2)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(auto) = read_env_bool("COMBAT_AUTO_APPROVE") {
            config.auto_approve = auto;
        }
        if let Some(capacity) = read_env::<usize>("COMBAT_EVENT_BUFFER") {
            config.event_buffer_size = capacity.max(1);
        }
        if let Some(capacity) = read_env::<usize>("COMBAT_BUS_BUFFER") {
            config.bus_buffer_size = capacity.max(1);
        }
        if let Some(penalty) = read_env::<u32>("COMBAT_DAZED_PENALTY") {
            config.combat.dazed_dice_penalty = penalty;
        }
        if let Some(penalty) = read_env::<i64>("COMBAT_FEAR_PENALTY") {
            config.combat.fear_damage_penalty = penalty;
        }

        config
    }

    /// Builder: toggle auto-approval.
    pub fn with_auto_approve(mut self, auto_approve: bool) -> Self {
        self.auto_approve = auto_approve;
        self
    }
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}

fn read_env_bool(key: &str) -> Option<bool> {
    match env::var(key).ok()?.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
