//! Client tuning and local settings accessors

use std::time::Duration;

/// Runtime tuning for a participant
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub tick_rate: u32,
    /// Delay before a death respawn completes
    pub respawn_delay: Duration,
    /// Cadence of `UpdateTransform` pushes for remote observers
    pub transform_push_interval: Duration,
    pub heartbeat_interval: Duration,
    /// Maximum number of messages shown at once
    pub feed_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            respawn_delay: Duration::from_secs(3),
            transform_push_interval: Duration::from_millis(100),
            heartbeat_interval: Duration::from_secs(1),
            feed_capacity: 5,
        }
    }
}

/// Locally persisted preferences. Storage format is up to the implementor.
pub trait SettingsStore {
    fn sensitivity(&self) -> f32;
    fn set_sensitivity(&mut self, value: f32);
    /// Master volume in `0.0..=1.0`
    fn audio_level(&self) -> f32;
    fn set_audio_level(&mut self, value: f32);
    fn last_address(&self) -> &str;
    fn set_last_address(&mut self, address: &str);
    fn last_name(&self) -> &str;
    fn set_last_name(&mut self, name: &str);
}

/// In-process settings that live for the duration of the run
#[derive(Debug, Clone, PartialEq)]
pub struct MemorySettings {
    sensitivity: f32,
    audio_level: f32,
    last_address: String,
    last_name: String,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            sensitivity: 120.0,
            audio_level: 1.0,
            last_address: "127.0.0.1:8080".to_string(),
            last_name: shared::DEFAULT_PLAYER_NAME.to_string(),
        }
    }
}

impl SettingsStore for MemorySettings {
    fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    fn set_sensitivity(&mut self, value: f32) {
        self.sensitivity = value.max(0.0);
    }

    fn audio_level(&self) -> f32 {
        self.audio_level
    }

    fn set_audio_level(&mut self, value: f32) {
        self.audio_level = value.clamp(0.0, 1.0);
    }

    fn last_address(&self) -> &str {
        &self.last_address
    }

    // Blank input keeps the previous value
    fn set_last_address(&mut self, address: &str) {
        let address = address.trim();
        if !address.is_empty() {
            self.last_address = address.to_string();
        }
    }

    fn last_name(&self) -> &str {
        &self.last_name
    }

    fn set_last_name(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() {
            self.last_name = name.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_settings_sanitize() {
        let mut settings = MemorySettings::default();
        settings.set_audio_level(1.7);
        assert_eq!(settings.audio_level(), 1.0);
        settings.set_sensitivity(-3.0);
        assert_eq!(settings.sensitivity(), 0.0);

        settings.set_last_address("   ");
        assert_eq!(settings.last_address(), "127.0.0.1:8080");
        settings.set_last_address(" 10.0.0.2:9000 ");
        assert_eq!(settings.last_address(), "10.0.0.2:9000");

        settings.set_last_name("alice");
        assert_eq!(settings.last_name(), "alice");
    }

    #[test]
    fn test_client_config_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(1));
        assert!(config.transform_push_interval < config.heartbeat_interval);
    }
}
