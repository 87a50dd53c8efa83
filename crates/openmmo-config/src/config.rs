//! Configuration structs with sensible defaults and RON persistence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Server connection and protocol settings.
    pub network: NetworkConfig,
    /// Watchdog durations for the login/character flow.
    pub timeouts: TimeoutConfig,
    /// Input settings.
    pub input: InputConfig,
    /// Local movement prediction tuning.
    pub prediction: PredictionConfig,
    /// Correction policy applied when authoritative state arrives.
    pub reconciliation: ReconciliationConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Network/protocol configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Server host name or IP address.
    pub server_address: String,
    /// Server port.
    pub server_port: u16,
    /// Client build version announced in the handshake.
    pub client_version: String,
    /// Wire protocol version announced in the handshake.
    pub protocol_version: String,
    /// Feature bit set announced in the handshake.
    pub supported_features: u32,
    /// Interval between heartbeat pings while connected, in milliseconds.
    pub ping_interval_ms: u64,
    /// Largest accepted frame payload in bytes.
    pub max_frame_size: u32,
    /// Capacity of the inbound transport queue drained each tick.
    pub inbound_queue_capacity: usize,
}

/// Watchdog durations, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed for the connection to open.
    pub connect_ms: u64,
    /// Time allowed between sending credentials and the authentication reply.
    pub auth_ms: u64,
    /// Upper bound on any stay in the loading screen.
    pub loading_ms: u64,
}

/// Input configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InputConfig {
    /// Mouse sensitivity multiplier.
    pub mouse_sensitivity: f32,
    /// Invert Y axis for camera.
    pub invert_y: bool,
    /// Keybinding overrides (action name -> key name).
    pub keybindings: HashMap<String, String>,
}

/// Movement prediction configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PredictionConfig {
    /// Movement speed in world units per second.
    pub move_speed: f32,
    /// Input magnitudes at or below this are treated as "no input".
    pub input_epsilon: f32,
    /// Step-vector tolerance when comparing against the last sent intent.
    pub position_epsilon: f32,
    /// Rotation tolerance (radians) while moving.
    pub rotation_epsilon: f32,
    /// Rotation drift (radians) that triggers an intent while standing still.
    pub idle_rotation_epsilon: f32,
    /// How far ahead (seconds of travel) the intent target is placed.
    pub intent_lookahead_secs: f32,
    /// Maximum number of remembered intents.
    pub history_capacity: usize,
    /// Age (milliseconds) after which remembered intents are pruned.
    pub history_window_ms: u64,
}

/// Reconciliation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Drift (world units) below which corrections are ignored.
    pub threshold: f32,
    /// Fraction of the drift removed per correction (0, 1].
    pub blend_factor: f32,
    /// Snap straight to the authoritative position instead of blending.
    pub trust_server: bool,
    /// Whether the locally controlled entity is corrected at all.
    pub reconcile_local_player: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1".to_string(),
            server_port: 8080,
            client_version: "0.1.0".to_string(),
            protocol_version: "1.0".to_string(),
            supported_features: 0,
            ping_interval_ms: 5_000,
            max_frame_size: 1_048_576,
            inbound_queue_capacity: 1024,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 10_000,
            auth_ms: 10_000,
            loading_ms: 30_000,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            mouse_sensitivity: 1.0,
            invert_y: false,
            keybindings: HashMap::new(),
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            input_epsilon: 0.01,
            position_epsilon: 0.001,
            rotation_epsilon: 0.05,
            idle_rotation_epsilon: 0.1,
            intent_lookahead_secs: 2.0,
            history_capacity: 64,
            history_window_ms: 2_000,
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            blend_factor: 0.2,
            trust_server: false,
            reconcile_local_player: true,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Platform-specific directory holding `config.ron`, if one can be resolved.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("openmmo"))
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// `host:port` string for the configured server.
    pub fn server_endpoint(&self) -> String {
        format!("{}:{}", self.network.server_address, self.network.server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(3))
                .unwrap();
        assert!(ron_str.contains("server_port: 8080"));
        assert!(ron_str.contains("trust_server: false"));
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(network: (server_port: 9000))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.network.server_port, 9000);
        assert_eq!(config.network.server_address, "127.0.0.1");
        assert_eq!(config.timeouts, TimeoutConfig::default());
        assert_eq!(config.reconciliation, ReconciliationConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.network.server_address = "10.0.0.1".to_string();
        config.reconciliation.trust_server = true;
        config.timeouts.auth_ms = 2_500;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join("config.ron").exists());
    }

    #[test]
    fn test_reload_detects_changes() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default();
        config.save(dir.path()).unwrap();

        let mut modified = config.clone();
        modified.prediction.move_speed = 7.5;
        modified.save(dir.path()).unwrap();

        let reloaded = config.reload(dir.path()).unwrap();
        assert_eq!(reloaded.map(|c| c.prediction.move_speed), Some(7.5));
        assert!(modified.reload(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.ron"), "{{not valid}}").unwrap();
        let result = Config::load_or_create(dir.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_server_endpoint_joins_host_and_port() {
        let config = Config::default();
        assert_eq!(config.server_endpoint(), "127.0.0.1:8080");
    }
}
