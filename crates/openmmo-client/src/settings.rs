//! Maps the persisted [`Config`] onto each component's own settings.

use std::time::Duration;

use openmmo_config::Config;
use openmmo_input::{ActionMap, InputTranslator, LookSettings, MovementKeys};
use openmmo_multiplayer::{PredictorConfig, ReconcileConfig};
use openmmo_net::{FrameConfig, SessionConfig};
use openmmo_ui::WatchdogConfig;

/// Handshake and heartbeat settings.
pub fn session_config(config: &Config) -> SessionConfig {
    SessionConfig {
        client_version: config.network.client_version.clone(),
        protocol_version: config.network.protocol_version.clone(),
        supported_features: config.network.supported_features,
        ping_interval: Duration::from_millis(config.network.ping_interval_ms),
        ..SessionConfig::default()
    }
}

/// Frame size limit for socket transports.
pub fn frame_config(config: &Config) -> FrameConfig {
    FrameConfig {
        max_payload_size: config.network.max_frame_size,
    }
}

/// Prediction and reconciliation tuning.
pub fn predictor_config(config: &Config) -> PredictorConfig {
    let p = &config.prediction;
    let r = &config.reconciliation;
    PredictorConfig {
        move_speed: p.move_speed,
        input_epsilon: p.input_epsilon,
        position_epsilon: p.position_epsilon,
        rotation_epsilon: p.rotation_epsilon,
        idle_rotation_epsilon: p.idle_rotation_epsilon,
        intent_lookahead_secs: p.intent_lookahead_secs,
        history_capacity: p.history_capacity,
        history_window: Duration::from_millis(p.history_window_ms),
        reconcile: ReconcileConfig {
            threshold: r.threshold,
            blend_factor: r.blend_factor,
            trust_server: r.trust_server,
            reconcile_local_player: r.reconcile_local_player,
        },
    }
}

/// The three UI watchdog timeouts.
pub fn watchdog_config(config: &Config) -> WatchdogConfig {
    WatchdogConfig {
        connect: Duration::from_millis(config.timeouts.connect_ms),
        auth: Duration::from_millis(config.timeouts.auth_ms),
        loading: Duration::from_millis(config.timeouts.loading_ms),
    }
}

/// Input translator with configured bindings and mouse settings.
pub fn input_translator(config: &Config) -> InputTranslator {
    InputTranslator::new(
        MovementKeys::from_overrides(&config.input.keybindings),
        ActionMap::from_overrides(&config.input.keybindings),
        LookSettings {
            sensitivity: config.input.mouse_sensitivity,
            invert_y: config.input.invert_y,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_line_up() {
        let config = Config::default();
        assert_eq!(predictor_config(&config), PredictorConfig::default());
        assert_eq!(watchdog_config(&config), WatchdogConfig::default());
        assert_eq!(
            frame_config(&config).max_payload_size,
            FrameConfig::default().max_payload_size
        );
        let session = session_config(&config);
        assert_eq!(session.client_version, "0.1.0");
        assert_eq!(session.ping_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_overrides_flow_through() {
        let mut config = Config::default();
        config.reconciliation.trust_server = true;
        config.reconciliation.reconcile_local_player = false;
        config.timeouts.auth_ms = 1_500;
        assert!(predictor_config(&config).reconcile.trust_server);
        assert!(!predictor_config(&config).reconcile.reconcile_local_player);
        assert_eq!(watchdog_config(&config).auth, Duration::from_millis(1_500));
    }

    #[test]
    fn test_keybindings_reach_movement_and_actions() {
        use openmmo_input::{InputEvent, RawInput};
        use winit::event::ElementState;
        use winit::keyboard::KeyCode;

        let mut config = Config::default();
        config
            .input
            .keybindings
            .insert("move_forward".to_string(), "ArrowUp".to_string());
        config
            .input
            .keybindings
            .insert("ability_2".to_string(), "KeyF".to_string());
        let mut input = input_translator(&config);

        for key in [KeyCode::ArrowUp, KeyCode::KeyF] {
            input.process(RawInput::Key {
                key,
                state: ElementState::Pressed,
                repeat: false,
            });
        }
        assert_eq!(input.movement(), glam::Vec2::Y);
        assert!(
            input
                .drain_events()
                .any(|e| e == InputEvent::Action(openmmo_input::Action::Ability(2)))
        );
    }
}
