//! Movement key layout and key-name parsing for config overrides.
//!
//! Physical key codes are used throughout so that WASD movement works
//! identically regardless of the user's keyboard layout.

use std::collections::HashMap;

use glam::Vec2;
use winit::keyboard::KeyCode;

/// Config key naming the forward movement binding.
pub const MOVE_FORWARD: &str = "move_forward";
/// Config key naming the backward movement binding.
pub const MOVE_BACK: &str = "move_back";
/// Config key naming the left strafe binding.
pub const MOVE_LEFT: &str = "move_left";
/// Config key naming the right strafe binding.
pub const MOVE_RIGHT: &str = "move_right";
/// Config key naming the jump binding.
pub const JUMP: &str = "jump";

/// The four directional keys plus jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementKeys {
    /// Contributes `(0, +1)`.
    pub forward: KeyCode,
    /// Contributes `(0, -1)`.
    pub back: KeyCode,
    /// Contributes `(-1, 0)`.
    pub left: KeyCode,
    /// Contributes `(+1, 0)`.
    pub right: KeyCode,
    /// Toggles the jump flag.
    pub jump: KeyCode,
}

impl Default for MovementKeys {
    fn default() -> Self {
        Self {
            forward: KeyCode::KeyW,
            back: KeyCode::KeyS,
            left: KeyCode::KeyA,
            right: KeyCode::KeyD,
            jump: KeyCode::Space,
        }
    }
}

impl MovementKeys {
    /// Builds the layout from `action name -> key name` overrides. Unknown
    /// action names and unparseable key names are logged and ignored.
    pub fn from_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut keys = Self::default();
        for (action, key_name) in overrides {
            let Some(code) = key_from_name(key_name) else {
                tracing::warn!("Ignoring binding {action} -> {key_name}: unknown key");
                continue;
            };
            match action.as_str() {
                MOVE_FORWARD => keys.forward = code,
                MOVE_BACK => keys.back = code,
                MOVE_LEFT => keys.left = code,
                MOVE_RIGHT => keys.right = code,
                JUMP => keys.jump = code,
                _ => tracing::debug!("Binding {action} is not a movement binding"),
            }
        }
        keys
    }

    /// Signed unit contribution of a directional key, if `key` is one.
    pub fn direction_of(&self, key: KeyCode) -> Option<Vec2> {
        if key == self.forward {
            Some(Vec2::Y)
        } else if key == self.back {
            Some(Vec2::NEG_Y)
        } else if key == self.left {
            Some(Vec2::NEG_X)
        } else if key == self.right {
            Some(Vec2::X)
        } else {
            None
        }
    }
}

/// Parses a key name as written in `config.ron` (the `Debug` form of
/// [`KeyCode`], e.g. `"KeyW"` or `"ArrowUp"`).
pub fn key_from_name(name: &str) -> Option<KeyCode> {
    Some(match name {
        "KeyA" => KeyCode::KeyA,
        "KeyB" => KeyCode::KeyB,
        "KeyC" => KeyCode::KeyC,
        "KeyD" => KeyCode::KeyD,
        "KeyE" => KeyCode::KeyE,
        "KeyF" => KeyCode::KeyF,
        "KeyG" => KeyCode::KeyG,
        "KeyH" => KeyCode::KeyH,
        "KeyI" => KeyCode::KeyI,
        "KeyJ" => KeyCode::KeyJ,
        "KeyK" => KeyCode::KeyK,
        "KeyL" => KeyCode::KeyL,
        "KeyM" => KeyCode::KeyM,
        "KeyN" => KeyCode::KeyN,
        "KeyO" => KeyCode::KeyO,
        "KeyP" => KeyCode::KeyP,
        "KeyQ" => KeyCode::KeyQ,
        "KeyR" => KeyCode::KeyR,
        "KeyS" => KeyCode::KeyS,
        "KeyT" => KeyCode::KeyT,
        "KeyU" => KeyCode::KeyU,
        "KeyV" => KeyCode::KeyV,
        "KeyW" => KeyCode::KeyW,
        "KeyX" => KeyCode::KeyX,
        "KeyY" => KeyCode::KeyY,
        "KeyZ" => KeyCode::KeyZ,
        "Space" => KeyCode::Space,
        "ShiftLeft" => KeyCode::ShiftLeft,
        "ControlLeft" => KeyCode::ControlLeft,
        "ArrowUp" => KeyCode::ArrowUp,
        "ArrowDown" => KeyCode::ArrowDown,
        "ArrowLeft" => KeyCode::ArrowLeft,
        "ArrowRight" => KeyCode::ArrowRight,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_is_wasd() {
        let keys = MovementKeys::default();
        assert_eq!(keys.direction_of(KeyCode::KeyW), Some(Vec2::Y));
        assert_eq!(keys.direction_of(KeyCode::KeyS), Some(Vec2::NEG_Y));
        assert_eq!(keys.direction_of(KeyCode::KeyA), Some(Vec2::NEG_X));
        assert_eq!(keys.direction_of(KeyCode::KeyD), Some(Vec2::X));
        assert_eq!(keys.direction_of(KeyCode::Space), None);
    }

    #[test]
    fn test_overrides_rebind_directions() {
        let mut overrides = HashMap::new();
        overrides.insert(MOVE_FORWARD.to_string(), "ArrowUp".to_string());
        overrides.insert(JUMP.to_string(), "KeyJ".to_string());
        let keys = MovementKeys::from_overrides(&overrides);
        assert_eq!(keys.forward, KeyCode::ArrowUp);
        assert_eq!(keys.jump, KeyCode::KeyJ);
        assert_eq!(keys.back, KeyCode::KeyS);
    }

    #[test]
    fn test_unknown_key_name_is_ignored() {
        let mut overrides = HashMap::new();
        overrides.insert(MOVE_LEFT.to_string(), "NotAKey".to_string());
        let keys = MovementKeys::from_overrides(&overrides);
        assert_eq!(keys.left, KeyCode::KeyA);
        assert_eq!(key_from_name("NotAKey"), None);
    }
}
