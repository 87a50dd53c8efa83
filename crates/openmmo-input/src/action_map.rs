//! Discrete action mapping: the clicks, wheel steps and keys that produce
//! named [`Action`]s. Key bindings can be overridden from config by action
//! name (`"ability_1"`, `"escape"`, ...).
//!
//! Anything not in the map is ignored by the translator; an unmapped input is
//! never an error.

use std::collections::HashMap;

use winit::event::MouseButton;
use winit::keyboard::KeyCode;

use crate::keybindings::key_from_name;

/// Named discrete actions forwarded to the presentation layer.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum Action {
    /// Primary click (attack, interact).
    PrimaryAction,
    /// Secondary click (context action).
    SecondaryAction,
    /// Camera zoom in.
    ScrollUp,
    /// Camera zoom out.
    ScrollDown,
    /// Numbered ability slot, 1 through 5.
    Ability(u8),
    /// Close the topmost window or open the menu.
    Escape,
    /// Cycle targets.
    Tab,
}

impl Action {
    /// Parses a config binding name. Wheel and mouse actions are not
    /// rebindable to keys.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "escape" => Action::Escape,
            "tab" => Action::Tab,
            _ => {
                let slot: u8 = name.strip_prefix("ability_")?.parse().ok()?;
                if !(1..=5).contains(&slot) {
                    return None;
                }
                Action::Ability(slot)
            }
        })
    }
}

/// Lookup table from physical inputs to [`Action`]s.
#[derive(Debug, Clone)]
pub struct ActionMap {
    keys: HashMap<KeyCode, Action>,
    buttons: Vec<(MouseButton, Action)>,
}

impl Default for ActionMap {
    fn default() -> Self {
        let keys = HashMap::from([
            (KeyCode::Digit1, Action::Ability(1)),
            (KeyCode::Digit2, Action::Ability(2)),
            (KeyCode::Digit3, Action::Ability(3)),
            (KeyCode::Digit4, Action::Ability(4)),
            (KeyCode::Digit5, Action::Ability(5)),
            (KeyCode::Escape, Action::Escape),
            (KeyCode::Tab, Action::Tab),
        ]);
        let buttons = vec![
            (MouseButton::Left, Action::PrimaryAction),
            (MouseButton::Right, Action::SecondaryAction),
        ];
        Self { keys, buttons }
    }
}

impl ActionMap {
    /// Default map with key bindings replaced from `action name -> key name`
    /// overrides. Movement names and unknown names are skipped.
    pub fn from_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut map = Self::default();
        for (name, key_name) in overrides {
            let Some(action) = Action::from_name(name) else {
                continue;
            };
            let Some(code) = key_from_name(key_name) else {
                tracing::warn!("Ignoring binding {name} -> {key_name}: unknown key");
                continue;
            };
            map.keys.retain(|_, bound| *bound != action);
            map.keys.insert(code, action);
        }
        map
    }

    /// Action bound to a key, if any.
    pub fn for_key(&self, key: KeyCode) -> Option<Action> {
        self.keys.get(&key).copied()
    }

    /// Action bound to a mouse button, if any.
    pub fn for_button(&self, button: MouseButton) -> Option<Action> {
        self.buttons
            .iter()
            .find(|(bound, _)| *bound == button)
            .map(|(_, action)| *action)
    }

    /// Action for a wheel step; zero deltas map to nothing.
    pub fn for_scroll(&self, delta_y: f32) -> Option<Action> {
        if delta_y > 0.0 {
            Some(Action::ScrollUp)
        } else if delta_y < 0.0 {
            Some(Action::ScrollDown)
        } else {
            None
        }
    }
}
