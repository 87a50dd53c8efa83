//! Raw input to semantic input.
//!
//! [`InputTranslator`] is fed raw press/release/motion events by the host and
//! keeps exactly three pieces of state: the accumulated movement vector, the
//! jump flag and the mouse capture flag. Everything it learns is pushed as an
//! [`InputEvent`] and drained once per tick.

use std::collections::HashSet;

use glam::Vec2;
use openmmo_events::EventQueue;
use winit::event::{ElementState, KeyEvent, MouseButton};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::action_map::{Action, ActionMap};
use crate::keybindings::MovementKeys;
use crate::mouse::LookSettings;

/// A raw, platform-independent input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawInput {
    /// A keyboard key changed state.
    Key {
        /// Physical key code.
        key: KeyCode,
        /// Pressed or released.
        state: ElementState,
        /// Auto-repeat events are ignored.
        repeat: bool,
    },
    /// A mouse button changed state.
    Button {
        /// Which button.
        button: MouseButton,
        /// Pressed or released.
        state: ElementState,
    },
    /// Wheel movement in lines (positive = up).
    Scroll {
        /// Vertical wheel delta.
        delta_y: f32,
    },
    /// Raw relative mouse motion.
    Motion {
        /// Horizontal delta.
        dx: f64,
        /// Vertical delta.
        dy: f64,
    },
    /// The host grabbed or released the cursor.
    Capture(bool),
}

/// Semantic input produced by the translator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// The movement vector changed; components lie in `[-1, 1]`.
    MovementChanged(Vec2),
    /// The jump key was pressed (`true`) or released (`false`).
    JumpChanged(bool),
    /// Scaled look delta from captured mouse motion.
    Look(Vec2),
    /// A discrete action fired.
    Action(Action),
}

/// Stateless-per-tick mapping from raw input to movement, jump, look and actions.
pub struct InputTranslator {
    keys: MovementKeys,
    actions: ActionMap,
    look: LookSettings,
    held: HashSet<KeyCode>,
    movement: Vec2,
    jump: bool,
    captured: bool,
    events: EventQueue<InputEvent>,
}

impl Default for InputTranslator {
    fn default() -> Self {
        Self::new(MovementKeys::default(), ActionMap::default(), LookSettings::default())
    }
}

impl InputTranslator {
    /// Creates a translator with the given bindings and look settings.
    pub fn new(keys: MovementKeys, actions: ActionMap, look: LookSettings) -> Self {
        Self {
            keys,
            actions,
            look,
            held: HashSet::new(),
            movement: Vec2::ZERO,
            jump: false,
            captured: false,
            events: EventQueue::default(),
        }
    }

    /// Processes a winit [`KeyEvent`]. Unidentified keys are ignored.
    pub fn process_key_event(&mut self, event: &KeyEvent) {
        if let PhysicalKey::Code(key) = event.physical_key {
            self.process(RawInput::Key {
                key,
                state: event.state,
                repeat: event.repeat,
            });
        }
    }

    /// Processes one raw event.
    pub fn process(&mut self, input: RawInput) {
        match input {
            RawInput::Key { repeat: true, .. } => {}
            RawInput::Key { key, state, .. } => self.on_key(key, state),
            RawInput::Button { button, state } => {
                if state == ElementState::Pressed
                    && let Some(action) = self.actions.for_button(button)
                {
                    self.events.push(InputEvent::Action(action));
                }
            }
            RawInput::Scroll { delta_y } => {
                if let Some(action) = self.actions.for_scroll(delta_y) {
                    self.events.push(InputEvent::Action(action));
                }
            }
            RawInput::Motion { dx, dy } => {
                if self.captured {
                    self.events.push(InputEvent::Look(self.look.scale(dx, dy)));
                }
            }
            RawInput::Capture(captured) => self.captured = captured,
        }
    }

    fn on_key(&mut self, key: KeyCode, state: ElementState) {
        let pressed = state == ElementState::Pressed;

        // Duplicate presses and stray releases must not skew the accumulator.
        let changed = if pressed {
            self.held.insert(key)
        } else {
            self.held.remove(&key)
        };
        if !changed {
            return;
        }

        if let Some(direction) = self.keys.direction_of(key) {
            let delta = if pressed { direction } else { -direction };
            let next = (self.movement + delta).clamp(Vec2::NEG_ONE, Vec2::ONE);
            if next != self.movement {
                self.movement = next;
                self.events.push(InputEvent::MovementChanged(next));
            }
        } else if key == self.keys.jump {
            self.jump = pressed;
            self.events.push(InputEvent::JumpChanged(pressed));
        } else if pressed && let Some(action) = self.actions.for_key(key) {
            self.events.push(InputEvent::Action(action));
        }
    }

    /// Current movement vector (x = strafe right, y = forward).
    pub fn movement(&self) -> Vec2 {
        self.movement
    }

    /// Whether jump is held.
    pub fn jump(&self) -> bool {
        self.jump
    }

    /// Whether mouse motion is routed to look events.
    pub fn is_captured(&self) -> bool {
        self.captured
    }

    /// Drains events produced since the last call.
    pub fn drain_events(&mut self) -> impl Iterator<Item = InputEvent> + '_ {
        self.events.drain()
    }

    /// Releases every held key, e.g. when the window loses focus.
    pub fn reset(&mut self) {
        self.held.clear();
        if self.movement != Vec2::ZERO {
            self.movement = Vec2::ZERO;
            self.events.push(InputEvent::MovementChanged(Vec2::ZERO));
        }
        if self.jump {
            self.jump = false;
            self.events.push(InputEvent::JumpChanged(false));
        }
    }
}
