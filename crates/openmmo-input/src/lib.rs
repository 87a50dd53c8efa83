//! Input translation: raw key, button, wheel and motion events turned into a
//! movement vector, a jump flag, camera look deltas and named actions.

pub mod action_map;
pub mod keybindings;
pub mod mouse;
pub mod translator;

pub use action_map::{Action, ActionMap};
pub use keybindings::{MovementKeys, key_from_name};
pub use mouse::LookSettings;
pub use translator::{InputEvent, InputTranslator, RawInput};
