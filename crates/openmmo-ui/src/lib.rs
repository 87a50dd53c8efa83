//! Screen flow for the pre-game and in-game client UI.
//!
//! [`UiFlowController`] is a finite state machine over the client screens.
//! It owns no networking or rendering; the host relays session events and
//! user actions into its `go_to_*` entry points and renders whichever
//! [`Screen`] is current.

pub mod controller;
pub mod state;
pub mod watchdog;

pub use controller::{TransitionError, UiEvent, UiFlowController};
pub use state::{LoadingPurpose, Screen, is_legal_transition};
pub use watchdog::{WatchdogConfig, WatchdogKind, Watchdogs};
