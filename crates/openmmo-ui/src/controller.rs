//! The screen-flow state machine.
//!
//! Transitions go through the `go_to_*` methods, which refuse anything
//! [`is_legal_transition`] does not allow. Asking for the current screen is a
//! no-op (`Ok(false)`) that still refreshes the screen's data. Returning to
//! Login cancels every watchdog.

use std::time::Instant;

use openmmo_events::EventQueue;
use openmmo_net::CharacterInfo;

use crate::state::{LoadingPurpose, Screen, is_legal_transition};
use crate::watchdog::{WatchdogConfig, WatchdogKind, Watchdogs};

/// Something the presentation layer should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Hide `from`, show `to`.
    StateChanged {
        /// Previous screen.
        from: Screen,
        /// New screen.
        to: Screen,
    },
    /// A watchdog fired and the flow was reset.
    TimedOut(WatchdogKind),
    /// The highlighted character changed.
    CharacterHighlighted(Option<u64>),
}

/// Refused transition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The flow does not allow moving between these screens.
    #[error("illegal screen transition {from:?} -> {to:?}")]
    Illegal {
        /// Current screen.
        from: Screen,
        /// Requested screen.
        to: Screen,
    },
}

/// Screen state plus the data each screen shows.
#[derive(Debug)]
pub struct UiFlowController {
    screen: Screen,
    username: String,
    error: Option<String>,
    characters: Vec<CharacterInfo>,
    highlighted: Option<u64>,
    watchdogs: Watchdogs,
    events: EventQueue<UiEvent>,
}

impl Default for UiFlowController {
    fn default() -> Self {
        Self::new(WatchdogConfig::default())
    }
}

impl UiFlowController {
    /// Starts on the Login screen with all watchdogs disarmed.
    pub fn new(timeouts: WatchdogConfig) -> Self {
        Self {
            screen: Screen::Login,
            username: String::new(),
            error: None,
            characters: Vec::new(),
            highlighted: None,
            watchdogs: Watchdogs::new(timeouts),
            events: EventQueue::default(),
        }
    }

    fn transition(&mut self, to: Screen) -> Result<bool, TransitionError> {
        let from = self.screen;
        if from == to {
            return Ok(false);
        }
        if !is_legal_transition(from, to) {
            tracing::warn!("Refusing screen transition {from:?} -> {to:?}");
            return Err(TransitionError::Illegal { from, to });
        }
        self.enter(to);
        Ok(true)
    }

    fn enter(&mut self, to: Screen) {
        let from = self.screen;
        if from.is_loading() && !to.is_loading() {
            self.watchdogs.cancel(WatchdogKind::Loading);
        }
        if to == Screen::Login {
            self.watchdogs.cancel_all();
        }
        tracing::info!("Screen {from:?} -> {to:?}");
        self.screen = to;
        self.events.push(UiEvent::StateChanged { from, to });
    }

    /// Shows Login, optionally with an error.
    pub fn go_to_login(&mut self, error: Option<String>) -> Result<bool, TransitionError> {
        let changed = self.transition(Screen::Login)?;
        self.error = error;
        Ok(changed)
    }

    /// Shows Register.
    pub fn go_to_register(&mut self) -> Result<bool, TransitionError> {
        let changed = self.transition(Screen::Register)?;
        self.error = None;
        Ok(changed)
    }

    /// Shows the loading screen for `purpose`.
    pub fn go_to_loading(&mut self, purpose: LoadingPurpose) -> Result<bool, TransitionError> {
        let changed = self.transition(Screen::Loading(purpose))?;
        self.error = None;
        Ok(changed)
    }

    /// Shows the character list, replacing it if `characters` is given.
    pub fn go_to_character_select(
        &mut self,
        characters: Option<Vec<CharacterInfo>>,
        error: Option<String>,
    ) -> Result<bool, TransitionError> {
        let changed = self.transition(Screen::CharacterSelect)?;
        if let Some(characters) = characters {
            self.characters = characters;
            if self
                .highlighted
                .is_some_and(|id| !self.characters.iter().any(|c| c.id == id))
            {
                self.set_highlight(None);
            }
        }
        self.error = error;
        Ok(changed)
    }

    /// Shows the character creation form.
    pub fn go_to_character_create(
        &mut self,
        error: Option<String>,
    ) -> Result<bool, TransitionError> {
        let changed = self.transition(Screen::CharacterCreate)?;
        self.error = error;
        Ok(changed)
    }

    /// Enters the world.
    pub fn go_to_connected(&mut self) -> Result<bool, TransitionError> {
        let changed = self.transition(Screen::Connected)?;
        self.error = None;
        Ok(changed)
    }

    /// Returns to Login from any screen, cancelling every watchdog. Used on
    /// disconnects and fatal errors.
    pub fn reset_to_login(&mut self, message: Option<String>) {
        self.watchdogs.cancel_all();
        if self.screen != Screen::Login {
            self.enter(Screen::Login);
        }
        self.characters.clear();
        self.set_highlight(None);
        self.error = message;
    }

    /// Highlights a character from the current list. Returns `false` if the
    /// id is not listed.
    pub fn highlight_character(&mut self, id: u64) -> bool {
        if !self.characters.iter().any(|c| c.id == id) {
            return false;
        }
        self.set_highlight(Some(id));
        true
    }

    fn set_highlight(&mut self, id: Option<u64>) {
        if self.highlighted != id {
            self.highlighted = id;
            self.events.push(UiEvent::CharacterHighlighted(id));
        }
    }

    /// Records the username last typed on Login or Register.
    pub fn set_username(&mut self, username: impl Into<String>) {
        self.username = username.into();
    }

    /// Arms a watchdog.
    pub fn arm_watchdog(&mut self, kind: WatchdogKind, now: Instant) {
        tracing::debug!("Arming {kind:?} watchdog");
        self.watchdogs.arm(kind, now);
    }

    /// Disarms a watchdog.
    pub fn cancel_watchdog(&mut self, kind: WatchdogKind) {
        self.watchdogs.cancel(kind);
    }

    /// Fires the first expired watchdog, if any: every watchdog is cancelled
    /// and the flow returns to Login with the watchdog's message.
    pub fn check_timeouts(&mut self, now: Instant) -> Option<WatchdogKind> {
        let kind = self.watchdogs.expired(now)?;
        tracing::warn!("{kind:?} watchdog fired");
        self.reset_to_login(Some(kind.message().to_string()));
        self.events.push(UiEvent::TimedOut(kind));
        Some(kind)
    }

    /// Current screen.
    pub fn screen(&self) -> Screen {
        self.screen
    }

    /// Last entered username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Message for the current screen.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Characters from the last list response.
    pub fn characters(&self) -> &[CharacterInfo] {
        &self.characters
    }

    /// Highlighted character id.
    pub fn highlighted_character(&self) -> Option<u64> {
        self.highlighted
    }

    /// Watchdog state.
    pub fn watchdogs(&self) -> &Watchdogs {
        &self.watchdogs
    }

    /// Drains events raised since the last call.
    pub fn drain_events(&mut self) -> impl Iterator<Item = UiEvent> + '_ {
        self.events.drain()
    }
}
