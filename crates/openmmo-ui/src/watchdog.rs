//! One-shot deadline watchdogs.
//!
//! A watchdog is armed with the current time and fires once its timeout has
//! elapsed. Nothing here runs on its own; the controller checks deadlines
//! every tick.

use std::time::{Duration, Instant};

/// The three independent watchdogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchdogKind {
    /// Waiting for the transport to open.
    Connection,
    /// Waiting for an authentication response.
    Auth,
    /// Stuck on any loading screen.
    Loading,
}

impl WatchdogKind {
    const ALL: [WatchdogKind; 3] = [
        WatchdogKind::Connection,
        WatchdogKind::Auth,
        WatchdogKind::Loading,
    ];

    fn index(self) -> usize {
        match self {
            WatchdogKind::Connection => 0,
            WatchdogKind::Auth => 1,
            WatchdogKind::Loading => 2,
        }
    }

    /// Message shown on the login screen when this watchdog fires.
    pub fn message(self) -> &'static str {
        match self {
            WatchdogKind::Connection => "Connection timed out",
            WatchdogKind::Auth => "Authentication timed out",
            WatchdogKind::Loading => "Loading took too long",
        }
    }
}

/// Timeouts for each watchdog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogConfig {
    /// Connection-establishment timeout.
    pub connect: Duration,
    /// Authentication-response timeout.
    pub auth: Duration,
    /// In-loading fallback timeout.
    pub loading: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            auth: Duration::from_secs(10),
            loading: Duration::from_secs(30),
        }
    }
}

impl WatchdogConfig {
    fn timeout(&self, kind: WatchdogKind) -> Duration {
        match kind {
            WatchdogKind::Connection => self.connect,
            WatchdogKind::Auth => self.auth,
            WatchdogKind::Loading => self.loading,
        }
    }
}

/// Deadlines for the three watchdogs.
#[derive(Debug, Clone, Default)]
pub struct Watchdogs {
    config: WatchdogConfig,
    deadlines: [Option<Instant>; 3],
}

impl Watchdogs {
    /// All watchdogs start disarmed.
    pub fn new(config: WatchdogConfig) -> Self {
        Self {
            config,
            deadlines: [None; 3],
        }
    }

    /// Arms (or re-arms) `kind` relative to `now`.
    pub fn arm(&mut self, kind: WatchdogKind, now: Instant) {
        self.deadlines[kind.index()] = Some(now + self.config.timeout(kind));
    }

    /// Disarms `kind`.
    pub fn cancel(&mut self, kind: WatchdogKind) {
        self.deadlines[kind.index()] = None;
    }

    /// Disarms everything.
    pub fn cancel_all(&mut self) {
        self.deadlines = [None; 3];
    }

    /// Whether `kind` is armed.
    pub fn is_armed(&self, kind: WatchdogKind) -> bool {
        self.deadlines[kind.index()].is_some()
    }

    /// Whether any watchdog is armed.
    pub fn any_armed(&self) -> bool {
        self.deadlines.iter().any(Option::is_some)
    }

    /// The watchdog whose deadline passed first, if any has by `now`.
    pub fn expired(&self, now: Instant) -> Option<WatchdogKind> {
        WatchdogKind::ALL
            .into_iter()
            .filter_map(|kind| {
                self.deadlines[kind.index()]
                    .filter(|deadline| now >= *deadline)
                    .map(|deadline| (deadline, kind))
            })
            .min_by_key(|(deadline, _)| *deadline)
            .map(|(_, kind)| kind)
    }
}
