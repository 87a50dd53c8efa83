//! Client-side movement prediction.
//!
//! The local player moves immediately from input without waiting for the
//! server. Each tick [`MovementPredictor::update`] advances the predicted
//! pose and decides whether the server needs a new [`MovementIntent`]:
//! intents go out on state changes only, never every tick. Sent intents are
//! kept in a bounded [`IntentHistory`].

use std::collections::VecDeque;
use std::f32::consts::{PI, TAU};
use std::time::{Duration, Instant};

use glam::{Vec2, Vec3};
use openmmo_net::MovementIntent;

use crate::reconciliation::ReconcileConfig;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default number of remembered intents (~1 s of changes at 60 Hz).
pub const DEFAULT_HISTORY_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// PredictorConfig
// ---------------------------------------------------------------------------

/// Tuning for [`MovementPredictor`].
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorConfig {
    /// Ground speed at full input, units per second.
    pub move_speed: f32,
    /// Input magnitude at or below which the player counts as idle.
    pub input_epsilon: f32,
    /// Movement input change that warrants a new intent while moving.
    pub position_epsilon: f32,
    /// Facing change that warrants a new intent while moving, radians.
    pub rotation_epsilon: f32,
    /// Facing change that warrants a stop intent while idle, radians.
    pub idle_rotation_epsilon: f32,
    /// How far ahead of the player the intent target is placed, seconds.
    pub intent_lookahead_secs: f32,
    /// Maximum number of remembered intents.
    pub history_capacity: usize,
    /// Intents older than this are forgotten.
    pub history_window: Duration,
    /// Server correction policy.
    pub reconcile: ReconcileConfig,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            move_speed: 5.0,
            input_epsilon: 0.01,
            position_epsilon: 0.001,
            rotation_epsilon: 0.05,
            idle_rotation_epsilon: 0.1,
            intent_lookahead_secs: 2.0,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            history_window: Duration::from_secs(2),
            reconcile: ReconcileConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// IntentHistory
// ---------------------------------------------------------------------------

/// An intent together with the time it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SentIntent {
    /// When the intent was produced.
    pub at: Instant,
    /// The intent itself.
    pub intent: MovementIntent,
}

/// Bounded, time-windowed record of produced intents, oldest first.
#[derive(Debug, Clone)]
pub struct IntentHistory {
    entries: VecDeque<SentIntent>,
    capacity: usize,
    window: Duration,
}

impl IntentHistory {
    /// Creates an empty history.
    pub fn new(capacity: usize, window: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            window,
        }
    }

    /// Appends an entry, evicting the oldest if at capacity.
    pub fn push(&mut self, entry: SentIntent) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Forgets entries older than the window as of `now`.
    pub fn prune(&mut self, now: Instant) {
        while self
            .entries
            .front()
            .is_some_and(|e| now.saturating_duration_since(e.at) > self.window)
        {
            self.entries.pop_front();
        }
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&SentIntent> {
        self.entries.back()
    }

    /// Iterates oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &SentIntent> {
        self.entries.iter()
    }

    /// Number of remembered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ---------------------------------------------------------------------------
// MovementPredictor
// ---------------------------------------------------------------------------

/// Locally predicted pose of the player plus the bookkeeping needed to
/// decide when to tell the server.
#[derive(Debug, Clone)]
pub struct MovementPredictor {
    pub(crate) config: PredictorConfig,
    pub(crate) position: Vec3,
    rotation_y: f32,
    velocity: Vec3,
    is_moving: bool,
    input: Vec2,
    sent_input: Vec2,
    sent_rotation: f32,
    sent_position: Vec3,
    pub(crate) authoritative_velocity: Vec3,
    history: IntentHistory,
}

impl Default for MovementPredictor {
    fn default() -> Self {
        Self::new(PredictorConfig::default())
    }
}

impl MovementPredictor {
    /// Creates an idle predictor at the origin.
    pub fn new(config: PredictorConfig) -> Self {
        let history = IntentHistory::new(config.history_capacity, config.history_window);
        Self {
            config,
            position: Vec3::ZERO,
            rotation_y: 0.0,
            velocity: Vec3::ZERO,
            is_moving: false,
            input: Vec2::ZERO,
            sent_input: Vec2::ZERO,
            sent_rotation: 0.0,
            sent_position: Vec3::ZERO,
            authoritative_velocity: Vec3::ZERO,
            history,
        }
    }

    /// Places the player at a server-provided pose and forgets all motion.
    pub fn reset(&mut self, position: Vec3, rotation_y: f32) {
        self.position = position;
        self.rotation_y = rotation_y;
        self.velocity = Vec3::ZERO;
        self.is_moving = false;
        self.input = Vec2::ZERO;
        self.sent_input = Vec2::ZERO;
        self.sent_rotation = rotation_y;
        self.sent_position = position;
        self.authoritative_velocity = Vec3::ZERO;
        self.history.clear();
    }

    /// Advances the prediction by `dt` seconds.
    ///
    /// `input` is the semantic movement vector (x = strafe right,
    /// y = forward) and `facing_yaw` the camera yaw in radians. Returns the
    /// intent to send, if this tick warrants one.
    pub fn update(
        &mut self,
        input: Vec2,
        facing_yaw: f32,
        dt: f32,
        now: Instant,
    ) -> Option<MovementIntent> {
        self.history.prune(now);
        self.rotation_y = facing_yaw;
        let input = input.clamp_length_max(1.0);
        let magnitude = input.length();
        self.input = input;

        if magnitude > self.config.input_epsilon {
            let (sin, cos) = facing_yaw.sin_cos();
            let forward = Vec3::new(sin, 0.0, cos);
            let right = Vec3::new(cos, 0.0, -sin);
            self.velocity = (forward * input.y + right * input.x) * self.config.move_speed;
            self.position += self.velocity * dt;

            let started = !self.is_moving;
            self.is_moving = true;
            let refresh_distance =
                self.config.move_speed * self.config.intent_lookahead_secs * 0.5;
            // Input and facing are compared separately, never the world velocity.
            let should_send = started
                || input.distance(self.sent_input) > self.config.position_epsilon
                || angle_between(self.rotation_y, self.sent_rotation).abs()
                    > self.config.rotation_epsilon
                || self.position.distance(self.sent_position) > refresh_distance;
            if !should_send {
                return None;
            }
            let target = self.position + self.velocity * self.config.intent_lookahead_secs;
            return Some(self.record(target, magnitude, false, now));
        }

        self.velocity = Vec3::ZERO;
        self.input = Vec2::ZERO;
        if self.is_moving {
            self.is_moving = false;
            return Some(self.record(self.position, 0.0, true, now));
        }
        if angle_between(self.rotation_y, self.sent_rotation).abs()
            > self.config.idle_rotation_epsilon
        {
            return Some(self.record(self.position, 0.0, true, now));
        }
        None
    }

    fn record(
        &mut self,
        target: Vec3,
        speed_modifier: f32,
        stop: bool,
        now: Instant,
    ) -> MovementIntent {
        let intent = MovementIntent {
            target_position: target.into(),
            speed_modifier,
            stop_movement: stop,
            rotation_y: self.rotation_y,
        };
        self.sent_input = self.input;
        self.sent_rotation = self.rotation_y;
        self.sent_position = self.position;
        self.history.push(SentIntent {
            at: now,
            intent: intent.clone(),
        });
        tracing::trace!(stop, ?target, "Movement intent");
        intent
    }

    /// Predicted position.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Predicted facing, radians.
    pub fn rotation_y(&self) -> f32 {
        self.rotation_y
    }

    /// Predicted velocity, units per second.
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Whether input is currently moving the player.
    pub fn is_moving(&self) -> bool {
        self.is_moving
    }

    /// Velocity from the most recent server correction.
    pub fn authoritative_velocity(&self) -> Vec3 {
        self.authoritative_velocity
    }

    /// Recently produced intents.
    pub fn history(&self) -> &IntentHistory {
        &self.history
    }

    /// Active tuning.
    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }
}

/// Signed smallest angle from `b` to `a`, in `(-PI, PI]`.
fn angle_between(a: f32, b: f32) -> f32 {
    let d = (a - b).rem_euclid(TAU);
    if d > PI { d - TAU } else { d }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
