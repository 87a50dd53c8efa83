//! Server reconciliation: pulls the predicted position toward the server's
//! authoritative one when they drift apart.
//!
//! Small drift is ignored so corrections never jitter. Larger drift is
//! blended by a fixed factor per call, or snapped when the client is set to
//! trust the server outright. Drift is measured from the current predicted
//! position on every call, so repeated corrections converge.

use glam::Vec3;

use crate::prediction::MovementPredictor;

/// Drift below which no correction is applied, world units.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Fraction of the drift removed per blended correction.
pub const DEFAULT_BLEND_FACTOR: f32 = 0.2;

/// Correction policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    /// Minimum drift that triggers a correction.
    pub threshold: f32,
    /// Blend fraction in `(0, 1]`; values outside are clamped.
    pub blend_factor: f32,
    /// Snap instead of blending.
    pub trust_server: bool,
    /// When `false`, the local player's position is never corrected.
    pub reconcile_local_player: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            blend_factor: DEFAULT_BLEND_FACTOR,
            trust_server: false,
            reconcile_local_player: true,
        }
    }
}

/// What a [`MovementPredictor::reconcile`] call did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconcileOutcome {
    /// Local-player reconciliation is switched off.
    Skipped,
    /// Drift was under the threshold; nothing changed.
    WithinTolerance {
        /// Measured drift.
        drift: f32,
    },
    /// Moved part of the way toward the server position.
    Blended {
        /// Drift before the correction.
        drift: f32,
        /// Drift after the correction.
        remaining: f32,
    },
    /// Jumped to the server position.
    Snapped {
        /// Drift before the correction.
        drift: f32,
    },
}

impl ReconcileOutcome {
    /// Whether the predicted position moved.
    pub fn corrected(&self) -> bool {
        matches!(self, Self::Blended { .. } | Self::Snapped { .. })
    }
}

impl MovementPredictor {
    /// Reconciles the predicted position against the server's.
    pub fn reconcile(
        &mut self,
        authoritative_position: Vec3,
        authoritative_velocity: Vec3,
    ) -> ReconcileOutcome {
        self.authoritative_velocity = authoritative_velocity;
        let policy = &self.config.reconcile;
        if !policy.reconcile_local_player {
            return ReconcileOutcome::Skipped;
        }

        let drift = self.position.distance(authoritative_position);
        if drift < policy.threshold {
            return ReconcileOutcome::WithinTolerance { drift };
        }

        if policy.trust_server {
            self.position = authoritative_position;
            tracing::debug!(drift, "Snapped to server position");
            return ReconcileOutcome::Snapped { drift };
        }

        let blend = policy.blend_factor.clamp(f32::EPSILON, 1.0);
        self.position = self.position.lerp(authoritative_position, blend);
        let remaining = self.position.distance(authoritative_position);
        tracing::debug!(drift, remaining, "Blended toward server position");
        ReconcileOutcome::Blended { drift, remaining }
    }
}
