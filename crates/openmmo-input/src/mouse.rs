//! Relative mouse-look scaling.

use glam::Vec2;

/// Sensitivity and axis inversion applied to captured mouse motion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookSettings {
    /// Multiplier applied to raw motion deltas.
    pub sensitivity: f32,
    /// Flip the vertical axis.
    pub invert_y: bool,
}

impl Default for LookSettings {
    fn default() -> Self {
        Self {
            sensitivity: 1.0,
            invert_y: false,
        }
    }
}

impl LookSettings {
    /// Scales a raw device delta into a look delta.
    pub fn scale(&self, dx: f64, dy: f64) -> Vec2 {
        let y_sign = if self.invert_y { -1.0 } else { 1.0 };
        Vec2::new(
            dx as f32 * self.sensitivity,
            dy as f32 * self.sensitivity * y_sign,
        )
    }
}
