//! Fixed-timestep tick loop.
//!
//! Wall-clock time is accumulated and spent in fixed 60 Hz steps, so the
//! session, predictor and watchdogs advance at a steady rate no matter how
//! irregularly the host wakes up.

use std::time::Instant;

use tracing::warn;

/// Fixed simulation timestep: 60 Hz.
pub const FIXED_DT: f64 = 1.0 / 60.0;

/// Longest frame that is caught up on; anything beyond is dropped.
pub const MAX_FRAME_TIME: f64 = 0.25;

/// Accumulator-driven tick scheduler.
#[derive(Debug, Clone)]
pub struct TickLoop {
    previous_time: Instant,
    accumulator: f64,
    total_time: f64,
    tick_count: u64,
}

impl TickLoop {
    /// Starts measuring from `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            previous_time: now,
            accumulator: 0.0,
            total_time: 0.0,
            tick_count: 0,
        }
    }

    /// Runs as many fixed steps as the time since the last call allows.
    /// `step(dt)` is called zero or more times. Returns the number of steps.
    pub fn advance(&mut self, now: Instant, mut step: impl FnMut(f64)) -> u32 {
        let mut frame_time = now
            .saturating_duration_since(self.previous_time)
            .as_secs_f64();
        self.previous_time = now;

        if frame_time > MAX_FRAME_TIME {
            warn!(
                "Frame time {:.1}ms exceeds maximum, clamping to {:.1}ms",
                frame_time * 1000.0,
                MAX_FRAME_TIME * 1000.0
            );
            frame_time = MAX_FRAME_TIME;
        }
        self.accumulator += frame_time;

        let mut steps = 0;
        while self.accumulator >= FIXED_DT {
            step(FIXED_DT);
            self.total_time += FIXED_DT;
            self.accumulator -= FIXED_DT;
            self.tick_count += 1;
            steps += 1;
        }
        steps
    }

    /// Total number of steps run.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Simulated seconds.
    pub fn total_time(&self) -> f64 {
        self.total_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_partial_frame_runs_no_steps() {
        let start = Instant::now();
        let mut ticks = TickLoop::new(start);
        assert_eq!(ticks.advance(start + secs(0.5 * FIXED_DT), |_| {}), 0);
        assert_eq!(ticks.advance(start + secs(1.01 * FIXED_DT), |_| {}), 1);
    }

    #[test]
    fn test_multiple_steps_use_fixed_dt() {
        let start = Instant::now();
        let mut ticks = TickLoop::new(start);
        let mut seen = Vec::new();
        ticks.advance(start + secs(3.01 * FIXED_DT), |dt| seen.push(dt));
        assert_eq!(seen, vec![FIXED_DT; 3]);
        assert!((ticks.total_time() - 3.0 * FIXED_DT).abs() < 1e-12);
    }

    #[test]
    fn test_long_frame_is_clamped() {
        let start = Instant::now();
        let mut ticks = TickLoop::new(start);
        let steps = ticks.advance(start + secs(5.0), |_| {});
        assert!(steps <= (MAX_FRAME_TIME / FIXED_DT).ceil() as u32);
        assert!(steps > 0);
    }

    #[test]
    fn test_clock_going_backwards_is_ignored() {
        let start = Instant::now() + secs(1.0);
        let mut ticks = TickLoop::new(start);
        assert_eq!(ticks.advance(start - secs(0.5), |_| {}), 0);
        assert_eq!(ticks.tick_count(), 0);
    }
}
