// racer_core/src/timing.rs

//! Elapsed-time bookkeeping driven by injected delta times.
//!
//! Nothing in the core reads a wall clock. Every timer (drift cooldown,
//! gear shift, recovery phases, flip delay, decision cadence) is a field
//! advanced by the `dt` the caller passes in, so a test can replay any
//! timeline by feeding synthetic steps.

/// Filters out stalled or corrupt clock readings.
/// Returns `None` for zero, negative or non-finite steps; callers treat that
/// as "no progress" and skip the tick's integration math.
pub fn sanitize_dt(dt: f32) -> Option<f32> {
    if dt.is_finite() && dt > 0.0 {
        Some(dt)
    } else {
        None
    }
}

/// Counts seconds since it was last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stopwatch {
    elapsed: f32,
}

impl Stopwatch {
    pub fn tick(&mut self, dt: f32) {
        if let Some(dt) = sanitize_dt(dt) {
            self.elapsed += dt;
        }
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }
}

/// Fires at a fixed rate regardless of how often it is advanced.
///
/// The AI decides at ~10 Hz while physics steps much faster; the clock
/// accumulates physics steps and hands back the whole accumulated step when
/// a decision is due.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionClock {
    interval: f32,
    accumulated: f32,
}

impl DecisionClock {
    pub fn new(interval: f32) -> Self {
        Self {
            interval: interval.max(0.0),
            accumulated: 0.0,
        }
    }

    /// Builds a clock from a rate in Hz. A zero rate decides on every step.
    pub fn from_hz(rate_hz: f32) -> Self {
        if rate_hz > 0.0 && rate_hz.is_finite() {
            Self::new(1.0 / rate_hz)
        } else {
            Self::new(0.0)
        }
    }

    /// Advances by `dt`; returns the accumulated step once the interval is reached.
    pub fn advance(&mut self, dt: f32) -> Option<f32> {
        let dt = sanitize_dt(dt)?;
        self.accumulated += dt;
        if self.accumulated + f32::EPSILON >= self.interval {
            let step = self.accumulated;
            self.accumulated = 0.0;
            Some(step)
        } else {
            None
        }
    }

    pub fn interval(&self) -> f32 {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn stalled_clock_is_ignored() {
        let mut watch = Stopwatch::default();
        watch.tick(-1.0);
        watch.tick(0.0);
        watch.tick(f32::NAN);
        assert_eq!(watch.elapsed(), 0.0);
        watch.tick(0.25);
        assert_relative_eq!(watch.elapsed(), 0.25);
    }

    #[test]
    fn decision_clock_accumulates_physics_steps() {
        let mut clock = DecisionClock::from_hz(10.0);
        let fired: Vec<f32> = (0..12).filter_map(|_| clock.advance(1.0 / 60.0)).collect();
        assert_eq!(fired.len(), 2);
        assert_relative_eq!(fired[0], 0.1, epsilon = 1e-4);
    }

    #[test]
    fn zero_rate_fires_every_step() {
        let mut clock = DecisionClock::from_hz(0.0);
        assert!(clock.advance(0.01).is_some());
        assert!(clock.advance(0.0).is_none());
    }
}
