// racer_core/src/autopilot/steering.rs

//! Steering and throttle laws for the autopilot. Everything here is a pure
//! function of the current geometry except the low-pass [`SteeringFilter`].

use nalgebra::Vector3;
use serde::Deserialize;

use crate::error::{positive, within, TuningError};
use crate::types::{clamp_finite, flatten};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SteeringTuning {
    /// Heading error (radians) that maps to full lock.
    pub full_lock_angle: f32,
    /// Normalized steer below this magnitude is ignored.
    pub dead_zone: f32,
    /// Exponential smoothing factor applied each decision, in (0, 1].
    pub smoothing: f32,
}

impl Default for SteeringTuning {
    fn default() -> Self {
        Self {
            full_lock_angle: std::f32::consts::PI * 0.3,
            dead_zone: 0.02,
            smoothing: 0.3,
        }
    }
}

impl SteeringTuning {
    pub fn validate(&self) -> Result<(), TuningError> {
        positive("steering.full_lock_angle", self.full_lock_angle)?;
        within("steering.dead_zone", self.dead_zone, 0.0, 1.0)?;
        within("steering.smoothing", self.smoothing, f32::EPSILON, 1.0)
    }
}

/// Signed heading error from `forward` to `to_target` on the ground plane.
/// Positive when the target lies to the left.
pub fn heading_error(forward: &Vector3<f32>, to_target: &Vector3<f32>) -> f32 {
    let forward = flatten(forward);
    let direction = flatten(to_target);
    let (Some(forward), Some(direction)) =
        (forward.try_normalize(1e-6), direction.try_normalize(1e-6))
    else {
        return 0.0;
    };
    forward.cross(&direction).y.atan2(forward.dot(&direction))
}

/// Normalized steer in [-1, 1] toward `to_target`, with the dead zone applied.
pub fn raw_steer(forward: &Vector3<f32>, to_target: &Vector3<f32>, tuning: &SteeringTuning) -> f32 {
    let steer = clamp_finite(heading_error(forward, to_target) / tuning.full_lock_angle, -1.0, 1.0);
    if steer.abs() < tuning.dead_zone {
        0.0
    } else {
        steer
    }
}

/// Exponential smoothing of the steer angle across decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SteeringFilter {
    value: f32,
}

impl SteeringFilter {
    pub fn update(&mut self, target: f32, alpha: f32) -> f32 {
        self.value += alpha * (target - self.value);
        self.value = clamp_finite(self.value, f32::MIN, f32::MAX);
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

// =========================================================================
// == Speed Control ==
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct SpeedTuning {
    /// Cruise speed in m/s.
    pub max_speed: f32,
    /// Below this distance to the target the cruise speed starts dropping.
    pub slow_radius: f32,
    /// Fraction of `max_speed` kept at `close_radius`.
    pub slow_floor: f32,
    /// Below this distance the speed drops further, toward `close_floor`.
    pub close_radius: f32,
    pub close_floor: f32,
    /// Extra factor while avoiding another vehicle.
    pub avoidance_factor: f32,
    /// Throttle (0..1) per m/s of speed gap.
    pub gain: f32,
}

impl Default for SpeedTuning {
    fn default() -> Self {
        Self {
            max_speed: 20.0,
            slow_radius: 20.0,
            slow_floor: 0.4,
            close_radius: 8.0,
            close_floor: 0.25,
            avoidance_factor: 0.6,
            gain: 0.25,
        }
    }
}

impl SpeedTuning {
    pub fn validate(&self) -> Result<(), TuningError> {
        positive("speed.max_speed", self.max_speed)?;
        positive("speed.close_radius", self.close_radius)?;
        within("speed.slow_radius", self.slow_radius, self.close_radius, f32::MAX)?;
        within("speed.slow_floor", self.slow_floor, 0.0, 1.0)?;
        within("speed.close_floor", self.close_floor, 0.0, self.slow_floor)?;
        within("speed.avoidance_factor", self.avoidance_factor, 0.0, 1.0)?;
        positive("speed.gain", self.gain)
    }
}

/// Cruise speed for a given distance to the target, piecewise linear and continuous.
pub fn target_speed(distance: f32, avoiding: bool, tuning: &SpeedTuning) -> f32 {
    let distance = distance.max(0.0);
    let factor = if distance >= tuning.slow_radius {
        1.0
    } else if distance >= tuning.close_radius {
        let t = (distance - tuning.close_radius) / (tuning.slow_radius - tuning.close_radius);
        tuning.slow_floor + (1.0 - tuning.slow_floor) * t
    } else {
        let t = distance / tuning.close_radius;
        tuning.close_floor + (tuning.slow_floor - tuning.close_floor) * t
    };
    let factor = if avoiding {
        factor * tuning.avoidance_factor
    } else {
        factor
    };
    tuning.max_speed * factor
}

/// Throttle and brake fractions, both in [0, 1], for closing a speed gap.
/// A positive gap accelerates; a negative gap releases the throttle and
/// brakes in proportion.
pub fn throttle_command(target_speed: f32, current_speed: f32, gain: f32) -> (f32, f32) {
    let gap = finite_gap(target_speed - current_speed);
    if gap >= 0.0 {
        ((gap * gain).clamp(0.0, 1.0), 0.0)
    } else {
        (0.0, (-gap * gain).clamp(0.0, 1.0))
    }
}

fn finite_gap(gap: f32) -> f32 {
    if gap.is_finite() {
        gap
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    #[test]
    fn target_on_the_left_steers_positive() {
        let forward = -Vector3::z();
        let tuning = SteeringTuning::default();
        assert!(raw_steer(&forward, &Vector3::new(-5.0, 0.0, -5.0), &tuning) > 0.0);
        assert!(raw_steer(&forward, &Vector3::new(5.0, 0.0, -5.0), &tuning) < 0.0);
        // Directly behind saturates.
        assert_relative_eq!(
            raw_steer(&forward, &Vector3::new(-0.01, 0.0, 5.0), &tuning),
            1.0
        );
    }

    #[test]
    fn dead_zone_swallows_jitter() {
        let forward = -Vector3::z();
        let tuning = SteeringTuning::default();
        let tiny = Vector3::new(-0.02, 0.0, -10.0);
        assert_eq!(raw_steer(&forward, &tiny, &tuning), 0.0);
        assert_eq!(raw_steer(&forward, &Vector3::zeros(), &tuning), 0.0);
    }

    #[test]
    fn heading_error_is_a_signed_angle() {
        let error = heading_error(&-Vector3::z(), &-Vector3::x());
        assert_relative_eq!(error, PI / 2.0, epsilon = 1e-6);
    }

    #[test]
    fn filter_converges_geometrically() {
        let mut filter = SteeringFilter::default();
        assert_relative_eq!(filter.update(1.0, 0.3), 0.3);
        assert_relative_eq!(filter.update(1.0, 0.3), 0.51);
        filter.update(f32::NAN, 0.3);
        assert!(filter.value().is_finite());
    }

    #[test]
    fn speed_drops_toward_the_target() {
        let tuning = SpeedTuning::default();
        assert_relative_eq!(target_speed(50.0, false, &tuning), 20.0);
        assert_relative_eq!(target_speed(8.0, false, &tuning), 8.0);
        assert_relative_eq!(target_speed(0.0, false, &tuning), 5.0);
        assert_relative_eq!(target_speed(50.0, true, &tuning), 12.0);
        assert!(target_speed(14.0, false, &tuning) < 20.0);
    }

    #[test]
    fn throttle_is_proportional_and_clamped() {
        assert_eq!(throttle_command(20.0, 0.0, 0.25), (1.0, 0.0));
        assert_eq!(throttle_command(10.0, 8.0, 0.25), (0.5, 0.0));
        assert_eq!(throttle_command(5.0, 7.0, 0.25), (0.0, 0.5));
        assert_eq!(throttle_command(f32::NAN, 1.0, 0.25), (0.0, 0.0));
    }
}
