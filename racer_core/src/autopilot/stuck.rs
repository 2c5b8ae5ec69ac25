// racer_core/src/autopilot/stuck.rs

use std::collections::VecDeque;

use nalgebra::Vector3;
use serde::Deserialize;

use crate::error::{positive, TuningError};
use crate::types::{flatten, BodyKind, ChassisState, TrackedBody, VehicleHandle};

/// Fewer samples than this cannot yield a meaningful average displacement.
const MIN_HISTORY: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct StuckTuning {
    /// Positions kept in the ring buffer, one per decision.
    pub history: usize,
    /// Run the stuck check every this many decisions.
    pub check_every: u32,
    /// Average distance per sample (m) below which the car is not progressing.
    pub min_displacement: f32,
    /// Speed (m/s) below which the car counts as stationary.
    pub min_speed: f32,
    /// Throttle fraction above which the car counts as trying to move.
    pub min_throttle: f32,
    /// Failed checks in a row needed to declare the car stuck.
    pub consecutive_checks: u32,
    /// Closing speed (m/s) that counts as an impact.
    pub impact_speed: f32,
    /// Bodies closer than this are checked for impacts.
    pub collision_radius: f32,
    /// Seconds after a recovery during which impacts are ignored.
    pub collision_cooldown: f32,
    /// Within this distance of a chased vehicle the stuck check is skipped,
    /// so ramming the target is not mistaken for a stall. Off when unset.
    pub attack_distance: Option<f32>,
}

impl Default for StuckTuning {
    fn default() -> Self {
        Self {
            history: 10,
            check_every: 2,
            min_displacement: 0.1,
            min_speed: 1.0,
            min_throttle: 0.05,
            consecutive_checks: 3,
            impact_speed: 8.0,
            collision_radius: 4.0,
            collision_cooldown: 1.0,
            attack_distance: None,
        }
    }
}

impl StuckTuning {
    pub fn validate(&self) -> Result<(), TuningError> {
        if self.history < MIN_HISTORY {
            return Err(TuningError::HistoryTooShort {
                min: MIN_HISTORY,
                found: self.history,
            });
        }
        positive("stuck.check_every", self.check_every as f32)?;
        positive("stuck.min_displacement", self.min_displacement)?;
        positive("stuck.min_speed", self.min_speed)?;
        positive("stuck.consecutive_checks", self.consecutive_checks as f32)?;
        positive("stuck.impact_speed", self.impact_speed)?;
        positive("stuck.collision_radius", self.collision_radius)?;
        if let Some(distance) = self.attack_distance {
            positive("stuck.attack_distance", distance)?;
        }
        Ok(())
    }
}

/// Position history plus the counters behind the stuck verdict.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StuckRecord {
    positions: VecDeque<Vector3<f32>>,
    decisions: u32,
    consecutive: u32,
    pending_impact: Option<f32>,
}

impl StuckRecord {
    pub fn record(&mut self, position: Vector3<f32>, capacity: usize) {
        while self.positions.len() >= capacity.max(1) {
            self.positions.pop_front();
        }
        self.positions.push_back(position);
    }

    /// Mean ground-plane distance between consecutive samples.
    pub fn average_displacement(&self) -> Option<f32> {
        if self.positions.len() < 2 {
            return None;
        }
        let total: f32 = self
            .positions
            .iter()
            .zip(self.positions.iter().skip(1))
            .map(|(a, b)| flatten(&(b - a)).norm())
            .sum();
        Some(total / (self.positions.len() - 1) as f32)
    }

    /// Counts one decision and, every `check_every` decisions, re-evaluates
    /// the stuck conditions. Returns `true` once enough checks failed in a row.
    pub fn check(&mut self, speed: f32, throttle: f32, tuning: &StuckTuning) -> bool {
        self.decisions = self.decisions.wrapping_add(1);
        if self.decisions % tuning.check_every.max(1) != 0 {
            return false;
        }
        // Only judge a full window; a car pulling away from rest looks stuck otherwise.
        let full = self.positions.len() >= tuning.history;
        let stalled = full
            && self
                .average_displacement()
                .is_some_and(|d| d < tuning.min_displacement)
            && speed < tuning.min_speed
            && throttle > tuning.min_throttle;
        if stalled {
            self.consecutive += 1;
        } else {
            self.consecutive = 0;
        }
        self.consecutive >= tuning.consecutive_checks
    }

    /// Remembers the strongest impact reported since the last decision.
    pub fn note_impact(&mut self, relative_speed: f32) {
        if !relative_speed.is_finite() {
            return;
        }
        self.pending_impact = Some(self.pending_impact.map_or(relative_speed, |s| s.max(relative_speed)));
    }

    pub fn take_impact(&mut self) -> Option<f32> {
        self.pending_impact.take()
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn samples(&self) -> usize {
        self.positions.len()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Looks for a body near `chassis` that we are closing on faster than the
/// impact threshold. Returns the closing speed of the worst one.
pub fn detect_impact(
    own: VehicleHandle,
    chassis: &ChassisState,
    others: &[TrackedBody],
    tuning: &StuckTuning,
) -> Option<f32> {
    others
        .iter()
        .filter(|body| body.handle != own)
        .filter_map(|body| {
            let offset = body.position - chassis.position;
            let distance = flatten(&offset).norm();
            if distance >= tuning.collision_radius {
                return None;
            }
            let velocity = match body.kind {
                BodyKind::Static => Vector3::zeros(),
                BodyKind::Player | BodyKind::Autopilot => body.velocity,
            };
            let relative = chassis.linear_velocity - velocity;
            // Only count bodies we are moving toward.
            if relative.dot(&offset) <= 0.0 {
                return None;
            }
            let speed = relative.norm();
            (speed >= tuning.impact_speed).then_some(speed)
        })
        .reduce(f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stalled_car_trips_after_consecutive_checks() {
        let tuning = StuckTuning::default();
        let mut record = StuckRecord::default();
        let mut tripped_at = None;
        for decision in 0..30 {
            record.record(Vector3::new(0.0, 0.0, -0.01 * decision as f32), tuning.history);
            if record.check(0.1, 1.0, &tuning) {
                tripped_at = Some(decision);
                break;
            }
        }
        // First full window at decision 9, checks on odd decisions: 9, 11, 13.
        assert_eq!(tripped_at, Some(13));
    }

    #[test]
    fn idle_or_moving_car_is_never_stuck() {
        let tuning = StuckTuning::default();
        let mut idle = StuckRecord::default();
        let mut moving = StuckRecord::default();
        for decision in 0..40 {
            idle.record(Vector3::zeros(), tuning.history);
            assert!(!idle.check(0.0, 0.0, &tuning));
            moving.record(Vector3::new(0.0, 0.0, -1.5 * decision as f32), tuning.history);
            assert!(!moving.check(0.5, 1.0, &tuning));
        }
    }

    #[test]
    fn ring_buffer_is_bounded() {
        let mut record = StuckRecord::default();
        for i in 0..25 {
            record.record(Vector3::new(i as f32, 0.0, 0.0), 10);
        }
        assert_eq!(record.samples(), 10);
        assert_eq!(record.average_displacement(), Some(1.0));
        record.clear();
        assert_eq!(record.samples(), 0);
    }

    #[test]
    fn impacts_need_closing_speed() {
        let tuning = StuckTuning::default();
        let mut chassis = ChassisState::default();
        chassis.linear_velocity = Vector3::new(0.0, 0.0, -10.0);
        let wall = TrackedBody {
            handle: VehicleHandle(9),
            kind: BodyKind::Static,
            position: Vector3::new(0.0, 0.0, -2.0),
            velocity: Vector3::zeros(),
        };
        assert_eq!(
            detect_impact(VehicleHandle(1), &chassis, &[wall], &tuning),
            Some(10.0)
        );

        chassis.linear_velocity = -chassis.linear_velocity;
        assert_eq!(detect_impact(VehicleHandle(1), &chassis, &[wall], &tuning), None);
    }

    #[test]
    fn strongest_impact_wins() {
        let mut record = StuckRecord::default();
        record.note_impact(9.0);
        record.note_impact(12.0);
        record.note_impact(f32::NAN);
        assert_eq!(record.take_impact(), Some(12.0));
        assert_eq!(record.take_impact(), None);
    }
}
