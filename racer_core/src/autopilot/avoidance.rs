// racer_core/src/autopilot/avoidance.rs

use serde::Deserialize;

use crate::error::{positive, within, TuningError};
use crate::types::{flatten, BodyKind, ChassisState, TrackedBody, VehicleHandle};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct AvoidanceTuning {
    /// Vehicles further than this are ignored.
    pub radius: f32,
    /// The closest vehicle inside this radius forces a recovery maneuver.
    pub danger_radius: f32,
    /// Minimum dot between our forward axis and the direction to a vehicle
    /// for it to count as ahead.
    pub ahead_dot: f32,
    pub player_weight: f32,
    pub autopilot_weight: f32,
}

impl Default for AvoidanceTuning {
    fn default() -> Self {
        Self {
            radius: 12.0,
            danger_radius: 3.5,
            ahead_dot: 0.3,
            player_weight: 1.5,
            autopilot_weight: 1.0,
        }
    }
}

impl AvoidanceTuning {
    pub fn validate(&self) -> Result<(), TuningError> {
        positive("avoidance.radius", self.radius)?;
        within("avoidance.danger_radius", self.danger_radius, 0.0, self.radius)?;
        within("avoidance.ahead_dot", self.ahead_dot, -1.0, 1.0)?;
        positive("avoidance.player_weight", self.player_weight)?;
        positive("avoidance.autopilot_weight", self.autopilot_weight)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Avoidance {
    /// Summed steering bias in normalized steer units, positive to the left.
    pub steer_bias: f32,
    /// `(radius - d) / radius` for the closest vehicle ahead, 0 when none.
    pub closeness: f32,
    pub closest: Option<(VehicleHandle, f32)>,
    /// The closest vehicle ahead is inside the danger radius.
    pub danger: bool,
}

impl Avoidance {
    pub fn is_active(&self) -> bool {
        self.closest.is_some()
    }
}

/// Scans the other vehicles ahead of `chassis` and sums how hard to steer away from them.
pub fn evaluate(
    own: VehicleHandle,
    chassis: &ChassisState,
    others: &[TrackedBody],
    tuning: &AvoidanceTuning,
) -> Avoidance {
    let forward = flatten(&chassis.forward());
    let right = flatten(&chassis.right());
    let mut result = Avoidance::default();

    for body in others {
        if body.handle == own {
            continue;
        }
        let weight = match body.kind {
            BodyKind::Player => tuning.player_weight,
            BodyKind::Autopilot => tuning.autopilot_weight,
            BodyKind::Static => continue,
        };
        let offset = flatten(&(body.position - chassis.position));
        let distance = offset.norm();
        if distance >= tuning.radius || distance < 1e-4 {
            continue;
        }
        let direction = offset / distance;
        if forward.dot(&direction) <= tuning.ahead_dot {
            continue;
        }

        // An obstacle on the right pushes us left (positive), and vice versa.
        // Dead ahead breaks toward the left.
        let away = right.dot(&direction).signum();
        let strength = (tuning.radius - distance) / tuning.radius;
        result.steer_bias += away * strength * weight;

        if result.closest.map_or(true, |(_, d)| distance < d) {
            result.closest = Some((body.handle, distance));
        }
    }

    if let Some((_, distance)) = result.closest {
        result.closeness = (tuning.radius - distance) / tuning.radius;
        result.danger = distance < tuning.danger_radius;
    }
    result
}
