// racer_core/src/autopilot/path.rs

use nalgebra::Vector3;
use serde::Deserialize;

use crate::error::{positive, TuningError};
use crate::types::flatten;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PathTuning {
    /// Radius around a waypoint that counts as having reached it.
    pub path_tolerance: f32,
    /// Radius around the final destination that ends driving.
    pub destination_tolerance: f32,
    /// The next waypoint is skipped to when within this multiple of `path_tolerance`.
    pub overshoot_factor: f32,
    /// Distance at which the look-ahead starts blending toward later waypoints.
    pub look_ahead_distance: f32,
    /// Largest fraction of the way toward the far waypoint the blend may go.
    pub max_blend: f32,
}

impl Default for PathTuning {
    fn default() -> Self {
        Self {
            path_tolerance: 3.0,
            destination_tolerance: 4.0,
            overshoot_factor: 1.5,
            look_ahead_distance: 15.0,
            max_blend: 0.5,
        }
    }
}

impl PathTuning {
    pub fn validate(&self) -> Result<(), TuningError> {
        positive("path.path_tolerance", self.path_tolerance)?;
        positive("path.destination_tolerance", self.destination_tolerance)?;
        positive("path.overshoot_factor", self.overshoot_factor)?;
        positive("path.look_ahead_distance", self.look_ahead_distance)?;
        crate::error::within("path.max_blend", self.max_blend, 0.0, 1.0)
    }
}

/// Ground-plane distance; waypoint heights never matter for progress.
pub fn flat_distance(a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    flatten(&(b - a)).norm()
}

/// Progress along an ordered list of waypoints.
///
/// The index only ever moves forward; the whole path is replaced with
/// [`PathState::replace`] rather than rewound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathState {
    waypoints: Vec<Vector3<f32>>,
    index: usize,
}

impl PathState {
    pub fn new(waypoints: Vec<Vector3<f32>>) -> Self {
        Self {
            waypoints,
            index: 0,
        }
    }

    pub fn replace(&mut self, waypoints: Vec<Vector3<f32>>) {
        self.waypoints = waypoints;
        self.index = 0;
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.waypoints.len()
    }

    pub fn current(&self) -> Option<&Vector3<f32>> {
        self.waypoints.get(self.index)
    }

    pub fn last(&self) -> Option<&Vector3<f32>> {
        self.waypoints.last()
    }

    /// Moves past the current waypoint when close enough, and skips one more
    /// when the car has overshot toward the next.
    pub fn advance(&mut self, position: &Vector3<f32>, tuning: &PathTuning) {
        if let Some(current) = self.current() {
            if flat_distance(position, current) < tuning.path_tolerance {
                self.index += 1;
            }
        }

        if let (Some(current), Some(next)) = (
            self.waypoints.get(self.index),
            self.waypoints.get(self.index + 1),
        ) {
            let to_current = flat_distance(position, current);
            let to_next = flat_distance(position, next);
            if to_next < to_current && to_next < tuning.path_tolerance * tuning.overshoot_factor {
                self.index += 1;
            }
        }
    }

    /// The point to steer at: the current waypoint pulled toward the one two
    /// ahead. The pull grows as the car closes on the current waypoint and
    /// shrinks as the path bends. `None` once every waypoint is behind us.
    pub fn look_ahead(&self, position: &Vector3<f32>, tuning: &PathTuning) -> Option<Vector3<f32>> {
        let current = *self.current()?;
        let next = self.waypoints.get(self.index + 1);
        let far = self.waypoints.get(self.index + 2).or(next);
        let (Some(next), Some(far)) = (next, far) else {
            return Some(current);
        };

        let proximity =
            1.0 - (flat_distance(position, &current) / tuning.look_ahead_distance).clamp(0.0, 1.0);

        let first = flatten(&(next - current));
        let second = flatten(&(far - next));
        let straightness = match (first.try_normalize(1e-6), second.try_normalize(1e-6)) {
            (Some(a), Some(b)) => a.dot(&b).clamp(0.0, 1.0),
            _ => 1.0,
        };

        let blend = tuning.max_blend * proximity * straightness;
        Some(current.lerp(far, blend))
    }
}
