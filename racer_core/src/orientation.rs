// racer_core/src/orientation.rs

//! Orientation monitoring shared by the player and autopilot controllers.
//!
//! The free functions here are pure: they classify an orientation and build
//! the heading-preserving reset transform. [`FlipRecord`] and [`FlipMonitor`]
//! add the small amount of state needed to fire a reset once a body has stayed
//! flipped for long enough.

use nalgebra::{UnitQuaternion, Vector3};
use serde::Deserialize;

use crate::error::{positive, within, TuningError};
use crate::timing::sanitize_dt;
use crate::types::{local_forward, local_right, local_up, ChassisState};

/// Below this up.y a body is "flipped" (more than ~72 degrees from upright).
pub const FLIP_THRESHOLD: f32 = 0.3;
/// Below this up.y a body is upside down rather than merely tipped over.
pub const UPSIDE_DOWN_THRESHOLD: f32 = -0.5;
/// Roll or pitch beyond this angle (radians) dominates the classification.
pub const DOMINANT_AXIS_ANGLE: f32 = std::f32::consts::FRAC_PI_3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlipType {
    Upright,
    Tilted,
    UpsideDown,
    LeftSide,
    RightSide,
    NoseUp,
    NoseDown,
}

// =========================================================================
// == Pure Queries ==
// =========================================================================

/// The canonical up vector (0, 1, 0) rotated by `orientation`.
pub fn up_vector(orientation: &UnitQuaternion<f32>) -> Vector3<f32> {
    orientation * local_up()
}

pub fn is_flipped(orientation: &UnitQuaternion<f32>, threshold: f32) -> bool {
    up_vector(orientation).y < threshold
}

/// Returns `(roll, pitch)` in radians.
///
/// Roll is positive when the right side lifts (the car lies on its left
/// side); pitch is positive when the nose points up.
pub fn roll_pitch(orientation: &UnitQuaternion<f32>) -> (f32, f32) {
    let up = orientation * local_up();
    let right = orientation * local_right();
    let forward = orientation * local_forward();
    let roll = right.y.atan2(up.y);
    let pitch = forward.y.clamp(-1.0, 1.0).asin();
    (roll, pitch)
}

pub fn classify(orientation: &UnitQuaternion<f32>) -> FlipType {
    let up_y = up_vector(orientation).y;
    if up_y < UPSIDE_DOWN_THRESHOLD {
        return FlipType::UpsideDown;
    }

    let (roll, pitch) = roll_pitch(orientation);
    if roll.abs() > DOMINANT_AXIS_ANGLE {
        if roll > 0.0 {
            FlipType::LeftSide
        } else {
            FlipType::RightSide
        }
    } else if pitch.abs() > DOMINANT_AXIS_ANGLE {
        if pitch > 0.0 {
            FlipType::NoseUp
        } else {
            FlipType::NoseDown
        }
    } else if up_y < FLIP_THRESHOLD {
        FlipType::Tilted
    } else {
        FlipType::Upright
    }
}

/// Heading about +Y, zero when facing -Z.
///
/// When the nose points almost straight up or down the forward vector has no
/// usable ground projection, so the heading is read off the roof instead.
pub fn heading(orientation: &UnitQuaternion<f32>) -> f32 {
    let forward = orientation * local_forward();
    let flat = Vector3::new(forward.x, 0.0, forward.z);
    if flat.norm_squared() > 1e-4 {
        return (-flat.x).atan2(-flat.z);
    }
    let up = orientation * local_up();
    // Nose up: the roof faces backwards. Nose down: the roof faces forwards.
    let facing = if forward.y > 0.0 { -up } else { up };
    (-facing.x).atan2(-facing.z)
}

// =========================================================================
// == Reset Transform ==
// =========================================================================

/// How far to lift a body before resetting it, per flip type.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct LiftHeights {
    pub upside_down: f32,
    pub side: f32,
    pub nose: f32,
    pub tilted: f32,
}

impl Default for LiftHeights {
    fn default() -> Self {
        Self {
            upside_down: 2.0,
            side: 1.5,
            nose: 1.5,
            tilted: 1.0,
        }
    }
}

impl LiftHeights {
    pub fn for_kind(&self, kind: FlipType) -> f32 {
        match kind {
            FlipType::UpsideDown => self.upside_down,
            FlipType::LeftSide | FlipType::RightSide => self.side,
            FlipType::NoseUp | FlipType::NoseDown => self.nose,
            FlipType::Tilted | FlipType::Upright => self.tilted,
        }
    }
}

/// The pose and velocities to write back to the physics body on auto-reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResetTransform {
    pub kind: FlipType,
    pub position: Vector3<f32>,
    pub orientation: UnitQuaternion<f32>,
    pub linear_velocity: Vector3<f32>,
    pub angular_velocity: Vector3<f32>,
}

/// Lifts the body, drops roll and pitch, keeps the heading and zeroes both velocities.
pub fn compute_reset_transform(
    position: Vector3<f32>,
    orientation: &UnitQuaternion<f32>,
    kind: FlipType,
    lift: &LiftHeights,
) -> ResetTransform {
    let yaw = heading(orientation);
    ResetTransform {
        kind,
        position: position + Vector3::y() * lift.for_kind(kind),
        orientation: UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw),
        linear_velocity: Vector3::zeros(),
        angular_velocity: Vector3::zeros(),
    }
}

// =========================================================================
// == Flip Record ==
// =========================================================================

/// Rolling "time spent flipped" counter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlipRecord {
    flipped_for: f32,
    was_flipped: bool,
}

impl FlipRecord {
    /// Advances the record by one check.
    ///
    /// The timer starts on the rising edge and accumulates `dt` while the
    /// body stays flipped. Returns `true` exactly once when the accumulated
    /// time reaches `delay`; the record then clears itself. Any upright
    /// reading zeroes it.
    pub fn tick(&mut self, flipped_now: bool, dt: f32, delay: f32) -> bool {
        if !flipped_now {
            self.clear();
            return false;
        }
        if !self.was_flipped {
            self.was_flipped = true;
            self.flipped_for = 0.0;
        } else if let Some(dt) = sanitize_dt(dt) {
            self.flipped_for += dt;
        }
        if self.flipped_for >= delay {
            self.clear();
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn flipped_for(&self) -> f32 {
        self.flipped_for
    }

    pub fn is_flipped(&self) -> bool {
        self.was_flipped
    }
}

// =========================================================================
// == Flip Monitor ==
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct FlipTuning {
    /// up.y below which the body counts as flipped.
    pub threshold: f32,
    /// Seconds between orientation checks.
    pub check_interval: f32,
    /// Seconds a body must stay flipped before it is reset.
    pub reset_delay: f32,
    pub lift: LiftHeights,
}

impl Default for FlipTuning {
    fn default() -> Self {
        Self {
            threshold: FLIP_THRESHOLD,
            check_interval: 0.1,
            reset_delay: 2.0,
            lift: LiftHeights::default(),
        }
    }
}

impl FlipTuning {
    /// Faster trigger used by AI cars: a stranded pursuer should not sit for long.
    pub fn autopilot() -> Self {
        Self {
            check_interval: 0.5,
            reset_delay: 1.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), TuningError> {
        within("flip.threshold", self.threshold, -1.0, 1.0)?;
        positive("flip.check_interval", self.check_interval)?;
        positive("flip.reset_delay", self.reset_delay)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlipEvent {
    /// The body just went from upright to flipped.
    Detected(FlipType),
    /// The body stayed flipped past the delay; write this transform back.
    Reset(ResetTransform),
}

/// Runs the orientation check at its own interval and owns the [`FlipRecord`].
#[derive(Debug, Clone, Default)]
pub struct FlipMonitor {
    tuning: FlipTuning,
    record: FlipRecord,
    since_check: f32,
    last_kind: Option<FlipType>,
}

impl FlipMonitor {
    pub fn new(tuning: FlipTuning) -> Self {
        Self {
            tuning,
            ..Default::default()
        }
    }

    pub fn tick(&mut self, dt: f32, chassis: &ChassisState) -> Option<FlipEvent> {
        self.since_check += sanitize_dt(dt)?;
        if self.since_check + f32::EPSILON < self.tuning.check_interval {
            return None;
        }
        let step = std::mem::take(&mut self.since_check);

        let flipped = is_flipped(&chassis.orientation, self.tuning.threshold);
        let kind = classify(&chassis.orientation);
        let rising = flipped && !self.record.is_flipped();
        self.last_kind = flipped.then_some(kind);

        if self.record.tick(flipped, step, self.tuning.reset_delay) {
            self.last_kind = None;
            return Some(FlipEvent::Reset(compute_reset_transform(
                chassis.position,
                &chassis.orientation,
                kind,
                &self.tuning.lift,
            )));
        }
        rising.then_some(FlipEvent::Detected(kind))
    }

    /// Whether the last completed check found the body flipped.
    pub fn is_flipped(&self) -> bool {
        self.last_kind.is_some()
    }

    pub fn last_kind(&self) -> Option<FlipType> {
        self.last_kind
    }

    pub fn clear(&mut self) {
        self.record.clear();
        self.since_check = 0.0;
        self.last_kind = None;
    }
}
