// racer_core/src/types.rs

use nalgebra::{UnitQuaternion, Vector3};

// --- Chassis axis convention ---
// Every controller in this crate agrees on one body frame:
// forward = -Z, up = +Y, right = +X. A positive steer angle turns left
// (a positive rotation about +Y) and a positive engine force pushes the
// chassis along its forward axis.

/// Chassis-local forward axis.
pub fn local_forward() -> Vector3<f32> {
    -Vector3::z()
}

/// Chassis-local up axis.
pub fn local_up() -> Vector3<f32> {
    Vector3::y()
}

/// Chassis-local right axis.
pub fn local_right() -> Vector3<f32> {
    Vector3::x()
}

// --- Core Identifier ---
/// A generic, framework-agnostic identifier for a vehicle or body.
/// In the Bevy sim, we use the bits of the Entity ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VehicleHandle(pub u64);

impl VehicleHandle {
    // A convenience method for use in the Bevy adapter crate.
    #[cfg(feature = "bevy")] // This will only compile if the "bevy" feature is enabled
    pub fn from_entity(entity: bevy_ecs::prelude::Entity) -> Self {
        Self(entity.to_bits())
    }
}

// =========================================================================
// == Chassis State ==
// =========================================================================

/// The physics engine's view of a chassis, refreshed every fixed step.
/// Controllers only ever read it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChassisState {
    pub position: Vector3<f32>,
    pub orientation: UnitQuaternion<f32>,
    pub linear_velocity: Vector3<f32>,
    pub angular_velocity: Vector3<f32>,
}

impl Default for ChassisState {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
        }
    }
}

impl ChassisState {
    /// A chassis at rest at `position`, facing `yaw` radians about +Y.
    pub fn at_rest(position: Vector3<f32>, yaw: f32) -> Self {
        Self {
            position,
            orientation: UnitQuaternion::from_axis_angle(&Vector3::y_axis(), yaw),
            ..Default::default()
        }
    }

    pub fn forward(&self) -> Vector3<f32> {
        self.orientation * local_forward()
    }

    pub fn right(&self) -> Vector3<f32> {
        self.orientation * local_right()
    }

    pub fn up(&self) -> Vector3<f32> {
        self.orientation * local_up()
    }

    /// Magnitude of the linear velocity in m/s.
    pub fn speed(&self) -> f32 {
        self.linear_velocity.norm()
    }

    /// Signed speed along the chassis forward axis (negative when rolling backwards).
    pub fn forward_speed(&self) -> f32 {
        self.linear_velocity.dot(&self.forward())
    }

    pub fn speed_kmh(&self) -> f32 {
        self.speed() * 3.6
    }
}

// =========================================================================
// == Drive Intent ==
// =========================================================================

/// What a controller wants the wheels to do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriveIntent {
    /// Steering angle in radians, positive turns left.
    pub steer_angle: f32,
    /// Engine force in Newtons. The sign encodes forward (+) or reverse (-).
    pub throttle_force: f32,
    /// Brake force, never negative.
    pub brake_force: f32,
}

impl DriveIntent {
    pub const IDLE: DriveIntent = DriveIntent {
        steer_angle: 0.0,
        throttle_force: 0.0,
        brake_force: 0.0,
    };

    /// Returns a copy that is safe to hand to the wheels: steer within
    /// `±max_steer`, brake non-negative, and any non-finite value replaced by zero.
    pub fn bounded(self, max_steer: f32) -> Self {
        Self {
            steer_angle: clamp_finite(self.steer_angle, -max_steer.abs(), max_steer.abs()),
            throttle_force: finite_or_zero(self.throttle_force),
            brake_force: finite_or_zero(self.brake_force).max(0.0),
        }
    }
}

/// NaN and infinities collapse to zero before clamping.
pub fn clamp_finite(value: f32, min: f32, max: f32) -> f32 {
    finite_or_zero(value).clamp(min, max)
}

pub fn finite_or_zero(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

// =========================================================================
// == World Snapshot ==
// =========================================================================

/// What kind of body another vehicle's controller is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKind {
    Player,
    Autopilot,
    Static,
}

/// A read-only record of another body, published once per physics step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedBody {
    pub handle: VehicleHandle,
    pub kind: BodyKind,
    pub position: Vector3<f32>,
    pub velocity: Vector3<f32>,
}

/// Projects a vector onto the ground (XZ) plane.
pub fn flatten(v: &Vector3<f32>) -> Vector3<f32> {
    Vector3::new(v.x, 0.0, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn forward_follows_yaw() {
        let chassis = ChassisState::at_rest(Vector3::zeros(), FRAC_PI_2);
        // A quarter turn left from -Z faces -X.
        assert_relative_eq!(chassis.forward(), -Vector3::x(), epsilon = 1e-6);
        assert_relative_eq!(chassis.right(), -Vector3::z(), epsilon = 1e-6);
    }

    #[test]
    fn bounded_intent_survives_garbage() {
        let intent = DriveIntent {
            steer_angle: f32::NAN,
            throttle_force: f32::INFINITY,
            brake_force: -3.0,
        }
        .bounded(0.5);
        assert_eq!(intent, DriveIntent::IDLE);

        let big = DriveIntent {
            steer_angle: -9.0,
            ..DriveIntent::IDLE
        }
        .bounded(0.5);
        assert_eq!(big.steer_angle, -0.5);
    }

    #[test]
    fn forward_speed_is_signed() {
        let mut chassis = ChassisState::default();
        chassis.linear_velocity = Vector3::new(0.0, 0.0, 4.0);
        assert_relative_eq!(chassis.forward_speed(), -4.0);
        assert_relative_eq!(chassis.speed_kmh(), 14.4, epsilon = 1e-4);
    }
}
