// racer_core/src/vehicle/mod.rs

//! The vehicle dynamics adapter shared by every car.
//!
//! It owns the wheel layout and translates a [`DriveIntent`] into per-wheel
//! steer, engine force and brake values on a [`WheelBackend`]. It also owns
//! drift friction modulation. It performs no clamping of its own: the
//! controllers bound every intent before it gets here.

mod wheel;

pub use wheel::{
    default_layout, Axle, WheelBackend, WheelCommand, WheelConfig, WheelSlots, FRONT_LEFT,
    FRONT_RIGHT, REAR_LEFT, REAR_RIGHT, WHEEL_COUNT,
};

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use serde::Deserialize;
use tracing::debug;

use crate::error::{positive, within, TuningError};
use crate::types::{ChassisState, DriveIntent};

/// Throttle magnitudes below this count as "off the pedal" and let the brake through.
const THROTTLE_EPSILON: f32 = 1e-3;

// =========================================================================
// == Tuning ==
// =========================================================================

/// Everything needed to build a chassis and its wheels.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VehicleTuning {
    /// Chassis mass in kg.
    pub mass: f32,
    /// Half extents of the chassis box, in meters.
    pub half_extents: [f32; 3],
    /// Maximum steering angle in radians.
    pub max_steer_angle: f32,
    /// Friction slip every wheel returns to when not drifting.
    pub nominal_friction_slip: f32,
    /// Friction slip of the rear pair while drifting.
    pub drift_rear_friction_slip: f32,
    pub wheels: Vec<WheelConfig>,
}

impl Default for VehicleTuning {
    fn default() -> Self {
        Self {
            mass: 150.0,
            half_extents: [0.9, 0.35, 2.0],
            max_steer_angle: 0.5,
            nominal_friction_slip: 1.4,
            drift_rear_friction_slip: 0.6,
            wheels: default_layout(0.85, 1.3, 0.0),
        }
    }
}

impl VehicleTuning {
    pub fn validate(&self) -> Result<(), TuningError> {
        positive("vehicle.mass", self.mass)?;
        for extent in self.half_extents {
            positive("vehicle.half_extents", extent)?;
        }
        within(
            "vehicle.max_steer_angle",
            self.max_steer_angle,
            f32::EPSILON,
            std::f32::consts::FRAC_PI_2,
        )?;
        positive("vehicle.nominal_friction_slip", self.nominal_friction_slip)?;
        positive("vehicle.drift_rear_friction_slip", self.drift_rear_friction_slip)?;
        validate_wheels(&self.wheels)
    }
}

fn validate_wheels(wheels: &[WheelConfig]) -> Result<(), TuningError> {
    if wheels.len() != WHEEL_COUNT {
        return Err(TuningError::WheelCount {
            expected: WHEEL_COUNT,
            found: wheels.len(),
        });
    }
    let steering = wheels.iter().filter(|w| w.steers).count();
    if steering != 2 {
        return Err(TuningError::SteeringPair(steering));
    }
    wheels.iter().try_for_each(WheelConfig::validate)
}

// =========================================================================
// == Adapter ==
// =========================================================================

/// The vehicle dynamics adapter. Generic over the physics backend so the
/// controllers can drive a real engine or the in-memory [`WheelSlots`].
#[derive(Debug, Clone)]
pub struct VehicleDynamics<B: WheelBackend = WheelSlots> {
    tuning: VehicleTuning,
    backend: B,
    drift_enabled: bool,
    last_intent: DriveIntent,
}

impl VehicleDynamics<WheelSlots> {
    /// An adapter writing into fresh in-memory wheel slots.
    pub fn with_slots(tuning: VehicleTuning) -> Result<Self, TuningError> {
        Self::new(tuning, WheelSlots::default())
    }
}

impl<B: WheelBackend> VehicleDynamics<B> {
    pub fn new(tuning: VehicleTuning, backend: B) -> Result<Self, TuningError> {
        tuning.validate()?;
        let wheels = tuning.wheels.clone();
        let mut dynamics = Self {
            tuning,
            backend,
            drift_enabled: false,
            last_intent: DriveIntent::IDLE,
        };
        dynamics.configure_wheels(wheels)?;
        Ok(dynamics)
    }

    /// Installs the wheel layout. Called once when the vehicle is created.
    pub fn configure_wheels(&mut self, mut wheels: Vec<WheelConfig>) -> Result<(), TuningError> {
        validate_wheels(&wheels)?;
        for wheel in &mut wheels {
            wheel.friction_slip = self.tuning.nominal_friction_slip;
        }
        self.tuning.wheels = wheels;
        self.drift_enabled = false;
        for index in 0..WHEEL_COUNT {
            self.backend
                .set_wheel_friction_slip(index, self.tuning.nominal_friction_slip);
        }
        Ok(())
    }

    /// Writes steer to the steering pair, engine force to all four wheels and,
    /// when the throttle is released, the brake to all four wheels.
    pub fn apply_drive(&mut self, steer: f32, throttle: f32, brake: f32) {
        let brake = if throttle.abs() < THROTTLE_EPSILON {
            brake
        } else {
            0.0
        };
        for (index, wheel) in self.tuning.wheels.iter().enumerate() {
            if wheel.steers {
                self.backend.set_wheel_steer(index, steer);
            }
            self.backend.set_wheel_engine_force(index, throttle);
            self.backend.set_wheel_brake(index, brake);
        }
        self.last_intent = DriveIntent {
            steer_angle: steer,
            throttle_force: throttle,
            brake_force: brake,
        };
    }

    /// Bounds the intent against this vehicle's steering limit, then applies it.
    pub fn apply_intent(&mut self, intent: DriveIntent) {
        let intent = intent.bounded(self.tuning.max_steer_angle);
        self.apply_drive(intent.steer_angle, intent.throttle_force, intent.brake_force);
    }

    /// Lowers rear grip for a drift, or restores nominal grip on all four wheels.
    pub fn set_drift_mode(&mut self, enabled: bool) {
        if enabled == self.drift_enabled {
            return;
        }
        self.drift_enabled = enabled;
        let nominal = self.tuning.nominal_friction_slip;
        let drift = self.tuning.drift_rear_friction_slip;
        for (index, wheel) in self.tuning.wheels.iter_mut().enumerate() {
            let slip = match (enabled, wheel.axle) {
                (true, Axle::Rear) => drift,
                _ => nominal,
            };
            wheel.friction_slip = slip;
            self.backend.set_wheel_friction_slip(index, slip);
        }
        debug!(enabled, "drift friction updated");
    }

    pub fn is_drifting(&self) -> bool {
        self.drift_enabled
    }

    pub fn max_steer_angle(&self) -> f32 {
        self.tuning.max_steer_angle
    }

    pub fn tuning(&self) -> &VehicleTuning {
        &self.tuning
    }

    pub fn wheels(&self) -> &[WheelConfig] {
        &self.tuning.wheels
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The last values written to the wheels.
    pub fn last_intent(&self) -> DriveIntent {
        self.last_intent
    }

    /// World pose of every wheel for the renderer.
    ///
    /// `suspension_lengths` are the current spring lengths reported by the
    /// physics engine; the steering pair is additionally yawed by the last steer.
    pub fn wheel_world_poses(
        &self,
        chassis: &ChassisState,
        suspension_lengths: &[f32; WHEEL_COUNT],
    ) -> [Isometry3<f32>; WHEEL_COUNT] {
        std::array::from_fn(|index| {
            let wheel = &self.tuning.wheels[index];
            let local_center = wheel.connection_point + wheel.direction * suspension_lengths[index];
            let steer = if wheel.steers {
                self.last_intent.steer_angle
            } else {
                0.0
            };
            let local_rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), steer);
            let world_center = chassis.position + chassis.orientation * local_center;
            Isometry3::from_parts(
                Translation3::from(world_center),
                chassis.orientation * local_rotation,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn adapter() -> VehicleDynamics {
        VehicleDynamics::with_slots(VehicleTuning::default()).expect("default tuning is valid")
    }

    #[test]
    fn steer_only_reaches_the_steering_pair() {
        let mut dynamics = adapter();
        dynamics.apply_drive(0.3, 500.0, 0.0);
        let slots = dynamics.backend();
        assert_eq!(slots.wheel(FRONT_RIGHT).unwrap().steer, 0.3);
        assert_eq!(slots.wheel(FRONT_LEFT).unwrap().steer, 0.3);
        assert_eq!(slots.wheel(REAR_RIGHT).unwrap().steer, 0.0);
        assert_eq!(slots.wheel(REAR_LEFT).unwrap().steer, 0.0);
        assert!(slots.iter().all(|w| w.engine_force == 500.0));
    }

    #[test]
    fn brake_only_applies_off_throttle() {
        let mut dynamics = adapter();
        dynamics.apply_drive(0.0, 800.0, 40.0);
        assert!(dynamics.backend().iter().all(|w| w.brake == 0.0));

        dynamics.apply_drive(0.0, 0.0, 40.0);
        assert!(dynamics.backend().iter().all(|w| w.brake == 40.0));
        assert!(dynamics.backend().iter().all(|w| w.engine_force == 0.0));
    }

    #[test]
    fn drift_mode_lowers_rear_grip_and_restores_it() {
        let mut dynamics = adapter();
        dynamics.set_drift_mode(true);
        dynamics.set_drift_mode(true);
        let slots = dynamics.backend();
        assert_eq!(slots.wheel(FRONT_RIGHT).unwrap().friction_slip, 1.4);
        assert_eq!(slots.wheel(REAR_LEFT).unwrap().friction_slip, 0.6);
        assert!(dynamics.is_drifting());

        dynamics.set_drift_mode(false);
        assert!(dynamics.backend().iter().all(|w| w.friction_slip == 1.4));
    }

    #[test]
    fn apply_intent_bounds_steer() {
        let mut dynamics = adapter();
        dynamics.apply_intent(DriveIntent {
            steer_angle: 4.0,
            throttle_force: f32::NAN,
            brake_force: 10.0,
        });
        let intent = dynamics.last_intent();
        assert_eq!(intent.steer_angle, 0.5);
        assert_eq!(intent.throttle_force, 0.0);
        assert_eq!(intent.brake_force, 10.0);
    }

    #[test]
    fn configure_rejects_bad_layouts() {
        let mut dynamics = adapter();
        let mut wheels = default_layout(0.8, 1.2, 0.0);
        wheels.pop();
        assert_eq!(
            dynamics.configure_wheels(wheels),
            Err(TuningError::WheelCount {
                expected: 4,
                found: 3
            })
        );

        let mut wheels = default_layout(0.8, 1.2, 0.0);
        wheels[REAR_LEFT].steers = true;
        assert_eq!(
            dynamics.configure_wheels(wheels),
            Err(TuningError::SteeringPair(3))
        );
    }

    #[test]
    fn wheel_poses_hang_below_connection_points() {
        let mut dynamics = adapter();
        dynamics.apply_drive(0.2, 0.0, 0.0);
        let chassis = ChassisState::at_rest(Vector3::new(0.0, 1.0, 0.0), 0.0);
        let poses = dynamics.wheel_world_poses(&chassis, &[0.3; WHEEL_COUNT]);

        assert_relative_eq!(
            poses[REAR_LEFT].translation.vector,
            Vector3::new(-0.85, 0.7, 1.3),
            epsilon = 1e-5
        );
        assert_relative_eq!(poses[FRONT_RIGHT].rotation.angle(), 0.2, epsilon = 1e-5);
        assert_relative_eq!(poses[REAR_RIGHT].rotation.angle(), 0.0, epsilon = 1e-5);
    }
}
