// racer_core/src/vehicle/wheel.rs

use nalgebra::Vector3;
use serde::Deserialize;

use crate::error::{positive, TuningError};

/// Number of wheel slots on every chassis.
pub const WHEEL_COUNT: usize = 4;

/// Slot order shared by the adapter, the physics binding and the renderer.
pub const FRONT_RIGHT: usize = 0;
pub const FRONT_LEFT: usize = 1;
pub const REAR_RIGHT: usize = 2;
pub const REAR_LEFT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Axle {
    Front,
    Rear,
}

/// Static description of one raycast wheel.
/// Only `friction_slip` changes after creation, and only through drift mode.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WheelConfig {
    pub radius: f32,
    /// Spring constant per unit of chassis mass.
    pub suspension_stiffness: f32,
    pub suspension_rest_length: f32,
    pub max_suspension_travel: f32,
    pub friction_slip: f32,
    pub damping_compression: f32,
    pub damping_relaxation: f32,
    /// Where the suspension attaches, in chassis space.
    pub connection_point: Vector3<f32>,
    /// Suspension ray direction in chassis space (usually down).
    pub direction: Vector3<f32>,
    /// Rolling axis in chassis space.
    pub axle_direction: Vector3<f32>,
    pub axle: Axle,
    pub steers: bool,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            radius: 0.4,
            suspension_stiffness: 30.0,
            suspension_rest_length: 0.3,
            max_suspension_travel: 0.3,
            friction_slip: 1.4,
            damping_compression: 4.4,
            damping_relaxation: 2.3,
            connection_point: Vector3::zeros(),
            direction: -Vector3::y(),
            axle_direction: Vector3::x(),
            axle: Axle::Front,
            steers: false,
        }
    }
}

impl WheelConfig {
    pub fn validate(&self) -> Result<(), TuningError> {
        positive("wheel.radius", self.radius)?;
        positive("wheel.suspension_stiffness", self.suspension_stiffness)?;
        positive("wheel.suspension_rest_length", self.suspension_rest_length)?;
        positive("wheel.max_suspension_travel", self.max_suspension_travel)?;
        positive("wheel.friction_slip", self.friction_slip)?;
        Ok(())
    }
}

/// The standard four-wheel layout: front pair steers, forward is -Z.
pub fn default_layout(half_track: f32, half_wheelbase: f32, height: f32) -> Vec<WheelConfig> {
    let slot = |x: f32, z: f32, axle: Axle| WheelConfig {
        connection_point: Vector3::new(x, height, z),
        axle,
        steers: axle == Axle::Front,
        ..Default::default()
    };
    vec![
        slot(half_track, -half_wheelbase, Axle::Front),
        slot(-half_track, -half_wheelbase, Axle::Front),
        slot(half_track, half_wheelbase, Axle::Rear),
        slot(-half_track, half_wheelbase, Axle::Rear),
    ]
}

// =========================================================================
// == Physics Contract ==
// =========================================================================

/// The narrow slice of a raycast-vehicle physics engine the adapter writes to.
/// Every value is read by the engine on its next integration step.
pub trait WheelBackend {
    fn set_wheel_steer(&mut self, index: usize, value: f32);
    fn set_wheel_engine_force(&mut self, index: usize, value: f32);
    fn set_wheel_brake(&mut self, index: usize, value: f32);
    fn set_wheel_friction_slip(&mut self, index: usize, value: f32);
}

/// The latest command written to one wheel slot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelCommand {
    pub steer: f32,
    pub engine_force: f32,
    pub brake: f32,
    pub friction_slip: f32,
}

/// An in-memory backend: the physics binding reads these slots every step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WheelSlots {
    slots: [WheelCommand; WHEEL_COUNT],
}

impl WheelSlots {
    pub fn wheel(&self, index: usize) -> Option<&WheelCommand> {
        self.slots.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WheelCommand> {
        self.slots.iter()
    }
}

impl WheelBackend for WheelSlots {
    fn set_wheel_steer(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.steer = value;
        }
    }

    fn set_wheel_engine_force(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.engine_force = value;
        }
    }

    fn set_wheel_brake(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.brake = value;
        }
    }

    fn set_wheel_friction_slip(&mut self, index: usize, value: f32) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.friction_slip = value;
        }
    }
}
