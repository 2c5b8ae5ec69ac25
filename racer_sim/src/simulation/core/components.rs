// racer_sim/src/simulation/core/components.rs

use bevy::prelude::{Component, Vec3};
use racer_core::prelude::{BodyKind, ChassisState, VehicleDynamics, WHEEL_COUNT};

use crate::simulation::config::AgentConfig;

/// A temporary component carrying an agent's resolved configuration through
/// the `SceneBuildSet` passes. Removed in `SceneBuildSet::Cleanup`.
#[derive(Component, Debug, Clone)]
pub struct SpawnAgentConfigRequest(pub AgentConfig);

/// The vehicle dynamics adapter for one chassis. Controllers write into its
/// wheel slots; the raycast wheel system reads them every fixed step.
#[derive(Component, Debug)]
pub struct VehicleBody(pub VehicleDynamics);

/// Per-wheel suspension lengths and ground contact from the last step.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Suspension {
    pub lengths: [f32; WHEEL_COUNT],
    pub grounded: [bool; WHEEL_COUNT],
}

impl Suspension {
    pub fn at_rest(rest_length: f32) -> Self {
        Self {
            lengths: [rest_length; WHEEL_COUNT],
            grounded: [false; WHEEL_COUNT],
        }
    }
}

/// The chassis state the controllers see this step, refreshed in
/// `SimulationSet::Precomputation`.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct ChassisSnapshot(pub ChassisState);

/// Chassis velocity recorded just before avian steps the world. Contacts
/// reported by that step are judged with it, since the solver has already
/// taken the closing speed out of `LinearVelocity` by the time they are read.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq)]
pub struct PreStepVelocity(pub Vec3);

/// Any body that shows up in other vehicles' `TrackedBodies` view.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tracked(pub BodyKind);

/// Marks world geometry. Static obstacles are tracked with `BodyKind::Static`.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct StaticObstacle;
