// racer_sim/src/simulation/core/snapshot.rs

//! The read-only world view every controller gets once per fixed step.

use avian3d::prelude::{AngularVelocity, LinearVelocity};
use bevy::prelude::*;
use nalgebra::Vector3;
use racer_core::prelude::{TrackedBody, VehicleHandle};

use super::components::{ChassisSnapshot, PreStepVelocity, Tracked};
use super::transforms::{chassis_state_from_physics, vec3_to_vector3};

/// Every tracked body as it was at the start of this step.
/// Controllers filter themselves out by handle.
#[derive(Resource, Default, Debug)]
pub struct TrackedBodies(pub Vec<TrackedBody>);

impl TrackedBodies {
    pub fn find(&self, handle: VehicleHandle) -> Option<&TrackedBody> {
        self.0.iter().find(|body| body.handle == handle)
    }
}

/// Copies the physics results into chassis snapshots and rebuilds the
/// tracked-body list.
pub fn refresh_snapshots(
    mut tracked: ResMut<TrackedBodies>,
    mut chassis_query: Query<(&Transform, &LinearVelocity, &AngularVelocity, &mut ChassisSnapshot)>,
    bodies: Query<(Entity, &Tracked, &Transform, Option<&LinearVelocity>)>,
) {
    for (transform, lin_vel, ang_vel, mut snapshot) in &mut chassis_query {
        snapshot.0 = chassis_state_from_physics(transform, lin_vel, ang_vel);
    }

    tracked.0.clear();
    tracked.0.extend(bodies.iter().map(|(entity, kind, transform, lin_vel)| TrackedBody {
        handle: VehicleHandle::from_entity(entity),
        kind: kind.0,
        position: vec3_to_vector3(transform.translation),
        velocity: lin_vel.map_or_else(Vector3::zeros, |v| vec3_to_vector3(v.0)),
    }));
}

/// Runs last in `FixedUpdate`, so the values hold the velocities the next
/// physics step starts from.
pub fn record_pre_step_velocities(mut query: Query<(&LinearVelocity, &mut PreStepVelocity)>) {
    for (lin_vel, mut pre_step) in &mut query {
        pre_step.0 = lin_vel.0;
    }
}
