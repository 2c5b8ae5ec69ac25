// racer_sim/src/simulation/core/transforms.rs

//! Conversions between Bevy's glam types and the nalgebra types used by
//! `racer_core`.
//!
//! Both sides share one frame (forward = -Z, up = +Y, right = +X), so no axis
//! swap happens here; only the numeric types change.

use avian3d::prelude::{AngularVelocity, LinearVelocity};
use bevy::prelude::{Quat as BevyQuat, Transform as BevyTransform, Vec3 as BevyVec3};
use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use racer_core::prelude::{ChassisState, ResetTransform};

pub fn vec3_to_vector3(v: BevyVec3) -> Vector3<f32> {
    Vector3::new(v.x, v.y, v.z)
}

pub fn vector3_to_vec3(v: &Vector3<f32>) -> BevyVec3 {
    BevyVec3::new(v.x, v.y, v.z)
}

pub fn quat_to_unit_quaternion(q: BevyQuat) -> UnitQuaternion<f32> {
    UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z))
}

pub fn unit_quaternion_to_quat(q: &UnitQuaternion<f32>) -> BevyQuat {
    let c = q.coords;
    BevyQuat::from_xyzw(c.x, c.y, c.z, c.w)
}

/// Converts a Bevy `Transform` into a `nalgebra::Isometry3<f32>`. Scale is dropped.
pub fn bevy_transform_to_isometry(transform: &BevyTransform) -> Isometry3<f32> {
    Isometry3::from_parts(
        Translation3::from(vec3_to_vector3(transform.translation)),
        quat_to_unit_quaternion(transform.rotation),
    )
}

pub fn isometry_to_bevy_transform(iso: &Isometry3<f32>) -> BevyTransform {
    BevyTransform::from_translation(vector3_to_vec3(&iso.translation.vector))
        .with_rotation(unit_quaternion_to_quat(&iso.rotation))
}

/// Builds the controllers' view of a chassis from its physics components.
pub fn chassis_state_from_physics(
    transform: &BevyTransform,
    lin_vel: &LinearVelocity,
    ang_vel: &AngularVelocity,
) -> ChassisState {
    ChassisState {
        position: vec3_to_vector3(transform.translation),
        orientation: quat_to_unit_quaternion(transform.rotation),
        linear_velocity: vec3_to_vector3(lin_vel.0),
        angular_velocity: vec3_to_vector3(ang_vel.0),
    }
}

/// Teleports a chassis to an auto-reset pose and stops it.
pub fn apply_reset(
    reset: &ResetTransform,
    transform: &mut BevyTransform,
    lin_vel: &mut LinearVelocity,
    ang_vel: &mut AngularVelocity,
) {
    transform.translation = vector3_to_vec3(&reset.position);
    transform.rotation = unit_quaternion_to_quat(&reset.orientation);
    lin_vel.0 = vector3_to_vec3(&reset.linear_velocity);
    ang_vel.0 = vector3_to_vec3(&reset.angular_velocity);
}
