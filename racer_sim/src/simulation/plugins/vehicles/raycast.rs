// racer_sim/src/simulation/plugins/vehicles/raycast.rs

//! Raycast-wheel vehicles on top of avian3d.
//!
//! Every fixed step each wheel casts a ray down its suspension direction.
//! A hit produces a spring/damper force along the ray, the wheel slot's
//! engine force and brake along the steered wheel's rolling direction, and a
//! lateral grip force bounded by the wheel's friction slip. All of it is
//! summed into the chassis' `ExternalForce` / `ExternalTorque`.

use crate::{
    prelude::*,
    simulation::core::transforms::{bevy_transform_to_isometry, vector3_to_vec3},
};
use avian3d::prelude::*;
use nalgebra::Isometry3;
use racer_core::prelude::{ChassisState, WheelConfig};
use racer_core::vehicle::WheelCommand;

/// Deceleration (m/s^2) contributed by one unit of brake value.
const BRAKE_DECELERATION_PER_UNIT: f32 = 0.25;
/// Fraction of the sideways slip velocity cancelled per step before the
/// friction limit applies.
const LATERAL_STIFFNESS: f32 = 0.5;

// --- BEVY COMPONENTS for a raycast vehicle ---

/// World pose of every wheel after the last step, for a renderer to pick up.
#[derive(Component, Debug, Clone, Copy)]
pub struct WheelPoses(pub [Isometry3<f32>; WHEEL_COUNT]);

// --- THE PLUGIN ---
pub struct RaycastVehiclePlugin;

impl Plugin for RaycastVehiclePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(AppState::SceneBuilding),
            (
                // Builds the dynamics adapter from the vehicle tuning.
                build_vehicle_dynamics.in_set(SceneBuildSet::ProcessVehicle),
                // Adds the PHYSICAL RigidBody and Collider.
                attach_chassis_physics.in_set(SceneBuildSet::Physics),
            ),
        )
        .add_systems(
            FixedUpdate,
            (drive_raycast_wheels, update_wheel_poses)
                .chain()
                .in_set(SimulationSet::Actuation),
        );
    }
}

// --- SYSTEMS ---

/// SPAWNING (LOGIC): Reads the request and adds the dynamics adapter.
fn build_vehicle_dynamics(
    mut commands: Commands,
    request_query: Query<(Entity, &Name, &Transform, &SpawnAgentConfigRequest)>,
) {
    for (entity, name, transform, request) in &request_query {
        let tuning = request.0.vehicle.clone();
        let rest_length = tuning
            .wheels
            .first()
            .map_or(0.0, |w| w.suspension_rest_length);
        match VehicleDynamics::with_slots(tuning) {
            Ok(dynamics) => {
                let iso = bevy_transform_to_isometry(transform);
                commands.entity(entity).insert((
                    VehicleBody(dynamics),
                    Suspension::at_rest(rest_length),
                    ChassisSnapshot(ChassisState {
                        position: iso.translation.vector,
                        orientation: iso.rotation,
                        ..Default::default()
                    }),
                ));
            }
            Err(e) => {
                error!("[SPAWN] Vehicle '{}' rejected: {}. Despawning.", name, e);
                commands.entity(entity).despawn();
            }
        }
    }
}

/// SPAWNING (PHYSICS): Attaches the physical body.
fn attach_chassis_physics(
    mut commands: Commands,
    query: Query<(Entity, &VehicleBody), Without<RigidBody>>,
) {
    for (entity, body) in &query {
        let tuning = body.0.tuning();
        let [hx, hy, hz] = tuning.half_extents;
        commands.entity(entity).insert((
            RigidBody::Dynamic,
            Collider::cuboid(2.0 * hx, 2.0 * hy, 2.0 * hz),
            Mass(tuning.mass),
            Friction::new(0.3),
            // Driving forces must keep applying to a car at rest.
            SleepingDisabled,
            CollisionEventsEnabled,
            LinearVelocity::default(),
            AngularVelocity::default(),
            PreStepVelocity::default(),
            ExternalForce::default().with_persistence(false),
            ExternalTorque::default().with_persistence(false),
        ));
    }
}

/// What one suspension ray saw this step.
#[derive(Debug, Clone, Copy)]
pub struct WheelContact {
    /// Distance from the connection point to the ground along the ray.
    pub distance: f32,
    /// World direction of the ray (down the suspension).
    pub ray_direction: Vec3,
    /// Ground normal at the hit.
    pub normal: Vec3,
    /// World velocity of the chassis at the contact point.
    pub point_velocity: Vec3,
    /// World rolling direction of the (possibly steered) wheel.
    pub wheel_forward: Vec3,
}

/// The force one grounded wheel puts on the chassis, and its spring length.
///
/// `mass_share` is the chassis mass carried by this wheel.
pub fn wheel_force(
    wheel: &WheelConfig,
    command: &WheelCommand,
    contact: &WheelContact,
    mass_share: f32,
    dt: f32,
) -> (Vec3, f32) {
    let max_length = wheel.suspension_rest_length + wheel.max_suspension_travel;
    let spring_length = (contact.distance - wheel.radius).clamp(0.0, max_length);

    // --- Suspension ---
    let up = -contact.ray_direction;
    let compression = wheel.suspension_rest_length - spring_length;
    let closing_speed = contact.point_velocity.dot(up);
    let damping = if closing_speed < 0.0 {
        wheel.damping_compression
    } else {
        wheel.damping_relaxation
    };
    let stiffness_force = wheel.suspension_stiffness * compression - damping * closing_speed;
    let load = (mass_share * WHEEL_COUNT as f32 * stiffness_force).max(0.0);
    let mut force = up * load;

    // --- Tyre frame on the ground plane ---
    let along_normal = contact.normal * contact.wheel_forward.dot(contact.normal);
    let forward = (contact.wheel_forward - along_normal).normalize_or_zero();
    let right = forward.cross(contact.normal).normalize_or_zero();
    let grip_limit = wheel.friction_slip * load;

    // --- Longitudinal: engine and brake ---
    let rolling_speed = contact.point_velocity.dot(forward);
    let mut longitudinal = command.engine_force;
    if command.brake > 0.0 && dt > 0.0 {
        let brake = command.brake * BRAKE_DECELERATION_PER_UNIT * mass_share;
        // Never push past a standstill within one step.
        let stop = rolling_speed.abs() * mass_share / dt;
        longitudinal -= rolling_speed.signum() * brake.min(stop);
    }
    force += forward * longitudinal;

    // --- Lateral grip ---
    if dt > 0.0 {
        let slip_speed = contact.point_velocity.dot(right);
        let lateral =
            (-slip_speed * mass_share / dt * LATERAL_STIFFNESS).clamp(-grip_limit, grip_limit);
        force += right * lateral;
    }

    (force, spring_length)
}

/// RUNTIME: Reads the wheel slots and applies forces/torques to the chassis.
fn drive_raycast_wheels(
    time: Res<Time>,
    spatial_query: SpatialQuery,
    mut query: Query<(
        Entity,
        &Transform,
        &LinearVelocity,
        &AngularVelocity,
        &VehicleBody,
        &mut Suspension,
        &mut ExternalForce,
        &mut ExternalTorque,
    )>,
) {
    let dt = time.delta_secs();
    for (entity, transform, lin_vel, ang_vel, body, mut suspension, mut force, mut torque) in
        &mut query
    {
        let filter = SpatialQueryFilter::from_excluded_entities([entity]);
        let mass_share = body.0.tuning().mass / WHEEL_COUNT as f32;
        let center = transform.translation;
        let mut total_force = Vec3::ZERO;
        let mut total_torque = Vec3::ZERO;

        for (index, wheel) in body.0.wheels().iter().enumerate() {
            let Some(command) = body.0.backend().wheel(index) else {
                continue;
            };
            let anchor = transform.transform_point(vector3_to_vec3(&wheel.connection_point));
            let direction = transform.rotation * vector3_to_vec3(&wheel.direction);
            let Ok(ray_direction) = Dir3::new(direction) else {
                continue;
            };
            let reach = wheel.suspension_rest_length + wheel.max_suspension_travel + wheel.radius;

            let Some(hit) = spatial_query.cast_ray(anchor, ray_direction, reach, true, &filter)
            else {
                suspension.lengths[index] =
                    wheel.suspension_rest_length + wheel.max_suspension_travel;
                suspension.grounded[index] = false;
                continue;
            };

            let contact_point = anchor + *ray_direction * hit.distance;
            let steer = if wheel.steers { command.steer } else { 0.0 };
            let contact = WheelContact {
                distance: hit.distance,
                ray_direction: *ray_direction,
                normal: hit.normal,
                point_velocity: lin_vel.0 + ang_vel.0.cross(contact_point - center),
                wheel_forward: transform.rotation * (Quat::from_rotation_y(steer) * Vec3::NEG_Z),
            };
            let (applied, spring_length) =
                wheel_force(wheel, command, &contact, mass_share, dt);
            suspension.lengths[index] = spring_length;
            suspension.grounded[index] = true;

            total_force += applied;
            total_torque += (contact_point - center).cross(applied);
        }

        *force = ExternalForce::new(total_force).with_persistence(false);
        *torque = ExternalTorque::new(total_torque).with_persistence(false);
    }
}

fn update_wheel_poses(
    mut commands: Commands,
    query: Query<(Entity, &VehicleBody, &Suspension, &ChassisSnapshot)>,
) {
    for (entity, body, suspension, snapshot) in &query {
        let poses = body.0.wheel_world_poses(&snapshot.0, &suspension.lengths);
        commands.entity(entity).insert(WheelPoses(poses));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f32 = 1.0 / 60.0;
    const SHARE: f32 = 37.5;

    fn contact(distance: f32, velocity: Vec3) -> WheelContact {
        WheelContact {
            distance,
            ray_direction: Vec3::NEG_Y,
            normal: Vec3::Y,
            point_velocity: velocity,
            wheel_forward: Vec3::NEG_Z,
        }
    }

    #[test]
    fn compressed_spring_pushes_up() {
        let wheel = WheelConfig::default();
        let rest = wheel.radius + wheel.suspension_rest_length;
        let (force, length) = wheel_force(
            &wheel,
            &WheelCommand::default(),
            &contact(rest - 0.1, Vec3::ZERO),
            SHARE,
            DT,
        );
        assert_relative_eq!(length, wheel.suspension_rest_length - 0.1, epsilon = 1e-5);
        assert!(force.y > 0.0);
        assert_relative_eq!(force.x, 0.0);

        // Fully extended: no load, so no grip either.
        let (force, _) = wheel_force(
            &wheel,
            &WheelCommand::default(),
            &contact(rest + wheel.max_suspension_travel, Vec3::X),
            SHARE,
            DT,
        );
        assert_eq!(force, Vec3::ZERO);
    }

    #[test]
    fn engine_force_follows_the_wheel() {
        let wheel = WheelConfig::default();
        let command = WheelCommand {
            engine_force: 500.0,
            ..Default::default()
        };
        let (force, _) = wheel_force(&wheel, &command, &contact(0.6, Vec3::ZERO), SHARE, DT);
        assert_relative_eq!(force.z, -500.0, epsilon = 1e-3);
    }

    #[test]
    fn brake_never_reverses_the_wheel() {
        let wheel = WheelConfig::default();
        let command = WheelCommand {
            brake: 40.0,
            ..Default::default()
        };
        // Rolling forward slowly: the brake can only cancel that speed.
        let slow = Vec3::new(0.0, 0.0, -0.01);
        let (force, _) = wheel_force(&wheel, &command, &contact(0.6, slow), SHARE, DT);
        assert!(force.z > 0.0);
        assert!(force.z <= 0.01 * SHARE / DT + 1e-3);

        // At speed the full brake applies.
        let fast = Vec3::new(0.0, 0.0, -10.0);
        let (force, _) = wheel_force(&wheel, &command, &contact(0.6, fast), SHARE, DT);
        assert_relative_eq!(force.z, 40.0 * BRAKE_DECELERATION_PER_UNIT * SHARE, epsilon = 1e-3);
    }

    #[test]
    fn lateral_grip_is_bounded_by_friction_slip() {
        let mut wheel = WheelConfig::default();
        let sliding = Vec3::new(20.0, 0.0, 0.0);
        let idle = WheelCommand::default();
        let (grippy, _) = wheel_force(&wheel, &idle, &contact(0.6, sliding), SHARE, DT);
        wheel.friction_slip = 0.6;
        let (loose, _) = wheel_force(&wheel, &idle, &contact(0.6, sliding), SHARE, DT);
        assert!(grippy.x < 0.0 && loose.x < 0.0);
        assert!(loose.x.abs() < grippy.x.abs());
        assert_relative_eq!(loose.x.abs() / grippy.x.abs(), 0.6 / 1.4, epsilon = 1e-4);
    }
}
