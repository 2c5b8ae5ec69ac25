// racer_sim/src/simulation/plugins/drivers/autopilot.rs

//! AI drivers: one `AutopilotController` per chassis, fed the shared
//! tracked-body snapshot every fixed step and told about physical contacts.

use crate::{
    prelude::*,
    simulation::{
        config::{structs::TargetConfig, ConfigError},
        core::{components::Tracked, prng::SimulationRng, transforms::apply_reset},
    },
};
use avian3d::prelude::*;

// --- BEVY COMPONENTS ---

#[derive(Component, Debug)]
pub struct AutopilotDriver(pub AutopilotController);

/// A chase target named in the config, resolved once every agent exists.
#[derive(Component, Debug, Clone)]
struct PendingChaseTarget(String);

// --- THE PLUGIN ---
pub struct AutopilotDriverPlugin;

impl Plugin for AutopilotDriverPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(AppState::SceneBuilding),
            (
                attach_autopilot_drivers.in_set(SceneBuildSet::ProcessDrivers),
                resolve_chase_targets.in_set(SceneBuildSet::Finalize),
            ),
        )
        .add_systems(
            FixedUpdate,
            (forward_contacts, tick_autopilots)
                .chain()
                .in_set(SimulationSet::Control),
        );
    }
}

/// Converts the configured target into a controller target. A named agent
/// is left for `resolve_chase_targets`.
fn initial_target(target: Option<&TargetConfig>) -> (Option<Target>, Option<PendingChaseTarget>) {
    match target {
        Some(TargetConfig::Point { position }) => (Some(Target::Point(*position)), None),
        Some(TargetConfig::Agent { name }) => (None, Some(PendingChaseTarget(name.clone()))),
        None => (None, None),
    }
}

// --- SYSTEMS ---

/// SPAWNING: Attaches an `AutopilotDriver`, seeded from the simulation RNG.
fn attach_autopilot_drivers(
    mut commands: Commands,
    mut rng: ResMut<SimulationRng>,
    request_query: Query<(Entity, &Name, &SpawnAgentConfigRequest)>,
) {
    for (entity, name, request) in &request_query {
        let DriverConfig::Autopilot {
            tuning,
            waypoints,
            target,
        } = &request.0.driver
        else {
            continue;
        };

        let (target, pending) = initial_target(target.as_ref());
        let handle = VehicleHandle::from_entity(entity);
        let seed = rng.next_seed();
        match AutopilotController::new(handle, tuning.clone(), waypoints.clone(), target, seed) {
            Ok(controller) => {
                info!(
                    "[SPAWN] '{}' follows {} waypoint(s), target {:?}",
                    name,
                    waypoints.len(),
                    target
                );
                let mut agent = commands.entity(entity);
                agent.insert((AutopilotDriver(controller), Tracked(BodyKind::Autopilot)));
                if let Some(pending) = pending {
                    agent.insert(pending);
                }
            }
            Err(e) => {
                error!("[SPAWN] Autopilot '{}' rejected: {}. Despawning.", name, e);
                commands.entity(entity).despawn();
            }
        }
    }
}

/// SPAWNING: Points every chasing autopilot at the agent it names.
fn resolve_chase_targets(
    mut commands: Commands,
    mut chasers: Query<(Entity, &Name, &PendingChaseTarget, &mut AutopilotDriver)>,
    agents: Query<(Entity, &Name), With<SpawnAgentConfigRequest>>,
) {
    for (entity, name, pending, mut driver) in &mut chasers {
        match agents.iter().find(|(_, n)| n.as_str() == pending.0) {
            Some((target, _)) => {
                driver
                    .0
                    .set_target(Some(Target::Vehicle(VehicleHandle::from_entity(target))));
                info!("[SPAWN] '{}' chases '{}'", name, pending.0);
            }
            None => {
                let err = ConfigError::UnknownTarget {
                    agent: name.to_string(),
                    target: pending.0.clone(),
                };
                warn!("{}. It will hold still once its path runs out.", err);
            }
        }
        commands.entity(entity).remove::<PendingChaseTarget>();
    }
}

/// One body of a contact pair as it was before the step that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ContactSide {
    /// `None` for untracked world geometry such as the ground.
    kind: Option<BodyKind>,
    velocity: Vec3,
}

/// What `own` should be told about touching `other`. Untracked geometry is
/// driven on, not hit, and yields nothing.
fn contact_report(own: ContactSide, other: ContactSide) -> Option<(BodyKind, f32)> {
    let kind = other.kind?;
    Some((kind, (own.velocity - other.velocity).length()))
}

/// Reports every new contact involving an autopilot, with the relative speed
/// of the two bodies just before the physics step that brought them together.
fn forward_contacts(
    mut collisions: EventReader<CollisionStarted>,
    mut drivers: Query<&mut AutopilotDriver>,
    bodies: Query<(Option<&PreStepVelocity>, Option<&Tracked>)>,
) {
    // Static bodies carry no pre-step velocity and count as standing still.
    let side = |entity: Entity| match bodies.get(entity) {
        Ok((velocity, tracked)) => ContactSide {
            kind: tracked.map(|t| t.0),
            velocity: velocity.map_or(Vec3::ZERO, |v| v.0),
        },
        Err(_) => ContactSide {
            kind: None,
            velocity: Vec3::ZERO,
        },
    };

    for CollisionStarted(a, b) in collisions.read() {
        let (side_a, side_b) = (side(*a), side(*b));
        for (own, own_side, other_side) in [(*a, side_a, side_b), (*b, side_b, side_a)] {
            let Ok(mut driver) = drivers.get_mut(own) else {
                continue;
            };
            if let Some((kind, relative_speed)) = contact_report(own_side, other_side) {
                driver.0.notify_contact(kind, relative_speed);
            }
        }
    }
}

/// RUNTIME: One autopilot tick per fixed step.
fn tick_autopilots(
    time: Res<Time>,
    tracked: Res<TrackedBodies>,
    mut effects: EventWriter<VehicleEffect>,
    mut query: Query<(
        Entity,
        &mut AutopilotDriver,
        &mut VehicleBody,
        &ChassisSnapshot,
        &mut Transform,
        &mut LinearVelocity,
        &mut AngularVelocity,
    )>,
) {
    let dt = time.delta_secs();
    for (entity, mut driver, mut body, snapshot, mut transform, mut lin_vel, mut ang_vel) in
        &mut query
    {
        if let Some(reset) = driver.0.tick(dt, &snapshot.0, &tracked.0, &mut body.0) {
            apply_reset(&reset, &mut transform, &mut lin_vel, &mut ang_vel);
        }
        for event in driver.0.drain_events() {
            effects.write(VehicleEffect { entity, event });
        }
    }
}
