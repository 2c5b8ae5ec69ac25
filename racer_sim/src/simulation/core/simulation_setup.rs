// racer_sim/src/simulation/core/simulation_setup.rs

use avian3d::prelude::Gravity;

use crate::prelude::*;
use crate::simulation::config::ResolvedAgents;
use crate::simulation::core::prng::SimulationRng;
use crate::simulation::core::snapshot::{record_pre_step_velocities, refresh_snapshots};

pub struct SimulationSetupPlugin;

/// Simulated time since the scene started running, and when to stop.
#[derive(Resource, Debug, Default)]
pub struct RunClock {
    pub elapsed: f32,
    pub limit: f32,
    finished: bool,
}

impl Plugin for SimulationSetupPlugin {
    fn build(&self, app: &mut App) {
        // --- INITIALIZE STATE, RESOURCES & EVENTS ---
        app.init_state::<AppState>()
            // Replaced with a seeded generator once the scenario is known.
            .init_resource::<SimulationRng>()
            // Rebuilt at the start of every fixed step.
            .init_resource::<TrackedBodies>()
            .init_resource::<RunClock>()
            // Every controller effect is re-published as a Bevy event.
            .add_event::<VehicleEffect>();

        // --- CONFIGURE THE SPAWNING PIPELINE ---
        // This chain of SystemSets guarantees the correct spawning order.
        app.configure_sets(
            OnEnter(AppState::SceneBuilding),
            (
                SceneBuildSet::CreateRequests,
                SceneBuildSet::ProcessVehicle,
                SceneBuildSet::ProcessDrivers,
                SceneBuildSet::Physics,
                SceneBuildSet::Finalize,
                SceneBuildSet::Cleanup,
            )
                .chain(),
        );

        app.add_systems(
            OnEnter(AppState::SceneBuilding),
            (
                configure_simulation.in_set(SceneBuildSet::CreateRequests),
                // This system reads the config and creates entities with "request" components.
                spawn_agent_shells
                    .in_set(SceneBuildSet::CreateRequests)
                    .after(configure_simulation),
                // This system removes the temporary request components after all processing is done.
                cleanup_spawn_requests.in_set(SceneBuildSet::Cleanup),
                // This system transitions to the main simulation loop after building is complete.
                transition_to_running
                    .in_set(SceneBuildSet::Cleanup)
                    .after(cleanup_spawn_requests),
            ),
        );

        // Configure the runtime schedule graph. Avian steps the world in
        // `FixedPostUpdate`, after all of these.
        app.configure_sets(
            FixedUpdate,
            (
                SimulationSet::Precomputation,
                SimulationSet::Input,
                SimulationSet::Control,
                SimulationSet::Actuation,
                SimulationSet::Validation,
            )
                .chain()
                .run_if(in_state(AppState::Running)),
        );

        app.add_systems(
            FixedUpdate,
            (
                (advance_run_clock, refresh_snapshots).in_set(SimulationSet::Precomputation),
                (record_pre_step_velocities, enforce_run_duration).in_set(SimulationSet::Validation),
            ),
        );
    }
}

/// Applies the `[simulation]` and `[world]` settings that live in resources.
fn configure_simulation(
    scenario: Res<ScenarioConfig>,
    mut rng: ResMut<SimulationRng>,
    mut fixed_time: ResMut<Time<Fixed>>,
    mut gravity: ResMut<Gravity>,
    mut clock: ResMut<RunClock>,
) {
    let settings = &scenario.simulation;

    // --- 1. The Deterministic PRNG ---
    *rng = SimulationRng::from_seed(settings.seed);
    match settings.seed {
        Some(seed) => info!("Simulation seeded with {}", seed),
        None => warn!("No seed configured, this run is not reproducible"),
    }

    // --- 2. Fixed physics rate ---
    if settings.physics_rate_hz > 0.0 && settings.physics_rate_hz.is_finite() {
        fixed_time.set_timestep_hz(settings.physics_rate_hz);
    } else {
        warn!(
            "Ignoring invalid physics rate {} Hz, keeping {:?}",
            settings.physics_rate_hz,
            fixed_time.timestep()
        );
    }

    // --- 3. World gravity and run length ---
    gravity.0 = Vec3::from_array(scenario.world.gravity);
    *clock = RunClock {
        elapsed: 0.0,
        limit: settings.duration_seconds.max(0.0),
        finished: false,
    };
}

fn spawn_agent_shells(mut commands: Commands, resolved_agents: Res<ResolvedAgents>) {
    for agent_config in &resolved_agents.0 {
        info!(
            "[SPAWN] Posting spawn request for resolved agent: {}",
            &agent_config.name
        );

        let start_transform = agent_config.starting_pose.to_bevy_transform();

        commands.spawn((
            Name::new(agent_config.name.clone()),
            start_transform,
            // Several passes of the spawning pipeline read the config.
            SpawnAgentConfigRequest(agent_config.clone()),
        ));
    }
}

fn cleanup_spawn_requests(mut commands: Commands, query: Query<Entity, With<SpawnAgentConfigRequest>>) {
    info!("[CLEANUP] Removing spawn request components.");
    for entity in &query {
        commands.entity(entity).remove::<SpawnAgentConfigRequest>();
    }
}

/// Runs once at the end of the `OnEnter(SceneBuilding)` chain.
fn transition_to_running(mut next_state: ResMut<NextState<AppState>>) {
    info!("Scene building complete. Transitioning to Running state.");
    next_state.set(AppState::Running);
}

fn advance_run_clock(time: Res<Time>, mut clock: ResMut<RunClock>) {
    clock.elapsed += time.delta_secs();
}

/// Logs where every car ended up and exits once the run time is used up.
fn enforce_run_duration(
    mut clock: ResMut<RunClock>,
    mut exit: EventWriter<AppExit>,
    vehicles: Query<(&Name, &ChassisSnapshot)>,
) {
    if clock.finished || clock.elapsed < clock.limit {
        return;
    }
    clock.finished = true;
    for (name, snapshot) in &vehicles {
        let chassis = &snapshot.0;
        info!(
            "[FINAL] {}: position ({:.1}, {:.1}, {:.1}), {:.1} km/h",
            name,
            chassis.position.x,
            chassis.position.y,
            chassis.position.z,
            chassis.speed_kmh()
        );
    }
    info!("Ran for {:.1} simulated seconds, exiting.", clock.elapsed);
    exit.write(AppExit::Success);
}
