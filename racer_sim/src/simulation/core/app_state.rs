// racer_sim/src/simulation/core/app_state.rs

use bevy::{ecs::schedule::SystemSet, prelude::States};

/// Defines the major phases of the application's lifecycle.
#[derive(States, Debug, Clone, Eq, PartialEq, Hash, Default)]
pub enum AppState {
    /// The initial state. Configuration is read and resolved here.
    #[default]
    AssetLoading,

    /// Configuration is resolved. We are now building the scene by spawning
    /// entities from the config.
    SceneBuilding,

    /// The scene is built. The main simulation loop is now running.
    Running,
}

/// System sets to control the order of execution during the SceneBuilding state.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SceneBuildSet {
    /// Pass 1: Create agent shells and attach the main request component.
    CreateRequests,

    /// Pass 2: Build the vehicle dynamics adapter for every agent.
    ProcessVehicle,

    /// Pass 3: Attach the player or autopilot controller.
    ProcessDrivers,

    /// Pass 4: Attach all physical bodies (RigidBody, Collider).
    Physics,

    /// Pass 5: Wire up anything that needs every agent to exist (chase targets).
    Finalize,

    /// Pass 6: Remove all temporary request components.
    Cleanup,
}

// =========================================================================
// == Main Simulation Sets (The "Data Flow Graph") ==
// =========================================================================

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimulationSet {
    /// Reads the physics results into chassis snapshots and the shared
    /// tracked-body list. Runs first.
    Precomputation,
    /// Replays scripted key events into the player controllers.
    Input,
    /// Player and autopilot ticks: chassis state in, wheel commands out.
    Control,
    /// Converts wheel commands into forces on the chassis.
    Actuation,
    /// End-of-step checks such as the run duration.
    Validation,
}
