// racer_sim/src/prelude.rs

// Re-export the entire Bevy prelude for convenience.
pub use bevy::prelude::*;

// Re-export the racer_core prelude so pure types like `ChassisState`,
// `VehicleDynamics` and the controllers are at hand.
pub use racer_core::prelude::*;

// Re-export common simulation-specific types for easy access in other plugins.
pub use crate::cli::Cli;
pub use crate::simulation::config::structs::*;
pub use crate::simulation::core::app_state::{AppState, SceneBuildSet, SimulationSet};
pub use crate::simulation::core::components::{
    ChassisSnapshot, PreStepVelocity, SpawnAgentConfigRequest, StaticObstacle, Suspension, VehicleBody,
};
pub use crate::simulation::core::events::VehicleEffect;
pub use crate::simulation::core::snapshot::TrackedBodies;
