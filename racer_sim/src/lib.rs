// racer_sim/src/lib.rs

use bevy::prelude::*;

// Import the plugins defined within the simulation crate.
use crate::simulation::config::ConfigPlugin;
use crate::simulation::core::simulation_setup::SimulationSetupPlugin;
use crate::simulation::plugins::drivers::autopilot::AutopilotDriverPlugin;
use crate::simulation::plugins::drivers::player::PlayerDriverPlugin;
use crate::simulation::plugins::effects::EffectsLogPlugin;
use crate::simulation::plugins::vehicles::raycast::RaycastVehiclePlugin;
use crate::simulation::plugins::world::spawner::WorldSpawnerPlugin;

// This prelude is for convenience for other files WITHIN the racer_sim crate.
pub mod prelude;

// This module contains all the simulation-specific logic.
pub mod cli;
pub mod simulation;

/// The main plugin that brings together all the simulation parts.
/// `main.rs` just adds this one plugin to the Bevy App.
pub struct RacerSimulationPlugin;

impl Plugin for RacerSimulationPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            // Loads the scenario and resolves every agent against the catalog.
            ConfigPlugin,
            // Core setup (states, schedule sets, RNG, agent shells).
            SimulationSetupPlugin,
            // Ground plane and static walls.
            WorldSpawnerPlugin,
            // Chassis bodies and the raycast wheel integration.
            RaycastVehiclePlugin,
            // The two kinds of driver.
            PlayerDriverPlugin,
            AutopilotDriverPlugin,
            // Prints every effect the controllers emit.
            EffectsLogPlugin,
        ));
    }
}
