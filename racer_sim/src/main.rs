// racer_sim/src/main.rs

//! Headless driving simulation.
//!
//! Loads a scenario, spawns every agent it describes, steps the physics at a
//! fixed rate and exits once the configured duration has been simulated.
//!
//! To run it:
//! `cargo run -p racer_sim -- --scenario assets/scenarios/00_chase.toml`

use std::time::Duration;

use avian3d::prelude::*;
use bevy::{
    app::ScheduleRunnerPlugin,
    log::LogPlugin,
    prelude::*,
    render::{settings::WgpuSettings, RenderPlugin},
    window::ExitCondition,
    winit::WinitPlugin,
};
use clap::Parser;

use racer_sim::cli::Cli;
use racer_sim::RacerSimulationPlugin;

fn main() -> AppExit {
    let cli = Cli::parse();

    let mut app = App::new();

    // --- 1. Core Bevy plugins, without a window or a GPU ---
    app.add_plugins(
        DefaultPlugins
            .set(LogPlugin {
                level: bevy::log::Level::INFO,
                // A good filter for focusing on our crates' logs during development.
                filter: "info,wgpu_core=error,wgpu_hal=error,racer_sim=debug,racer_core=debug"
                    .to_string(),
                ..default()
            })
            .set(WindowPlugin {
                primary_window: None,
                exit_condition: ExitCondition::DontExit,
                ..default()
            })
            .set(RenderPlugin {
                render_creation: WgpuSettings {
                    backends: None,
                    ..default()
                }
                .into(),
                ..default()
            })
            .disable::<WinitPlugin>(),
    )
    // Without winit something else has to drive the main loop.
    .add_plugins(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
        1.0 / 60.0,
    )))
    // --- 2. The Avian3D physics plugins ---
    .add_plugins(PhysicsPlugins::default())
    // The parsed command line, read by the config loader.
    .insert_resource(cli);

    // --- 3. Everything racing-specific ---
    app.add_plugins(RacerSimulationPlugin);

    info!("Starting racer simulation...");
    app.run()
}
