// racer_sim/src/simulation/config/mod.rs

//! This module handles loading, resolving, and validating all simulation
//! configuration from disk, including the prefab catalog system.

mod catalog;
mod resolver;

pub mod structs;

use std::path::{Path, PathBuf};

use bevy::prelude::*;
use figment::{
    providers::{Format, Toml},
    value::Value,
    Figment,
};
use racer_core::prelude::TuningError;
use thiserror::Error;

use crate::cli::Cli;
use crate::prelude::AppState;
pub use catalog::{load_catalog_from_disk, PrefabCatalog};
pub use resolver::resolve_agent_value;
pub use structs::{AgentConfig, DriverConfig, ScenarioConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("scenario file not found at {0:?}")]
    MissingScenario(PathBuf),
    #[error("prefab '{0}' not found in catalog")]
    PrefabNotFound(String),
    #[error("prefab '{0}' must resolve to a dictionary to be merged")]
    NotADictionary(String),
    #[error("prefab '{0}' refers back to itself")]
    CyclicPrefab(String),
    #[error("agent '{agent}' has invalid tuning: {source}")]
    Tuning {
        agent: String,
        #[source]
        source: TuningError,
    },
    #[error("agent '{agent}' chases unknown agent '{target}'")]
    UnknownTarget { agent: String, target: String },
    #[error(transparent)]
    Figment(#[from] figment::Error),
}

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app
            // A resource to hold the final, resolved agent configurations.
            .init_resource::<ResolvedAgents>()
            // The resource for the raw, unresolved catalog data.
            .init_resource::<PrefabCatalog>()
            // The resource for the top-level scenario config.
            .init_resource::<ScenarioConfig>()
            // Add all the systems that run at startup to load and process config.
            .add_systems(
                OnEnter(AppState::AssetLoading),
                (
                    load_catalog_from_disk,
                    load_and_resolve_scenario,
                    transition_to_scene_building,
                )
                    .chain(),
            );
    }
}

#[derive(Resource, Default, Debug)]
pub struct ResolvedAgents(pub Vec<AgentConfig>);

/// Reads a scenario file. Agents are left unresolved.
pub fn load_scenario(path: &Path) -> Result<ScenarioConfig, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::MissingScenario(path.to_path_buf()));
    }
    Ok(Figment::new().merge(Toml::file(path)).extract()?)
}

/// Expands the agent's prefab references, deserializes it and validates
/// every tuning section it carries.
pub fn resolve_agent(agent_value: &Value, catalog: &PrefabCatalog) -> Result<AgentConfig, ConfigError> {
    let resolved_value = resolve_agent_value(agent_value, catalog)?;
    let agent: AgentConfig = resolved_value.deserialize()?;

    let tuning_error = |source| ConfigError::Tuning {
        agent: agent.name.clone(),
        source,
    };
    agent.vehicle.validate().map_err(tuning_error)?;
    match &agent.driver {
        DriverConfig::Player { tuning, .. } => tuning.validate().map_err(tuning_error)?,
        DriverConfig::Autopilot { tuning, .. } => tuning.validate().map_err(tuning_error)?,
    }
    Ok(agent)
}

fn load_and_resolve_scenario(
    cli: Res<Cli>,
    mut scenario_config: ResMut<ScenarioConfig>,
    catalog: Res<PrefabCatalog>,
    mut resolved_agents: ResMut<ResolvedAgents>,
    mut exit: EventWriter<AppExit>,
) {
    info!("Loading scenario from: {:?}", cli.scenario);

    let mut loaded_config = match load_scenario(&cli.scenario) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load scenario: {}", e);
            exit.write(AppExit::error());
            return;
        }
    };

    // Command-line overrides win over the file.
    if let Some(seed) = cli.seed {
        loaded_config.simulation.seed = Some(seed);
    }
    if let Some(duration) = cli.duration {
        loaded_config.simulation.duration_seconds = duration;
    }

    // --- Resolve each agent against the catalog ---
    for agent_value in &loaded_config.agents {
        match resolve_agent(agent_value, &catalog) {
            Ok(agent_config) => {
                info!(
                    "Successfully resolved and deserialized agent: '{}'",
                    &agent_config.name
                );
                resolved_agents.0.push(agent_config);
            }
            Err(e) => {
                error!("Failed to resolve agent config: {}. Skipping agent.", e);
            }
        }
    }

    *scenario_config = loaded_config;
}

fn transition_to_scene_building(mut next_state: ResMut<NextState<AppState>>) {
    info!("Configuration loading and resolution complete. Transitioning to SceneBuilding state.");
    next_state.set(AppState::SceneBuilding);
}
