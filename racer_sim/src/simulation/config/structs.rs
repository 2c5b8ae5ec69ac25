// racer_sim/src/simulation/config/structs.rs

use bevy::prelude::{Resource, Transform};
use figment::value::Value;
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use racer_core::prelude::{AutopilotTuning, DriveAction, PlayerTuning, VehicleTuning};
use serde::Deserialize;

use crate::simulation::utils::serde_helpers;

// =========================================================================
// == Top-Level Configuration Resource ==
// =========================================================================

/// The root of a `scenario.toml` file.
///
/// Agents stay as raw figment values here; they are resolved against the
/// prefab catalog before being deserialized into [`AgentConfig`].
#[derive(Resource, Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    #[serde(default)] // Use default if the [simulation] section is missing
    pub simulation: SimulationSettings,

    #[serde(default)]
    pub world: WorldSettings,

    // The TOML has `[[agents]]`, which becomes a Vec of raw values.
    #[serde(default)]
    pub agents: Vec<Value>,
}

// =========================================================================
// == Configuration Sub-Structs ==
// =========================================================================

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct SimulationSettings {
    /// Optional seed for the pseudo-random number generator for determinism.
    pub seed: Option<u64>,
    /// Simulated seconds to run before the app exits.
    #[serde(default = "default_duration")]
    pub duration_seconds: f32,
    /// Fixed physics step rate in Hz.
    #[serde(default = "default_physics_rate")]
    pub physics_rate_hz: f64,
}

fn default_duration() -> f32 {
    30.0
}

fn default_physics_rate() -> f64 {
    60.0
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            seed: None,
            duration_seconds: default_duration(),
            physics_rate_hz: default_physics_rate(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct WorldSettings {
    /// Half the side length of the square ground slab, in meters.
    #[serde(default = "default_ground_half_extent")]
    pub ground_half_extent: f32,
    /// Global gravity vector in m/s^2.
    #[serde(default = "default_gravity")]
    pub gravity: [f32; 3],
    #[serde(default)]
    pub walls: Vec<WallConfig>,
}

fn default_ground_half_extent() -> f32 {
    200.0
}

fn default_gravity() -> [f32; 3] {
    [0.0, -9.81, 0.0]
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            ground_half_extent: default_ground_half_extent(),
            gravity: default_gravity(),
            walls: Vec::new(),
        }
    }
}

/// A static box the cars can hit.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct WallConfig {
    pub name: String,
    #[serde(with = "serde_helpers::vec3_from_array")]
    pub center: Vector3<f32>,
    #[serde(with = "serde_helpers::vec3_from_array")]
    pub half_extents: Vector3<f32>,
    #[serde(default)]
    pub yaw_deg: f32,
}

// =========================================================================
// == Agents ==
// =========================================================================

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    pub name: String,
    #[serde(default)]
    pub starting_pose: Pose,
    #[serde(default)]
    pub vehicle: VehicleTuning,
    pub driver: DriverConfig,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct Pose {
    #[serde(with = "serde_helpers::vec3_from_array", default = "Vector3::zeros")]
    pub translation: Vector3<f32>,

    #[serde(
        rename = "rotation_deg",
        with = "serde_helpers::quat_from_euler_deg",
        default = "UnitQuaternion::identity"
    )]
    pub rotation: UnitQuaternion<f32>,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

impl Pose {
    pub fn to_isometry(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.translation), self.rotation)
    }

    pub fn to_bevy_transform(&self) -> Transform {
        crate::simulation::core::transforms::isometry_to_bevy_transform(&self.to_isometry())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type")] // The "type" field picks the variant
#[serde(rename_all = "PascalCase")] // "Autopilot" in TOML maps to `Autopilot`
pub enum DriverConfig {
    /// A human driver replaced by a timed key script.
    Player {
        #[serde(default)]
        tuning: PlayerTuning,
        #[serde(default)]
        script: Vec<ScriptedKey>,
    },
    Autopilot {
        #[serde(default)]
        tuning: AutopilotTuning,
        #[serde(default, with = "serde_helpers::vec3_list_from_arrays")]
        waypoints: Vec<Vector3<f32>>,
        #[serde(default)]
        target: Option<TargetConfig>,
    },
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KeyEdge {
    Down,
    Up,
}

/// One key event replayed at a fixed simulated time.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScriptedKey {
    /// Seconds since the run started.
    pub at: f32,
    pub action: DriveAction,
    pub edge: KeyEdge,
}

/// Where an autopilot heads once its waypoints are exhausted.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "PascalCase")]
pub enum TargetConfig {
    Point {
        #[serde(with = "serde_helpers::vec3_from_array")]
        position: Vector3<f32>,
    },
    /// Chase another agent by name.
    Agent { name: String },
}
