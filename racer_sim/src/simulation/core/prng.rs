// racer_sim/src/simulation/core/prng.rs

use bevy::prelude::Resource;
use rand::{Rng, SeedableRng};
use rand::rngs::OsRng;
use rand_chacha::ChaCha8Rng;

/// A newtype wrapper around `ChaCha8Rng` to make it a Bevy Resource.
/// This is the central, deterministic pseudo-random number generator for the simulation.
#[derive(Resource)]
pub struct SimulationRng(pub ChaCha8Rng);

impl SimulationRng {
    /// Seeds from the scenario, or from the OS when no seed is configured.
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self(ChaCha8Rng::seed_from_u64(seed)),
            None => Self(ChaCha8Rng::seed_from_u64(OsRng.gen())),
        }
    }

    /// Draws a seed for one vehicle's private generator.
    pub fn next_seed(&mut self) -> u64 {
        self.0.gen()
    }
}

impl Default for SimulationRng {
    fn default() -> Self {
        Self::from_seed(None)
    }
}
