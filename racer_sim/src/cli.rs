use bevy::prelude::Resource;
use clap::Parser;
use std::path::PathBuf;

/// Racer: a headless driving-control simulation.
///
/// This struct defines the command-line arguments accepted by the
/// `racer_sim` binary.
#[derive(Parser, Debug, Resource, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the scenario TOML file to run.
    #[arg(short, long, default_value = "assets/scenarios/00_chase.toml")]
    pub scenario: PathBuf,

    /// Overrides the scenario's PRNG seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Overrides how many simulated seconds to run before exiting.
    #[arg(short, long)]
    pub duration: Option<f32>,
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            scenario: PathBuf::from("assets/scenarios/00_chase.toml"),
            seed: None,
            duration: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_are_optional() {
        let cli = Cli::parse_from(["racer_sim"]);
        assert_eq!(cli.scenario, Cli::default().scenario);
        assert_eq!(cli.seed, None);

        let cli = Cli::parse_from(["racer_sim", "-s", "a.toml", "--seed", "7", "-d", "12.5"]);
        assert_eq!(cli.scenario, PathBuf::from("a.toml"));
        assert_eq!(cli.seed, Some(7));
        assert_eq!(cli.duration, Some(12.5));
    }
}
