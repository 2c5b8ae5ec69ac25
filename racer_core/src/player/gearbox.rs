// racer_core/src/player/gearbox.rs

//! Staged acceleration: the engine force ramps through a list of gear
//! phases, with a short reduced-force shift between each pair.

use serde::Deserialize;

use crate::error::{positive, within, TuningError};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GearPhase {
    /// Engine force cap in N while in this phase.
    pub max_force: f32,
    /// Seconds spent in this phase before shifting up. May be infinite.
    pub duration: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GearboxTuning {
    pub phases: Vec<GearPhase>,
    /// Length of the reduced-force shift between phases.
    pub shift_duration: f32,
    /// Fraction of the phase's max force delivered while shifting.
    pub shift_force_ratio: f32,
}

impl Default for GearboxTuning {
    fn default() -> Self {
        let phase = |max_force, duration| GearPhase {
            max_force,
            duration,
        };
        Self {
            phases: vec![
                phase(800.0, 0.3),
                phase(1200.0, 1.0),
                phase(1600.0, 1.5),
                phase(2000.0, f32::INFINITY),
            ],
            shift_duration: 0.25,
            shift_force_ratio: 0.3,
        }
    }
}

impl GearboxTuning {
    pub fn validate(&self) -> Result<(), TuningError> {
        if self.phases.is_empty() {
            return Err(TuningError::EmptyGearbox);
        }
        for phase in &self.phases {
            positive("gearbox.phases.max_force", phase.max_force)?;
            // Infinite durations are allowed: the last phase usually never ends.
            if phase.duration.is_nan() || phase.duration <= 0.0 {
                return Err(TuningError::NonPositive {
                    field: "gearbox.phases.duration",
                    value: phase.duration,
                });
            }
        }
        positive("gearbox.shift_duration", self.shift_duration)?;
        within("gearbox.shift_force_ratio", self.shift_force_ratio, 0.0, 1.0)
    }
}

/// One tick of gearbox output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GearOutput {
    pub force: f32,
    /// Set on the tick a shift begins: `(from, to)` phase indices.
    pub shift_started: Option<(usize, usize)>,
}

#[derive(Debug, Clone, Default)]
pub struct Gearbox {
    tuning: GearboxTuning,
    phase: usize,
    phase_elapsed: f32,
    /// Elapsed time of the shift in progress.
    shifting: Option<f32>,
}

impl Gearbox {
    pub fn new(tuning: GearboxTuning) -> Self {
        Self {
            tuning,
            ..Default::default()
        }
    }

    /// Advances the gearbox while the accelerator is held.
    pub fn engage(&mut self, dt: f32) -> GearOutput {
        let Some(current) = self.tuning.phases.get(self.phase).copied() else {
            return GearOutput {
                force: 0.0,
                shift_started: None,
            };
        };
        let last = self.tuning.phases.len() - 1;

        if let Some(elapsed) = self.shifting.as_mut() {
            *elapsed += dt;
            if *elapsed >= self.tuning.shift_duration {
                self.shifting = None;
                self.phase = (self.phase + 1).min(last);
                self.phase_elapsed = 0.0;
                return GearOutput {
                    force: self.tuning.phases[self.phase].max_force,
                    shift_started: None,
                };
            }
            return GearOutput {
                force: current.max_force * self.tuning.shift_force_ratio,
                shift_started: None,
            };
        }

        self.phase_elapsed += dt;
        if self.phase < last && self.phase_elapsed >= current.duration {
            self.shifting = Some(0.0);
            return GearOutput {
                force: current.max_force * self.tuning.shift_force_ratio,
                shift_started: Some((self.phase, self.phase + 1)),
            };
        }
        GearOutput {
            force: current.max_force,
            shift_started: None,
        }
    }

    /// Drops back to the first phase when the accelerator is released.
    pub fn release(&mut self) {
        self.phase = 0;
        self.phase_elapsed = 0.0;
        self.shifting = None;
    }

    pub fn phase(&self) -> usize {
        self.phase
    }

    pub fn is_shifting(&self) -> bool {
        self.shifting.is_some()
    }

    pub fn tuning(&self) -> &GearboxTuning {
        &self.tuning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn shifts_once_per_boundary_at_reduced_force() {
        let mut gearbox = Gearbox::new(GearboxTuning::default());
        let mut shifts = Vec::new();
        let mut shift_forces = Vec::new();
        for _ in 0..200 {
            let was_shifting = gearbox.is_shifting();
            let phase = gearbox.phase();
            let out = gearbox.engage(0.02);
            if let Some(shift) = out.shift_started {
                shifts.push(shift);
            }
            if gearbox.is_shifting() || (was_shifting && gearbox.phase() == phase) {
                shift_forces.push((phase, out.force));
            }
        }
        assert_eq!(shifts, vec![(0, 1), (1, 2), (2, 3)]);
        assert_eq!(gearbox.phase(), 3);
        for (phase, force) in shift_forces {
            let nominal = GearboxTuning::default().phases[phase].max_force;
            assert_relative_eq!(force, nominal * 0.3, epsilon = 1e-3);
        }
    }

    #[test]
    fn release_resets_to_first_phase() {
        let mut gearbox = Gearbox::new(GearboxTuning::default());
        for _ in 0..40 {
            gearbox.engage(0.05);
        }
        assert!(gearbox.phase() > 0);
        gearbox.release();
        assert_eq!(gearbox.phase(), 0);
        assert_relative_eq!(gearbox.engage(0.01).force, 800.0);
    }

    #[test]
    fn empty_gearbox_is_rejected() {
        let tuning = GearboxTuning {
            phases: Vec::new(),
            ..Default::default()
        };
        assert_eq!(tuning.validate(), Err(TuningError::EmptyGearbox));
        assert!(GearboxTuning::default().validate().is_ok());
    }
}
