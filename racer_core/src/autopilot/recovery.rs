// racer_core/src/autopilot/recovery.rs

//! The reverse → turn → forward maneuver used to free a stuck or collided car.

use nalgebra::Vector3;
use rand::Rng;
use serde::Deserialize;

use crate::effects::RecoveryReason;
use crate::error::{positive, TuningError};
use crate::types::{flatten, ChassisState, TrackedBody, VehicleHandle};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecoveryTuning {
    pub reverse_duration: f32,
    pub turn_duration: f32,
    pub forward_duration: f32,
    /// Engine force (N) for the first half of the reverse phase; the second half uses half.
    pub reverse_force: f32,
    /// Engine force (N) during the forward phase.
    pub forward_force: f32,
    /// Reverse ends early once the car has backed up this far.
    pub early_exit_distance: f32,
    /// Radius scanned on each side when choosing the turn direction.
    pub probe_distance: f32,
}

impl Default for RecoveryTuning {
    fn default() -> Self {
        Self {
            reverse_duration: 1.5,
            turn_duration: 0.6,
            forward_duration: 0.5,
            reverse_force: 1200.0,
            forward_force: 800.0,
            early_exit_distance: 3.0,
            probe_distance: 10.0,
        }
    }
}

impl RecoveryTuning {
    pub fn validate(&self) -> Result<(), TuningError> {
        positive("recovery.reverse_duration", self.reverse_duration)?;
        positive("recovery.turn_duration", self.turn_duration)?;
        positive("recovery.forward_duration", self.forward_duration)?;
        positive("recovery.reverse_force", self.reverse_force)?;
        positive("recovery.forward_force", self.forward_force)?;
        positive("recovery.early_exit_distance", self.early_exit_distance)?;
        positive("recovery.probe_distance", self.probe_distance)
    }

    /// Upper bound on how long one maneuver can last.
    pub fn total_duration(&self) -> f32 {
        self.reverse_duration + self.turn_duration + self.forward_duration
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecoveryPhase {
    #[default]
    Idle,
    Reverse,
    Turn,
    Forward,
}

/// What the maneuver wants this decision. `steer` is normalized to [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecoveryCommand {
    pub steer: f32,
    pub engine_force: f32,
    /// Set on the decision the maneuver returns to idle.
    pub finished: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recovery {
    phase: RecoveryPhase,
    phase_elapsed: f32,
    /// +1 to end up heading left, -1 for right.
    direction: f32,
    start_position: Vector3<f32>,
    reason: Option<RecoveryReason>,
}

/// Picks the side with fewer bodies within `probe_distance`; `+1` is left.
/// A tie is broken by `rng`.
pub fn choose_direction<R: Rng + ?Sized>(
    own: VehicleHandle,
    chassis: &ChassisState,
    others: &[TrackedBody],
    probe_distance: f32,
    rng: &mut R,
) -> f32 {
    let right = flatten(&chassis.right());
    let (mut left_count, mut right_count) = (0usize, 0usize);
    for body in others.iter().filter(|b| b.handle != own) {
        let offset = flatten(&(body.position - chassis.position));
        if offset.norm() > probe_distance {
            continue;
        }
        let side = right.dot(&offset);
        if side > 0.0 {
            right_count += 1;
        } else if side < 0.0 {
            left_count += 1;
        }
    }
    match left_count.cmp(&right_count) {
        std::cmp::Ordering::Less => 1.0,
        std::cmp::Ordering::Greater => -1.0,
        std::cmp::Ordering::Equal => {
            if rng.gen_bool(0.5) {
                1.0
            } else {
                -1.0
            }
        }
    }
}

impl Recovery {
    pub fn start(&mut self, reason: RecoveryReason, direction: f32, position: Vector3<f32>) {
        self.phase = RecoveryPhase::Reverse;
        self.phase_elapsed = 0.0;
        self.direction = if direction < 0.0 { -1.0 } else { 1.0 };
        self.start_position = position;
        self.reason = Some(reason);
    }

    /// Advances the maneuver by one decision step.
    pub fn tick(&mut self, dt: f32, chassis: &ChassisState, tuning: &RecoveryTuning) -> RecoveryCommand {
        self.phase_elapsed += dt;

        if self.phase == RecoveryPhase::Reverse {
            let backed_up = flatten(&(chassis.position - self.start_position)).norm();
            if self.phase_elapsed >= tuning.reverse_duration
                || backed_up >= tuning.early_exit_distance
            {
                self.enter(RecoveryPhase::Turn);
            }
        }
        if self.phase == RecoveryPhase::Turn && self.phase_elapsed >= tuning.turn_duration {
            self.enter(RecoveryPhase::Forward);
        }
        if self.phase == RecoveryPhase::Forward && self.phase_elapsed >= tuning.forward_duration {
            self.enter(RecoveryPhase::Idle);
            self.reason = None;
            return RecoveryCommand {
                steer: 0.0,
                engine_force: 0.0,
                finished: true,
            };
        }

        match self.phase {
            RecoveryPhase::Reverse => {
                let progress = self.phase_elapsed / tuning.reverse_duration;
                let intensity = if progress < 0.5 { 1.0 } else { 0.5 };
                // Strong, then moderate, then a slight straightening turn.
                let ramp = if progress < 1.0 / 3.0 {
                    1.0
                } else if progress < 2.0 / 3.0 {
                    0.6
                } else {
                    -0.3
                };
                // Backing up with the wheels turned away swings the nose toward `direction`.
                RecoveryCommand {
                    steer: -self.direction * ramp,
                    engine_force: -tuning.reverse_force * intensity,
                    finished: false,
                }
            }
            RecoveryPhase::Turn => RecoveryCommand {
                steer: self.direction,
                engine_force: 0.0,
                finished: false,
            },
            RecoveryPhase::Forward => RecoveryCommand {
                steer: 0.0,
                engine_force: tuning.forward_force,
                finished: false,
            },
            RecoveryPhase::Idle => RecoveryCommand {
                steer: 0.0,
                engine_force: 0.0,
                finished: false,
            },
        }
    }

    fn enter(&mut self, phase: RecoveryPhase) {
        self.phase = phase;
        self.phase_elapsed = 0.0;
    }

    pub fn cancel(&mut self) {
        *self = Self::default();
    }

    pub fn is_active(&self) -> bool {
        self.phase != RecoveryPhase::Idle
    }

    pub fn phase(&self) -> RecoveryPhase {
        self.phase
    }

    pub fn direction(&self) -> f32 {
        self.direction
    }

    pub fn reason(&self) -> Option<RecoveryReason> {
        self.reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BodyKind;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn parked(id: u64, x: f32) -> TrackedBody {
        TrackedBody {
            handle: VehicleHandle(id),
            kind: BodyKind::Autopilot,
            position: Vector3::new(x, 0.0, 0.0),
            velocity: Vector3::zeros(),
        }
    }

    #[test]
    fn turns_toward_the_emptier_side() {
        let chassis = ChassisState::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let crowded_right = [parked(2, 3.0), parked(3, 5.0), parked(4, -4.0)];
        assert_eq!(
            choose_direction(VehicleHandle(1), &chassis, &crowded_right, 10.0, &mut rng),
            1.0
        );
        let crowded_left = [parked(2, -3.0), parked(3, -5.0)];
        assert_eq!(
            choose_direction(VehicleHandle(1), &chassis, &crowded_left, 10.0, &mut rng),
            -1.0
        );
    }

    #[test]
    fn ties_are_reproducible_from_the_seed() {
        let chassis = ChassisState::default();
        let pick = |seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            (0..8)
                .map(|_| choose_direction(VehicleHandle(1), &chassis, &[], 10.0, &mut rng))
                .collect::<Vec<_>>()
        };
        assert_eq!(pick(42), pick(42));
    }

    #[test]
    fn phases_run_in_order_and_terminate() {
        let tuning = RecoveryTuning::default();
        let chassis = ChassisState::default();
        let mut recovery = Recovery::default();
        recovery.start(RecoveryReason::Stuck, 1.0, Vector3::zeros());

        let dt = 0.1;
        let mut phases = vec![recovery.phase()];
        let mut elapsed = 0.0;
        loop {
            let command = recovery.tick(dt, &chassis, &tuning);
            elapsed += dt;
            match recovery.phase() {
                RecoveryPhase::Reverse => assert!(command.engine_force < 0.0),
                RecoveryPhase::Turn => {
                    assert_eq!(command.engine_force, 0.0);
                    assert_eq!(command.steer, 1.0);
                }
                RecoveryPhase::Forward => {
                    assert!(command.engine_force > 0.0);
                    assert_eq!(command.steer, 0.0);
                }
                RecoveryPhase::Idle => assert!(command.finished),
            }
            if phases.last() != Some(&recovery.phase()) {
                phases.push(recovery.phase());
            }
            if command.finished {
                break;
            }
            assert!(elapsed < tuning.total_duration() + 4.0 * dt);
        }
        assert_eq!(
            phases,
            vec![
                RecoveryPhase::Reverse,
                RecoveryPhase::Turn,
                RecoveryPhase::Forward,
                RecoveryPhase::Idle
            ]
        );
        assert!(!recovery.is_active());
        assert_eq!(recovery.reason(), None);
    }

    #[test]
    fn reverse_halves_and_exits_early() {
        let tuning = RecoveryTuning::default();
        let mut chassis = ChassisState::default();
        let mut recovery = Recovery::default();
        recovery.start(RecoveryReason::Collision, -1.0, Vector3::zeros());

        let first = recovery.tick(0.1, &chassis, &tuning);
        assert_eq!(first.engine_force, -1200.0);
        assert_eq!(first.steer, 1.0);
        let late = recovery.tick(0.9, &chassis, &tuning);
        assert_eq!(late.engine_force, -600.0);

        chassis.position = Vector3::new(0.0, 0.0, 3.5);
        recovery.tick(0.1, &chassis, &tuning);
        assert_eq!(recovery.phase(), RecoveryPhase::Turn);
    }
}
