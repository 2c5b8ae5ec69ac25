// racer_core/src/player/mod.rs

//! The player control state machine.
//!
//! Discrete key events update a held-action set; every fixed step `tick`
//! reads that set plus the chassis state, resolves one of
//! {Idle, Accelerating, Braking, Reversing} and the orthogonal drift flag,
//! and writes the resulting intent to the vehicle.

mod drift;
mod gearbox;
mod input;

pub use drift::{DriftState, DriftTransition, DriftTuning};
pub use gearbox::{GearOutput, GearPhase, Gearbox, GearboxTuning};
pub use input::{DriveAction, HeldKeys};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::effects::{EventQueue, VehicleEvent};
use crate::error::{positive, TuningError};
use crate::orientation::{FlipEvent, FlipMonitor, FlipTuning, ResetTransform};
use crate::timing::sanitize_dt;
use crate::types::{ChassisState, DriveIntent};
use crate::vehicle::{VehicleDynamics, WheelBackend};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    /// Steer angle for a held turn key, before the drift multiplier.
    /// The vehicle's own max steer angle still bounds the result.
    pub steer_angle: f32,
    /// Engine force in N while reversing.
    pub reverse_force: f32,
    /// Brake force while the handbrake is held and the car is rolling.
    pub brake_force: f32,
    /// Brake force applied when nothing is held, so the car coasts to a stop.
    pub slow_down_brake: f32,
    /// Speed in m/s above which the car counts as moving for braking.
    pub moving_speed: f32,
    pub gearbox: GearboxTuning,
    pub drift: DriftTuning,
    pub flip: FlipTuning,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            steer_angle: 0.3,
            reverse_force: 600.0,
            brake_force: 40.0,
            slow_down_brake: 8.0,
            moving_speed: 0.5,
            gearbox: GearboxTuning::default(),
            drift: DriftTuning::default(),
            flip: FlipTuning::default(),
        }
    }
}

impl PlayerTuning {
    pub fn validate(&self) -> Result<(), TuningError> {
        positive("player.steer_angle", self.steer_angle)?;
        positive("player.reverse_force", self.reverse_force)?;
        positive("player.brake_force", self.brake_force)?;
        positive("player.slow_down_brake", self.slow_down_brake)?;
        positive("player.moving_speed", self.moving_speed)?;
        self.gearbox.validate()?;
        self.drift.validate()?;
        self.flip.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DriveState {
    #[default]
    Idle,
    Accelerating,
    Braking,
    Reversing,
}

#[derive(Debug, Clone)]
pub struct PlayerController {
    tuning: PlayerTuning,
    keys: HeldKeys,
    gearbox: Gearbox,
    drift: DriftState,
    flip: FlipMonitor,
    state: DriveState,
    braking: bool,
    last_speed: f32,
    last_intent: DriveIntent,
    events: EventQueue,
    disposed: bool,
}

impl PlayerController {
    pub fn new(tuning: PlayerTuning) -> Result<Self, TuningError> {
        tuning.validate()?;
        Ok(Self {
            gearbox: Gearbox::new(tuning.gearbox.clone()),
            flip: FlipMonitor::new(tuning.flip),
            tuning,
            keys: HeldKeys::default(),
            drift: DriftState::default(),
            state: DriveState::Idle,
            braking: false,
            last_speed: 0.0,
            last_intent: DriveIntent::IDLE,
            events: EventQueue::default(),
            disposed: false,
        })
    }

    // --- Input ---

    pub fn on_key_down(&mut self, action: DriveAction) {
        if !self.disposed {
            self.keys.press(action);
        }
    }

    pub fn on_key_up(&mut self, action: DriveAction) {
        self.keys.release(action);
    }

    /// Name-based variant for input layers that only carry strings.
    /// Returns `false` for unknown names, which are otherwise ignored.
    pub fn on_key_down_named(&mut self, name: &str) -> bool {
        match DriveAction::from_name(name) {
            Some(action) => {
                self.on_key_down(action);
                true
            }
            None => {
                warn!(name, "ignoring unknown drive action");
                false
            }
        }
    }

    pub fn on_key_up_named(&mut self, name: &str) -> bool {
        match DriveAction::from_name(name) {
            Some(action) => {
                self.on_key_up(action);
                true
            }
            None => false,
        }
    }

    // --- Control ---

    /// Runs one fixed step. Returns a transform to write back to the body
    /// when an auto-reset fires.
    pub fn tick<B: WheelBackend>(
        &mut self,
        dt: f32,
        chassis: &ChassisState,
        vehicle: &mut VehicleDynamics<B>,
    ) -> Option<ResetTransform> {
        if self.disposed {
            return None;
        }
        let dt = sanitize_dt(dt)?;
        let speed = chassis.speed();
        self.last_speed = speed;

        let reset = match self.flip.tick(dt, chassis) {
            Some(FlipEvent::Detected(kind)) => {
                debug!(?kind, "player vehicle flipped");
                self.events.push(VehicleEvent::FlipDetected { kind });
                None
            }
            Some(FlipEvent::Reset(reset)) => {
                info!(kind = ?reset.kind, "auto-resetting player vehicle");
                self.events.push(VehicleEvent::AutoReset { kind: reset.kind });
                if self.drift.force_stop().is_some() {
                    vehicle.set_drift_mode(false);
                    self.events.push(VehicleEvent::DriftEnded);
                }
                self.gearbox.release();
                Some(reset)
            }
            None => None,
        };

        self.update_drift(dt, speed, vehicle);
        let drifting = self.drift.is_active();

        // Brake beats accelerate beats reverse beats idle.
        let braking = self.keys.is_held(DriveAction::Handbrake)
            && speed > self.tuning.moving_speed
            && !drifting;
        let state = if braking {
            DriveState::Braking
        } else if self.keys.wants_forward() {
            DriveState::Accelerating
        } else if self.keys.wants_reverse() {
            DriveState::Reversing
        } else {
            DriveState::Idle
        };
        self.transition(state, braking);

        let (throttle_force, brake_force) = match state {
            DriveState::Accelerating => {
                let out = self.gearbox.engage(dt);
                if let Some((from, to)) = out.shift_started {
                    debug!(from, to, "gear shift");
                    self.events.push(VehicleEvent::GearShift { from, to });
                }
                (out.force, 0.0)
            }
            DriveState::Reversing => (-self.tuning.reverse_force, 0.0),
            DriveState::Braking => (0.0, self.tuning.brake_force),
            DriveState::Idle => (0.0, self.tuning.slow_down_brake),
        };
        if state != DriveState::Accelerating {
            self.gearbox.release();
        }

        let multiplier = if drifting {
            self.tuning.drift.steer_multiplier
        } else {
            1.0
        };
        let steer_angle = self.keys.steer_direction() * self.tuning.steer_angle * multiplier;

        let intent = DriveIntent {
            steer_angle,
            throttle_force,
            brake_force,
        }
        .bounded(vehicle.max_steer_angle());
        vehicle.apply_intent(intent);
        self.last_intent = intent;

        reset
    }

    fn update_drift<B: WheelBackend>(
        &mut self,
        dt: f32,
        speed: f32,
        vehicle: &mut VehicleDynamics<B>,
    ) {
        let wanted = self.keys.is_held(DriveAction::Handbrake)
            && self.keys.is_turning()
            && self.keys.is_held(DriveAction::Accelerate)
            && speed > self.tuning.drift.min_speed;

        match self.drift.update(wanted, dt, &self.tuning.drift) {
            Some(DriftTransition::Started) => {
                if self.braking {
                    self.braking = false;
                    self.events.push(VehicleEvent::BrakeEnded);
                }
                vehicle.set_drift_mode(true);
                self.events.push(VehicleEvent::DriftStarted);
                debug!(speed, "drift started");
            }
            Some(DriftTransition::Ended) => {
                vehicle.set_drift_mode(false);
                self.events.push(VehicleEvent::DriftEnded);
                debug!("drift ended");
            }
            None => {}
        }
    }

    /// Emits the edge events between the previous and the new state.
    fn transition(&mut self, state: DriveState, braking: bool) {
        if braking != self.braking {
            self.braking = braking;
            self.events.push(if braking {
                VehicleEvent::BrakeStarted
            } else {
                VehicleEvent::BrakeEnded
            });
        }
        let was_reversing = self.state == DriveState::Reversing;
        let is_reversing = state == DriveState::Reversing;
        if was_reversing != is_reversing {
            self.events.push(if is_reversing {
                VehicleEvent::ReverseLightsOn
            } else {
                VehicleEvent::ReverseLightsOff
            });
        }
        self.state = state;
    }

    /// Stops the controller for good. Later ticks neither compute nor apply anything.
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.keys.clear();
    }

    pub fn drain_events(&mut self) -> Vec<VehicleEvent> {
        self.events.drain()
    }

    // --- Telemetry ---

    pub fn state(&self) -> DriveState {
        self.state
    }

    pub fn is_drifting(&self) -> bool {
        self.drift.is_active()
    }

    pub fn is_braking(&self) -> bool {
        self.braking
    }

    pub fn gear_phase(&self) -> usize {
        self.gearbox.phase()
    }

    pub fn is_shifting(&self) -> bool {
        self.gearbox.is_shifting()
    }

    pub fn speed_kmh(&self) -> f32 {
        self.last_speed * 3.6
    }

    pub fn last_intent(&self) -> DriveIntent {
        self.last_intent
    }

    pub fn held_keys(&self) -> HeldKeys {
        self.keys
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn tuning(&self) -> &PlayerTuning {
        &self.tuning
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::{VehicleTuning, FRONT_LEFT, REAR_LEFT};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    const DT: f32 = 1.0 / 60.0;

    fn setup() -> (PlayerController, VehicleDynamics) {
        let player = PlayerController::new(PlayerTuning::default()).unwrap();
        let vehicle = VehicleDynamics::with_slots(VehicleTuning::default()).unwrap();
        (player, vehicle)
    }

    fn moving(speed: f32) -> ChassisState {
        let mut chassis = ChassisState::default();
        chassis.linear_velocity = Vector3::new(0.0, 0.0, -speed);
        chassis
    }

    #[test]
    fn idle_applies_slow_down_brake() {
        let (mut player, mut vehicle) = setup();
        player.tick(DT, &moving(2.0), &mut vehicle);
        assert_eq!(player.state(), DriveState::Idle);
        assert_eq!(vehicle.last_intent().brake_force, 8.0);
        assert_eq!(vehicle.last_intent().throttle_force, 0.0);
    }

    #[test]
    fn accelerate_and_reverse_cancel() {
        let (mut player, mut vehicle) = setup();
        player.on_key_down(DriveAction::Accelerate);
        player.on_key_down(DriveAction::Reverse);
        player.tick(DT, &moving(0.0), &mut vehicle);
        assert_eq!(player.state(), DriveState::Idle);
    }

    #[test]
    fn handbrake_beats_accelerate_when_moving() {
        let (mut player, mut vehicle) = setup();
        player.on_key_down(DriveAction::Accelerate);
        player.on_key_down(DriveAction::Handbrake);
        player.tick(DT, &moving(3.0), &mut vehicle);
        assert_eq!(player.state(), DriveState::Braking);
        assert!(player.is_braking());
        assert_eq!(vehicle.last_intent().brake_force, 40.0);
        assert_eq!(player.drain_events(), vec![VehicleEvent::BrakeStarted]);

        player.on_key_up(DriveAction::Handbrake);
        player.tick(DT, &moving(3.0), &mut vehicle);
        assert_eq!(player.state(), DriveState::Accelerating);
        assert_eq!(player.drain_events(), vec![VehicleEvent::BrakeEnded]);
    }

    #[test]
    fn drift_needs_every_condition() {
        let (mut player, mut vehicle) = setup();
        player.on_key_down(DriveAction::Accelerate);
        player.on_key_down(DriveAction::Handbrake);
        player.on_key_down(DriveAction::SteerLeft);

        // Too slow: plain braking.
        player.tick(DT, &moving(3.0), &mut vehicle);
        assert!(!player.is_drifting());

        player.tick(DT, &moving(8.0), &mut vehicle);
        assert!(player.is_drifting());
        assert!(vehicle.is_drifting());
        assert_eq!(player.state(), DriveState::Accelerating);
        let events = player.drain_events();
        assert!(events.contains(&VehicleEvent::DriftStarted));
        assert_eq!(events.last(), Some(&VehicleEvent::DriftStarted));
        assert_eq!(
            vehicle.backend().wheel(REAR_LEFT).unwrap().friction_slip,
            0.6
        );
        // Drift amplifies the keyboard steer.
        assert_relative_eq!(
            vehicle.backend().wheel(FRONT_LEFT).unwrap().steer,
            0.45,
            epsilon = 1e-6
        );
    }

    #[test]
    fn drift_survives_until_minimum_duration() {
        let (mut player, mut vehicle) = setup();
        for action in [
            DriveAction::Accelerate,
            DriveAction::Handbrake,
            DriveAction::SteerRight,
        ] {
            player.on_key_down(action);
        }
        player.tick(DT, &moving(8.0), &mut vehicle);
        assert!(player.is_drifting());

        player.on_key_up(DriveAction::SteerRight);
        let mut elapsed = 0.0;
        while player.is_drifting() {
            player.tick(DT, &moving(8.0), &mut vehicle);
            elapsed += DT;
            assert!(elapsed < 0.5, "drift never ended");
        }
        assert!(elapsed >= 0.15 - 1e-4);
        assert!(!vehicle.is_drifting());
    }

    #[test]
    fn reverse_toggles_lights() {
        let (mut player, mut vehicle) = setup();
        player.on_key_down(DriveAction::Reverse);
        player.tick(DT, &moving(0.0), &mut vehicle);
        assert_eq!(vehicle.last_intent().throttle_force, -600.0);
        player.on_key_up(DriveAction::Reverse);
        player.tick(DT, &moving(0.0), &mut vehicle);
        assert_eq!(
            player.drain_events(),
            vec![VehicleEvent::ReverseLightsOn, VehicleEvent::ReverseLightsOff]
        );
    }

    #[test]
    fn named_keys_and_dispose() {
        let (mut player, mut vehicle) = setup();
        assert!(player.on_key_down_named("accelerate"));
        assert!(!player.on_key_down_named("honk"));
        player.tick(DT, &moving(0.0), &mut vehicle);
        assert_relative_eq!(vehicle.last_intent().throttle_force, 800.0);
        assert!(player.on_key_up_named("ACCELERATE"));
        assert!(!player.held_keys().is_held(DriveAction::Accelerate));
        assert!(player.on_key_down_named("accelerate"));

        player.dispose();
        vehicle.apply_drive(0.0, 0.0, 0.0);
        assert!(player.tick(DT, &moving(0.0), &mut vehicle).is_none());
        assert_eq!(vehicle.last_intent(), DriveIntent::IDLE);
    }

    #[test]
    fn bad_dt_skips_the_tick() {
        let (mut player, mut vehicle) = setup();
        player.on_key_down(DriveAction::Accelerate);
        player.tick(f32::NAN, &moving(0.0), &mut vehicle);
        player.tick(-1.0, &moving(0.0), &mut vehicle);
        assert_eq!(vehicle.last_intent(), DriveIntent::IDLE);
        assert_eq!(player.gear_phase(), 0);
    }
}
