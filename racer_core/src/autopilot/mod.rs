// racer_core/src/autopilot/mod.rs

//! The autonomous driving controller.
//!
//! Physics steps call [`AutopilotController::tick`] at whatever rate they
//! run; the controller decides at its own cadence and re-applies its last
//! intent in between. One decision runs, in order:
//!
//! 1. orientation check (a flipped car holds zero intent until reset),
//! 2. destination check (terminal once reached),
//! 3. stuck and collision detection,
//! 4. the recovery maneuver, if one is running,
//! 5. otherwise path following, avoidance and speed control.

pub mod avoidance;
pub mod path;
pub mod recovery;
pub mod steering;
pub mod stuck;

use nalgebra::Vector3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::effects::{EventQueue, RecoveryReason, VehicleEvent};
use crate::error::{positive, TuningError};
use crate::orientation::{FlipEvent, FlipMonitor, FlipTuning, ResetTransform};
use crate::timing::{sanitize_dt, DecisionClock};
use crate::types::{BodyKind, ChassisState, DriveIntent, TrackedBody, VehicleHandle};
use crate::vehicle::{VehicleDynamics, WheelBackend};

use avoidance::AvoidanceTuning;
use path::{flat_distance, PathState, PathTuning};
use recovery::{Recovery, RecoveryPhase, RecoveryTuning};
use steering::{SpeedTuning, SteeringFilter, SteeringTuning};
use stuck::{StuckRecord, StuckTuning};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AutopilotTuning {
    /// How often the controller makes a decision, in Hz.
    pub decision_rate_hz: f32,
    /// Engine force (N) at full throttle.
    pub max_engine_force: f32,
    /// Brake force at a full proportional brake.
    pub max_brake_force: f32,
    /// Brake held once the destination is reached.
    pub arrival_brake: f32,
    pub path: PathTuning,
    pub steering: SteeringTuning,
    pub speed: SpeedTuning,
    pub avoidance: AvoidanceTuning,
    pub stuck: StuckTuning,
    pub recovery: RecoveryTuning,
    pub flip: FlipTuning,
}

impl Default for AutopilotTuning {
    fn default() -> Self {
        Self {
            decision_rate_hz: 10.0,
            max_engine_force: 2000.0,
            max_brake_force: 20.0,
            arrival_brake: 10.0,
            path: PathTuning::default(),
            steering: SteeringTuning::default(),
            speed: SpeedTuning::default(),
            avoidance: AvoidanceTuning::default(),
            stuck: StuckTuning::default(),
            recovery: RecoveryTuning::default(),
            flip: FlipTuning::autopilot(),
        }
    }
}

impl AutopilotTuning {
    pub fn validate(&self) -> Result<(), TuningError> {
        positive("autopilot.decision_rate_hz", self.decision_rate_hz)?;
        positive("autopilot.max_engine_force", self.max_engine_force)?;
        positive("autopilot.max_brake_force", self.max_brake_force)?;
        positive("autopilot.arrival_brake", self.arrival_brake)?;
        self.path.validate()?;
        self.steering.validate()?;
        self.speed.validate()?;
        self.avoidance.validate()?;
        self.stuck.validate()?;
        self.recovery.validate()?;
        self.flip.validate()
    }
}

/// Where the autopilot is ultimately heading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    /// A fixed end point; reaching it ends driving.
    Point(Vector3<f32>),
    /// Another vehicle to chase, looked up in the snapshot every tick.
    Vehicle(VehicleHandle),
}

/// A coarse summary of what the controller is doing, for HUDs and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutopilotMode {
    Following,
    Avoiding,
    Recovering(RecoveryPhase),
    Flipped,
    Arrived,
    Disposed,
}

#[derive(Debug, Clone)]
pub struct AutopilotController {
    handle: VehicleHandle,
    tuning: AutopilotTuning,
    path: PathState,
    target: Option<Target>,
    target_position: Option<Vector3<f32>>,
    clock: DecisionClock,
    steer_filter: SteeringFilter,
    stuck: StuckRecord,
    recovery: Recovery,
    flip: FlipMonitor,
    rng: ChaCha8Rng,
    intent: DriveIntent,
    /// Normalized throttle of the last decision, read by the stuck check.
    throttle: f32,
    avoiding: bool,
    danger_pending: bool,
    collision_cooldown: f32,
    arrived: bool,
    warned_no_target: bool,
    last_speed: f32,
    events: EventQueue,
    disposed: bool,
}

impl AutopilotController {
    pub fn new(
        handle: VehicleHandle,
        tuning: AutopilotTuning,
        waypoints: Vec<Vector3<f32>>,
        target: Option<Target>,
        seed: u64,
    ) -> Result<Self, TuningError> {
        tuning.validate()?;
        let target_position = match target {
            Some(Target::Point(point)) => Some(point),
            _ => None,
        };
        Ok(Self {
            handle,
            clock: DecisionClock::from_hz(tuning.decision_rate_hz),
            flip: FlipMonitor::new(tuning.flip),
            tuning,
            path: PathState::new(waypoints),
            target,
            target_position,
            steer_filter: SteeringFilter::default(),
            stuck: StuckRecord::default(),
            recovery: Recovery::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            intent: DriveIntent::IDLE,
            throttle: 0.0,
            avoiding: false,
            danger_pending: false,
            collision_cooldown: 0.0,
            arrived: false,
            warned_no_target: false,
            last_speed: 0.0,
            events: EventQueue::default(),
            disposed: false,
        })
    }

    // --- Inputs from the outside world ---

    /// Called by the physics binding when this body starts touching another.
    pub fn notify_contact(&mut self, other: BodyKind, relative_speed: f32) {
        if self.disposed || self.recovery.is_active() || self.collision_cooldown > 0.0 {
            return;
        }
        if relative_speed >= self.tuning.stuck.impact_speed {
            debug!(handle = self.handle.0, ?other, relative_speed, "impact reported");
            self.stuck.note_impact(relative_speed);
        }
    }

    pub fn set_target(&mut self, target: Option<Target>) {
        self.target = target;
        self.target_position = match target {
            Some(Target::Point(point)) => Some(point),
            _ => None,
        };
        self.arrived = false;
    }

    /// Replaces the path. Progress restarts at the first waypoint of the new path.
    pub fn set_waypoints(&mut self, waypoints: Vec<Vector3<f32>>) {
        self.path.replace(waypoints);
        self.arrived = false;
    }

    // --- Control ---

    /// Runs one physics step. Returns a transform to write back to the body
    /// when an upside-down reset fires.
    pub fn tick<B: WheelBackend>(
        &mut self,
        dt: f32,
        chassis: &ChassisState,
        others: &[TrackedBody],
        vehicle: &mut VehicleDynamics<B>,
    ) -> Option<ResetTransform> {
        if self.disposed {
            return None;
        }
        let dt = sanitize_dt(dt)?;
        self.collision_cooldown = (self.collision_cooldown - dt).max(0.0);
        self.refresh_target(others);

        let reset = match self.clock.advance(dt) {
            Some(step) => self.decide(step, chassis, others, vehicle.max_steer_angle()),
            None => None,
        };
        vehicle.apply_intent(self.intent);
        reset
    }

    fn refresh_target(&mut self, others: &[TrackedBody]) {
        if let Some(Target::Vehicle(handle)) = self.target {
            self.target_position = others
                .iter()
                .find(|body| body.handle == handle)
                .map(|body| body.position);
        }
    }

    fn decide(
        &mut self,
        step: f32,
        chassis: &ChassisState,
        others: &[TrackedBody],
        max_steer: f32,
    ) -> Option<ResetTransform> {
        self.last_speed = chassis.speed();

        // 1. Orientation.
        match self.flip.tick(step, chassis) {
            Some(FlipEvent::Detected(kind)) => {
                debug!(handle = self.handle.0, ?kind, "autopilot vehicle flipped");
                self.events.push(VehicleEvent::FlipDetected { kind });
            }
            Some(FlipEvent::Reset(reset)) => {
                info!(handle = self.handle.0, kind = ?reset.kind, "auto-resetting autopilot vehicle");
                self.events.push(VehicleEvent::AutoReset { kind: reset.kind });
                self.clear_driving_state();
                return Some(reset);
            }
            None => {}
        }
        if self.flip.is_flipped() {
            self.intent = DriveIntent::IDLE;
            self.throttle = 0.0;
            self.danger_pending = false;
            return None;
        }

        // 2. Destination.
        if self.arrived || self.check_arrival(chassis) {
            self.hold_at_destination();
            return None;
        }

        // 3. Stuck and collision detection.
        self.stuck.record(chassis.position, self.tuning.stuck.history);
        if !self.recovery.is_active() {
            if let Some(reason) = self.recovery_trigger(chassis, others) {
                self.start_recovery(reason, chassis, others);
            }
        }

        // 4. Recovery.
        if self.recovery.is_active() {
            let command = self.recovery.tick(step, chassis, &self.tuning.recovery);
            if command.finished {
                info!(handle = self.handle.0, "recovery finished");
                self.events.push(VehicleEvent::CollisionRecoveryEnded);
                self.stuck.clear();
                self.steer_filter.reset();
                self.collision_cooldown = self.tuning.stuck.collision_cooldown;
            }
            self.intent = DriveIntent {
                steer_angle: command.steer * max_steer,
                throttle_force: command.engine_force,
                brake_force: 0.0,
            };
            self.throttle = command.engine_force / self.tuning.max_engine_force;
            return None;
        }

        // 5. Path following, avoidance and speed control.
        self.drive(chassis, others, max_steer);
        None
    }

    fn check_arrival(&mut self, chassis: &ChassisState) -> bool {
        // Chasing a vehicle never ends.
        if matches!(self.target, Some(Target::Vehicle(_))) {
            return false;
        }
        let Some(destination) = self.destination() else {
            return false;
        };
        let distance = flat_distance(&chassis.position, &destination);
        // Written so a NaN distance never counts as arrival.
        if !(distance < self.tuning.path.destination_tolerance) {
            return false;
        }
        info!(handle = self.handle.0, "destination reached");
        self.arrived = true;
        self.end_recovery();
        self.stuck.clear();
        self.danger_pending = false;
        self.avoiding = false;
        self.events.push(VehicleEvent::DestinationReached);
        true
    }

    fn hold_at_destination(&mut self) {
        self.intent = DriveIntent {
            steer_angle: 0.0,
            throttle_force: 0.0,
            brake_force: self.tuning.arrival_brake,
        };
        self.throttle = 0.0;
    }

    fn recovery_trigger(&mut self, chassis: &ChassisState, others: &[TrackedBody]) -> Option<RecoveryReason> {
        // Only start the maneuver if the obstacle is still inside the danger radius.
        if std::mem::take(&mut self.danger_pending)
            && avoidance::evaluate(self.handle, chassis, others, &self.tuning.avoidance).danger
        {
            return Some(RecoveryReason::Danger);
        }
        if self.collision_cooldown <= 0.0 {
            if let Some(speed) = stuck::detect_impact(self.handle, chassis, others, &self.tuning.stuck) {
                self.stuck.note_impact(speed);
            }
        }
        if let Some(speed) = self.stuck.take_impact() {
            debug!(handle = self.handle.0, speed, "impact");
            return Some(RecoveryReason::Collision);
        }

        let near_target = match (self.target, self.tuning.stuck.attack_distance) {
            (Some(Target::Vehicle(_)), Some(attack)) => self
                .target_position
                .is_some_and(|p| flat_distance(&chassis.position, &p) < attack),
            _ => false,
        };
        let stuck = self
            .stuck
            .check(chassis.speed(), self.throttle, &self.tuning.stuck);
        (stuck && !near_target).then_some(RecoveryReason::Stuck)
    }

    fn start_recovery(&mut self, reason: RecoveryReason, chassis: &ChassisState, others: &[TrackedBody]) {
        let direction = recovery::choose_direction(
            self.handle,
            chassis,
            others,
            self.tuning.recovery.probe_distance,
            &mut self.rng,
        );
        info!(handle = self.handle.0, ?reason, direction, "recovery started");
        self.recovery.start(reason, direction, chassis.position);
        self.stuck.clear();
        self.avoiding = false;
        self.events.push(VehicleEvent::CollisionRecoveryStarted { reason });
    }

    fn drive(&mut self, chassis: &ChassisState, others: &[TrackedBody], max_steer: f32) {
        self.path.advance(&chassis.position, &self.tuning.path);
        let aim = self
            .path
            .look_ahead(&chassis.position, &self.tuning.path)
            .or(self.target_position);

        let Some(aim) = aim else {
            if !self.warned_no_target {
                warn!(handle = self.handle.0, "no path or target; holding still");
                self.warned_no_target = true;
            }
            self.intent = DriveIntent {
                steer_angle: 0.0,
                throttle_force: 0.0,
                brake_force: self.tuning.arrival_brake,
            };
            self.throttle = 0.0;
            return;
        };
        self.warned_no_target = false;

        let raw = steering::raw_steer(&chassis.forward(), &(aim - chassis.position), &self.tuning.steering);
        let smoothed = self
            .steer_filter
            .update(raw * max_steer, self.tuning.steering.smoothing);

        let avoidance = avoidance::evaluate(self.handle, chassis, others, &self.tuning.avoidance);
        self.avoiding = avoidance.is_active();
        if avoidance.danger {
            // Bias and slow down now; the maneuver starts on the next decision.
            self.danger_pending = true;
        }
        let steer_angle = (smoothed + avoidance.steer_bias * max_steer).clamp(-max_steer, max_steer);

        let distance = flat_distance(&chassis.position, &self.destination().unwrap_or(aim));
        let target_speed = steering::target_speed(distance, self.avoiding, &self.tuning.speed);
        let (throttle, brake) =
            steering::throttle_command(target_speed, chassis.forward_speed(), self.tuning.speed.gain);
        let throttle = throttle * (1.0 - avoidance.closeness);

        self.throttle = throttle;
        self.intent = DriveIntent {
            steer_angle,
            throttle_force: throttle * self.tuning.max_engine_force,
            brake_force: brake * self.tuning.max_brake_force,
        };
    }

    /// Final point of the drive: the target if there is one, else the last waypoint.
    pub fn destination(&self) -> Option<Vector3<f32>> {
        self.target_position.or_else(|| self.path.last().copied())
    }

    fn clear_driving_state(&mut self) {
        self.intent = DriveIntent::IDLE;
        self.throttle = 0.0;
        self.steer_filter.reset();
        self.stuck.clear();
        self.end_recovery();
        self.danger_pending = false;
        self.avoiding = false;
    }

    /// Abandons a running maneuver, closing it with an end event.
    fn end_recovery(&mut self) {
        if self.recovery.is_active() {
            info!(handle = self.handle.0, "recovery abandoned");
            self.recovery.cancel();
            self.events.push(VehicleEvent::CollisionRecoveryEnded);
        }
    }

    /// Stops the controller for good. Later ticks neither compute nor apply anything.
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.intent = DriveIntent::IDLE;
    }

    pub fn drain_events(&mut self) -> Vec<VehicleEvent> {
        self.events.drain()
    }

    // --- Telemetry ---

    pub fn mode(&self) -> AutopilotMode {
        if self.disposed {
            AutopilotMode::Disposed
        } else if self.flip.is_flipped() {
            AutopilotMode::Flipped
        } else if self.arrived {
            AutopilotMode::Arrived
        } else if self.recovery.is_active() {
            AutopilotMode::Recovering(self.recovery.phase())
        } else if self.avoiding {
            AutopilotMode::Avoiding
        } else {
            AutopilotMode::Following
        }
    }

    pub fn handle(&self) -> VehicleHandle {
        self.handle
    }

    pub fn path_index(&self) -> usize {
        self.path.index()
    }

    pub fn path_len(&self) -> usize {
        self.path.len()
    }

    pub fn recovery_phase(&self) -> RecoveryPhase {
        self.recovery.phase()
    }

    pub fn recovery_direction(&self) -> f32 {
        self.recovery.direction()
    }

    pub fn is_arrived(&self) -> bool {
        self.arrived
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn stuck_samples(&self) -> usize {
        self.stuck.samples()
    }

    pub fn intent(&self) -> DriveIntent {
        self.intent
    }

    pub fn speed_kmh(&self) -> f32 {
        self.last_speed * 3.6
    }

    pub fn tuning(&self) -> &AutopilotTuning {
        &self.tuning
    }
}
