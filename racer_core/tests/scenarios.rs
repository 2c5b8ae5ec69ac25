// racer_core/tests/scenarios.rs

//! End-to-end driving scenarios. A tiny kinematic bicycle model stands in
//! for the physics engine: it reads the wheel slots the controllers write
//! and integrates a chassis state from them.

use approx::assert_relative_eq;
use nalgebra::{UnitQuaternion, Vector3};
use racer_core::autopilot::recovery::RecoveryPhase;
use racer_core::orientation::{heading, up_vector};
use racer_core::prelude::*;
use racer_core::vehicle::FRONT_LEFT;

const DT: f32 = 1.0 / 60.0;
const MASS: f32 = 150.0;
const WHEELBASE: f32 = 2.6;
const BRAKE_DECEL: f32 = 0.25;
const DRAG: f32 = 0.05;

struct Kinematic {
    chassis: ChassisState,
    yaw: f32,
    speed: f32,
    /// Nothing may pass below this z (a wall across the track).
    wall_z: Option<f32>,
}

impl Kinematic {
    fn new(position: Vector3<f32>, yaw: f32) -> Self {
        Self {
            chassis: ChassisState::at_rest(position, yaw),
            yaw,
            speed: 0.0,
            wall_z: None,
        }
    }

    fn step(&mut self, slots: &WheelSlots, dt: f32) {
        let wheel = *slots.wheel(FRONT_LEFT).unwrap();
        self.speed += wheel.engine_force / MASS * dt;
        let decel = (wheel.brake * BRAKE_DECEL + DRAG * self.speed.abs()) * dt;
        if self.speed.abs() <= decel {
            self.speed = 0.0;
        } else {
            self.speed -= decel * self.speed.signum();
        }
        self.yaw += self.speed * wheel.steer.tan() / WHEELBASE * dt;

        let forward = Vector3::new(-self.yaw.sin(), 0.0, -self.yaw.cos());
        let mut position = self.chassis.position + forward * self.speed * dt;
        if let Some(wall) = self.wall_z {
            if position.z < wall {
                position.z = wall;
                self.speed = 0.0;
            }
        }
        self.chassis = ChassisState {
            position,
            orientation: UnitQuaternion::from_axis_angle(&Vector3::y_axis(), self.yaw),
            linear_velocity: forward * self.speed,
            angular_velocity: Vector3::zeros(),
        };
    }
}

fn vehicle() -> VehicleDynamics {
    VehicleDynamics::with_slots(VehicleTuning::default()).unwrap()
}

fn autopilot(waypoints: Vec<Vector3<f32>>, target: Option<Target>) -> AutopilotController {
    AutopilotController::new(VehicleHandle(1), AutopilotTuning::default(), waypoints, target, 11)
        .unwrap()
}

#[test]
fn steer_is_bounded_for_every_input() {
    let mut car = vehicle();
    let max = car.max_steer_angle();
    for angle in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY, 10.0, -10.0, 0.3, -0.49] {
        car.apply_intent(DriveIntent {
            steer_angle: angle,
            ..DriveIntent::IDLE
        });
        for wheel in car.backend().iter() {
            assert!(wheel.steer.abs() <= max, "{angle} escaped the bound");
        }
        if !angle.is_finite() {
            assert_eq!(car.last_intent().steer_angle, 0.0);
        }
    }

    // A poisoned target position must not leak NaN into the wheels either.
    let mut ai = autopilot(Vec::new(), Some(Target::Point(Vector3::new(f32::NAN, 0.0, 5.0))));
    ai.tick(0.1, &ChassisState::default(), &[], &mut car);
    assert!(car.backend().iter().all(|w| w.steer.is_finite() && w.steer.abs() <= max));
}

#[test]
fn car_against_a_wall_recovers_once() {
    let mut ai = autopilot(Vec::new(), Some(Target::Point(Vector3::new(0.0, 0.0, -100.0))));
    let mut car = vehicle();
    let mut body = Kinematic::new(Vector3::zeros(), 0.0);
    body.wall_z = Some(0.0);

    let mut started_at = None;
    let mut ended_at = None;
    let mut starts = 0;
    let mut saw_turn = false;
    let mut saw_forward = false;
    let mut time = 0.0;

    while ended_at.is_none() && time < 10.0 {
        ai.tick(DT, &body.chassis, &[], &mut car);
        body.step(car.backend(), DT);
        time += DT;

        for event in ai.drain_events() {
            match event {
                VehicleEvent::CollisionRecoveryStarted { reason } => {
                    assert_eq!(reason, RecoveryReason::Stuck);
                    assert_eq!(ai.stuck_samples(), 0, "stuck record clears on trigger");
                    starts += 1;
                    started_at = Some(time);
                }
                VehicleEvent::CollisionRecoveryEnded => ended_at = Some(time),
                _ => {}
            }
        }

        let intent = ai.intent();
        match ai.recovery_phase() {
            RecoveryPhase::Reverse => assert!(intent.throttle_force < 0.0),
            RecoveryPhase::Turn => {
                saw_turn = true;
                assert_eq!(intent.throttle_force, 0.0);
                assert_relative_eq!(intent.steer_angle, ai.recovery_direction() * 0.5);
            }
            RecoveryPhase::Forward => {
                saw_forward = true;
                assert!(intent.throttle_force > 0.0);
                assert!(intent.throttle_force < ai.tuning().max_engine_force);
                assert_eq!(intent.steer_angle, 0.0);
            }
            RecoveryPhase::Idle => {}
        }
    }

    let (started_at, ended_at) = (started_at.unwrap(), ended_at.unwrap());
    assert_eq!(starts, 1);
    assert!(saw_turn && saw_forward);
    // Ten samples to fill the window, then three failed checks two decisions apart.
    assert!(started_at > 1.0 && started_at < 2.0, "triggered at {started_at}");
    let allowed = ai.tuning().recovery.total_duration() + 0.3;
    assert!(ended_at - started_at <= allowed);
    assert_eq!(ai.recovery_phase(), RecoveryPhase::Idle);
    assert_eq!(ai.mode(), AutopilotMode::Following);
}

#[test]
fn player_in_the_danger_radius_is_avoided() {
    let target = Some(Target::Point(Vector3::new(0.0, 0.0, -100.0)));
    let player = TrackedBody {
        handle: VehicleHandle(99),
        kind: BodyKind::Player,
        position: Vector3::new(1.0, 0.0, -3.0),
        velocity: Vector3::zeros(),
    };

    let mut baseline = autopilot(Vec::new(), target);
    let mut baseline_car = vehicle();
    baseline.tick(0.1, &ChassisState::default(), &[], &mut baseline_car);

    let mut ai = autopilot(Vec::new(), target);
    let mut car = vehicle();
    ai.tick(0.1, &ChassisState::default(), &[player], &mut car);

    let closeness = (12.0 - 10f32.sqrt()) / 12.0;
    assert_eq!(ai.mode(), AutopilotMode::Avoiding);
    assert!(car.last_intent().steer_angle > baseline_car.last_intent().steer_angle);
    assert!(car.last_intent().steer_angle > 0.0, "player is on the right, steer left");
    assert_relative_eq!(
        car.last_intent().throttle_force,
        baseline_car.last_intent().throttle_force * (1.0 - closeness),
        epsilon = 1.0
    );

    // The maneuver follows on the next decision.
    ai.tick(0.1, &ChassisState::default(), &[player], &mut car);
    assert_eq!(ai.mode(), AutopilotMode::Recovering(RecoveryPhase::Reverse));
    assert_eq!(
        ai.drain_events(),
        vec![VehicleEvent::CollisionRecoveryStarted {
            reason: RecoveryReason::Danger
        }]
    );
}

#[test]
fn path_index_never_decreases() {
    let waypoints: Vec<_> = (1..=8)
        .map(|i| Vector3::new(2.0 * i as f32, 0.0, -10.0 * i as f32))
        .collect();
    let mut ai = autopilot(waypoints, None);
    let mut car = vehicle();
    let mut body = Kinematic::new(Vector3::zeros(), 0.0);

    let mut last = 0;
    for _ in 0..(20.0 / DT) as usize {
        ai.tick(DT, &body.chassis, &[], &mut car);
        body.step(car.backend(), DT);
        assert!(ai.path_index() >= last);
        last = ai.path_index();
    }
    assert!(last > 0);
}

#[test]
fn flipped_player_resets_once_keeping_heading() {
    let mut player = PlayerController::new(PlayerTuning::default()).unwrap();
    let mut car = vehicle();
    let yaw = -2.2;
    let mut chassis = ChassisState::at_rest(Vector3::new(4.0, 0.3, 4.0), yaw);
    chassis.orientation *= UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 2.9);
    assert!(up_vector(&chassis.orientation).y < 0.3);

    let mut resets = Vec::new();
    for _ in 0..(4.0 / DT) as usize {
        if let Some(reset) = player.tick(DT, &chassis, &mut car) {
            chassis.position = reset.position;
            chassis.orientation = reset.orientation;
            resets.push(reset);
        }
    }
    assert_eq!(resets.len(), 1);
    assert_relative_eq!(up_vector(&resets[0].orientation).y, 1.0, epsilon = 1e-5);
    assert_relative_eq!(heading(&resets[0].orientation), yaw, epsilon = 1e-3);
    let autoresets = player
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, VehicleEvent::AutoReset { .. }))
        .count();
    assert_eq!(autoresets, 1);
}

#[test]
fn gear_shifts_once_per_boundary_at_thirty_percent() {
    let mut player = PlayerController::new(PlayerTuning::default()).unwrap();
    let mut car = vehicle();
    let mut body = Kinematic::new(Vector3::zeros(), 0.0);
    player.on_key_down(DriveAction::Accelerate);

    let phases = player.tuning().gearbox.phases.clone();
    let mut shifts = Vec::new();
    for _ in 0..(5.0 / DT) as usize {
        player.tick(DT, &body.chassis, &mut car);
        body.step(car.backend(), DT);
        if player.is_shifting() {
            let nominal = phases[player.gear_phase()].max_force;
            assert_relative_eq!(car.last_intent().throttle_force, nominal * 0.3, epsilon = 1e-3);
        }
        for event in player.drain_events() {
            if let VehicleEvent::GearShift { from, to } = event {
                shifts.push((from, to));
            }
        }
    }
    assert_eq!(shifts, vec![(0, 1), (1, 2), (2, 3)]);
    assert_eq!(player.gear_phase(), 3);

    player.on_key_up(DriveAction::Accelerate);
    player.tick(DT, &body.chassis, &mut car);
    assert_eq!(player.gear_phase(), 0);
}

#[test]
fn drift_ends_within_a_tick_after_the_minimum_duration() {
    let mut player = PlayerController::new(PlayerTuning::default()).unwrap();
    let mut car = vehicle();
    let mut body = Kinematic::new(Vector3::zeros(), 0.0);
    player.on_key_down(DriveAction::Accelerate);

    let mut time = 0.0;
    while body.speed < 6.0 {
        player.tick(DT, &body.chassis, &mut car);
        body.step(car.backend(), DT);
        time += DT;
        assert!(!player.is_drifting());
        assert!(time < 10.0);
    }

    player.on_key_down(DriveAction::Handbrake);
    player.on_key_down(DriveAction::SteerLeft);
    player.tick(DT, &body.chassis, &mut car);
    body.step(car.backend(), DT);
    assert!(player.is_drifting());
    assert!(car.is_drifting());
    let started = time;

    // Release the accelerator almost immediately.
    player.on_key_up(DriveAction::Accelerate);
    let mut ended = None;
    for _ in 0..60 {
        time += DT;
        player.tick(DT, &body.chassis, &mut car);
        body.step(car.backend(), DT);
        if !player.is_drifting() {
            ended = Some(time);
            break;
        }
    }
    let held = ended.unwrap() - started;
    let min = player.tuning().drift.min_duration;
    assert!(held >= min - 1e-4, "drift ended after {held}s");
    assert!(held <= min + 2.0 * DT, "drift lingered for {held}s");
    assert!(!car.is_drifting());
}
