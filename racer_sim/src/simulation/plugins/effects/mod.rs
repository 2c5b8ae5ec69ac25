// racer_sim/src/simulation/plugins/effects/mod.rs

//! Stands in for the audio, lights and HUD layers: every `VehicleEffect` is
//! logged, and a once-a-second telemetry line is printed per car.

use std::collections::BTreeMap;

use crate::{
    prelude::*,
    simulation::plugins::drivers::{autopilot::AutopilotDriver, player::PlayerDriver},
};

/// Seconds between telemetry lines.
const TELEMETRY_PERIOD: f32 = 1.0;

/// How many times each kind of effect fired this run.
#[derive(Resource, Default, Debug)]
pub struct EffectTally(pub BTreeMap<&'static str, usize>);

pub struct EffectsLogPlugin;

impl Plugin for EffectsLogPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<EffectTally>()
            .insert_resource(TelemetryTimer(Timer::from_seconds(
                TELEMETRY_PERIOD,
                TimerMode::Repeating,
            )))
            .add_systems(
                FixedUpdate,
                (log_vehicle_effects, log_telemetry).in_set(SimulationSet::Validation),
            )
            .add_systems(Last, log_effect_tally.run_if(on_event::<AppExit>));
    }
}

#[derive(Resource)]
struct TelemetryTimer(Timer);

/// A stable name for each effect, used as the tally key.
pub fn effect_name(event: &VehicleEvent) -> &'static str {
    match event {
        VehicleEvent::DriftStarted => "drift_started",
        VehicleEvent::DriftEnded => "drift_ended",
        VehicleEvent::BrakeStarted => "brake_started",
        VehicleEvent::BrakeEnded => "brake_ended",
        VehicleEvent::GearShift { .. } => "gear_shift",
        VehicleEvent::ReverseLightsOn => "reverse_lights_on",
        VehicleEvent::ReverseLightsOff => "reverse_lights_off",
        VehicleEvent::CollisionRecoveryStarted { .. } => "collision_recovery_started",
        VehicleEvent::CollisionRecoveryEnded => "collision_recovery_ended",
        VehicleEvent::FlipDetected { .. } => "flip_detected",
        VehicleEvent::AutoReset { .. } => "auto_reset",
        VehicleEvent::DestinationReached => "destination_reached",
    }
}

fn log_vehicle_effects(
    mut effects: EventReader<VehicleEffect>,
    mut tally: ResMut<EffectTally>,
    names: Query<&Name>,
) {
    for effect in effects.read() {
        let name = names
            .get(effect.entity)
            .map_or_else(|_| format!("{}", effect.entity), |n| n.to_string());
        *tally.0.entry(effect_name(&effect.event)).or_default() += 1;
        match effect.event {
            VehicleEvent::CollisionRecoveryStarted { .. }
            | VehicleEvent::CollisionRecoveryEnded
            | VehicleEvent::AutoReset { .. }
            | VehicleEvent::DestinationReached => info!("[EFFECT] {}: {:?}", name, effect.event),
            _ => debug!("[EFFECT] {}: {:?}", name, effect.event),
        }
    }
}

fn log_telemetry(
    time: Res<Time>,
    mut timer: ResMut<TelemetryTimer>,
    players: Query<(&Name, &PlayerDriver)>,
    autopilots: Query<(&Name, &AutopilotDriver)>,
) {
    if !timer.0.tick(time.delta()).just_finished() {
        return;
    }
    for (name, driver) in &players {
        let c = &driver.controller;
        debug!(
            "[TELEMETRY] {}: {:?}, gear {}{}, {:.1} km/h{}",
            name,
            c.state(),
            c.gear_phase(),
            if c.is_shifting() { " (shifting)" } else { "" },
            c.speed_kmh(),
            if c.is_drifting() { ", drifting" } else { "" },
        );
    }
    for (name, driver) in &autopilots {
        let c = &driver.0;
        debug!(
            "[TELEMETRY] {}: {:?}, waypoint {}/{}, {:.1} km/h",
            name,
            c.mode(),
            c.path_index(),
            c.path_len(),
            c.speed_kmh(),
        );
    }
}

fn log_effect_tally(tally: Res<EffectTally>) {
    for (effect, count) in &tally.0 {
        info!("[SUMMARY] {}: {}", effect, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use racer_core::prelude::RecoveryReason;

    #[test]
    fn effect_names_ignore_payloads() {
        assert_eq!(
            effect_name(&VehicleEvent::GearShift { from: 0, to: 1 }),
            effect_name(&VehicleEvent::GearShift { from: 2, to: 3 })
        );
        assert_eq!(
            effect_name(&VehicleEvent::CollisionRecoveryStarted {
                reason: RecoveryReason::Danger
            }),
            "collision_recovery_started"
        );
    }
}
