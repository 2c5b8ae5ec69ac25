// racer_sim/src/simulation/plugins/drivers/player.rs

//! The human driver, replayed from a key script.
//!
//! Key events are fed into the `PlayerController` at their scripted time,
//! exactly as an input layer would on key-down / key-up.

use crate::{
    prelude::*,
    simulation::core::{
        components::Tracked, simulation_setup::RunClock, transforms::apply_reset,
    },
};
use avian3d::prelude::*;

// --- BEVY COMPONENTS ---

#[derive(Component, Debug)]
pub struct PlayerDriver {
    pub controller: PlayerController,
    /// Sorted by time.
    script: Vec<ScriptedKey>,
    next_key: usize,
}

impl PlayerDriver {
    pub fn new(controller: PlayerController, mut script: Vec<ScriptedKey>) -> Self {
        script.retain(|key| key.at.is_finite());
        script.sort_by(|a, b| a.at.total_cmp(&b.at));
        Self {
            controller,
            script,
            next_key: 0,
        }
    }

    /// Feeds every scripted key due at or before `now`. Returns how many fired.
    pub fn replay_until(&mut self, now: f32) -> usize {
        let mut fired = 0;
        while let Some(key) = self.script.get(self.next_key).filter(|k| k.at <= now) {
            match key.edge {
                KeyEdge::Down => self.controller.on_key_down(key.action),
                KeyEdge::Up => self.controller.on_key_up(key.action),
            }
            self.next_key += 1;
            fired += 1;
        }
        fired
    }

    pub fn remaining_keys(&self) -> usize {
        self.script.len() - self.next_key
    }
}

// --- THE PLUGIN ---
pub struct PlayerDriverPlugin;

impl Plugin for PlayerDriverPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(AppState::SceneBuilding),
            attach_player_drivers.in_set(SceneBuildSet::ProcessDrivers),
        )
        .add_systems(
            FixedUpdate,
            (
                replay_key_scripts.in_set(SimulationSet::Input),
                tick_players.in_set(SimulationSet::Control),
            ),
        );
    }
}

// --- SYSTEMS ---

/// SPAWNING: Attaches a `PlayerDriver` to every agent configured as a player.
fn attach_player_drivers(
    mut commands: Commands,
    request_query: Query<(Entity, &Name, &SpawnAgentConfigRequest)>,
) {
    for (entity, name, request) in &request_query {
        let DriverConfig::Player { tuning, script } = &request.0.driver else {
            continue;
        };
        match PlayerController::new(tuning.clone()) {
            Ok(controller) => {
                info!("[SPAWN] '{}' is driven by a {}-key script", name, script.len());
                commands.entity(entity).insert((
                    PlayerDriver::new(controller, script.clone()),
                    Tracked(BodyKind::Player),
                ));
            }
            Err(e) => {
                error!("[SPAWN] Player '{}' rejected: {}. Despawning.", name, e);
                commands.entity(entity).despawn();
            }
        }
    }
}

fn replay_key_scripts(clock: Res<RunClock>, mut query: Query<(&Name, &mut PlayerDriver)>) {
    for (name, mut driver) in &mut query {
        if driver.replay_until(clock.elapsed) > 0 {
            debug!(
                "[INPUT] {} now holds {:?}",
                name,
                driver.controller.held_keys().held().collect::<Vec<_>>()
            );
        }
    }
}

/// RUNTIME: One player tick per fixed step. Auto-resets are written straight
/// back to the body.
fn tick_players(
    time: Res<Time>,
    mut effects: EventWriter<VehicleEffect>,
    mut query: Query<(
        Entity,
        &mut PlayerDriver,
        &mut VehicleBody,
        &ChassisSnapshot,
        &mut Transform,
        &mut LinearVelocity,
        &mut AngularVelocity,
    )>,
) {
    let dt = time.delta_secs();
    for (entity, mut driver, mut body, snapshot, mut transform, mut lin_vel, mut ang_vel) in
        &mut query
    {
        if let Some(reset) = driver.controller.tick(dt, &snapshot.0, &mut body.0) {
            apply_reset(&reset, &mut transform, &mut lin_vel, &mut ang_vel);
        }
        for event in driver.controller.drain_events() {
            effects.write(VehicleEffect { entity, event });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(at: f32, action: DriveAction, edge: KeyEdge) -> ScriptedKey {
        ScriptedKey { at, action, edge }
    }

    #[test]
    fn script_replays_in_time_order() {
        let controller = PlayerController::new(PlayerTuning::default()).unwrap();
        let mut driver = PlayerDriver::new(
            controller,
            vec![
                key(2.0, DriveAction::Accelerate, KeyEdge::Up),
                key(0.0, DriveAction::Accelerate, KeyEdge::Down),
                key(1.0, DriveAction::SteerLeft, KeyEdge::Down),
                key(f32::NAN, DriveAction::Reverse, KeyEdge::Down),
            ],
        );
        assert_eq!(driver.remaining_keys(), 3);

        assert_eq!(driver.replay_until(0.5), 1);
        assert!(driver.controller.held_keys().is_held(DriveAction::Accelerate));
        assert_eq!(driver.replay_until(0.5), 0);

        assert_eq!(driver.replay_until(2.0), 2);
        let held = driver.controller.held_keys();
        assert!(!held.is_held(DriveAction::Accelerate));
        assert!(held.is_held(DriveAction::SteerLeft));
        assert_eq!(driver.remaining_keys(), 0);
    }
}
