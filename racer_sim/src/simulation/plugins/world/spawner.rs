// racer_sim/src/simulation/plugins/world/spawner.rs

//! Spawns the static world described by the scenario's `[world]` section:
//! a ground slab and any number of box walls.

use crate::prelude::*;
use crate::simulation::core::components::Tracked;
use crate::simulation::core::transforms::vector3_to_vec3;
use avian3d::prelude::*;

/// Thickness of the ground slab; its top face sits at y = 0.
const GROUND_THICKNESS: f32 = 1.0;

pub struct WorldSpawnerPlugin;

impl Plugin for WorldSpawnerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(AppState::SceneBuilding),
            spawn_static_world.in_set(SceneBuildSet::Physics),
        );
    }
}

fn spawn_static_world(mut commands: Commands, scenario: Res<ScenarioConfig>) {
    let world = &scenario.world;
    let side = 2.0 * world.ground_half_extent.max(1.0);
    info!("[WORLD] Spawning {side} m ground with {} wall(s)", world.walls.len());

    commands.spawn((
        Name::new("Ground"),
        Transform::from_xyz(0.0, -GROUND_THICKNESS / 2.0, 0.0),
        RigidBody::Static,
        Collider::cuboid(side, GROUND_THICKNESS, side),
        Friction::new(0.8),
        StaticObstacle,
    ));

    for wall in &world.walls {
        let size = vector3_to_vec3(&(wall.half_extents * 2.0));
        if size.min_element() <= 0.0 {
            warn!("[WORLD] Skipping wall '{}' with non-positive size {:?}", wall.name, size);
            continue;
        }
        commands.spawn((
            Name::new(wall.name.clone()),
            Transform::from_translation(vector3_to_vec3(&wall.center))
                .with_rotation(Quat::from_rotation_y(wall.yaw_deg.to_radians())),
            RigidBody::Static,
            Collider::cuboid(size.x, size.y, size.z),
            StaticObstacle,
            // Walls appear in every controller's world view.
            Tracked(BodyKind::Static),
        ));
    }
}
