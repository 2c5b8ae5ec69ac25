// racer_sim/src/simulation/core/events.rs
use bevy::prelude::{Entity, Event};
// Import the pure effect type from the core library
use racer_core::effects::VehicleEvent;

/// A controller effect tagged with the chassis that produced it.
#[derive(Event, Debug, Clone, Copy)]
pub struct VehicleEffect {
    pub entity: Entity,
    pub event: VehicleEvent,
}
