// racer_core/src/effects.rs

//! Named, fire-and-forget notifications for the presentation layer.
//!
//! Controllers never touch audio, lights or UI. They push a `VehicleEvent`
//! whenever one of their state machines crosses an edge, and whoever owns
//! the controller drains the queue after the tick.

use crate::orientation::FlipType;

/// Why the autopilot started a recovery maneuver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecoveryReason {
    /// Wanted to move, but the position history shows no progress.
    Stuck,
    /// A contact or close pass exceeded the impact threshold.
    Collision,
    /// An obstacle entered the danger radius ahead of the car.
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VehicleEvent {
    DriftStarted,
    DriftEnded,
    BrakeStarted,
    BrakeEnded,
    GearShift { from: usize, to: usize },
    ReverseLightsOn,
    ReverseLightsOff,
    CollisionRecoveryStarted { reason: RecoveryReason },
    CollisionRecoveryEnded,
    FlipDetected { kind: FlipType },
    AutoReset { kind: FlipType },
    DestinationReached,
}

/// An append-only buffer of events produced during ticks.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    pending: Vec<VehicleEvent>,
}

impl EventQueue {
    pub fn push(&mut self, event: VehicleEvent) {
        self.pending.push(event);
    }

    /// Hands every pending event to the caller, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<VehicleEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VehicleEvent> {
        self.pending.iter()
    }
}
