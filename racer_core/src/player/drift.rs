// racer_core/src/player/drift.rs

use serde::Deserialize;

use crate::error::{positive, within, TuningError};

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DriftTuning {
    /// Speed in m/s the car must exceed to start a drift.
    pub min_speed: f32,
    /// A drift lasts at least this long once started.
    pub min_duration: f32,
    /// No new drift may start this soon after one ends.
    pub cooldown: f32,
    /// Steering amplification while drifting.
    pub steer_multiplier: f32,
}

impl Default for DriftTuning {
    fn default() -> Self {
        Self {
            min_speed: 5.0,
            min_duration: 0.15,
            cooldown: 0.15,
            steer_multiplier: 1.5,
        }
    }
}

impl DriftTuning {
    pub fn validate(&self) -> Result<(), TuningError> {
        positive("drift.min_speed", self.min_speed)?;
        positive("drift.steer_multiplier", self.steer_multiplier)?;
        within("drift.min_duration", self.min_duration, 0.0, f32::MAX)?;
        within("drift.cooldown", self.cooldown, 0.0, f32::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftTransition {
    Started,
    Ended,
}

/// The drift flag plus the two timers that debounce it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriftState {
    active: bool,
    active_for: f32,
    cooldown_left: f32,
}

impl DriftState {
    /// Re-evaluates the drift flag given whether its conditions currently hold.
    pub fn update(&mut self, wanted: bool, dt: f32, tuning: &DriftTuning) -> Option<DriftTransition> {
        if self.active {
            self.active_for += dt;
            if !wanted && self.active_for >= tuning.min_duration {
                self.active = false;
                self.active_for = 0.0;
                self.cooldown_left = tuning.cooldown;
                return Some(DriftTransition::Ended);
            }
            return None;
        }

        self.cooldown_left = (self.cooldown_left - dt).max(0.0);
        if wanted && self.cooldown_left <= 0.0 {
            self.active = true;
            self.active_for = 0.0;
            return Some(DriftTransition::Started);
        }
        None
    }

    /// Ends a drift immediately, ignoring the minimum duration. Used on reset.
    pub fn force_stop(&mut self) -> Option<DriftTransition> {
        let was_active = self.active;
        *self = Self::default();
        was_active.then_some(DriftTransition::Ended)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn active_for(&self) -> f32 {
        self.active_for
    }
}
