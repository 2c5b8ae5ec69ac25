// racer_core/src/player/input.rs

use serde::Deserialize;

/// A normalized driving action, independent of the physical key bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriveAction {
    Accelerate,
    Reverse,
    SteerLeft,
    SteerRight,
    /// Brake while rolling, or the drift modifier when combined with a turn.
    #[serde(alias = "brake", alias = "drift-modifier")]
    Handbrake,
}

impl DriveAction {
    pub const ALL: [DriveAction; 5] = [
        DriveAction::Accelerate,
        DriveAction::Reverse,
        DriveAction::SteerLeft,
        DriveAction::SteerRight,
        DriveAction::Handbrake,
    ];

    /// Parses an action name from an input layer. Case and `_`/`-` are ignored.
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "accelerate" | "forward" => Some(Self::Accelerate),
            "reverse" | "backward" => Some(Self::Reverse),
            "steer-left" | "left" => Some(Self::SteerLeft),
            "steer-right" | "right" => Some(Self::SteerRight),
            "handbrake" | "brake" | "drift-modifier" | "drift" => Some(Self::Handbrake),
            _ => None,
        }
    }

    fn bit(self) -> u8 {
        match self {
            Self::Accelerate => 1 << 0,
            Self::Reverse => 1 << 1,
            Self::SteerLeft => 1 << 2,
            Self::SteerRight => 1 << 3,
            Self::Handbrake => 1 << 4,
        }
    }
}

/// The set of actions currently held down, owned by one controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeldKeys {
    bits: u8,
}

impl HeldKeys {
    pub fn press(&mut self, action: DriveAction) {
        self.bits |= action.bit();
    }

    pub fn release(&mut self, action: DriveAction) {
        self.bits &= !action.bit();
    }

    pub fn is_held(&self, action: DriveAction) -> bool {
        self.bits & action.bit() != 0
    }

    pub fn clear(&mut self) {
        self.bits = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// +1 for left, -1 for right, 0 for neither or both.
    pub fn steer_direction(&self) -> f32 {
        match (
            self.is_held(DriveAction::SteerLeft),
            self.is_held(DriveAction::SteerRight),
        ) {
            (true, false) => 1.0,
            (false, true) => -1.0,
            _ => 0.0,
        }
    }

    pub fn is_turning(&self) -> bool {
        self.steer_direction() != 0.0
    }

    /// Accelerate held without reverse. Holding both cancels out.
    pub fn wants_forward(&self) -> bool {
        self.is_held(DriveAction::Accelerate) && !self.is_held(DriveAction::Reverse)
    }

    pub fn wants_reverse(&self) -> bool {
        self.is_held(DriveAction::Reverse) && !self.is_held(DriveAction::Accelerate)
    }

    pub fn held(&self) -> impl Iterator<Item = DriveAction> + '_ {
        DriveAction::ALL.into_iter().filter(|a| self.is_held(*a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_normalize_to_actions() {
        assert_eq!(DriveAction::from_name("Steer_Left"), Some(DriveAction::SteerLeft));
        assert_eq!(DriveAction::from_name("brake"), Some(DriveAction::Handbrake));
        assert_eq!(DriveAction::from_name("drift-modifier"), Some(DriveAction::Handbrake));
        assert_eq!(DriveAction::from_name(" accelerate "), Some(DriveAction::Accelerate));
        assert_eq!(DriveAction::from_name("jump"), None);
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut keys = HeldKeys::default();
        keys.press(DriveAction::SteerLeft);
        assert_eq!(keys.steer_direction(), 1.0);
        keys.press(DriveAction::SteerRight);
        assert_eq!(keys.steer_direction(), 0.0);
        keys.release(DriveAction::SteerLeft);
        assert_eq!(keys.steer_direction(), -1.0);

        keys.press(DriveAction::Accelerate);
        keys.press(DriveAction::Reverse);
        assert!(!keys.wants_forward());
        assert!(!keys.wants_reverse());
        assert_eq!(keys.held().count(), 3);
    }
}
