// racer_core/src/prelude.rs

// --- Core Data Structures ---
pub use crate::types::{
    BodyKind, ChassisState, DriveIntent, TrackedBody, VehicleHandle,
};

// --- Vehicle Dynamics ---
pub use crate::vehicle::{
    Axle, VehicleDynamics, VehicleTuning, WheelBackend, WheelConfig, WheelSlots, WHEEL_COUNT,
};

// --- Controllers ---
pub use crate::autopilot::{AutopilotController, AutopilotMode, AutopilotTuning, Target};
pub use crate::player::{DriveAction, DriveState, PlayerController, PlayerTuning};

// --- Shared Services ---
pub use crate::effects::{RecoveryReason, VehicleEvent};
pub use crate::error::TuningError;
pub use crate::orientation::{FlipTuning, FlipType, ResetTransform};
pub use crate::timing::DecisionClock;
