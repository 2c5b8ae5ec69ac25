// racer_core/src/error.rs

use thiserror::Error;

/// Rejections raised while validating tuning data at vehicle creation.
/// The per-tick control APIs never return errors; only configuration can be wrong.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TuningError {
    #[error("expected exactly {expected} wheels, got {found}")]
    WheelCount { expected: usize, found: usize },

    #[error("`{field}` must be positive, got {value}")]
    NonPositive { field: &'static str, value: f32 },

    #[error("`{field}` must lie in [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },

    #[error("exactly two wheels must steer, found {0}")]
    SteeringPair(usize),

    #[error("the gearbox needs at least one phase")]
    EmptyGearbox,

    #[error("position history needs at least {min} samples, got {found}")]
    HistoryTooShort { min: usize, found: usize },
}

/// Shorthand for the checks every `validate()` repeats.
pub(crate) fn positive(field: &'static str, value: f32) -> Result<(), TuningError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TuningError::NonPositive { field, value })
    }
}

pub(crate) fn within(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), TuningError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(TuningError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
