use crate::axis::Axis;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unknown axis '{name}', expected 'x' or 'y'")]
    UnknownAxis { name: String },

    #[error("Speed {speed} for {axis} axis must be positive")]
    SpeedNotPositive { axis: Axis, speed: f64 },

    #[error("Speed {speed} exceeds maximum {max} for {axis} axis")]
    SpeedExceedsLimit { axis: Axis, speed: f64, max: f64 },

    #[error("Target {position} for {axis} axis is outside [{min}, {max}]")]
    PositionOutOfBounds {
        axis: Axis,
        position: f64,
        min: f64,
        max: f64,
    },

    #[error("{what} for {axis} axis must be a finite number, got {value}")]
    NotFinite {
        axis: Axis,
        what: &'static str,
        value: f64,
    },

    #[error("Invalid jog direction {direction}, expected +1 or -1")]
    InvalidDirection { direction: i32 },

    #[error("Invalid IO name '{name}', use 'down' for mist or 'start' for flood")]
    UnknownIo { name: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Emergency stop is active, {operation} blocked")]
    SafetyBlocked { operation: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Motion backend unavailable: {message}")]
    BackendUnavailable { message: String },

    #[error("Backend failed to {operation}: {message}")]
    Backend { operation: String, message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CoordinatorError {
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        CoordinatorError::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn is_safety_blocked(&self) -> bool {
        matches!(self, CoordinatorError::SafetyBlocked { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CoordinatorError::Validation(_))
    }
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;
