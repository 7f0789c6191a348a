use std::{fmt, str::FromStr};

use crate::{
    config::{AxisConfig, TableConfig},
    error::ValidationError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::X, Axis::Y];

    pub fn name(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
        }
    }

    /// Joint number of the axis on the motion backend.
    pub fn joint(&self) -> u8 {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
        }
    }

    pub fn index(&self) -> usize {
        self.joint() as usize
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Axis {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x" => Ok(Axis::X),
            "y" => Ok(Axis::Y),
            _ => Err(ValidationError::UnknownAxis {
                name: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JogDirection {
    Positive,
    Negative,
}

impl JogDirection {
    pub fn sign(&self) -> f64 {
        match self {
            JogDirection::Positive => 1.0,
            JogDirection::Negative => -1.0,
        }
    }
}

impl TryFrom<i32> for JogDirection {
    type Error = ValidationError;

    fn try_from(direction: i32) -> Result<Self, Self::Error> {
        match direction {
            1 => Ok(JogDirection::Positive),
            -1 => Ok(JogDirection::Negative),
            _ => Err(ValidationError::InvalidDirection { direction }),
        }
    }
}

/// Digital outputs exposed by the table. `down` drives mist, `start` drives flood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoChannel {
    Down,
    Start,
}

impl IoChannel {
    pub fn channel(&self) -> u8 {
        match self {
            IoChannel::Down => 0,
            IoChannel::Start => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IoChannel::Down => "down",
            IoChannel::Start => "start",
        }
    }
}

impl FromStr for IoChannel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "down" => Ok(IoChannel::Down),
            "start" => Ok(IoChannel::Start),
            _ => Err(ValidationError::UnknownIo {
                name: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisLimits {
    pub min_position: f64,
    pub max_position: f64,
    pub max_speed: f64,
}

impl From<&AxisConfig> for AxisLimits {
    fn from(config: &AxisConfig) -> Self {
        AxisLimits {
            min_position: config.min_position,
            max_position: config.max_position,
            max_speed: config.max_speed,
        }
    }
}

/// Immutable per-axis limits, loaded once from the table configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisRegistry {
    axes: [AxisLimits; 2],
}

impl AxisRegistry {
    pub fn new(x: AxisLimits, y: AxisLimits) -> Self {
        AxisRegistry { axes: [x, y] }
    }

    pub fn from_config(table: &TableConfig) -> Self {
        AxisRegistry::new((&table.x_axis).into(), (&table.y_axis).into())
    }

    pub fn limits(&self, axis: Axis) -> &AxisLimits {
        &self.axes[axis.index()]
    }

    pub fn validate_speed(&self, axis: Axis, speed: f64) -> Result<(), ValidationError> {
        if !speed.is_finite() {
            return Err(ValidationError::NotFinite {
                axis,
                what: "Speed",
                value: speed,
            });
        }

        if speed <= 0.0 {
            return Err(ValidationError::SpeedNotPositive { axis, speed });
        }

        let max = self.limits(axis).max_speed;
        if speed > max {
            return Err(ValidationError::SpeedExceedsLimit { axis, speed, max });
        }

        Ok(())
    }

    pub fn validate_distance(&self, axis: Axis, distance: f64) -> Result<(), ValidationError> {
        if distance.is_finite() {
            Ok(())
        } else {
            Err(ValidationError::NotFinite {
                axis,
                what: "Distance",
                value: distance,
            })
        }
    }

    pub fn validate_position(&self, axis: Axis, position: f64) -> Result<(), ValidationError> {
        let limits = self.limits(axis);

        if !position.is_finite() {
            return Err(ValidationError::NotFinite {
                axis,
                what: "Position",
                value: position,
            });
        }

        if position < limits.min_position || position > limits.max_position {
            return Err(ValidationError::PositionOutOfBounds {
                axis,
                position,
                min: limits.min_position,
                max: limits.max_position,
            });
        }

        Ok(())
    }
}

impl fmt::Display for AxisRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for axis in Axis::ALL {
            let limits = self.limits(axis);
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(
                f,
                "{}:min={:.4},max={:.4},max_speed={:.4}",
                axis, limits.min_position, limits.max_position, limits.max_speed
            )?;
        }
        Ok(())
    }
}
