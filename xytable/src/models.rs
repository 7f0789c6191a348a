use std::fmt;

use crate::{axis::Axis, error::CoordinatorError, status::StatusSnapshot};

pub type CommandResult = Result<CommandResponse, CommandError>;

#[derive(Debug, Clone, PartialEq)]
pub struct CommandError {
    pub message: String,
}

impl From<String> for CommandError {
    fn from(message: String) -> Self {
        CommandError { message }
    }
}

impl From<&str> for CommandError {
    fn from(message: &str) -> Self {
        CommandError {
            message: message.to_string(),
        }
    }
}

impl From<CoordinatorError> for CommandError {
    fn from(error: CoordinatorError) -> Self {
        CommandError {
            message: error.to_string(),
        }
    }
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error: {}", self.message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandResponse {
    Success,
    Status(StatusSnapshot),
    Limits(String),
}

impl fmt::Display for CommandResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandResponse::Success => f.write_str("OK"),
            CommandResponse::Status(status) => write!(f, "{}", status),
            CommandResponse::Limits(limits) => f.write_str(limits),
        }
    }
}

/// One request line of the socket protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Move {
        axis: Axis,
        distance: f64,
        speed: Option<f64>,
    },
    MoveXy {
        x_distance: f64,
        y_distance: f64,
        speed: Option<f64>,
    },
    MoveTo {
        x: f64,
        y: f64,
        speed: Option<f64>,
    },
    Home,
    HomeAxis {
        axis: Axis,
    },
    Jog {
        axis: Axis,
        direction: i32,
        speed: f64,
    },
    JogStop {
        axis: Axis,
    },
    EmergencyStop,
    ClearEmergencyStop,
    SetIo {
        name: String,
        state: bool,
    },
    Status,
    Limits,
}

impl Command {
    pub fn is_get(&self) -> bool {
        matches!(self, Command::Status | Command::Limits)
    }

    pub fn is_jog(&self) -> bool {
        matches!(self, Command::Jog { .. })
    }
}
