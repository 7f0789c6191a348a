use std::io;

use linuxcnc::state::StateParams;
use utilities::command_executor::Command;

use crate::command_executor::linuxcnc::LinuxCncHandler;

#[derive(Debug, Clone)]
pub enum BackendCommand {
    Connect,
    Disconnect,
    GetState,
    Move { joint: u8, distance: f64, speed: f64 },
    MoveAbsolute { x: f64, y: f64 },
    Home { joint: Option<u8> },
    StartJog { joint: u8, velocity: f64 },
    StopJog { joint: u8 },
    SetIo { channel: u8, state: bool },
    EmergencyStop,
    ClearEmergencyStop,
}

#[derive(Debug)]
pub enum BackendResponse {
    Done(bool),
    State(StateParams),
}

impl Command for BackendCommand {
    type Response = BackendResponse;
    type Handler = LinuxCncHandler;

    fn execute(self, handler: &mut Self::Handler) -> io::Result<Self::Response> {
        match self {
            BackendCommand::Connect => handler.connect().map(BackendResponse::Done),
            BackendCommand::Disconnect => {
                handler.disconnect();
                Ok(BackendResponse::Done(true))
            }
            BackendCommand::GetState => handler.get_state().map(BackendResponse::State),
            BackendCommand::Move {
                joint,
                distance,
                speed,
            } => handler
                .move_relative(joint, distance, speed)
                .map(BackendResponse::Done),
            BackendCommand::MoveAbsolute { x, y } => {
                handler.move_absolute(x, y).map(BackendResponse::Done)
            }
            BackendCommand::Home { joint } => handler.home(joint).map(BackendResponse::Done),
            BackendCommand::StartJog { joint, velocity } => {
                handler.start_jog(joint, velocity).map(BackendResponse::Done)
            }
            BackendCommand::StopJog { joint } => handler.stop_jog(joint).map(BackendResponse::Done),
            BackendCommand::SetIo { channel, state } => {
                handler.set_io(channel, state).map(BackendResponse::Done)
            }
            BackendCommand::EmergencyStop => handler.emergency_stop().map(BackendResponse::Done),
            BackendCommand::ClearEmergencyStop => {
                handler.clear_emergency_stop().map(BackendResponse::Done)
            }
        }
    }

    fn name(&self) -> &'static str {
        match self {
            BackendCommand::Connect => "connect",
            BackendCommand::Disconnect => "disconnect",
            BackendCommand::GetState => "get_state",
            BackendCommand::Move { .. } => "move",
            BackendCommand::MoveAbsolute { .. } => "move_absolute",
            BackendCommand::Home { .. } => "home",
            BackendCommand::StartJog { .. } => "start_jog",
            BackendCommand::StopJog { .. } => "stop_jog",
            BackendCommand::SetIo { .. } => "set_io",
            BackendCommand::EmergencyStop => "emergency_stop",
            BackendCommand::ClearEmergencyStop => "clear_emergency_stop",
        }
    }
}
