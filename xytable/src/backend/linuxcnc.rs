use std::io;

use async_trait::async_trait;
use linuxcnc::state::StateParams;
use tracing::debug;

use super::{AxisFields, BackendStatus, Limit, MotionBackend};
use crate::{
    axis::{Axis, IoChannel, JogDirection},
    command_executor::linuxcnc::{command_sender::LinuxCncCommandSender, commands::BackendCommand},
};

/// Motion backend talking to LinuxCNC through its remote shell.
/// X is joint 0, Y is joint 1.
pub struct LinuxCncBackend {
    sender: LinuxCncCommandSender,
}

impl LinuxCncBackend {
    pub fn new(sender: LinuxCncCommandSender) -> Self {
        Self { sender }
    }
}

fn missing(field: &str, axis: Axis) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("LinuxCNC reported no {} for joint {}", field, axis.joint()),
    )
}

pub fn status_from_state(state: &StateParams) -> io::Result<BackendStatus> {
    let enabled = state.is_machine_on() && !state.is_estop();

    let axis = |axis: Axis| -> io::Result<AxisFields> {
        let joint = axis.index();
        let limit = state
            .limit(joint)
            .map(|limit| Limit::from_switches(limit.lower(), limit.upper()))
            .unwrap_or_default();

        Ok(AxisFields {
            position: state
                .position(joint)
                .ok_or_else(|| missing("position", axis))?,
            moving: !state.in_position,
            enabled,
            in_position: state.in_position,
            homed: state.is_homed(joint).unwrap_or(false),
            limit,
        })
    };

    Ok(BackendStatus {
        estop: state.is_estop(),
        machine_on: state.is_machine_on(),
        axes: [axis(Axis::X)?, axis(Axis::Y)?],
    })
}

#[async_trait]
impl MotionBackend for LinuxCncBackend {
    async fn connect(&self) -> io::Result<bool> {
        self.sender.send(BackendCommand::Connect).await
    }

    async fn disconnect(&self) {
        if let Err(e) = self.sender.send(BackendCommand::Disconnect).await {
            debug!("Disconnect from LinuxCNC failed: {}", e);
        }
    }

    fn is_connected(&self) -> bool {
        self.sender.is_connected()
    }

    async fn read_status(&self) -> io::Result<BackendStatus> {
        let state = self.sender.get_state().await?;
        status_from_state(&state)
    }

    async fn move_axis(&self, axis: Axis, distance: f64, speed: f64) -> io::Result<bool> {
        self.sender
            .send(BackendCommand::Move {
                joint: axis.joint(),
                distance,
                speed,
            })
            .await
    }

    async fn move_absolute(&self, x: f64, y: f64) -> io::Result<bool> {
        self.sender
            .send(BackendCommand::MoveAbsolute { x, y })
            .await
    }

    async fn home_axis(&self, axis: Axis) -> io::Result<bool> {
        self.sender
            .send(BackendCommand::Home {
                joint: Some(axis.joint()),
            })
            .await
    }

    async fn home_all_axes(&self) -> io::Result<bool> {
        self.sender.send(BackendCommand::Home { joint: None }).await
    }

    async fn start_jog(&self, axis: Axis, direction: JogDirection, speed: f64) -> io::Result<bool> {
        self.sender
            .send(BackendCommand::StartJog {
                joint: axis.joint(),
                velocity: direction.sign() * speed,
            })
            .await
    }

    async fn stop_jog(&self, axis: Axis) -> io::Result<bool> {
        self.sender
            .send(BackendCommand::StopJog {
                joint: axis.joint(),
            })
            .await
    }

    async fn set_io(&self, channel: IoChannel, state: bool) -> io::Result<bool> {
        self.sender
            .send(BackendCommand::SetIo {
                channel: channel.channel(),
                state,
            })
            .await
    }

    async fn emergency_stop(&self) -> io::Result<bool> {
        self.sender.send(BackendCommand::EmergencyStop).await
    }

    async fn clear_emergency_stop(&self) -> io::Result<bool> {
        self.sender.send(BackendCommand::ClearEmergencyStop).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linuxcnc::state::JointLimit;

    fn state() -> StateParams {
        StateParams {
            estop: false,
            machine_on: true,
            in_position: true,
            positions: vec![1.5, -0.25, 0.0],
            homed: vec![true, false],
            limits: vec![JointLimit::empty(), JointLimit::MIN_HARD],
        }
    }

    #[test]
    fn maps_joints_to_axes() {
        let status = status_from_state(&state()).unwrap();

        assert_eq!(status.axis(Axis::X).position, 1.5);
        assert_eq!(status.axis(Axis::Y).position, -0.25);
        assert!(status.axis(Axis::X).homed);
        assert_eq!(status.axis(Axis::Y).limit, Limit::Lower);
        assert!(status.axis(Axis::X).enabled);
        assert!(!status.axis(Axis::X).moving);
    }

    #[test]
    fn estop_disables_axes() {
        let mut params = state();
        params.estop = true;

        let status = status_from_state(&params).unwrap();
        assert!(status.estop);
        assert!(!status.axis(Axis::Y).enabled);
    }

    #[test]
    fn missing_position_is_an_error() {
        let mut params = state();
        params.positions.truncate(1);

        assert!(status_from_state(&params).is_err());
    }
}
