use tokio::sync::watch;

use crate::{
    controller::MotionCoordinator,
    models::{Command, CommandResponse, CommandResult},
    status::StatusSnapshot,
};

/// Runs one socket command against the coordinator.
///
/// `status` answers from the snapshot published by the state monitor instead
/// of polling the backend on every request.
pub async fn execute(
    coordinator: &MotionCoordinator,
    status: &watch::Receiver<StatusSnapshot>,
    command: Command,
) -> CommandResult {
    let result = match command {
        Command::Move {
            axis,
            distance,
            speed,
        } => coordinator.move_single_axis(axis, distance, speed).await,
        Command::MoveXy {
            x_distance,
            y_distance,
            speed,
        } => {
            coordinator
                .move_coordinated(x_distance, y_distance, speed)
                .await
        }
        Command::MoveTo { x, y, speed } => coordinator.move_absolute(x, y, speed).await,
        Command::Home => coordinator.home_axes(None).await,
        Command::HomeAxis { axis } => coordinator.home_axis(axis, None).await,
        Command::Jog {
            axis,
            direction,
            speed,
        } => coordinator.start_jog(axis, direction, speed).await,
        Command::JogStop { axis } => coordinator.stop_jog(axis).await,
        Command::EmergencyStop => coordinator.emergency_stop().await,
        Command::ClearEmergencyStop => coordinator.clear_emergency_stop().await,
        Command::SetIo { name, state } => coordinator.set_io(&name, state).await,
        Command::Status => {
            let mut snapshot = status.borrow().clone();
            snapshot.emergency_stop_active = coordinator.is_emergency_stop_active();
            snapshot.movement_in_progress = coordinator.is_movement_in_progress();
            return Ok(CommandResponse::Status(snapshot));
        }
        Command::Limits => {
            return Ok(CommandResponse::Limits(coordinator.registry().to_string()));
        }
    };

    result
        .map(|_| CommandResponse::Success)
        .map_err(Into::into)
}
