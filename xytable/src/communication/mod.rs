use anyhow::{anyhow, Result};
use std::{path::Path, sync::Arc};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::UnixListener,
    sync::watch,
};
use tracing::{debug, error, info, warn};

use crate::{
    controller::{controller_service, MotionCoordinator},
    status::StatusSnapshot,
};

pub mod commands;

use commands::parse_command;

/// Serves one client until it disconnects.
///
/// If the client started a jog, every active jog is stopped when it goes away.
pub async fn handle_connection<S>(
    stream: S,
    coordinator: Arc<MotionCoordinator>,
    status: watch::Receiver<StatusSnapshot>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut lines = BufReader::new(reader).lines();
    let mut started_jog = false;

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Error reading from socket: {}", e);
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let reply = match parse_command(&line) {
            Ok(command) => {
                let is_jog = command.is_jog();
                let result = controller_service::execute(&coordinator, &status, command).await;

                if is_jog && result.is_ok() {
                    started_jog = true;
                }

                match result {
                    Ok(response) => format!("{}\n", response),
                    Err(e) => format!("{}\n", e),
                }
            }
            Err(e) => format!("{}\n", e),
        };

        if let Err(e) = writer.write_all(reply.as_bytes()).await {
            warn!("Failed to send response: {}", e);
            break;
        }
    }

    if started_jog {
        info!("Jog client disconnected, stopping active jogs");
        if let Err(e) = coordinator.stop_all_jogs().await {
            error!("Failed to stop jogs after client disconnect: {}", e);
        }
    }
}

pub async fn run_communication_layer(
    socket_path: &Path,
    coordinator: Arc<MotionCoordinator>,
    status: watch::Receiver<StatusSnapshot>,
) -> Result<()> {
    if socket_path.exists() {
        std::fs::remove_file(socket_path)
            .map_err(|e| anyhow!("Failed to remove existing socket file: {}", e))?;
    }

    let listener =
        UnixListener::bind(socket_path).map_err(|e| anyhow!("Failed to bind to socket: {}", e))?;

    info!("Listening on {}", socket_path.display());

    loop {
        let (socket, _) = listener
            .accept()
            .await
            .map_err(|e| anyhow!("Failed to accept connection: {}", e))?;

        debug!("Client connected");

        tokio::spawn(handle_connection(
            socket,
            coordinator.clone(),
            status.clone(),
        ));
    }
}
