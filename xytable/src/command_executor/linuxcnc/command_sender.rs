use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use linuxcnc::state::StateParams;
use utilities::command_executor::CommandSender;

use super::commands::{BackendCommand, BackendResponse};

#[derive(Clone)]
pub struct LinuxCncCommandSender {
    sender: CommandSender<BackendCommand>,
    connected: Arc<AtomicBool>,
}

fn unexpected_response() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "Unexpected response type")
}

impl LinuxCncCommandSender {
    pub fn new(sender: CommandSender<BackendCommand>, connected: Arc<AtomicBool>) -> Self {
        Self { sender, connected }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub async fn send(&self, command: BackendCommand) -> io::Result<bool> {
        match self.sender.send_command(command).await? {
            BackendResponse::Done(accepted) => Ok(accepted),
            BackendResponse::State(_) => Err(unexpected_response()),
        }
    }

    pub async fn get_state(&self) -> io::Result<StateParams> {
        match self.sender.send_command(BackendCommand::GetState).await? {
            BackendResponse::State(state) => Ok(state),
            BackendResponse::Done(_) => Err(unexpected_response()),
        }
    }
}
