use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use commands::BackendCommand;
use linuxcnc::{state::StateParams, LinuxCnc, Mode, ALL_JOINTS};
use tracing::{info, warn};
use utilities::{
    command_executor::{CommandExecutor, DeviceHandler},
    lazy_tcp::LazyTcpStream,
};

use crate::config::BackendConfig;
use command_sender::LinuxCncCommandSender;

pub mod command_sender;
pub mod commands;

/// Owns the remote shell session. Runs on the executor thread only.
pub struct LinuxCncHandler {
    tcp_stream: LazyTcpStream,
    linuxcnc: LinuxCnc,
    connected: Arc<AtomicBool>,
}

impl DeviceHandler for LinuxCncHandler {
    type Command = BackendCommand;
}

impl LinuxCncHandler {
    pub fn new(linuxcnc: LinuxCnc, tcp_stream: LazyTcpStream, connected: Arc<AtomicBool>) -> Self {
        Self {
            tcp_stream,
            linuxcnc,
            connected,
        }
    }

    fn publish_connection(&self) {
        self.connected
            .store(self.tcp_stream.is_connected(), Ordering::SeqCst);
    }

    /// Runs `f` against an established session and keeps the shared
    /// connection flag in sync with the socket afterwards.
    fn with_session<T>(
        &mut self,
        f: impl FnOnce(&LinuxCnc, &mut LazyTcpStream) -> io::Result<T>,
    ) -> io::Result<T> {
        if !self.tcp_stream.is_connected() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "Not connected to LinuxCNC",
            ));
        }

        let result = f(&self.linuxcnc, &mut self.tcp_stream);
        self.publish_connection();
        result
    }

    pub fn connect(&mut self) -> io::Result<bool> {
        let fresh = self.tcp_stream.ensure_connected()?;

        if fresh {
            if let Err(e) = self.linuxcnc.handshake(&mut self.tcp_stream) {
                warn!("LinuxCNC handshake failed: {}", e);
                self.tcp_stream.disconnect();
                self.publish_connection();
                return Err(e);
            }
            info!("LinuxCNC session established");
        }

        self.publish_connection();
        Ok(true)
    }

    pub fn disconnect(&mut self) {
        self.tcp_stream.disconnect();
        self.publish_connection();
    }

    pub fn get_state(&mut self) -> io::Result<StateParams> {
        self.with_session(|cnc, stream| cnc.get_state(stream))
    }

    pub fn move_relative(&mut self, joint: u8, distance: f64, speed: f64) -> io::Result<bool> {
        self.with_session(|cnc, stream| {
            Ok(cnc.set_mode(stream, Mode::Manual)?
                && cnc.set_teleop(stream, false)?
                && cnc.jog_increment(stream, joint, speed, distance)?)
        })
    }

    pub fn move_absolute(&mut self, x: f64, y: f64) -> io::Result<bool> {
        self.with_session(|cnc, stream| {
            Ok(cnc.set_mode(stream, Mode::Mdi)?
                && cnc.mdi(stream, &format!("G0 X{:.4} Y{:.4}", x, y))?)
        })
    }

    pub fn home(&mut self, joint: Option<u8>) -> io::Result<bool> {
        let joint = joint.map(|j| j as i8).unwrap_or(ALL_JOINTS);

        self.with_session(|cnc, stream| {
            Ok(cnc.set_mode(stream, Mode::Manual)? && cnc.home(stream, joint)?)
        })
    }

    pub fn start_jog(&mut self, joint: u8, velocity: f64) -> io::Result<bool> {
        self.with_session(|cnc, stream| {
            Ok(cnc.set_mode(stream, Mode::Manual)?
                && cnc.set_teleop(stream, false)?
                && cnc.jog_continuous(stream, joint, velocity)?)
        })
    }

    pub fn stop_jog(&mut self, joint: u8) -> io::Result<bool> {
        self.with_session(|cnc, stream| cnc.jog_stop(stream, joint))
    }

    pub fn set_io(&mut self, channel: u8, state: bool) -> io::Result<bool> {
        self.with_session(|cnc, stream| match channel {
            0 => cnc.set_mist(stream, state),
            1 => cnc.set_flood(stream, state),
            other => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Invalid IO channel {}", other),
            )),
        })
    }

    pub fn emergency_stop(&mut self) -> io::Result<bool> {
        self.with_session(|cnc, stream| cnc.set_estop(stream, true))
    }

    pub fn clear_emergency_stop(&mut self) -> io::Result<bool> {
        self.with_session(|cnc, stream| {
            Ok(cnc.set_estop(stream, false)? && cnc.set_machine(stream, true)?)
        })
    }
}

pub fn create_linuxcnc(
    config: &BackendConfig,
) -> (CommandExecutor<LinuxCncHandler>, LinuxCncCommandSender) {
    let connected = Arc::new(AtomicBool::new(false));

    let tcp_stream = LazyTcpStream::new(
        (config.host.as_str(), config.port),
        config.max_retries,
        config.read_timeout(),
        config.write_timeout(),
        config.connect_timeout(),
    );

    let handler = LinuxCncHandler::new(
        LinuxCnc::new(config.password.clone(), config.client_name.clone()),
        tcp_stream,
        connected.clone(),
    );

    let executor = CommandExecutor::new(handler);
    let sender = LinuxCncCommandSender::new(executor.sender(), connected);

    (executor, sender)
}
