use std::io;

use async_trait::async_trait;

use crate::axis::{Axis, IoChannel, JogDirection};

pub mod linuxcnc;
pub mod simulated;

pub use self::linuxcnc::LinuxCncBackend;
pub use simulated::SimulatedBackend;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Limit {
    #[default]
    None,
    Lower,
    Upper,
    Both,
}

impl Limit {
    pub fn from_switches(lower: bool, upper: bool) -> Self {
        match (lower, upper) {
            (true, true) => Limit::Both,
            (true, false) => Limit::Lower,
            (false, true) => Limit::Upper,
            (false, false) => Limit::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Limit::None => "none",
            Limit::Lower => "lower",
            Limit::Upper => "upper",
            Limit::Both => "both",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisFields {
    pub position: f64,
    pub moving: bool,
    pub enabled: bool,
    pub in_position: bool,
    pub homed: bool,
    pub limit: Limit,
}

/// What the backend reports about the machine at one poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendStatus {
    pub estop: bool,
    pub machine_on: bool,
    pub axes: [AxisFields; 2],
}

impl BackendStatus {
    pub fn axis(&self, axis: Axis) -> &AxisFields {
        &self.axes[axis.index()]
    }
}

/// Contract of the external motion backend.
///
/// `Ok(false)` means the backend refused the command; `Err` means it could not
/// be delivered. Implementations bound their own I/O and keep no coordinator state.
#[async_trait]
pub trait MotionBackend: Send + Sync {
    async fn connect(&self) -> io::Result<bool>;

    async fn disconnect(&self);

    fn is_connected(&self) -> bool;

    async fn read_status(&self) -> io::Result<BackendStatus>;

    async fn move_axis(&self, axis: Axis, distance: f64, speed: f64) -> io::Result<bool>;

    async fn move_absolute(&self, x: f64, y: f64) -> io::Result<bool>;

    async fn home_axis(&self, axis: Axis) -> io::Result<bool>;

    async fn home_all_axes(&self) -> io::Result<bool>;

    async fn start_jog(&self, axis: Axis, direction: JogDirection, speed: f64) -> io::Result<bool>;

    async fn stop_jog(&self, axis: Axis) -> io::Result<bool>;

    async fn set_io(&self, channel: IoChannel, state: bool) -> io::Result<bool>;

    async fn emergency_stop(&self) -> io::Result<bool>;

    async fn clear_emergency_stop(&self) -> io::Result<bool>;
}
