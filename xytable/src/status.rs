use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tracing::debug;

use crate::{
    axis::Axis,
    backend::{AxisFields, BackendStatus, Limit, MotionBackend},
    controller::SafetyGate,
};

/// Per-axis view. `None` means the backend could not be read.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisStatus {
    pub position: Option<f64>,
    pub moving: Option<bool>,
    pub enabled: Option<bool>,
    pub in_position: Option<bool>,
    pub homed: Option<bool>,
    pub limit: Option<Limit>,
}

impl From<&AxisFields> for AxisStatus {
    fn from(fields: &AxisFields) -> Self {
        AxisStatus {
            position: Some(fields.position),
            moving: Some(fields.moving),
            enabled: Some(fields.enabled),
            in_position: Some(fields.in_position),
            homed: Some(fields.homed),
            limit: Some(fields.limit),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusSnapshot {
    pub connected: bool,
    pub emergency_stop_active: bool,
    pub movement_in_progress: bool,
    pub machine_on: Option<bool>,
    pub x_axis: AxisStatus,
    pub y_axis: AxisStatus,
    pub error_state: bool,
    pub error: Option<String>,
}

impl StatusSnapshot {
    pub fn axis(&self, axis: Axis) -> &AxisStatus {
        match axis {
            Axis::X => &self.x_axis,
            Axis::Y => &self.y_axis,
        }
    }

    /// Whether `axis` sits within `tolerance` of `target`, if its position is known.
    pub fn at_position(&self, axis: Axis, target: f64, tolerance: f64) -> Option<bool> {
        self.axis(axis)
            .position
            .map(|position| (position - target).abs() <= tolerance)
    }
}

fn opt<T: fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "?".to_string(), |v| v.to_string())
}

impl fmt::Display for AxisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pos={},moving={},enabled={},in_position={},homed={},limit={}",
            self.position.map_or_else(|| "?".to_string(), |p| format!("{:.4}", p)),
            opt(self.moving),
            opt(self.enabled),
            opt(self.in_position),
            opt(self.homed),
            opt(self.limit.map(|l| l.as_str())),
        )
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "connected={} estop={} busy={} machine_on={} error={} x:{} y:{}",
            self.connected,
            self.emergency_stop_active,
            self.movement_in_progress,
            opt(self.machine_on),
            self.error_state,
            self.x_axis,
            self.y_axis,
        )?;

        if let Some(error) = &self.error {
            write!(f, " message=\"{}\"", error)?;
        }

        Ok(())
    }
}

/// Merges backend status with coordinator-local state. Never fails.
pub struct StatusAggregator {
    backend: Arc<dyn MotionBackend>,
    safety: Arc<SafetyGate>,
    in_progress: Arc<AtomicBool>,
    timeout: Duration,
}

impl StatusAggregator {
    pub fn new(
        backend: Arc<dyn MotionBackend>,
        safety: Arc<SafetyGate>,
        in_progress: Arc<AtomicBool>,
        timeout: Duration,
    ) -> Self {
        Self {
            backend,
            safety,
            in_progress,
            timeout,
        }
    }

    async fn read_backend(&self) -> Result<BackendStatus, String> {
        if !self.backend.is_connected() {
            return Err("Not connected".to_string());
        }

        match tokio::time::timeout(self.timeout, self.backend.read_status()).await {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "Status read timed out after {} ms",
                self.timeout.as_millis()
            )),
        }
    }

    pub async fn get_status(&self) -> StatusSnapshot {
        let generation = self.safety.generation();
        let backend = self.read_backend().await;

        if let Ok(status) = &backend {
            self.safety.refresh(status.estop, generation);
        }

        let mut snapshot = StatusSnapshot {
            connected: self.backend.is_connected(),
            emergency_stop_active: self.safety.is_active(),
            movement_in_progress: self.in_progress.load(Ordering::SeqCst),
            ..Default::default()
        };

        match backend {
            Ok(status) => {
                snapshot.machine_on = Some(status.machine_on);
                snapshot.x_axis = status.axis(Axis::X).into();
                snapshot.y_axis = status.axis(Axis::Y).into();
            }
            Err(message) => {
                debug!("Status read failed: {}", message);
                snapshot.error_state = true;
                snapshot.error = Some(message);
            }
        }

        snapshot
    }
}
