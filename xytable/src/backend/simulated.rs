use std::{
    collections::HashSet,
    io,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
    time::Duration,
};

use async_trait::async_trait;
use tracing::debug;

use super::{AxisFields, BackendStatus, Limit, MotionBackend};
use crate::axis::{Axis, IoChannel, JogDirection};

#[derive(Debug, Default)]
struct Machine {
    estop: bool,
    positions: [f64; 2],
    homed: [bool; 2],
    jogging: [Option<f64>; 2],
    io: [bool; 2],
}

#[derive(Debug, Default)]
struct Faults {
    refuse_connect: bool,
    failing: HashSet<&'static str>,
    erroring: HashSet<&'static str>,
    failing_axes: [bool; 2],
    unreachable_status: bool,
}

/// In-memory table used by `--simulate` runs and the tests.
///
/// Motion completes instantly after the configured latency. Every dispatched
/// call is recorded, and overlapping dispatches are counted.
#[derive(Debug)]
pub struct SimulatedBackend {
    connected: AtomicBool,
    machine: Mutex<Machine>,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<String>>,
    latency: Duration,
    status_latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a> {
    counter: &'a AtomicUsize,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::with_latency(Duration::ZERO)
    }

    pub fn with_latency(latency: Duration) -> Self {
        SimulatedBackend {
            connected: AtomicBool::new(false),
            machine: Mutex::new(Machine::default()),
            faults: Mutex::new(Faults::default()),
            calls: Mutex::new(Vec::new()),
            latency,
            status_latency: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Delays status reads after the machine state has been sampled, so the
    /// returned status can be older than commands sent meanwhile.
    pub fn with_status_latency(mut self, latency: Duration) -> Self {
        self.status_latency = latency;
        self
    }

    /// Makes relative moves of `axis` answer `Ok(false)` while `failing` is set.
    pub fn fail_axis(&self, axis: Axis, failing: bool) {
        lock(&self.faults).failing_axes[axis.index()] = failing;
    }

    /// Makes `operation` answer `Ok(false)` until [`recover`](Self::recover).
    pub fn fail(&self, operation: &'static str) {
        lock(&self.faults).failing.insert(operation);
    }

    /// Makes `operation` answer with an I/O error until [`recover`](Self::recover).
    pub fn error(&self, operation: &'static str) {
        lock(&self.faults).erroring.insert(operation);
    }

    pub fn recover(&self, operation: &'static str) {
        let mut faults = lock(&self.faults);
        faults.failing.remove(operation);
        faults.erroring.remove(operation);
    }

    pub fn refuse_connect(&self, refuse: bool) {
        lock(&self.faults).refuse_connect = refuse;
    }

    pub fn set_status_unreachable(&self, unreachable: bool) {
        lock(&self.faults).unreachable_status = unreachable;
    }

    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Flips the E-stop as if the operator pressed the physical button.
    pub fn press_estop(&self) {
        let mut machine = lock(&self.machine);
        machine.estop = true;
        machine.jogging = [None, None];
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|call| call.split_whitespace().next() == Some(operation))
            .count()
    }

    pub fn max_concurrent_calls(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn position(&self, axis: Axis) -> f64 {
        lock(&self.machine).positions[axis.index()]
    }

    pub fn is_jogging(&self, axis: Axis) -> bool {
        lock(&self.machine).jogging[axis.index()].is_some()
    }

    pub fn io_state(&self, channel: IoChannel) -> bool {
        lock(&self.machine).io[channel.channel() as usize]
    }

    async fn enter(&self, operation: &'static str, call: String) -> io::Result<bool> {
        lock(&self.calls).push(call);

        let active = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(active, Ordering::SeqCst);
        let _in_flight = InFlight {
            counter: &self.in_flight,
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if !self.connected.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "Not connected"));
        }

        let faults = lock(&self.faults);
        if faults.erroring.contains(operation) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("simulated fault in {}", operation),
            ));
        }

        Ok(!faults.failing.contains(operation))
    }
}

#[async_trait]
impl MotionBackend for SimulatedBackend {
    async fn connect(&self) -> io::Result<bool> {
        if lock(&self.faults).refuse_connect {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "simulated backend refused connection",
            ));
        }

        self.connected.store(true, Ordering::SeqCst);
        debug!("Simulated backend connected");
        Ok(true)
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn read_status(&self) -> io::Result<BackendStatus> {
        if !self.is_connected() || lock(&self.faults).unreachable_status {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "simulated backend unreachable",
            ));
        }

        let status = {
            let machine = lock(&self.machine);
            let axis = |index: usize| {
                let moving = machine.jogging[index].is_some();
                AxisFields {
                    position: machine.positions[index],
                    moving,
                    enabled: !machine.estop,
                    in_position: !moving,
                    homed: machine.homed[index],
                    limit: Limit::None,
                }
            };

            let axes = [axis(0), axis(1)];
            BackendStatus {
                estop: machine.estop,
                machine_on: !machine.estop,
                axes,
            }
        };

        if !self.status_latency.is_zero() {
            tokio::time::sleep(self.status_latency).await;
        }

        Ok(status)
    }

    async fn move_axis(&self, axis: Axis, distance: f64, speed: f64) -> io::Result<bool> {
        let accepted = self
            .enter("move_axis", format!("move_axis {} {} {}", axis, distance, speed))
            .await?
            && !lock(&self.faults).failing_axes[axis.index()];
        if accepted {
            lock(&self.machine).positions[axis.index()] += distance;
        }
        Ok(accepted)
    }

    async fn move_absolute(&self, x: f64, y: f64) -> io::Result<bool> {
        let accepted = self
            .enter("move_absolute", format!("move_absolute {} {}", x, y))
            .await?;
        if accepted {
            lock(&self.machine).positions = [x, y];
        }
        Ok(accepted)
    }

    async fn home_axis(&self, axis: Axis) -> io::Result<bool> {
        let accepted = self
            .enter("home_axis", format!("home_axis {}", axis))
            .await?;
        if accepted {
            let mut machine = lock(&self.machine);
            machine.positions[axis.index()] = 0.0;
            machine.homed[axis.index()] = true;
        }
        Ok(accepted)
    }

    async fn home_all_axes(&self) -> io::Result<bool> {
        let accepted = self
            .enter("home_all_axes", "home_all_axes".to_string())
            .await?;
        if accepted {
            let mut machine = lock(&self.machine);
            machine.positions = [0.0, 0.0];
            machine.homed = [true, true];
        }
        Ok(accepted)
    }

    async fn start_jog(&self, axis: Axis, direction: JogDirection, speed: f64) -> io::Result<bool> {
        let velocity = direction.sign() * speed;
        let accepted = self
            .enter("start_jog", format!("start_jog {} {}", axis, velocity))
            .await?;
        if accepted {
            lock(&self.machine).jogging[axis.index()] = Some(velocity);
        }
        Ok(accepted)
    }

    async fn stop_jog(&self, axis: Axis) -> io::Result<bool> {
        let accepted = self
            .enter("stop_jog", format!("stop_jog {}", axis))
            .await?;
        if accepted {
            lock(&self.machine).jogging[axis.index()] = None;
        }
        Ok(accepted)
    }

    async fn set_io(&self, channel: IoChannel, state: bool) -> io::Result<bool> {
        let accepted = self
            .enter("set_io", format!("set_io {} {}", channel.channel(), state))
            .await?;
        if accepted {
            lock(&self.machine).io[channel.channel() as usize] = state;
        }
        Ok(accepted)
    }

    async fn emergency_stop(&self) -> io::Result<bool> {
        let accepted = self
            .enter("emergency_stop", "emergency_stop".to_string())
            .await?;
        if accepted {
            let mut machine = lock(&self.machine);
            machine.estop = true;
            machine.jogging = [None, None];
        }
        Ok(accepted)
    }

    async fn clear_emergency_stop(&self) -> io::Result<bool> {
        let accepted = self
            .enter("clear_emergency_stop", "clear_emergency_stop".to_string())
            .await?;
        if accepted {
            lock(&self.machine).estop = false;
        }
        Ok(accepted)
    }
}
