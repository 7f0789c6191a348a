use std::{
    future::Future,
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tracing::{debug, error, info, warn};

use crate::{
    axis::{Axis, AxisLimits, AxisRegistry, IoChannel, JogDirection},
    backend::MotionBackend,
    config::{Config, MovementConfig},
    controller::{
        dispatch::Dispatcher,
        jog::JogSession,
        safety::SafetyGate,
    },
    error::{CoordinatorError, CoordinatorResult},
    status::{StatusAggregator, StatusSnapshot},
};

/// Holds the movement flag for the duration of one backend motion command.
struct MovementGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> MovementGuard<'a> {
    fn begin(flag: &'a AtomicBool) -> CoordinatorResult<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| CoordinatorError::Internal {
                message: "movement already in progress while holding the dispatch lock"
                    .to_string(),
            })?;

        Ok(Self { flag })
    }
}

impl Drop for MovementGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

fn log_outcome(axis: Axis, distance: f64, speed: f64, kind: &str, result: &CoordinatorResult<()>) {
    match result {
        Ok(()) => info!(
            axis = %axis,
            distance,
            speed,
            event = "completed",
            "{} axis {} completed",
            axis,
            kind
        ),
        Err(e) => error!(
            axis = %axis,
            distance,
            speed,
            event = "failed",
            "{} axis {} failed: {}",
            axis,
            kind,
            e
        ),
    }
}

/// Entry point for every movement, jog, homing, IO and safety request.
///
/// Requests are checked against the safety gate and the axis registry first,
/// then sent to the backend one at a time.
pub struct MotionCoordinator {
    registry: AxisRegistry,
    movement: MovementConfig,
    dispatch: Arc<Dispatcher>,
    safety: Arc<SafetyGate>,
    in_progress: Arc<AtomicBool>,
    status: StatusAggregator,
}

impl MotionCoordinator {
    pub fn new(
        backend: Arc<dyn MotionBackend>,
        registry: AxisRegistry,
        movement: MovementConfig,
    ) -> Self {
        let timeout = movement.command_timeout();
        let dispatch = Arc::new(Dispatcher::new(backend.clone(), timeout));
        let safety = Arc::new(SafetyGate::new(dispatch.clone()));
        let in_progress = Arc::new(AtomicBool::new(false));
        let status = StatusAggregator::new(backend, safety.clone(), in_progress.clone(), timeout);

        Self {
            registry,
            movement,
            dispatch,
            safety,
            in_progress,
            status,
        }
    }

    pub fn from_config(backend: Arc<dyn MotionBackend>, config: &Config) -> Self {
        Self::new(
            backend,
            AxisRegistry::from_config(&config.table),
            config.movement.clone(),
        )
    }

    pub fn registry(&self) -> &AxisRegistry {
        &self.registry
    }

    pub fn limits(&self, axis: Axis) -> &AxisLimits {
        self.registry.limits(axis)
    }

    pub fn movement_config(&self) -> &MovementConfig {
        &self.movement
    }

    pub fn safety(&self) -> &Arc<SafetyGate> {
        &self.safety
    }

    pub fn is_emergency_stop_active(&self) -> bool {
        self.safety.is_active()
    }

    pub fn is_movement_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    pub async fn jog_session(&self, axis: Axis) -> Option<JogSession> {
        self.dispatch.lock().await.jogs.get(axis).copied()
    }

    pub async fn connect(&self) -> CoordinatorResult<()> {
        let mut state = self.dispatch.lock().await;
        self.dispatch.ensure_connected(&mut state).await
    }

    /// Stops any jog still running and closes the backend session.
    pub async fn shutdown(&self) {
        if let Err(e) = self.stop_all_jogs().await {
            error!("Failed to stop jogs during shutdown: {}", e);
        }

        let _state = self.dispatch.lock().await;
        self.dispatch.backend().disconnect().await;
        info!("Motion coordinator shut down");
    }

    /// Omitted speeds become the configured default before any limit check.
    fn resolve_speed(&self, speed: Option<f64>) -> f64 {
        speed.unwrap_or(self.movement.default_speed)
    }

    /// Runs one motion command under the dispatch lock with the movement flag set.
    async fn run_motion<F>(&self, operation: &str, command: F) -> CoordinatorResult<()>
    where
        F: Future<Output = io::Result<bool>>,
    {
        let mut state = self.dispatch.lock().await;
        self.safety.check(operation)?;
        let _busy = MovementGuard::begin(&self.in_progress)?;

        self.dispatch.call(&mut state, operation, command).await
    }

    pub async fn move_single_axis(
        &self,
        axis: Axis,
        distance: f64,
        speed: Option<f64>,
    ) -> CoordinatorResult<()> {
        let operation = format!("move {} axis", axis);
        self.safety.check(&operation)?;

        let speed = self.resolve_speed(speed);
        self.registry.validate_distance(axis, distance)?;
        self.registry.validate_speed(axis, speed)?;

        info!(
            axis = %axis,
            distance,
            speed,
            event = "started",
            "Starting {} axis movement",
            axis
        );

        let result = self
            .run_motion(
                &operation,
                self.dispatch.backend().move_axis(axis, distance, speed),
            )
            .await;

        log_outcome(axis, distance, speed, "movement", &result);
        result
    }

    /// Sends X then Y. A failed Y move does not undo the X move.
    pub async fn move_coordinated(
        &self,
        x_distance: f64,
        y_distance: f64,
        speed: Option<f64>,
    ) -> CoordinatorResult<()> {
        let operation = "coordinated move";
        self.safety.check(operation)?;

        let speed = self.resolve_speed(speed);
        for (axis, distance) in [(Axis::X, x_distance), (Axis::Y, y_distance)] {
            self.registry.validate_distance(axis, distance)?;
            self.registry.validate_speed(axis, speed)?;
        }

        info!(
            x_distance,
            y_distance,
            speed,
            event = "started",
            "Starting coordinated movement"
        );

        let mut state = self.dispatch.lock().await;
        self.safety.check(operation)?;
        let _busy = MovementGuard::begin(&self.in_progress)?;

        let backend = self.dispatch.backend();
        for (axis, distance) in [(Axis::X, x_distance), (Axis::Y, y_distance)] {
            let result = self
                .dispatch
                .call(
                    &mut state,
                    &format!("move {} axis", axis),
                    backend.move_axis(axis, distance, speed),
                )
                .await;

            log_outcome(axis, distance, speed, "coordinated movement", &result);
            result?;
        }

        Ok(())
    }

    pub async fn move_absolute(&self, x: f64, y: f64, speed: Option<f64>) -> CoordinatorResult<()> {
        let operation = "absolute move";
        self.safety.check(operation)?;

        let speed = self.resolve_speed(speed);
        for (axis, position) in [(Axis::X, x), (Axis::Y, y)] {
            self.registry.validate_speed(axis, speed)?;
            self.registry.validate_position(axis, position)?;
        }

        info!(x, y, speed, event = "started", "Starting absolute movement");

        let result = self
            .run_motion(operation, self.dispatch.backend().move_absolute(x, y))
            .await;

        match &result {
            Ok(()) => info!(x, y, speed, event = "completed", "Absolute movement completed"),
            Err(e) => error!(x, y, speed, event = "failed", "Absolute movement failed: {}", e),
        }

        result
    }

    /// `speed` falls back to the homing speed and is only logged; the backend
    /// homes at the rates of its own configuration.
    pub async fn home_axes(&self, speed: Option<f64>) -> CoordinatorResult<()> {
        let operation = "home all axes";
        self.safety.check(operation)?;

        let speed = speed.unwrap_or(self.movement.homing_speed);
        info!(speed, "Starting homing sequence");

        let result = self
            .run_motion(operation, self.dispatch.backend().home_all_axes())
            .await;

        match &result {
            Ok(()) => info!("Homing sequence completed"),
            Err(e) => error!("Homing sequence failed: {}", e),
        }

        result
    }

    pub async fn home_axis(&self, axis: Axis, speed: Option<f64>) -> CoordinatorResult<()> {
        let operation = format!("home {} axis", axis);
        self.safety.check(&operation)?;

        let speed = speed.unwrap_or(self.movement.homing_speed);
        info!(axis = %axis, speed, "Homing {} axis", axis);

        let result = self
            .run_motion(&operation, self.dispatch.backend().home_axis(axis))
            .await;

        match &result {
            Ok(()) => info!(axis = %axis, "{} axis homed", axis),
            Err(e) => error!(axis = %axis, "Homing {} axis failed: {}", axis, e),
        }

        result
    }

    pub async fn emergency_stop(&self) -> CoordinatorResult<()> {
        self.safety.assert_stop().await
    }

    pub async fn clear_emergency_stop(&self) -> CoordinatorResult<()> {
        self.safety.clear().await
    }

    /// Starts a continuous jog. A running jog on the same axis is replaced.
    pub async fn start_jog(&self, axis: Axis, direction: i32, speed: f64) -> CoordinatorResult<()> {
        let operation = format!("jog {} axis", axis);
        self.safety.check(&operation)?;

        let direction = JogDirection::try_from(direction)?;
        self.registry.validate_speed(axis, speed)?;

        info!(axis = %axis, direction = ?direction, speed, "Starting jog");

        let mut state = self.dispatch.lock().await;
        self.safety.check(&operation)?;

        {
            let _busy = MovementGuard::begin(&self.in_progress)?;
            self.dispatch
                .call(
                    &mut state,
                    &operation,
                    self.dispatch.backend().start_jog(axis, direction, speed),
                )
                .await
                .inspect_err(|e| error!(axis = %axis, "Jog start failed: {}", e))?;
        }

        if let Some(previous) = state.jogs.start(axis, JogSession { direction, speed }) {
            debug!(axis = %axis, "Replaced jog session {:?}", previous);
        }

        Ok(())
    }

    /// Stopping an axis that is not jogging succeeds. The stop is still sent
    /// so a jog the coordinator does not know about is halted too.
    pub async fn stop_jog(&self, axis: Axis) -> CoordinatorResult<()> {
        let operation = format!("stop jog on {} axis", axis);
        let mut state = self.dispatch.lock().await;

        info!(axis = %axis, "Stopping jog");

        let backend = self.dispatch.backend();
        if state.jogs.get(axis).is_none() {
            if let Err(e) = self
                .dispatch
                .call(&mut state, &operation, backend.stop_jog(axis))
                .await
            {
                warn!(axis = %axis, "No active jog, stop not confirmed: {}", e);
            }
            return Ok(());
        }

        self.dispatch
            .call(&mut state, &operation, backend.stop_jog(axis))
            .await
            .inspect_err(|e| error!(axis = %axis, "Failed to stop jog: {}", e))?;

        state.jogs.stop(axis);
        Ok(())
    }

    /// Stops every axis with an active jog session. Axes whose stop fails
    /// keep their session; the first failure is returned.
    pub async fn stop_all_jogs(&self) -> CoordinatorResult<()> {
        let mut state = self.dispatch.lock().await;
        let backend = self.dispatch.backend();
        let mut first_error = None;

        for axis in state.jogs.active() {
            let operation = format!("stop jog on {} axis", axis);

            match self
                .dispatch
                .call(&mut state, &operation, backend.stop_jog(axis))
                .await
            {
                Ok(()) => {
                    state.jogs.stop(axis);
                    info!(axis = %axis, "Jog stopped");
                }
                Err(e) => {
                    error!(axis = %axis, "Failed to stop jog: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    pub async fn set_io(&self, name: &str, state: bool) -> CoordinatorResult<()> {
        let channel: IoChannel = name.parse()?;
        let operation = format!(
            "set {} (channel {}) {}",
            channel.name(),
            channel.channel(),
            if state { "ON" } else { "OFF" }
        );

        info!("{}", operation);

        let mut dispatch_state = self.dispatch.lock().await;
        self.dispatch
            .call(
                &mut dispatch_state,
                &operation,
                self.dispatch.backend().set_io(channel, state),
            )
            .await
            .inspect_err(|e| error!("Failed to {}: {}", operation, e))
    }

    pub async fn get_status(&self) -> StatusSnapshot {
        self.status.get_status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_guard_is_exclusive() {
        let flag = AtomicBool::new(false);

        let guard = MovementGuard::begin(&flag).unwrap();
        assert!(flag.load(Ordering::SeqCst));
        assert!(matches!(
            MovementGuard::begin(&flag),
            Err(CoordinatorError::Internal { .. })
        ));

        drop(guard);
        assert!(!flag.load(Ordering::SeqCst));
    }
}
