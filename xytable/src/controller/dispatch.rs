use std::{future::Future, io, sync::Arc, time::Duration};

use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

use crate::{
    backend::MotionBackend,
    controller::jog::JogTable,
    error::{CoordinatorError, CoordinatorResult},
};

/// State that may only change while the dispatch lock is held.
#[derive(Debug, Default)]
pub struct DispatchState {
    pub jogs: JogTable,
}

/// Serializes access to the motion backend.
///
/// Every call that reaches the backend takes `&mut DispatchState`, so it can
/// only be made by a holder of the lock. Calls are bounded by `timeout`.
pub struct Dispatcher {
    backend: Arc<dyn MotionBackend>,
    timeout: Duration,
    state: Mutex<DispatchState>,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn MotionBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            state: Mutex::new(DispatchState::default()),
        }
    }

    pub fn backend(&self) -> &dyn MotionBackend {
        self.backend.as_ref()
    }

    pub fn backend_handle(&self) -> Arc<dyn MotionBackend> {
        self.backend.clone()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn lock(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock().await
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, DispatchState>> {
        self.state.try_lock().ok()
    }

    /// Makes exactly one reconnect attempt when the backend reports it is down.
    pub async fn ensure_connected(&self, _state: &mut DispatchState) -> CoordinatorResult<()> {
        if self.backend.is_connected() {
            return Ok(());
        }

        warn!("Motion backend not connected, attempting reconnect");

        let unavailable = |message: String| CoordinatorError::BackendUnavailable { message };

        match tokio::time::timeout(self.timeout, self.backend.connect()).await {
            Ok(Ok(true)) => {
                info!("Reconnected to motion backend");
                Ok(())
            }
            Ok(Ok(false)) => Err(unavailable("backend refused the connection".to_string())),
            Ok(Err(e)) => Err(unavailable(e.to_string())),
            Err(_) => Err(unavailable(format!(
                "connect timed out after {} ms",
                self.timeout.as_millis()
            ))),
        }
    }

    /// Sends one command. `Ok(false)` and I/O failures become `Backend` errors.
    pub async fn call<F>(
        &self,
        state: &mut DispatchState,
        operation: &str,
        command: F,
    ) -> CoordinatorResult<()>
    where
        F: Future<Output = io::Result<bool>>,
    {
        self.ensure_connected(state).await?;

        match tokio::time::timeout(self.timeout, command).await {
            Ok(Ok(true)) => Ok(()),
            Ok(Ok(false)) => Err(CoordinatorError::backend(
                operation,
                "backend rejected the command",
            )),
            Ok(Err(e)) => Err(CoordinatorError::backend(operation, e.to_string())),
            Err(_) => Err(CoordinatorError::backend(
                operation,
                format!("timed out after {} ms", self.timeout.as_millis()),
            )),
        }
    }
}
