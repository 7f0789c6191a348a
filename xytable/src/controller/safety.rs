use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use tracing::{debug, error, info, warn};

use crate::{
    controller::dispatch::Dispatcher,
    error::{CoordinatorError, CoordinatorResult},
};

/// Process-wide emergency-stop flag.
///
/// Raising the flag never waits; lowering it and folding in backend reports
/// happen under the dispatch lock. Motion commands re-check the flag once they
/// hold the lock, so none reaches the backend after an E-stop was requested.
/// Reads are lock-free and never touch the backend.
pub struct SafetyGate {
    active: AtomicBool,
    clears: AtomicU64,
    dispatch: Arc<Dispatcher>,
}

impl SafetyGate {
    pub fn new(dispatch: Arc<Dispatcher>) -> Self {
        Self {
            active: AtomicBool::new(false),
            clears: AtomicU64::new(0),
            dispatch,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Number of successful clears so far. Sample it before a backend status
    /// read and hand it to [`refresh`](Self::refresh).
    pub fn generation(&self) -> u64 {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn check(&self, operation: &str) -> CoordinatorResult<()> {
        if self.is_active() {
            return Err(CoordinatorError::SafetyBlocked {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    /// Raises the flag, drops all jog sessions, then tells the backend.
    /// The flag stays raised if the backend call fails.
    ///
    /// The flag goes up before waiting for the dispatch lock, so commands
    /// already queued behind a running one are refused when their turn comes.
    pub async fn assert_stop(&self) -> CoordinatorResult<()> {
        self.active.store(true, Ordering::SeqCst);
        let mut state = self.dispatch.lock().await;

        // A clear that held the lock may have lowered it meanwhile.
        self.active.store(true, Ordering::SeqCst);
        let jogs = state.jogs.clear();
        warn!(jogs_dropped = jogs, "Emergency stop activated");

        let result = self
            .dispatch
            .call(
                &mut state,
                "assert emergency stop",
                self.dispatch.backend().emergency_stop(),
            )
            .await;

        match &result {
            Ok(()) => info!("Emergency stop completed"),
            Err(e) => error!("Emergency stop failed, motion stays blocked: {}", e),
        }

        result
    }

    /// Clears the flag only after the backend confirms the clear and re-power.
    pub async fn clear(&self) -> CoordinatorResult<()> {
        let mut state = self.dispatch.lock().await;

        info!("Clearing emergency stop");

        let result = self
            .dispatch
            .call(
                &mut state,
                "clear emergency stop",
                self.dispatch.backend().clear_emergency_stop(),
            )
            .await;

        match &result {
            Ok(()) => {
                self.clears.fetch_add(1, Ordering::SeqCst);
                self.active.store(false, Ordering::SeqCst);
                info!("Emergency stop cleared");
            }
            Err(e) => error!("Clear emergency stop failed, motion stays blocked: {}", e),
        }

        result
    }

    /// Folds in an E-stop observed on the backend.
    ///
    /// Best effort: skipped while a command holds the dispatch lock. Only ever
    /// raises the flag, clearing stays an explicit operation. `generation` is
    /// the value of [`generation`](Self::generation) taken before the backend
    /// was read; a read that started before a successful clear is ignored.
    pub fn refresh(&self, backend_estop: bool, generation: u64) {
        if !backend_estop || self.is_active() {
            return;
        }

        if let Some(mut state) = self.dispatch.try_lock() {
            if self.generation() != generation {
                debug!("Ignoring emergency stop from a status read older than the last clear");
                return;
            }

            self.active.store(true, Ordering::SeqCst);
            state.jogs.clear();
            warn!("Backend reports emergency stop, motion blocked until cleared");
        }
    }
}
