use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tokio::{sync::watch, time::MissedTickBehavior};
use tracing::debug;

use crate::{controller::MotionCoordinator, status::StatusSnapshot};

/// Polls the coordinator status and publishes each snapshot.
/// Returns once every receiver is gone.
pub async fn run_state_monitor(
    coordinator: Arc<MotionCoordinator>,
    period: Duration,
    status_tx: watch::Sender<StatusSnapshot>,
) -> Result<()> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        if status_tx.is_closed() {
            debug!("No status subscribers left, state monitor exiting");
            return Ok(());
        }

        let snapshot = coordinator.get_status().await;
        status_tx.send_replace(snapshot);
    }
}
