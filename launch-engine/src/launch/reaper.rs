//! Background sweep of abandoned reservations

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info};

use super::LaunchTransactionCoordinator;

/// Run `reap_expired` every `interval` until `shutdown` flips to true
pub fn spawn_reaper(
    coordinator: Arc<LaunchTransactionCoordinator>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval_timer = time::interval(interval);
        interval_timer.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        let mut iteration = 0u64;

        info!("Reservation sweep running every {:?}", interval);
        loop {
            tokio::select! {
                _ = interval_timer.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Reservation sweep stopping");
                        return;
                    }
                    continue;
                }
            }

            iteration += 1;
            match coordinator.reap_expired().await {
                Ok(0) => debug!("Sweep {}: nothing to release", iteration),
                Ok(released) => info!("Sweep {}: released {} reservations", iteration, released),
                // Keep sweeping even if an individual pass fails
                Err(e) => error!("Sweep {} failed: {}", iteration, e),
            }
        }
    })
}
