//! Periodic no-op tick that keeps the hosting process warm.

use chrono::Utc;
use std::time::Duration;
use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Spawn the timer. It logs once per `period` until `shutdown` is cancelled.
pub fn spawn(period: Duration, shutdown: CancellationToken) -> JoinHandle<u64> {
    tokio::spawn(run(period, shutdown))
}

/// Returns the number of ticks fired.
async fn run(period: Duration, shutdown: CancellationToken) -> u64 {
    let mut interval = time::interval_at(time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut ticks = 0;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                ticks += 1;
                info!("keep-warm timer fired at {}", Utc::now().to_rfc3339());
            }
        }
    }
    ticks
}
