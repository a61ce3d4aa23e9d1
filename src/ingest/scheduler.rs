// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::runner::Radar;

/// Tick `Radar::run_once` every `interval_secs`. The first tick fires
/// immediately; a slow run delays the next tick instead of overlapping it.
pub fn spawn_scheduler(radar: Arc<Radar>, interval_secs: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match radar.run_once().await {
                Ok(summary) => tracing::debug!(
                    target: "ingest",
                    date = %summary.date,
                    items = summary.items,
                    "scheduled run done"
                ),
                Err(e) => tracing::error!(target: "ingest", error = %e, "scheduled run failed"),
            }
        }
    })
}
