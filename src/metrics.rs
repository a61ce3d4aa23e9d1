// src/metrics.rs
//! Prometheus exposition for the `radar_*` series.

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

/// Register descriptions once per process. Safe to call from every run.
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("radar_items_total", "Items kept after cleaning, across all providers.");
        describe_counter!("radar_filtered_total", "Items dropped by a global filter.");
        describe_counter!("radar_matches_total", "Category matches produced by the matcher.");
        describe_counter!("radar_new_matches_total", "Matches labelled new by dedup.");
        describe_counter!("radar_runs_total", "Completed report runs.");
        describe_counter!("radar_notifications_total", "Notifications delivered.");
        describe_counter!(
            "radar_notifications_suppressed_total",
            "Notifications skipped (not fired, empty or cooldown)."
        );
        describe_counter!("radar_provider_errors_total", "Provider fetch/parse failures.");
        describe_counter!("radar_store_errors_total", "Store reads/writes that failed during a run.");
        describe_histogram!("radar_fetch_ms", "Provider fetch time in milliseconds.");
        describe_gauge!("radar_last_run_ts", "Unix timestamp of the last completed run.");
    });
}

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide recorder. A second call reuses the first
    /// handle instead of failing.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE.get_or_try_init(|| PrometheusBuilder::new().install_recorder())?;
        ensure_described();
        Ok(Self {
            handle: handle.clone(),
        })
    }

    /// `/metrics` in the Prometheus text format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
