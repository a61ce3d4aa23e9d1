// src/runner.rs
//! One full crawl-and-report run against a store.
//!
//! fetch → persist items → load state/history → `run_report` → persist
//! snapshot/state → notify → prune.
//!
//! Store failures never block delivery: an unreadable state or history is
//! treated as absent, and a failed write is logged and counted.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use metrics::{counter, gauge};
use tokio::sync::Mutex;

use crate::config::taxonomy::Taxonomy;
use crate::config::{AppConfig, ReportZone};
use crate::error::{RadarError, Result};
use crate::ingest::{self, types::SourceProvider};
use crate::notify::{Dispatcher, NotifierMux};
use crate::pipeline::{self, RunInput, RunOutput};
use crate::report::ReportMode;
use crate::store::{ItemStore, RunItems};

/// What a run did, for logs and tests.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub date: NaiveDate,
    pub items: usize,
    pub output: RunOutput,
    /// Sinks reached; `None` when the push was suppressed.
    pub notified: Option<usize>,
}

pub struct Radar {
    store: Arc<dyn ItemStore>,
    taxonomy: Arc<Taxonomy>,
    config: AppConfig,
    zone: ReportZone,
    providers: Vec<Box<dyn SourceProvider>>,
    dispatcher: Mutex<Dispatcher>,
}

impl Radar {
    pub fn new(
        config: AppConfig,
        taxonomy: Arc<Taxonomy>,
        store: Arc<dyn ItemStore>,
        providers: Vec<Box<dyn SourceProvider>>,
        mux: NotifierMux,
    ) -> Result<Self> {
        let zone = config.report_zone()?;
        let dispatcher = Mutex::new(Dispatcher::new(mux, &config.notify));
        Ok(Self {
            store,
            taxonomy,
            config,
            zone,
            providers,
            dispatcher,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn ItemStore> {
        self.store.clone()
    }

    pub fn taxonomy(&self) -> Arc<Taxonomy> {
        self.taxonomy.clone()
    }

    pub async fn run_once(&self) -> Result<RunSummary> {
        self.run_at(Utc::now()).await
    }

    /// `run_once` with an explicit clock.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunSummary> {
        let mode = self.config.report.mode;
        let date = pipeline::run_date(now, self.zone);

        let items = ingest::run_once(&self.providers).await;
        let run = RunItems {
            timestamp: now,
            date,
            items,
        };
        degrade("save_items", self.store.save_items(&run).await);

        let prior = degrade("load_dedup_state", self.store.load_dedup_state().await).flatten();
        let history = if mode == ReportMode::Daily {
            degrade("load_snapshots", self.store.load_snapshots(date).await).unwrap_or_default()
        } else {
            Vec::new()
        };

        let output = pipeline::run_report(RunInput {
            items: &run.items,
            taxonomy: &self.taxonomy,
            normalization: self.config.matching.normalization(),
            mode,
            now,
            zone: self.zone,
            prior_state: prior,
            history: &history,
        });

        degrade("save_snapshot", self.store.save_snapshot(&output.snapshot).await);
        degrade("save_dedup_state", self.store.save_dedup_state(&output.dedup_state).await);

        let notified = self
            .dispatcher
            .lock()
            .await
            .dispatch(output.fires, &output.payload, now)
            .await
            .ok();

        let keep_days = i64::from(self.config.storage.retention_days);
        if keep_days > 0 {
            let cutoff = date - ChronoDuration::days(keep_days);
            degrade("prune", self.store.prune(cutoff).await);
        }

        counter!("radar_runs_total", "mode" => mode.as_str()).increment(1);
        gauge!("radar_last_run_ts").set(now.timestamp() as f64);

        tracing::info!(
            target: "runner",
            %mode,
            %date,
            items = run.items.len(),
            matches = output.snapshot.total_matches(),
            reportable = output.payload.total_entries(),
            new = output.payload.new_entries(),
            fires = output.fires,
            notified = ?notified,
            "run finished"
        );

        Ok(RunSummary {
            date,
            items: run.items.len(),
            output,
            notified,
        })
    }
}

/// Log and count a store failure, yielding `None` in its place.
fn degrade<T>(op: &'static str, res: std::result::Result<T, RadarError>) -> Option<T> {
    match res {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(target: "runner", op, error = %e, "store operation failed; continuing");
            counter!("radar_store_errors_total", "op" => op).increment(1);
            None
        }
    }
}
