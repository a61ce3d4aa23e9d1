//! Trend radar: binary entrypoint.
//! Loads config and taxonomy, starts the crawl scheduler and serves the
//! query API.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trend_radar::api::{self, AppState};
use trend_radar::ingest::{providers, scheduler::spawn_scheduler};
use trend_radar::metrics::Metrics;
use trend_radar::notify::NotifierMux;
use trend_radar::store::{FileStore, ItemStore};
use trend_radar::{AppConfig, Radar, Taxonomy};

/// `RADAR_LOG_JSON=1` switches to JSON lines; otherwise compact text.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("trend_radar=info,warn"));

    let json = std::env::var("RADAR_LOG_JSON").ok().is_some_and(|v| v == "1");
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = AppConfig::load().context("loading config")?;
    let taxonomy = Arc::new(
        Taxonomy::load(&config.taxonomy.path)
            .with_context(|| format!("loading taxonomy {}", config.taxonomy.path.display()))?,
    );
    if taxonomy.is_empty() {
        tracing::warn!("taxonomy has no categories; every report will be empty");
    }

    let metrics = Metrics::init().context("installing prometheus recorder")?;
    let store: Arc<dyn ItemStore> = Arc::new(FileStore::new(&config.storage.data_dir));
    let zone = config.report_zone()?;
    let normalization = config.matching.normalization();
    let bind = config.server.bind.clone();
    let interval = config.crawler.interval_secs;

    let sources = providers::from_config(&config.crawler);
    if sources.is_empty() {
        tracing::warn!("no hot lists or feeds configured; runs will see no items");
    }

    let radar = Arc::new(Radar::new(
        config,
        taxonomy.clone(),
        store.clone(),
        sources,
        NotifierMux::from_env(),
    )?);
    tracing::info!(
        mode = %radar.config().report.mode,
        %zone,
        interval_secs = interval,
        categories = taxonomy.categories().len(),
        "radar starting"
    );
    let _scheduler = spawn_scheduler(radar, interval);

    let state = AppState {
        store,
        taxonomy,
        normalization,
        zone,
    };
    let app = api::router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    tracing::info!(%bind, "query API listening");
    axum::serve(listener, app).await?;
    Ok(())
}
