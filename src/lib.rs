// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod ingest;

// Core report pipeline: matcher → dedup → strategy → ranking
pub mod dedup;
pub mod matcher;
pub mod pipeline;
pub mod ranking;
pub mod report;

// Persistence, orchestration, push
pub mod notify;
pub mod runner;
pub mod store;

// Read side
pub mod api;
pub mod metrics;
pub mod query;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::config::taxonomy::Taxonomy;
pub use crate::config::AppConfig;
pub use crate::error::{RadarError, Result};
pub use crate::pipeline::{run_report, RunInput, RunOutput};
pub use crate::report::ReportMode;
pub use crate::runner::Radar;
