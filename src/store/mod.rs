// src/store/mod.rs
//! Persistence seam for crawled items, match snapshots and dedup state.
//!
//! Everything is keyed by report date (in the configured zone). A missing
//! or unreadable record is reported as absent, never as a hard error, so a
//! corrupt file costs one run's history rather than the whole service.

pub mod file;
pub mod memory;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::dedup::DedupState;
use crate::error::Result;
use crate::ingest::types::Item;
use crate::matcher::MatchSnapshot;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Items of one crawl run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunItems {
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub items: Vec<Item>,
}

#[async_trait::async_trait]
pub trait ItemStore: Send + Sync {
    async fn save_items(&self, run: &RunItems) -> Result<()>;

    /// All runs of `date`, oldest first.
    async fn load_items(&self, date: NaiveDate) -> Result<Vec<RunItems>>;

    /// Most recent run overall.
    async fn latest_items(&self) -> Result<Option<RunItems>>;

    /// Dates with stored items, ascending.
    async fn list_dates(&self) -> Result<Vec<NaiveDate>>;

    async fn load_dedup_state(&self) -> Result<Option<DedupState>>;

    async fn save_dedup_state(&self, state: &DedupState) -> Result<()>;

    /// Snapshots of `date`, oldest first.
    async fn load_snapshots(&self, date: NaiveDate) -> Result<Vec<MatchSnapshot>>;

    async fn save_snapshot(&self, snapshot: &MatchSnapshot) -> Result<()>;

    /// Drop every date strictly before `before`. Returns how many dates went.
    async fn prune(&self, before: NaiveDate) -> Result<usize>;
}
