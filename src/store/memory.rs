// src/store/memory.rs
//! In-process store for tests and one-shot runs.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tokio::sync::Mutex;

use super::{ItemStore, RunItems};
use crate::dedup::DedupState;
use crate::error::Result;
use crate::matcher::MatchSnapshot;

#[derive(Debug, Default)]
struct Inner {
    items: BTreeMap<NaiveDate, Vec<RunItems>>,
    snapshots: BTreeMap<NaiveDate, Vec<MatchSnapshot>>,
    dedup: Option<DedupState>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ItemStore for MemoryStore {
    async fn save_items(&self, run: &RunItems) -> Result<()> {
        let mut g = self.inner.lock().await;
        let runs = g.items.entry(run.date).or_default();
        runs.retain(|r| r.timestamp != run.timestamp);
        runs.push(run.clone());
        runs.sort_by_key(|r| r.timestamp);
        Ok(())
    }

    async fn load_items(&self, date: NaiveDate) -> Result<Vec<RunItems>> {
        Ok(self.inner.lock().await.items.get(&date).cloned().unwrap_or_default())
    }

    async fn latest_items(&self) -> Result<Option<RunItems>> {
        let g = self.inner.lock().await;
        Ok(g.items.values().rev().find_map(|runs| runs.last().cloned()))
    }

    async fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        Ok(self.inner.lock().await.items.keys().copied().collect())
    }

    async fn load_dedup_state(&self) -> Result<Option<DedupState>> {
        Ok(self.inner.lock().await.dedup.clone())
    }

    async fn save_dedup_state(&self, state: &DedupState) -> Result<()> {
        self.inner.lock().await.dedup = Some(state.clone());
        Ok(())
    }

    async fn load_snapshots(&self, date: NaiveDate) -> Result<Vec<MatchSnapshot>> {
        Ok(self
            .inner
            .lock()
            .await
            .snapshots
            .get(&date)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_snapshot(&self, snapshot: &MatchSnapshot) -> Result<()> {
        let mut g = self.inner.lock().await;
        let snaps = g.snapshots.entry(snapshot.date).or_default();
        snaps.retain(|s| s.timestamp != snapshot.timestamp);
        snaps.push(snapshot.clone());
        snaps.sort_by_key(|s| s.timestamp);
        Ok(())
    }

    async fn prune(&self, before: NaiveDate) -> Result<usize> {
        let mut g = self.inner.lock().await;
        let keep_items = g.items.split_off(&before);
        let removed = std::mem::replace(&mut g.items, keep_items).len();
        let keep_snaps = g.snapshots.split_off(&before);
        g.snapshots = keep_snaps;
        Ok(removed)
    }
}
