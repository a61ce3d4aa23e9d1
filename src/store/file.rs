// src/store/file.rs
//! JSON-on-disk store.
//!
//! ```text
//! <data_dir>/
//!   dedup_state.json
//!   2025-10-01/
//!     items/083000.json
//!     snapshots/083000.json
//! ```
//!
//! File stems are the run's UTC time of day; records are re-sorted by their
//! own timestamp on load.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;

use super::{ItemStore, RunItems};
use crate::dedup::DedupState;
use crate::error::{RadarError, Result};
use crate::matcher::MatchSnapshot;

const DEDUP_FILE: &str = "dedup_state.json";
const ITEMS_DIR: &str = "items";
const SNAPSHOTS_DIR: &str = "snapshots";

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn date_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join(date.format("%Y-%m-%d").to_string())
    }

    fn run_file(&self, date: NaiveDate, kind: &str, ts: DateTime<Utc>) -> PathBuf {
        self.date_dir(date)
            .join(kind)
            .join(format!("{}.json", ts.format("%H%M%S")))
    }
}

/// Write via a temp file and rename so readers never see half a record.
async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

/// `Ok(None)` for a missing, unreadable or corrupt file; all but missing
/// ones are logged.
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let raw = match fs::read_to_string(path).await {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            tracing::warn!(target: "store", path = %path.display(), error = %e, "cannot read record");
            return Ok(None);
        }
    };
    match serde_json::from_str(&raw) {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            tracing::warn!(target: "store", path = %path.display(), error = %e, "skipping unreadable record");
            Ok(None)
        }
    }
}

/// Every parseable `*.json` record in `dir`, in file-name order.
async fn read_dir_json<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut rd = match fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut paths = Vec::new();
    while let Some(entry) = rd.next_entry().await? {
        let p = entry.path();
        if p.extension().is_some_and(|x| x == "json") {
            paths.push(p);
        }
    }
    paths.sort();

    let mut out = Vec::with_capacity(paths.len());
    for p in paths {
        if let Some(v) = read_json(&p).await? {
            out.push(v);
        }
    }
    Ok(out)
}

#[async_trait::async_trait]
impl ItemStore for FileStore {
    async fn save_items(&self, run: &RunItems) -> Result<()> {
        let path = self.run_file(run.date, ITEMS_DIR, run.timestamp);
        write_json(&path, run).await?;
        tracing::debug!(target: "store", path = %path.display(), items = run.items.len(), "items saved");
        Ok(())
    }

    async fn load_items(&self, date: NaiveDate) -> Result<Vec<RunItems>> {
        let mut runs: Vec<RunItems> = read_dir_json(&self.date_dir(date).join(ITEMS_DIR)).await?;
        runs.retain(|r| r.date == date);
        runs.sort_by_key(|r| r.timestamp);
        Ok(runs)
    }

    async fn latest_items(&self) -> Result<Option<RunItems>> {
        for date in self.list_dates().await?.into_iter().rev() {
            if let Some(run) = self.load_items(date).await?.pop() {
                return Ok(Some(run));
            }
        }
        Ok(None)
    }

    async fn list_dates(&self) -> Result<Vec<NaiveDate>> {
        let mut rd = match fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut dates = Vec::new();
        while let Some(entry) = rd.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            if let Some(d) = name
                .to_str()
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            {
                dates.push(d);
            }
        }
        dates.sort();
        Ok(dates)
    }

    async fn load_dedup_state(&self) -> Result<Option<DedupState>> {
        read_json(&self.root.join(DEDUP_FILE)).await
    }

    async fn save_dedup_state(&self, state: &DedupState) -> Result<()> {
        write_json(&self.root.join(DEDUP_FILE), state).await
    }

    async fn load_snapshots(&self, date: NaiveDate) -> Result<Vec<MatchSnapshot>> {
        let mut snaps: Vec<MatchSnapshot> =
            read_dir_json(&self.date_dir(date).join(SNAPSHOTS_DIR)).await?;
        snaps.retain(|s| s.date == date);
        snaps.sort_by_key(|s| s.timestamp);
        Ok(snaps)
    }

    async fn save_snapshot(&self, snapshot: &MatchSnapshot) -> Result<()> {
        let path = self.run_file(snapshot.date, SNAPSHOTS_DIR, snapshot.timestamp);
        write_json(&path, snapshot).await
    }

    async fn prune(&self, before: NaiveDate) -> Result<usize> {
        let mut removed = 0;
        for date in self.list_dates().await? {
            if date >= before {
                break;
            }
            let dir = self.date_dir(date);
            fs::remove_dir_all(&dir).await.map_err(|e| {
                RadarError::Storage(format!("removing {}: {e}", dir.display()))
            })?;
            removed += 1;
        }
        if removed > 0 {
            tracing::info!(target: "store", removed, before = %before, "pruned old dates");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Item;
    use chrono::TimeZone;

    fn run(day: u32, hour: u32, title: &str) -> RunItems {
        let ts = Utc.with_ymd_and_hms(2025, 10, day, hour, 0, 0).unwrap();
        RunItems {
            timestamp: ts,
            date: ts.date_naive(),
            items: vec![Item::ranked("weibo", "微博", title, None, 1, ts)],
        }
    }

    #[tokio::test]
    async fn items_round_trip_in_time_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.save_items(&run(1, 9, "b")).await.unwrap();
        store.save_items(&run(1, 8, "a")).await.unwrap();

        let d = run(1, 0, "").date;
        let runs = store.load_items(d).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].items[0].title, "a");
        assert_eq!(store.latest_items().await.unwrap().unwrap().items[0].title, "b");
    }

    #[tokio::test]
    async fn corrupt_records_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let r = run(1, 8, "ok");
        store.save_items(&r).await.unwrap();
        let junk = dir.path().join("2025-10-01").join(ITEMS_DIR).join("090000.json");
        std::fs::write(&junk, "{not json").unwrap();
        std::fs::write(dir.path().join(DEDUP_FILE), "[]").unwrap();

        assert_eq!(store.load_items(r.date).await.unwrap().len(), 1);
        assert!(store.load_dedup_state().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreadable_records_read_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join(DEDUP_FILE)).unwrap();
        let snap_dir = dir.path().join("2025-10-01").join(SNAPSHOTS_DIR);
        std::fs::create_dir_all(snap_dir.join("080000.json")).unwrap();

        assert!(store.load_dedup_state().await.unwrap().is_none());
        let d = run(1, 0, "").date;
        assert!(store.load_snapshots(d).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nope"));
        assert!(store.list_dates().await.unwrap().is_empty());
        assert!(store.latest_items().await.unwrap().is_none());
        assert!(store.load_dedup_state().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn prune_drops_older_dates_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        for day in 1..=3 {
            store.save_items(&run(day, 8, "x")).await.unwrap();
        }
        std::fs::create_dir_all(dir.path().join("not-a-date")).unwrap();

        let removed = store.prune(run(3, 0, "").date).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.list_dates().await.unwrap(), vec![run(3, 0, "").date]);
        assert!(dir.path().join("not-a-date").exists());
    }
}
