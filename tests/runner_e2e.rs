// tests/runner_e2e.rs
//
// Full runs through `Radar::run_at` with fixture providers, both stores and
// a capturing notifier. No network.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use trend_radar::config::AppConfig;
use trend_radar::ingest::providers::{HotListProvider, RssProvider};
use trend_radar::ingest::types::SourceProvider;
use trend_radar::notify::{Notification, Notifier, NotifierMux};
use trend_radar::dedup::DedupState;
use trend_radar::matcher::MatchSnapshot;
use trend_radar::store::{FileStore, ItemStore, MemoryStore, RunItems};
use trend_radar::RadarError;
use trend_radar::{Radar, ReportMode, Taxonomy};

const HOTLIST: &str = include_str!("fixtures/hotlist_weibo.json");
const FEED: &str = include_str!("fixtures/feed.xml");

const WORDS: &str = "\
[GLOBAL_FILTER]
广告

[WORD_GROUPS]
芯片
!爆料

AI
大模型
";

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<Notification>>>);

#[async_trait::async_trait]
impl Notifier for Capture {
    async fn send(&self, n: &Notification) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(n.clone());
        Ok(())
    }
    fn name(&self) -> &str {
        "capture"
    }
}

/// Every operation fails, as a store on a dead disk would.
struct BrokenStore;

fn broken<T>() -> Result<T, RadarError> {
    Err(RadarError::Storage("disk gone".into()))
}

#[async_trait::async_trait]
impl ItemStore for BrokenStore {
    async fn save_items(&self, _run: &RunItems) -> Result<(), RadarError> {
        broken()
    }
    async fn load_items(&self, _date: NaiveDate) -> Result<Vec<RunItems>, RadarError> {
        broken()
    }
    async fn latest_items(&self) -> Result<Option<RunItems>, RadarError> {
        broken()
    }
    async fn list_dates(&self) -> Result<Vec<NaiveDate>, RadarError> {
        broken()
    }
    async fn load_dedup_state(&self) -> Result<Option<DedupState>, RadarError> {
        broken()
    }
    async fn save_dedup_state(&self, _state: &DedupState) -> Result<(), RadarError> {
        broken()
    }
    async fn load_snapshots(&self, _date: NaiveDate) -> Result<Vec<MatchSnapshot>, RadarError> {
        broken()
    }
    async fn save_snapshot(&self, _snapshot: &MatchSnapshot) -> Result<(), RadarError> {
        broken()
    }
    async fn prune(&self, _before: NaiveDate) -> Result<usize, RadarError> {
        broken()
    }
}

fn providers() -> Vec<Box<dyn SourceProvider>> {
    vec![
        Box::new(HotListProvider::from_fixture("weibo", "微博", HOTLIST)),
        Box::new(RssProvider::from_fixture("tech", "Tech Feed", FEED)),
    ]
}

fn config(mode: ReportMode) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.report.mode = mode;
    cfg.report.timezone = "+08:00".into();
    cfg.storage.retention_days = 2;
    cfg
}

fn radar(mode: ReportMode, store: Arc<dyn ItemStore>, capture: &Capture) -> Radar {
    let tax = Arc::new(Taxonomy::from_word_list(WORDS).unwrap());
    let mux = NotifierMux::new(vec![Box::new(capture.clone())]);
    Radar::new(config(mode), tax, store, providers(), mux).unwrap()
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, day, hour, 0, 0).unwrap()
}

#[tokio::test]
async fn incremental_pushes_once_per_day() {
    let store: Arc<dyn ItemStore> = Arc::new(MemoryStore::new());
    let capture = Capture::default();
    let r = radar(ReportMode::Incremental, store.clone(), &capture);

    let first = r.run_at(at(1, 1)).await.unwrap();
    assert!(first.output.fires);
    assert_eq!(first.notified, Some(1));
    // 芯片: 国产芯片取得新突破, RISC-V 芯片; AI: 大模型 AI 助手发布会, Open-source AI model
    assert_eq!(first.output.payload.total_entries(), 4);

    let second = r.run_at(at(1, 2)).await.unwrap();
    assert!(!second.output.fires);
    assert_eq!(second.notified, None);

    let next_day = r.run_at(at(2, 1)).await.unwrap();
    assert!(next_day.output.fires);
    assert_eq!(capture.0.lock().unwrap().len(), 2);

    let sent = capture.0.lock().unwrap();
    assert!(sent[0].body.contains("🆕"));
    assert!(!sent[0].body.contains("爆料"));
    assert!(!sent[0].body.contains("广告"));
}

#[tokio::test]
async fn daily_accumulates_run_counts() {
    let store: Arc<dyn ItemStore> = Arc::new(MemoryStore::new());
    let capture = Capture::default();
    let r = radar(ReportMode::Daily, store.clone(), &capture);

    r.run_at(at(1, 1)).await.unwrap();
    r.run_at(at(1, 2)).await.unwrap();
    let third = r.run_at(at(1, 3)).await.unwrap();

    let chips = &third.output.payload.groups[0];
    assert_eq!(chips.category, "芯片");
    assert!(chips.entries.iter().all(|e| e.weight == 3));
    assert!(chips.entries.iter().all(|e| !e.is_new()));
    assert_eq!(store.load_snapshots(third.date).await.unwrap().len(), 3);
}

#[tokio::test]
async fn state_persists_across_instances_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let capture = Capture::default();

    let store: Arc<dyn ItemStore> = Arc::new(FileStore::new(dir.path()));
    let first = radar(ReportMode::Incremental, store, &capture)
        .run_at(at(1, 1))
        .await
        .unwrap();
    assert!(first.output.fires);

    // Fresh process: new store handle, new radar
    let store: Arc<dyn ItemStore> = Arc::new(FileStore::new(dir.path()));
    let second = radar(ReportMode::Incremental, store.clone(), &capture)
        .run_at(at(1, 2))
        .await
        .unwrap();
    assert!(!second.output.fires);
    assert_eq!(store.load_items(second.date).await.unwrap().len(), 2);
}

#[tokio::test]
async fn corrupt_dedup_state_degrades_to_first_run() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("dedup_state.json"), "{{{").unwrap();
    let capture = Capture::default();
    let store: Arc<dyn ItemStore> = Arc::new(FileStore::new(dir.path()));

    let out = radar(ReportMode::Incremental, store, &capture)
        .run_at(at(1, 1))
        .await
        .unwrap();
    assert!(out.output.fires);
    assert_eq!(out.output.payload.new_entries(), out.output.payload.total_entries());
}

#[tokio::test]
async fn old_dates_are_pruned() {
    let store: Arc<dyn ItemStore> = Arc::new(MemoryStore::new());
    let capture = Capture::default();
    let r = radar(ReportMode::Current, store.clone(), &capture);

    for day in 1..=4 {
        r.run_at(at(day, 1)).await.unwrap();
    }
    let dates = store.list_dates().await.unwrap();
    assert_eq!(dates.len(), 3);
    assert_eq!(dates[0], at(2, 1).date_naive());
}

#[tokio::test]
async fn unreadable_state_file_does_not_block_delivery() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the state file should be: reads and writes both fail
    std::fs::create_dir_all(dir.path().join("dedup_state.json")).unwrap();
    let capture = Capture::default();
    let store: Arc<dyn ItemStore> = Arc::new(FileStore::new(dir.path()));

    let out = radar(ReportMode::Current, store.clone(), &capture)
        .run_at(at(1, 1))
        .await
        .expect("run completes");
    assert!(out.output.fires);
    assert_eq!(out.notified, Some(1));
    assert_eq!(out.output.payload.new_entries(), 4);
    assert_eq!(store.load_items(out.date).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unreadable_daily_history_falls_back_to_current_run() {
    let dir = tempfile::tempdir().unwrap();
    let snaps = dir.path().join("2025-10-01").join("snapshots");
    std::fs::create_dir_all(snaps.join("000000.json")).unwrap();
    let capture = Capture::default();
    let store: Arc<dyn ItemStore> = Arc::new(FileStore::new(dir.path()));

    let out = radar(ReportMode::Daily, store, &capture)
        .run_at(at(1, 1))
        .await
        .expect("run completes");
    assert!(out.output.fires);
    assert_eq!(out.output.payload.total_entries(), 4);
    assert!(out.output.payload.groups.iter().flat_map(|g| g.entries.iter()).all(|e| e.weight == 1));
}

#[tokio::test]
async fn failing_store_still_notifies() {
    let capture = Capture::default();
    let r = radar(ReportMode::Incremental, Arc::new(BrokenStore), &capture);

    let out = r.run_at(at(1, 1)).await.expect("store errors are not fatal");
    assert!(out.output.fires);
    assert_eq!(out.notified, Some(1));
    assert_eq!(out.output.payload.total_entries(), 4);
    assert_eq!(capture.0.lock().unwrap().len(), 1);
}

