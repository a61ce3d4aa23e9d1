// tests/report_pipeline.rs
//
// Behavioural checks of the pure report pipeline through the public API:
// matcher determinism, filter precedence, dedup across persisted state,
// day rollover, mode gating, daily merge order independence, tie ordering.

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Asia::Shanghai;

use trend_radar::config::taxonomy::{CategorySpec, Taxonomy};
use trend_radar::config::ReportZone;
use trend_radar::dedup::{self, DedupState, Freshness};
use trend_radar::ingest::types::Item;
use trend_radar::matcher::{FrequencyMatcher, MatchSnapshot, Normalization};
use trend_radar::pipeline::{run_date, run_report, RunInput, RunOutput};
use trend_radar::report::{merge_daily, ReportMode};

fn cat(name: &str, priority: i64, required: &[&str], excluded: &[&str]) -> CategorySpec {
    CategorySpec {
        name: Some(name.into()),
        priority: Some(priority),
        required: required.iter().map(|s| s.to_string()).collect(),
        excluded: excluded.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

fn taxonomy() -> Taxonomy {
    Taxonomy::new(
        vec![
            cat("科技", 3, &["科技", "AI"], &[]),
            cat("芯片", 5, &["芯片"], &["爆料"]),
        ],
        vec!["广告".into()],
    )
    .expect("valid taxonomy")
}

fn cst() -> ReportZone {
    ReportZone::from(Shanghai)
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, day, hour, 0, 0).unwrap()
}

fn items(ts: DateTime<Utc>, titles: &[&str]) -> Vec<Item> {
    titles
        .iter()
        .enumerate()
        .map(|(i, t)| Item::ranked("weibo", "微博", *t, None, i as u32 + 1, ts))
        .collect()
}

fn run(
    tax: &Taxonomy,
    mode: ReportMode,
    now: DateTime<Utc>,
    titles: &[&str],
    prior: Option<DedupState>,
    history: &[MatchSnapshot],
) -> RunOutput {
    let its = items(now, titles);
    run_report(RunInput {
        items: &its,
        taxonomy: tax,
        normalization: Normalization::default(),
        mode,
        now,
        zone: cst(),
        prior_state: prior,
        history,
    })
}

#[test]
fn matcher_is_deterministic() {
    let tax = taxonomy();
    let m = FrequencyMatcher::new(&tax, Normalization::default());
    let its = items(at(1, 1), &["AI 芯片", "科技新闻", "芯片爆料", "天气"]);
    let a = m.run(&its, at(1, 1), run_date(at(1, 1), cst()));
    let b = m.run(&its, at(1, 1), run_date(at(1, 1), cst()));
    assert_eq!(a, b);
}

#[test]
fn global_filter_beats_every_category() {
    let tax = taxonomy();
    let out = run(&tax, ReportMode::Current, at(1, 1), &["科技广告推广"], None, &[]);
    assert_eq!(out.snapshot.total_matches(), 0);
    assert!(out.payload.is_empty());
}

#[test]
fn exclusion_vetoes_only_its_category() {
    let tax = taxonomy();
    let out = run(&tax, ReportMode::Current, at(1, 1), &["芯片爆料 AI"], None, &[]);
    assert!(out.snapshot.group("芯片").unwrap().matches.is_empty());
    assert_eq!(out.snapshot.group("科技").unwrap().matches.len(), 1);
}

#[test]
fn one_item_two_categories_two_matches() {
    let tax = taxonomy();
    let out = run(&tax, ReportMode::Current, at(1, 1), &["AI 芯片"], None, &[]);
    assert_eq!(out.snapshot.total_matches(), 2);
    assert_eq!(out.payload.groups.len(), 2);
}

#[test]
fn dedup_state_survives_json_round_trip() {
    let tax = taxonomy();
    let first = run(&tax, ReportMode::Incremental, at(1, 1), &["AI 芯片"], None, &[]);
    let persisted = serde_json::to_string(&first.dedup_state).unwrap();
    let restored: DedupState = serde_json::from_str(&persisted).unwrap();

    let second = run(&tax, ReportMode::Current, at(1, 2), &["AI 芯片"], Some(restored), &[]);
    assert!(second
        .payload
        .groups
        .iter()
        .flat_map(|g| g.entries.iter())
        .all(|e| e.status == Freshness::Seen));
}

#[test]
fn rollover_uses_configured_zone() {
    let tax = taxonomy();
    // 15:00 UTC is 23:00 in Shanghai; 17:00 UTC is already the next day
    let late = run(&tax, ReportMode::Incremental, at(1, 15), &["AI 芯片"], None, &[]);
    let next = run(
        &tax,
        ReportMode::Incremental,
        at(1, 17),
        &["AI 芯片"],
        Some(late.dedup_state.clone()),
        &[],
    );
    assert_ne!(late.payload.date, next.payload.date);
    assert!(next.fires);
    assert_eq!(next.payload.new_entries(), 2);
    assert_eq!(next.dedup_state.date, Some(next.payload.date));
}

#[test]
fn incremental_silent_when_nothing_new_current_still_fires() {
    let tax = taxonomy();
    let first = run(&tax, ReportMode::Incremental, at(1, 1), &["AI 芯片"], None, &[]);
    let inc = run(
        &tax,
        ReportMode::Incremental,
        at(1, 2),
        &["AI 芯片"],
        Some(first.dedup_state.clone()),
        &[],
    );
    let cur = run(
        &tax,
        ReportMode::Current,
        at(1, 2),
        &["AI 芯片"],
        Some(first.dedup_state),
        &[],
    );
    assert!(!inc.fires);
    assert!(cur.fires);
    assert_eq!(cur.payload.total_entries(), 2);
}

#[test]
fn daily_merge_is_order_independent() {
    let tax = taxonomy();
    let r1 = run(&tax, ReportMode::Daily, at(1, 1), &["AI 芯片", "科技周报"], None, &[]);
    let r2 = run(
        &tax,
        ReportMode::Daily,
        at(1, 2),
        &["科技周报", "AI 芯片"],
        Some(r1.dedup_state.clone()),
        &[r1.snapshot.clone()],
    );
    let cur = FrequencyMatcher::new(&tax, Normalization::default()).run(
        &items(at(1, 3), &["AI 芯片"]),
        at(1, 3),
        run_date(at(1, 3), cst()),
    );
    let (classified, _) = dedup::classify(&cur, Some(r2.dedup_state));

    let forward = merge_daily(&classified, &[r1.snapshot.clone(), r2.snapshot.clone()], &tax);
    let backward = merge_daily(&classified, &[r2.snapshot, r1.snapshot], &tax);
    assert_eq!(forward, backward);

    let tech = forward.iter().find(|g| g.category == "科技").unwrap();
    let chip = tech.matches.iter().find(|m| m.m.item.title == "AI 芯片").unwrap();
    assert_eq!(chip.m.weight, 3);
    let weekly = tech.matches.iter().find(|m| m.m.item.title == "科技周报").unwrap();
    assert_eq!(weekly.m.weight, 2);
    assert_eq!(weekly.status, Freshness::Seen);
}

#[test]
fn equal_scores_follow_declared_term_order() {
    let tax = taxonomy();
    // Same run, same observed_at, same category: "AI" is declared after "科技"
    let out = run(&tax, ReportMode::Current, at(1, 1), &["AI 头条", "科技头条"], None, &[]);
    let tech = out.payload.groups.iter().find(|g| g.category == "科技").unwrap();
    let titles: Vec<_> = tech.entries.iter().map(|e| e.item.title.as_str()).collect();
    assert_eq!(titles, vec!["科技头条", "AI 头条"]);

    let again = run(&tax, ReportMode::Current, at(1, 1), &["AI 头条", "科技头条"], None, &[]);
    assert_eq!(out.payload, again.payload);
}

#[test]
fn categories_ordered_by_priority() {
    let tax = taxonomy();
    let out = run(&tax, ReportMode::Current, at(1, 1), &["AI 芯片"], None, &[]);
    let names: Vec<_> = out.payload.groups.iter().map(|g| g.category.as_str()).collect();
    assert_eq!(names, vec!["芯片", "科技"]);
    assert_eq!(out.payload.groups[0].entries[0].score, 5);
}
