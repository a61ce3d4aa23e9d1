//! # Report pipeline
//! Pure entry point: items + taxonomy + prior state → snapshot, new state,
//! fire decision and ranked payload. No I/O, suitable for unit tests.
//!
//! Order: matcher → dedup → strategy → ranking.
//!
//! Cross-run state comes in and goes out as plain values. Two concurrent runs
//! for the same date are not supported; the last one to persist wins.

use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;

use crate::config::taxonomy::Taxonomy;
use crate::config::ReportZone;
use crate::dedup::{self, DedupState};
use crate::ingest::types::Item;
use crate::matcher::{FrequencyMatcher, MatchSnapshot, Normalization};
use crate::ranking::{self, ReportPayload};
use crate::report::{self, ReportMode};

pub struct RunInput<'a> {
    pub items: &'a [Item],
    pub taxonomy: &'a Taxonomy,
    pub normalization: Normalization,
    pub mode: ReportMode,
    pub now: DateTime<Utc>,
    /// Zone that defines the report day.
    pub zone: ReportZone,
    /// `None` on first run or when the store had nothing usable.
    pub prior_state: Option<DedupState>,
    /// Earlier snapshots of the same date; read by `daily` only.
    pub history: &'a [MatchSnapshot],
}

#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Persist via the store.
    pub snapshot: MatchSnapshot,
    /// Persist via the store.
    pub dedup_state: DedupState,
    pub fires: bool,
    pub payload: ReportPayload,
}

/// Calendar date of `now` in the configured zone.
pub fn run_date(now: DateTime<Utc>, zone: ReportZone) -> NaiveDate {
    zone.date_of(now)
}

pub fn run_report(input: RunInput<'_>) -> RunOutput {
    let date = run_date(input.now, input.zone);

    let matcher = FrequencyMatcher::new(input.taxonomy, input.normalization);
    let snapshot = matcher.run(input.items, input.now, date);
    if snapshot.is_empty() {
        tracing::debug!(target: "pipeline", %date, items = input.items.len(), "no matches this run");
    }

    let (classified, dedup_state) = dedup::classify(&snapshot, input.prior_state);
    counter!("radar_new_matches_total").increment(classified.new_count() as u64);

    let decision = report::decide(input.mode, &classified, input.history, input.taxonomy);
    let payload = ranking::rank(&decision, input.taxonomy, date, input.now);

    RunOutput {
        snapshot,
        dedup_state,
        fires: decision.fires,
        payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::taxonomy::CategorySpec;
    use crate::dedup::Freshness;
    use chrono::TimeZone;

    fn taxonomy() -> Taxonomy {
        Taxonomy::new(
            vec![
                CategorySpec {
                    name: Some("AI".into()),
                    priority: Some(2),
                    required: vec!["AI".into()],
                    ..Default::default()
                },
                CategorySpec {
                    name: Some("芯片".into()),
                    priority: Some(5),
                    required: vec!["芯片".into()],
                    excluded: vec!["爆料".into()],
                    ..Default::default()
                },
            ],
            vec!["广告".into()],
        )
        .unwrap()
    }

    fn items(at: DateTime<Utc>) -> Vec<Item> {
        vec![
            Item::ranked("weibo", "微博", "AI 芯片发布", Some("https://w/1".into()), 1, at),
            Item::ranked("weibo", "微博", "芯片爆料", Some("https://w/2".into()), 2, at),
            Item::ranked("zhihu", "知乎", "AI 广告", None, 1, at),
        ]
    }

    fn input<'a>(
        items: &'a [Item],
        tax: &'a Taxonomy,
        mode: ReportMode,
        now: DateTime<Utc>,
        prior: Option<DedupState>,
        history: &'a [MatchSnapshot],
    ) -> RunInput<'a> {
        RunInput {
            items,
            taxonomy: tax,
            normalization: Normalization::default(),
            mode,
            now,
            zone: "Asia/Shanghai".parse().unwrap(),
            prior_state: prior,
            history,
        }
    }

    #[test]
    fn run_date_uses_zone() {
        // 2025-10-01 17:00 UTC is already 2025-10-02 in Shanghai
        let now = Utc.with_ymd_and_hms(2025, 10, 1, 17, 0, 0).unwrap();
        let d = run_date(now, "Asia/Shanghai".parse().unwrap());
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 10, 2).unwrap());
        let d = run_date(now, ReportZone::UTC);
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 10, 1).unwrap());
    }

    #[test]
    fn full_run_orders_categories_and_labels_new() {
        let tax = taxonomy();
        let now = Utc.with_ymd_and_hms(2025, 10, 1, 2, 0, 0).unwrap();
        let its = items(now);
        let out = run_report(input(&its, &tax, ReportMode::Current, now, None, &[]));

        assert!(out.fires);
        assert_eq!(out.snapshot.total_matches(), 2);
        let names: Vec<_> = out.payload.groups.iter().map(|g| g.category.as_str()).collect();
        assert_eq!(names, vec!["芯片", "AI"]);
        assert!(out
            .payload
            .groups
            .iter()
            .flat_map(|g| g.entries.iter())
            .all(|e| e.status == Freshness::New));
        assert_eq!(out.dedup_state.len(), 2);
    }

    #[test]
    fn second_incremental_run_same_day_does_not_fire() {
        let tax = taxonomy();
        let t1 = Utc.with_ymd_and_hms(2025, 10, 1, 2, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 10, 1, 3, 0, 0).unwrap();
        let its1 = items(t1);
        let first = run_report(input(&its1, &tax, ReportMode::Incremental, t1, None, &[]));
        assert!(first.fires);

        let its2 = items(t2);
        let second = run_report(input(
            &its2,
            &tax,
            ReportMode::Incremental,
            t2,
            Some(first.dedup_state.clone()),
            &[],
        ));
        assert!(!second.fires);
        assert!(second.payload.is_empty());

        // Next day the same items are new again
        let t3 = Utc.with_ymd_and_hms(2025, 10, 2, 2, 0, 0).unwrap();
        let its3 = items(t3);
        let third = run_report(input(
            &its3,
            &tax,
            ReportMode::Incremental,
            t3,
            Some(second.dedup_state),
            &[],
        ));
        assert!(third.fires);
        assert_eq!(third.payload.new_entries(), 2);
    }

    #[test]
    fn daily_mode_counts_runs_in_score() {
        let tax = taxonomy();
        let t1 = Utc.with_ymd_and_hms(2025, 10, 1, 2, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 10, 1, 3, 0, 0).unwrap();
        let its1 = items(t1);
        let first = run_report(input(&its1, &tax, ReportMode::Daily, t1, None, &[]));

        let its2 = items(t2);
        let history = vec![first.snapshot.clone()];
        let second = run_report(input(
            &its2,
            &tax,
            ReportMode::Daily,
            t2,
            Some(first.dedup_state),
            &history,
        ));
        let chips = &second.payload.groups[0];
        assert_eq!(chips.category, "芯片");
        assert_eq!(chips.entries[0].weight, 2);
        assert_eq!(chips.entries[0].score, 10);
        assert_eq!(chips.entries[0].first_seen_at, t1);
    }

    #[test]
    fn empty_taxonomy_produces_empty_payload() {
        let tax = Taxonomy::default();
        let now = Utc.with_ymd_and_hms(2025, 10, 1, 2, 0, 0).unwrap();
        let its = items(now);
        let out = run_report(input(&its, &tax, ReportMode::Incremental, now, None, &[]));
        assert!(out.payload.is_empty());
        assert!(!out.fires);
        assert!(out.snapshot.is_empty());
    }
}
