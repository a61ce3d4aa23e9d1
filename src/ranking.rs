// src/ranking.rs
//! Final ordering of the reportable matches.
//!
//! - `score = weight × priority` (weight is 1 except for merged daily items,
//!   where it counts the runs the item appeared in).
//! - Within a category: score desc, then earliest sighting, then the
//!   category's declared term order. The sort is stable.
//! - Categories: priority desc, then taxonomy declaration order.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::taxonomy::Taxonomy;
use crate::dedup::{ClassifiedGroup, Freshness};
use crate::ingest::types::Item;
use crate::report::{Decision, ReportMode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub item: Item,
    pub matched_terms: Vec<String>,
    pub weight: u32,
    pub score: u64,
    pub status: Freshness,
    pub first_seen_at: DateTime<Utc>,
}

impl ReportEntry {
    pub fn is_new(&self) -> bool {
        self.status.is_new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportGroup {
    pub category: String,
    pub priority: u32,
    /// Matches before the per-category display cap.
    pub total: usize,
    pub entries: Vec<ReportEntry>,
}

/// What the renderer/notifier receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPayload {
    pub mode: ReportMode,
    pub date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub groups: Vec<ReportGroup>,
}

impl ReportPayload {
    pub fn empty(mode: ReportMode, date: NaiveDate, generated_at: DateTime<Utc>) -> Self {
        Self {
            mode,
            date,
            generated_at,
            groups: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|g| g.entries.is_empty())
    }

    pub fn total_entries(&self) -> usize {
        self.groups.iter().map(|g| g.entries.len()).sum()
    }

    pub fn new_entries(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|g| g.entries.iter())
            .filter(|e| e.is_new())
            .count()
    }
}

/// Score and order a strategy decision. Empty categories are dropped.
pub fn rank(
    decision: &Decision,
    taxonomy: &Taxonomy,
    date: NaiveDate,
    generated_at: DateTime<Utc>,
) -> ReportPayload {
    let mut groups: Vec<(u32, usize, ReportGroup)> = decision
        .groups
        .iter()
        .filter(|g| !g.matches.is_empty())
        .map(|g| {
            let cat = taxonomy.category(&g.category);
            let priority = cat.map(|c| c.priority).unwrap_or(g.priority);
            let order = cat.map(|c| c.order).unwrap_or(g.order);
            let max_items = cat.and_then(|c| c.max_items);
            (priority, order, rank_group(g, priority, max_items))
        })
        .collect();

    groups.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

    ReportPayload {
        mode: decision.mode,
        date,
        generated_at,
        groups: groups.into_iter().map(|(_, _, g)| g).collect(),
    }
}

fn rank_group(g: &ClassifiedGroup, priority: u32, max_items: Option<usize>) -> ReportGroup {
    let mut scored: Vec<(usize, ReportEntry)> = g
        .matches
        .iter()
        .map(|cm| {
            let weight = cm.m.weight.max(1);
            (
                cm.m.term_order,
                ReportEntry {
                    item: cm.m.item.clone(),
                    matched_terms: cm.m.matched_terms.clone(),
                    weight,
                    score: u64::from(weight) * u64::from(priority),
                    status: cm.status,
                    first_seen_at: cm.m.first_seen_at,
                },
            )
        })
        .collect();

    scored.sort_by(|(ta, a), (tb, b)| {
        b.score
            .cmp(&a.score)
            .then(a.first_seen_at.cmp(&b.first_seen_at))
            .then(ta.cmp(tb))
    });

    let total = scored.len();
    let mut entries: Vec<ReportEntry> = scored.into_iter().map(|(_, e)| e).collect();
    if let Some(cap) = max_items {
        entries.truncate(cap);
    }

    ReportGroup {
        category: g.category.clone(),
        priority,
        total,
        entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::taxonomy::CategorySpec;
    use crate::dedup::ClassifiedMatch;
    use crate::matcher::Match;
    use chrono::TimeZone;

    fn spec(name: &str, priority: i64, required: &[&str], max_items: Option<i64>) -> CategorySpec {
        CategorySpec {
            name: Some(name.into()),
            priority: Some(priority),
            required: required.iter().map(|s| s.to_string()).collect(),
            max_items,
            ..Default::default()
        }
    }

    fn cm(title: &str, weight: u32, minute: u32, term_order: usize) -> ClassifiedMatch {
        let at = Utc.with_ymd_and_hms(2025, 10, 1, 8, minute, 0).unwrap();
        ClassifiedMatch {
            m: Match {
                item: Item::ranked("weibo", "微博", title, None, 1, at),
                category: String::new(),
                matched_terms: vec![],
                term_order,
                weight,
                score: 0,
                first_seen_at: at,
            },
            status: Freshness::New,
        }
    }

    fn group(name: &str, matches: Vec<ClassifiedMatch>) -> ClassifiedGroup {
        ClassifiedGroup {
            category: name.into(),
            priority: 0,
            order: 0,
            matches,
        }
    }

    fn decision(groups: Vec<ClassifiedGroup>) -> Decision {
        Decision {
            mode: ReportMode::Current,
            fires: true,
            groups,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn score_is_weight_times_priority_and_orders_entries() {
        let tax = Taxonomy::new(vec![spec("AI", 4, &["AI"], None)], vec![]).unwrap();
        let d = decision(vec![group(
            "AI",
            vec![cm("once", 1, 0, 0), cm("thrice", 3, 5, 0), cm("early", 1, 0, 0)],
        )]);
        let p = rank(&d, &tax, now().date_naive(), now());
        let e = &p.groups[0].entries;
        assert_eq!(e[0].item.title, "thrice");
        assert_eq!(e[0].score, 12);
        // equal score + equal time: input order kept
        assert_eq!(e[1].item.title, "once");
        assert_eq!(e[2].item.title, "early");
    }

    #[test]
    fn ties_fall_back_to_time_then_term_order() {
        let tax = Taxonomy::new(vec![spec("AI", 1, &["大模型", "AI"], None)], vec![]).unwrap();
        let d = decision(vec![group(
            "AI",
            vec![cm("late", 1, 9, 0), cm("term1", 1, 1, 1), cm("term0", 1, 1, 0)],
        )]);
        let p = rank(&d, &tax, now().date_naive(), now());
        let titles: Vec<_> = p.groups[0].entries.iter().map(|e| e.item.title.as_str()).collect();
        assert_eq!(titles, vec!["term0", "term1", "late"]);
    }

    #[test]
    fn categories_by_priority_then_declaration() {
        let tax = Taxonomy::new(
            vec![
                spec("a", 1, &["a"], None),
                spec("b", 5, &["b"], None),
                spec("c", 5, &["c"], None),
                spec("d", 9, &["d"], None),
            ],
            vec![],
        )
        .unwrap();
        let d = decision(vec![
            group("a", vec![cm("x", 1, 0, 0)]),
            group("c", vec![cm("x", 1, 0, 0)]),
            group("b", vec![cm("x", 1, 0, 0)]),
            group("d", vec![]),
        ]);
        let p = rank(&d, &tax, now().date_naive(), now());
        let names: Vec<_> = p.groups.iter().map(|g| g.category.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
    }

    #[test]
    fn max_items_caps_after_sorting() {
        let tax = Taxonomy::new(vec![spec("AI", 1, &["AI"], Some(1))], vec![]).unwrap();
        let d = decision(vec![group("AI", vec![cm("low", 1, 0, 0), cm("high", 2, 0, 0)])]);
        let p = rank(&d, &tax, now().date_naive(), now());
        assert_eq!(p.groups[0].total, 2);
        assert_eq!(p.groups[0].entries.len(), 1);
        assert_eq!(p.groups[0].entries[0].item.title, "high");
    }

    #[test]
    fn empty_decision_gives_empty_payload() {
        let p = rank(&decision(vec![]), &Taxonomy::default(), now().date_naive(), now());
        assert!(p.is_empty());
        assert_eq!(p.total_entries(), 0);
    }
}
