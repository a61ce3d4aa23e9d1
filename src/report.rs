// src/report.rs
//! Report mode strategy.
//!
//! | mode          | reportable                               | fires              |
//! |---------------|------------------------------------------|--------------------|
//! | `incremental` | `new` matches of this run                | any `new` match    |
//! | `current`     | every match of this run                  | always             |
//! | `daily`       | every match of the day, merged per item  | always             |
//!
//! Suppressing an empty push is the notifier's call, not ours.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use crate::config::taxonomy::Taxonomy;
use crate::dedup::{ClassifiedGroup, ClassifiedMatch, ClassifiedSnapshot, Freshness};
use crate::error::RadarError;
use crate::ingest::types::ItemIdentity;
use crate::matcher::{Match, MatchSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMode {
    #[default]
    Daily,
    Current,
    Incremental,
}

impl ReportMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportMode::Daily => "daily",
            ReportMode::Current => "current",
            ReportMode::Incremental => "incremental",
        }
    }
}

impl std::fmt::Display for ReportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportMode {
    type Err = RadarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(ReportMode::Daily),
            "current" => Ok(ReportMode::Current),
            "incremental" => Ok(ReportMode::Incremental),
            other => Err(RadarError::config(format!(
                "unknown report mode `{other}` (expected daily|current|incremental)"
            ))),
        }
    }
}

/// Outcome of the strategy: whether to fire and what is reportable.
/// Groups are unordered; ranking happens afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub mode: ReportMode,
    pub fires: bool,
    pub groups: Vec<ClassifiedGroup>,
}

impl Decision {
    pub fn total(&self) -> usize {
        self.groups.iter().map(|g| g.matches.len()).sum()
    }
}

/// Apply `mode` to the classified current run. `history` is only read for
/// `daily` and should hold the day's earlier snapshots.
pub fn decide(
    mode: ReportMode,
    current: &ClassifiedSnapshot,
    history: &[MatchSnapshot],
    taxonomy: &Taxonomy,
) -> Decision {
    let decision = match mode {
        ReportMode::Incremental => {
            let groups: Vec<ClassifiedGroup> = current
                .groups
                .iter()
                .map(|g| ClassifiedGroup {
                    matches: g
                        .matches
                        .iter()
                        .filter(|m| m.status.is_new())
                        .cloned()
                        .collect(),
                    ..g.clone()
                })
                .collect();
            let fires = groups.iter().any(|g| !g.matches.is_empty());
            Decision {
                mode,
                fires,
                groups,
            }
        }
        ReportMode::Current => Decision {
            mode,
            fires: true,
            groups: current.groups.clone(),
        },
        ReportMode::Daily => Decision {
            mode,
            fires: true,
            groups: merge_daily(current, history, taxonomy),
        },
    };
    tracing::debug!(
        target: "report",
        mode = %decision.mode,
        fires = decision.fires,
        reportable = decision.total(),
        "strategy decided"
    );
    decision
}

struct Accum {
    latest: Match,
    latest_at: DateTime<Utc>,
    runs: BTreeSet<DateTime<Utc>>,
    first_seen_at: DateTime<Utc>,
    max_score: u64,
}

impl Accum {
    fn new(m: &Match, run_at: DateTime<Utc>) -> Self {
        Self {
            latest: m.clone(),
            latest_at: run_at,
            runs: BTreeSet::from([run_at]),
            first_seen_at: m.first_seen_at,
            max_score: m.score,
        }
    }

    fn absorb(&mut self, m: &Match, run_at: DateTime<Utc>) {
        self.runs.insert(run_at);
        self.first_seen_at = self.first_seen_at.min(m.first_seen_at);
        self.max_score = self.max_score.max(m.score);
        // Latest run wins; equal timestamps fall back to a content order so
        // the merge does not depend on input order.
        let newer = run_at > self.latest_at
            || (run_at == self.latest_at && tie_key(m) < tie_key(&self.latest));
        if newer {
            self.latest = m.clone();
            self.latest_at = run_at;
        }
    }
}

fn tie_key(m: &Match) -> (Option<u32>, &str, Option<&str>, DateTime<Utc>) {
    (m.item.rank, m.item.title.as_str(), m.item.url.as_deref(), m.item.observed_at)
}

/// Merge every snapshot of the current date (history + current run) by item
/// identity within each category.
///
/// Each merged match has `weight` = number of distinct runs it appeared in,
/// `first_seen_at` = earliest sighting, and the item data of its latest run.
/// Its status is the current run's label, or `seen` if it did not appear in
/// the current run.
pub fn merge_daily(
    current: &ClassifiedSnapshot,
    history: &[MatchSnapshot],
    taxonomy: &Taxonomy,
) -> Vec<ClassifiedGroup> {
    let mut per_cat: BTreeMap<&str, BTreeMap<ItemIdentity, Accum>> = BTreeMap::new();

    let mut feed = |category: &str, m: &Match, run_at: DateTime<Utc>| {
        let Some(cat) = taxonomy.category(category) else {
            tracing::trace!(target: "report", category, "category no longer in taxonomy");
            return;
        };
        per_cat
            .entry(cat.name.as_str())
            .or_default()
            .entry(m.identity())
            .and_modify(|a| a.absorb(m, run_at))
            .or_insert_with(|| Accum::new(m, run_at));
    };

    for snap in history.iter().filter(|s| s.date == current.date) {
        for g in &snap.groups {
            for m in &g.matches {
                feed(&g.category, m, snap.timestamp);
            }
        }
    }
    for g in &current.groups {
        for cm in &g.matches {
            feed(&g.category, &cm.m, current.snapshot_timestamp);
        }
    }

    taxonomy
        .categories()
        .iter()
        .map(|cat| {
            let matches = per_cat
                .remove(cat.name.as_str())
                .unwrap_or_default()
                .into_iter()
                .map(|(id, acc)| {
                    let status = current
                        .status_of(&cat.name, &id)
                        .unwrap_or(Freshness::Seen);
                    ClassifiedMatch {
                        m: Match {
                            weight: acc.runs.len() as u32,
                            score: acc.max_score,
                            first_seen_at: acc.first_seen_at,
                            ..acc.latest
                        },
                        status,
                    }
                })
                .collect();
            ClassifiedGroup {
                category: cat.name.clone(),
                priority: cat.priority,
                order: cat.order,
                matches,
            }
        })
        .collect()
}
