// src/dedup.rs
//! Cross-run dedup: labels each match `new` or `seen` against the identities
//! already recorded for its category on the same report day.
//!
//! State is a plain value passed in and out; the caller persists it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::ingest::types::ItemIdentity;
use crate::matcher::{Match, MatchSnapshot};

/// Per-category identities surfaced so far on `date`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupState {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub seen: BTreeMap<String, BTreeSet<ItemIdentity>>,
}

impl DedupState {
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date: Some(date),
            seen: BTreeMap::new(),
        }
    }

    pub fn contains(&self, category: &str, id: &ItemIdentity) -> bool {
        self.seen.get(category).is_some_and(|s| s.contains(id))
    }

    pub fn len(&self) -> usize {
        self.seen.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    New,
    Seen,
}

impl Freshness {
    pub fn is_new(self) -> bool {
        self == Freshness::New
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedMatch {
    #[serde(rename = "match")]
    pub m: Match,
    pub status: Freshness,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedGroup {
    pub category: String,
    pub priority: u32,
    pub order: usize,
    pub matches: Vec<ClassifiedMatch>,
}

/// A snapshot with every match labelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedSnapshot {
    pub snapshot_timestamp: chrono::DateTime<chrono::Utc>,
    pub date: NaiveDate,
    pub groups: Vec<ClassifiedGroup>,
}

impl ClassifiedSnapshot {
    pub fn new_count(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|g| g.matches.iter())
            .filter(|m| m.status.is_new())
            .count()
    }

    pub fn status_of(&self, category: &str, id: &ItemIdentity) -> Option<Freshness> {
        self.groups
            .iter()
            .find(|g| g.category == category)?
            .matches
            .iter()
            .find(|m| &m.m.identity() == id)
            .map(|m| m.status)
    }
}

/// Classify `snapshot` against `prior` and return the state to persist.
///
/// `None` (first run, missing or unreadable state) behaves as empty. State
/// from another date is discarded before classifying.
pub fn classify(
    snapshot: &MatchSnapshot,
    prior: Option<DedupState>,
) -> (ClassifiedSnapshot, DedupState) {
    let mut state = match prior {
        Some(s) if s.date == Some(snapshot.date) => s,
        Some(s) => {
            tracing::info!(
                target: "dedup",
                previous = ?s.date,
                current = %snapshot.date,
                dropped = s.len(),
                "day rollover; dedup state reset"
            );
            DedupState::for_date(snapshot.date)
        }
        None => {
            tracing::debug!(target: "dedup", "no prior dedup state; starting empty");
            DedupState::for_date(snapshot.date)
        }
    };

    let groups = snapshot
        .groups
        .iter()
        .map(|g| ClassifiedGroup {
            category: g.category.clone(),
            priority: g.priority,
            order: g.order,
            matches: g
                .matches
                .iter()
                .map(|m| {
                    let status = if state.contains(&g.category, &m.identity()) {
                        Freshness::Seen
                    } else {
                        Freshness::New
                    };
                    ClassifiedMatch {
                        m: m.clone(),
                        status,
                    }
                })
                .collect(),
        })
        .collect();

    // Record after labelling so identities within this run never see themselves.
    for g in &snapshot.groups {
        if g.matches.is_empty() {
            continue;
        }
        let entry = state.seen.entry(g.category.clone()).or_default();
        for m in &g.matches {
            entry.insert(m.identity());
        }
    }

    let classified = ClassifiedSnapshot {
        snapshot_timestamp: snapshot.timestamp,
        date: snapshot.date,
        groups,
    };
    tracing::debug!(
        target: "dedup",
        new = classified.new_count(),
        tracked = state.len(),
        "classification finished"
    );
    (classified, state)
}
