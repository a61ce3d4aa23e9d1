// src/matcher.rs
//! Frequency matcher: global filters first, then every category in taxonomy
//! order. Produces a `MatchSnapshot` for one run.
//!
//! Matching is substring-based on the normalized title. An item may land in
//! several categories; that is intended.

use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

use crate::config::taxonomy::Taxonomy;
use crate::ingest::fold_width;
use crate::ingest::types::{Item, ItemIdentity};

/// How titles and terms are folded before substring tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Normalization {
    pub fold_case: bool,
    pub fold_width: bool,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            fold_case: true,
            fold_width: true,
        }
    }
}

impl Normalization {
    pub fn apply(&self, s: &str) -> String {
        let mut out = if self.fold_width {
            fold_width(s)
        } else {
            s.to_string()
        };
        if self.fold_case {
            out = out.to_lowercase();
        }
        out
    }
}

/// One item classified under one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub item: Item,
    pub category: String,
    /// Terms (as declared) that hit the title.
    pub matched_terms: Vec<String>,
    /// Declaration index of the first required term that hit.
    pub term_order: usize,
    /// Count contribution. Always 1 out of the matcher.
    pub weight: u32,
    pub score: u64,
    /// Earliest time this identity was seen matching this category.
    pub first_seen_at: DateTime<Utc>,
}

impl Match {
    pub fn identity(&self) -> ItemIdentity {
        self.item.identity()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryMatches {
    pub category: String,
    pub priority: u32,
    pub order: usize,
    pub matches: Vec<Match>,
}

/// All matches of one run, one group per taxonomy category (possibly empty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub groups: Vec<CategoryMatches>,
}

impl MatchSnapshot {
    pub fn empty(timestamp: DateTime<Utc>, date: NaiveDate) -> Self {
        Self {
            timestamp,
            date,
            groups: Vec::new(),
        }
    }

    pub fn total_matches(&self) -> usize {
        self.groups.iter().map(|g| g.matches.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_matches() == 0
    }

    pub fn group(&self, category: &str) -> Option<&CategoryMatches> {
        self.groups.iter().find(|g| g.category == category)
    }
}

#[derive(Debug)]
struct CompiledCategory {
    name: String,
    priority: u32,
    order: usize,
    /// (as declared, normalized)
    required: Vec<(String, String)>,
    mandatory: Vec<(String, String)>,
    excluded: Vec<String>,
}

/// Holds normalized terms; build once per taxonomy.
#[derive(Debug)]
pub struct FrequencyMatcher {
    normalization: Normalization,
    global_filters: Vec<String>,
    categories: Vec<CompiledCategory>,
}

/// Per-category outcome for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryHit {
    pub category_index: usize,
    pub matched_terms: Vec<String>,
    pub term_order: usize,
}

impl FrequencyMatcher {
    pub fn new(taxonomy: &Taxonomy, normalization: Normalization) -> Self {
        let pair = |t: &String| (t.clone(), normalization.apply(t));
        let categories = taxonomy
            .categories()
            .iter()
            .map(|c| CompiledCategory {
                name: c.name.clone(),
                priority: c.priority,
                order: c.order,
                required: c.required_terms.iter().map(pair).collect(),
                mandatory: c.mandatory_terms.iter().map(pair).collect(),
                excluded: c
                    .excluded_terms
                    .iter()
                    .map(|t| normalization.apply(t))
                    .collect(),
            })
            .collect();
        let global_filters = taxonomy
            .global_filters()
            .terms
            .iter()
            .map(|t| normalization.apply(t))
            .collect();
        Self {
            normalization,
            global_filters,
            categories,
        }
    }

    /// First global filter term found in `title`, if any.
    pub fn global_filter_hit(&self, title: &str) -> Option<&str> {
        let norm = self.normalization.apply(title);
        self.global_filters
            .iter()
            .find(|f| norm.contains(f.as_str()))
            .map(String::as_str)
    }

    /// Categories matched by `title`, in taxonomy order. Global filters are
    /// NOT consulted here; see `run`.
    pub fn match_title(&self, title: &str) -> Vec<CategoryHit> {
        let norm = self.normalization.apply(title);
        let mut hits = Vec::new();

        for (idx, c) in self.categories.iter().enumerate() {
            // Exclusions veto first
            if c.excluded.iter().any(|x| norm.contains(x.as_str())) {
                continue;
            }
            let mut first: Option<usize> = None;
            let mut terms = Vec::new();
            for (i, (orig, n)) in c.required.iter().enumerate() {
                if norm.contains(n.as_str()) {
                    first.get_or_insert(i);
                    terms.push(orig.clone());
                }
            }
            let Some(term_order) = first else {
                continue;
            };
            if !c.mandatory.iter().all(|(_, n)| norm.contains(n.as_str())) {
                continue;
            }
            terms.extend(c.mandatory.iter().map(|(orig, _)| orig.clone()));
            hits.push(CategoryHit {
                category_index: idx,
                matched_terms: terms,
                term_order,
            });
        }
        hits
    }

    /// Match every item against the taxonomy. Deterministic and side-effect
    /// free apart from metrics and dev logs.
    pub fn run(&self, items: &[Item], timestamp: DateTime<Utc>, date: NaiveDate) -> MatchSnapshot {
        let mut groups: Vec<CategoryMatches> = self
            .categories
            .iter()
            .map(|c| CategoryMatches {
                category: c.name.clone(),
                priority: c.priority,
                order: c.order,
                matches: Vec::new(),
            })
            .collect();
        let mut seen: Vec<HashSet<ItemIdentity>> = vec![HashSet::new(); groups.len()];
        let mut filtered = 0u64;

        for item in items {
            if let Some(term) = self.global_filter_hit(&item.title) {
                filtered += 1;
                dev_log_match("filtered", &item.title, &[term.to_string()]);
                continue;
            }
            let hits = self.match_title(&item.title);
            if hits.is_empty() {
                continue;
            }
            let identity = item.identity();
            for hit in hits {
                if !seen[hit.category_index].insert(identity.clone()) {
                    continue;
                }
                let c = &self.categories[hit.category_index];
                dev_log_match("matched", &item.title, &hit.matched_terms);
                groups[hit.category_index].matches.push(Match {
                    item: item.clone(),
                    category: c.name.clone(),
                    matched_terms: hit.matched_terms,
                    term_order: hit.term_order,
                    weight: 1,
                    score: u64::from(c.priority),
                    first_seen_at: item.observed_at,
                });
            }
        }

        let snapshot = MatchSnapshot {
            timestamp,
            date,
            groups,
        };
        let total = snapshot.total_matches();
        counter!("radar_filtered_total").increment(filtered);
        counter!("radar_matches_total").increment(total as u64);
        tracing::debug!(
            target: "matcher",
            items = items.len(),
            filtered,
            matches = total,
            "matching finished"
        );
        snapshot
    }
}

// Dev logging gate: RADAR_DEV_LOG=1 AND dev env (debug build or RADAR_ENV in {local,development,dev})
pub(crate) fn dev_logging_enabled() -> bool {
    let on = std::env::var("RADAR_DEV_LOG").ok().as_deref() == Some("1");
    if !on {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var("RADAR_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Never logs the raw title, only a short digest.
fn dev_log_match(event: &str, title: &str, terms: &[String]) {
    if !dev_logging_enabled() {
        return;
    }
    let id = anon_hash(title);
    let terms_short: Vec<&String> = terms.iter().take(5).collect();
    info!(target: "matcher", %id, event, terms = ?terms_short);
}
