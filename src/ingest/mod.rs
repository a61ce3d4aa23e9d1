// src/ingest/mod.rs
pub mod providers;
pub mod scheduler;
pub mod types;

use crate::ingest::types::{Item, ItemIdentity, SourceProvider};
use metrics::{counter, histogram};
use std::collections::HashSet;

/// Normalize scraped text: decode entities, strip tags, unify quotes,
/// collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 5) Length cap: 500 chars (titles only)
    if out.chars().count() > 500 {
        out = out.chars().take(500).collect();
    }

    out
}

/// Map full-width ASCII variants and CJK punctuation to their half-width forms.
pub fn fold_width(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{3000}' => ' ',
            '\u{3001}' => ',',
            '\u{3002}' => '.',
            '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
            _ => c,
        })
        .collect()
}

/// Stable key for titles without a URL: width-folded, lowercased,
/// whitespace-collapsed.
pub fn normalize_title_key(title: &str) -> String {
    fold_width(title)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop empty titles and collapse repeated identities within one fetch.
/// Returns (kept, dropped_empty, dropped_duplicate).
pub fn clean_items(raw: Vec<Item>) -> (Vec<Item>, usize, usize) {
    let mut empty = 0usize;
    let mut dup = 0usize;
    let mut seen: HashSet<ItemIdentity> = HashSet::new();
    let mut keep = Vec::with_capacity(raw.len());

    for mut it in raw {
        it.title = normalize_text(&it.title);
        if it.title.is_empty() {
            empty += 1;
            continue;
        }
        if !seen.insert(it.identity()) {
            dup += 1;
            continue;
        }
        keep.push(it);
    }

    (keep, empty, dup)
}

/// Fetch from every provider once. Provider errors are logged and counted;
/// they never fail the run.
pub async fn run_once(providers: &[Box<dyn SourceProvider>]) -> Vec<Item> {
    crate::metrics::ensure_described();

    let mut raw = Vec::new();
    for p in providers {
        let t0 = std::time::Instant::now();
        match p.fetch_latest().await {
            Ok(mut v) => {
                tracing::debug!(target: "ingest", provider = p.name(), items = v.len(), "fetched");
                raw.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, provider = p.name(), "provider error");
                counter!("radar_provider_errors_total").increment(1);
            }
        }
        histogram!("radar_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    }

    let (kept, empty, dup) = clean_items(raw);
    counter!("radar_items_total").increment(kept.len() as u64);
    tracing::info!(
        target: "ingest",
        kept = kept.len(),
        empty = empty,
        duplicate = dup,
        "ingest finished"
    );
    kept
}
