// src/query.rs
//! Read-side views over stored runs, used by the HTTP layer.
//!
//! Everything here is pure: callers load `RunItems` from a store and pass
//! them in.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::taxonomy::Taxonomy;
use crate::ingest::types::{Item, ItemIdentity};
use crate::matcher::{FrequencyMatcher, Normalization};
use crate::store::RunItems;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsItem {
    pub title: String,
    pub platform: String,
    pub platform_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl From<&Item> for NewsItem {
    fn from(it: &Item) -> Self {
        Self {
            title: it.title.clone(),
            platform: it.source_id.clone(),
            platform_name: it.source_name.clone(),
            rank: it.rank,
            url: it.url.clone(),
            observed_at: it.observed_at,
        }
    }
}

/// One identity across all runs of a day.
#[derive(Debug, Clone)]
pub struct DayItem {
    /// Latest observation.
    pub item: Item,
    /// Rank at first sighting.
    pub first_rank: Option<u32>,
    pub first_seen: DateTime<Utc>,
    /// Runs the identity appeared in.
    pub appearances: usize,
}

impl DayItem {
    pub fn is_new(&self) -> bool {
        self.appearances == 1
    }
}

fn platform_ok(platforms: Option<&[String]>, id: &str) -> bool {
    platforms.map_or(true, |ps| ps.iter().any(|p| p == id))
}

/// Merge runs by identity, keeping first-appearance order.
pub fn aggregate(runs: &[RunItems]) -> Vec<DayItem> {
    let mut index: HashMap<ItemIdentity, usize> = HashMap::new();
    let mut out: Vec<DayItem> = Vec::new();
    let mut sorted: Vec<&RunItems> = runs.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);

    for run in sorted {
        let mut in_run = HashSet::new();
        for it in &run.items {
            let id = it.identity();
            if !in_run.insert(id.clone()) {
                continue;
            }
            match index.get(&id) {
                Some(&i) => {
                    let d = &mut out[i];
                    d.appearances += 1;
                    d.item = it.clone();
                }
                None => {
                    index.insert(id, out.len());
                    out.push(DayItem {
                        item: it.clone(),
                        first_rank: it.rank,
                        first_seen: it.observed_at,
                        appearances: 1,
                    });
                }
            }
        }
    }
    out
}

/// Items of the latest run, in crawl order.
pub fn latest_news(run: &RunItems, platforms: Option<&[String]>, limit: usize) -> Vec<NewsItem> {
    run.items
        .iter()
        .filter(|it| platform_ok(platforms, &it.source_id))
        .take(limit)
        .map(NewsItem::from)
        .collect()
}

/// Every distinct item of one day, ranked items first by rank.
pub fn news_by_date(runs: &[RunItems], platforms: Option<&[String]>, limit: usize) -> Vec<NewsItem> {
    let mut day: Vec<DayItem> = aggregate(runs)
        .into_iter()
        .filter(|d| platform_ok(platforms, &d.item.source_id))
        .collect();
    day.sort_by_key(|d| d.first_rank.unwrap_or(u32::MAX));
    day.iter().take(limit).map(|d| NewsItem::from(&d.item)).collect()
}

/// Items whose normalized title contains `keyword`, newest first.
pub fn search_news(
    runs: &[RunItems],
    keyword: &str,
    normalization: Normalization,
    platforms: Option<&[String]>,
    limit: Option<usize>,
) -> Vec<NewsItem> {
    let needle = normalization.apply(keyword.trim());
    if needle.is_empty() {
        return Vec::new();
    }
    let mut hits: Vec<DayItem> = aggregate(runs)
        .into_iter()
        .filter(|d| platform_ok(platforms, &d.item.source_id))
        .filter(|d| normalization.apply(&d.item.title).contains(&needle))
        .collect();
    hits.sort_by(|a, b| b.item.observed_at.cmp(&a.item.observed_at));
    let take = limit.unwrap_or(usize::MAX);
    hits.iter().take(take).map(|d| NewsItem::from(&d.item)).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicCount {
    pub category: String,
    pub priority: u32,
    pub count: usize,
}

/// Distinct matched items per category over `runs`, count desc.
/// Pass the latest run alone for `current`, the whole day for `daily`.
pub fn trending_topics(
    runs: &[RunItems],
    taxonomy: &Taxonomy,
    normalization: Normalization,
    top_n: usize,
) -> Vec<TopicCount> {
    let matcher = FrequencyMatcher::new(taxonomy, normalization);
    let mut counts = vec![0usize; taxonomy.categories().len()];
    for d in aggregate(runs) {
        if matcher.global_filter_hit(&d.item.title).is_some() {
            continue;
        }
        for hit in matcher.match_title(&d.item.title) {
            counts[hit.category_index] += 1;
        }
    }

    let mut topics: Vec<(usize, TopicCount)> = taxonomy
        .categories()
        .iter()
        .zip(counts)
        .filter(|(_, n)| *n > 0)
        .map(|(c, count)| {
            (
                c.order,
                TopicCount {
                    category: c.name.clone(),
                    priority: c.priority,
                    count,
                },
            )
        })
        .collect();
    topics.sort_by(|(oa, a), (ob, b)| {
        b.count
            .cmp(&a.count)
            .then(b.priority.cmp(&a.priority))
            .then(oa.cmp(ob))
    });
    topics.into_iter().take(top_n).map(|(_, t)| t).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Keyword,
    Platform,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryItem {
    pub title: String,
    pub source_name: String,
    pub rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub is_new: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryGroup {
    /// Keyword term or platform id.
    pub key: String,
    pub name: String,
    /// Items before the per-group cap.
    pub count: usize,
    pub news: Vec<SummaryItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub group_by: GroupBy,
    pub total_news: usize,
    pub groups: Vec<SummaryGroup>,
}

fn bucket<'a>(
    order: &mut Vec<(String, String)>,
    buckets: &mut BTreeMap<String, Vec<&'a DayItem>>,
    key: &str,
    name: &str,
    d: &'a DayItem,
) {
    if !order.iter().any(|(k, _)| k == key) {
        order.push((key.to_string(), name.to_string()));
    }
    buckets.entry(key.to_string()).or_default().push(d);
}

/// The day's items grouped by matched keyword term or by platform.
/// Groups are ordered by size (ties keep declaration/first-seen order),
/// items by rank, and each group is capped at `max_per_group`.
pub fn summary(
    runs: &[RunItems],
    taxonomy: &Taxonomy,
    normalization: Normalization,
    group_by: GroupBy,
    max_per_group: usize,
) -> Summary {
    let day = aggregate(runs);
    let mut order: Vec<(String, String)> = Vec::new();
    let mut buckets: BTreeMap<String, Vec<&DayItem>> = BTreeMap::new();

    match group_by {
        GroupBy::Platform => {
            for d in &day {
                bucket(&mut order, &mut buckets, &d.item.source_id, &d.item.source_name, d);
            }
        }
        GroupBy::Keyword => {
            let matcher = FrequencyMatcher::new(taxonomy, normalization);
            // Term declaration order breaks ties between equal-sized groups.
            for c in taxonomy.categories() {
                for t in c.required_terms.iter().chain(c.mandatory_terms.iter()) {
                    if !order.iter().any(|(k, _)| k == t) {
                        order.push((t.clone(), t.clone()));
                    }
                }
            }
            for d in &day {
                if matcher.global_filter_hit(&d.item.title).is_some() {
                    continue;
                }
                let mut done = HashSet::new();
                for hit in matcher.match_title(&d.item.title) {
                    for t in hit.matched_terms {
                        if done.insert(t.clone()) {
                            bucket(&mut order, &mut buckets, &t, &t, d);
                        }
                    }
                }
            }
        }
    }

    let mut groups: Vec<SummaryGroup> = order
        .into_iter()
        .filter_map(|(key, name)| {
            let mut items = buckets.remove(&key)?;
            items.sort_by_key(|d| d.first_rank.unwrap_or(u32::MAX));
            let count = items.len();
            let news = items
                .into_iter()
                .take(max_per_group)
                .map(|d| SummaryItem {
                    title: d.item.title.clone(),
                    source_name: d.item.source_name.clone(),
                    rank: d.first_rank,
                    url: d.item.url.clone(),
                    is_new: d.is_new(),
                })
                .collect();
            Some(SummaryGroup {
                key,
                name,
                count,
                news,
            })
        })
        .collect();
    groups.sort_by(|a, b| b.count.cmp(&a.count));

    Summary {
        group_by,
        total_news: groups.iter().map(|g| g.count).sum(),
        groups,
    }
}

// ---- RSS views ----
// Feed entries are the items without a hot-list rank.

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEntry {
    pub title: String,
    pub feed: String,
    pub feed_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub observed_at: DateTime<Utc>,
}

impl From<&Item> for FeedEntry {
    fn from(it: &Item) -> Self {
        Self {
            title: it.title.clone(),
            feed: it.source_id.clone(),
            feed_name: it.source_name.clone(),
            url: it.url.clone(),
            published_at: it.published_at,
            observed_at: it.observed_at,
        }
    }
}

/// Newest publish time first; undated entries follow, newest observation first.
fn by_recency(a: &Item, b: &Item) -> Ordering {
    match (a.published_at, b.published_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.observed_at.cmp(&a.observed_at),
    }
    .then_with(|| a.title.cmp(&b.title))
}

/// Feed entries of one run, newest first.
pub fn latest_rss(run: &RunItems, feeds: Option<&[String]>, limit: usize) -> Vec<FeedEntry> {
    let mut entries: Vec<&Item> = run
        .items
        .iter()
        .filter(|it| it.is_feed_entry() && platform_ok(feeds, &it.source_id))
        .collect();
    entries.sort_by(|a, b| by_recency(a, b));
    entries.into_iter().take(limit).map(FeedEntry::from).collect()
}

/// Distinct feed entries across `runs` whose title contains `keyword`.
pub fn search_rss(
    runs: &[RunItems],
    keyword: &str,
    normalization: Normalization,
    feeds: Option<&[String]>,
    limit: usize,
) -> Vec<FeedEntry> {
    let needle = normalization.apply(keyword.trim());
    if needle.is_empty() {
        return Vec::new();
    }
    let mut hits: Vec<DayItem> = aggregate(runs)
        .into_iter()
        .filter(|d| d.item.is_feed_entry() && platform_ok(feeds, &d.item.source_id))
        .filter(|d| normalization.apply(&d.item.title).contains(&needle))
        .collect();
    hits.sort_by(|a, b| by_recency(&a.item, &b.item));
    hits.iter().take(limit).map(|d| FeedEntry::from(&d.item)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedStatus {
    pub feed: String,
    pub name: String,
    /// Distinct entries over all stored runs.
    pub entries: usize,
    /// Entries in the newest run that carried this feed.
    pub latest_entries: usize,
    pub last_fetched_at: DateTime<Utc>,
    pub latest_published_at: Option<DateTime<Utc>>,
    pub days_with_data: usize,
}

/// Per-feed health over every stored run, by feed id.
pub fn feed_status(runs: &[RunItems]) -> Vec<FeedStatus> {
    struct Acc {
        name: String,
        ids: HashSet<ItemIdentity>,
        last_run: DateTime<Utc>,
        latest_entries: usize,
        latest_published_at: Option<DateTime<Utc>>,
        days: HashSet<NaiveDate>,
    }

    let mut sorted: Vec<&RunItems> = runs.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);

    let mut feeds: BTreeMap<String, Acc> = BTreeMap::new();
    for run in sorted {
        let mut in_run: HashMap<&str, usize> = HashMap::new();
        for it in run.items.iter().filter(|it| it.is_feed_entry()) {
            *in_run.entry(it.source_id.as_str()).or_default() += 1;
            let acc = feeds.entry(it.source_id.clone()).or_insert_with(|| Acc {
                name: it.source_name.clone(),
                ids: HashSet::new(),
                last_run: run.timestamp,
                latest_entries: 0,
                latest_published_at: None,
                days: HashSet::new(),
            });
            acc.name = it.source_name.clone();
            acc.ids.insert(it.identity());
            acc.days.insert(run.date);
            acc.latest_published_at = acc.latest_published_at.max(it.published_at);
        }
        for (feed, n) in in_run {
            if let Some(acc) = feeds.get_mut(feed) {
                acc.last_run = run.timestamp;
                acc.latest_entries = n;
            }
        }
    }

    feeds
        .into_iter()
        .map(|(feed, acc)| FeedStatus {
            feed,
            name: acc.name,
            entries: acc.ids.len(),
            latest_entries: acc.latest_entries,
            last_fetched_at: acc.last_run,
            latest_published_at: acc.latest_published_at,
            days_with_data: acc.days.len(),
        })
        .collect()
}
