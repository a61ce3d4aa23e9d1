// src/api.rs
//! Read-only HTTP query surface over the item store.
//!
//! Every body is `{"success": true, ...}` or
//! `{"success": false, "error": {"code", "message"}}`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::config::taxonomy::Taxonomy;
use crate::config::ReportZone;
use crate::error::RadarError;
use crate::matcher::Normalization;
use crate::pipeline::run_date;
use crate::query::{self, GroupBy};
use crate::store::{ItemStore, RunItems};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 1000;
const DEFAULT_TOP_N: usize = 10;
const DEFAULT_PER_GROUP: usize = 10;
const MAX_KEYWORD_CHARS: usize = 100;
const DEFAULT_RSS_DAYS: i64 = 7;
const MAX_RSS_DAYS: i64 = 30;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ItemStore>,
    pub taxonomy: Arc<Taxonomy>,
    pub normalization: Normalization,
    pub zone: ReportZone,
}

impl AppState {
    fn today(&self) -> NaiveDate {
        run_date(Utc::now(), self.zone)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/news/latest", get(news_latest))
        .route("/news/search", get(news_search))
        .route("/news/by-date", get(news_by_date))
        .route("/topics/trending", get(topics_trending))
        .route("/summary", get(summary))
        .route("/rss/latest", get(rss_latest))
        .route("/rss/search", get(rss_search))
        .route("/rss/feeds/status", get(rss_feeds_status))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "INVALID_PARAMETER",
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "DATA_NOT_FOUND",
            message: message.into(),
        }
    }
}

impl From<RadarError> for ApiError {
    fn from(e: RadarError) -> Self {
        tracing::error!(target: "api", error = %e, "query failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "INTERNAL_ERROR",
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "error": { "code": self.code, "message": self.message }
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;
type Params = Query<HashMap<String, String>>;

// ---- parameter parsing ----

fn param<'a>(q: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    q.get(key).map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn parse_bounded(
    q: &HashMap<String, String>,
    key: &str,
    default: usize,
    max: usize,
) -> Result<usize, ApiError> {
    let Some(raw) = param(q, key) else {
        return Ok(default);
    };
    match raw.parse::<usize>() {
        Ok(n) if (1..=max).contains(&n) => Ok(n),
        _ => Err(ApiError::invalid(format!("{key} must be an integer in 1..={max}"))),
    }
}

fn parse_date(q: &HashMap<String, String>, key: &str) -> Result<Option<NaiveDate>, ApiError> {
    param(q, key)
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|_| ApiError::invalid(format!("{key} must be YYYY-MM-DD, got `{s}`")))
        })
        .transpose()
}

fn parse_platforms(q: &HashMap<String, String>) -> Option<Vec<String>> {
    parse_list(q, "platforms")
}

/// Comma-separated ids; `None` when absent or blank.
fn parse_list(q: &HashMap<String, String>, key: &str) -> Option<Vec<String>> {
    let list: Vec<String> = param(q, key)?
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    (!list.is_empty()).then_some(list)
}

fn parse_keyword(q: &HashMap<String, String>) -> Result<&str, ApiError> {
    let keyword = param(q, "keyword").ok_or_else(|| ApiError::invalid("keyword is required"))?;
    if keyword.chars().count() > MAX_KEYWORD_CHARS {
        return Err(ApiError::invalid(format!(
            "keyword longer than {MAX_KEYWORD_CHARS} chars"
        )));
    }
    Ok(keyword)
}

/// Search window in days; out-of-range values fall back to the default.
fn parse_days(q: &HashMap<String, String>) -> Result<i64, ApiError> {
    let Some(raw) = param(q, "days") else {
        return Ok(DEFAULT_RSS_DAYS);
    };
    let days: i64 = raw
        .parse()
        .map_err(|_| ApiError::invalid(format!("days must be an integer, got `{raw}`")))?;
    Ok(if (1..=MAX_RSS_DAYS).contains(&days) {
        days
    } else {
        DEFAULT_RSS_DAYS
    })
}

fn parse_choice<'a>(
    q: &HashMap<String, String>,
    key: &str,
    allowed: &[&'a str],
    default: &'a str,
) -> Result<&'a str, ApiError> {
    match param(q, key) {
        None => Ok(default),
        Some(v) => allowed
            .iter()
            .find(|a| a.eq_ignore_ascii_case(v))
            .copied()
            .ok_or_else(|| {
                ApiError::invalid(format!("{key} must be one of {}", allowed.join("|")))
            }),
    }
}

async fn day_runs(state: &AppState, date: NaiveDate) -> Result<Vec<RunItems>, ApiError> {
    let runs = state.store.load_items(date).await?;
    if runs.is_empty() {
        return Err(ApiError::not_found(format!("no data for {date}")));
    }
    Ok(runs)
}

// ---- handlers ----

async fn health() -> Json<Value> {
    Json(json!({ "success": true, "status": "ok" }))
}

async fn news_latest(State(state): State<AppState>, Query(q): Params) -> ApiResult {
    let platforms = parse_platforms(&q);
    let limit = parse_bounded(&q, "limit", DEFAULT_LIMIT, MAX_LIMIT)?;
    let run = state
        .store
        .latest_items()
        .await?
        .ok_or_else(|| ApiError::not_found("no crawl data yet"))?;

    let news = query::latest_news(&run, platforms.as_deref(), limit);
    Ok(Json(json!({
        "success": true,
        "crawled_at": run.timestamp,
        "total": news.len(),
        "platforms": platforms,
        "news": news,
    })))
}

async fn news_search(State(state): State<AppState>, Query(q): Params) -> ApiResult {
    let keyword = parse_keyword(&q)?;
    let start = parse_date(&q, "start")?;
    let end = parse_date(&q, "end")?;
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(ApiError::invalid("start must not be after end"));
        }
    }
    let platforms = parse_platforms(&q);
    let limit = match param(&q, "limit") {
        Some(_) => Some(parse_bounded(&q, "limit", DEFAULT_LIMIT, MAX_LIMIT)?),
        None => None,
    };

    let mut runs = Vec::new();
    let mut searched = Vec::new();
    for date in state.store.list_dates().await? {
        if start.is_some_and(|s| date < s) || end.is_some_and(|e| date > e) {
            continue;
        }
        runs.extend(state.store.load_items(date).await?);
        searched.push(date);
    }

    let news = query::search_news(&runs, keyword, state.normalization, platforms.as_deref(), limit);
    Ok(Json(json!({
        "success": true,
        "keyword": keyword,
        "dates": searched,
        "total": news.len(),
        "news": news,
    })))
}

async fn news_by_date(State(state): State<AppState>, Query(q): Params) -> ApiResult {
    let date = parse_date(&q, "date")?.unwrap_or_else(|| state.today());
    let platforms = parse_platforms(&q);
    let limit = parse_bounded(&q, "limit", DEFAULT_LIMIT, MAX_LIMIT)?;
    let runs = day_runs(&state, date).await?;

    let news = query::news_by_date(&runs, platforms.as_deref(), limit);
    Ok(Json(json!({
        "success": true,
        "date": date,
        "runs": runs.len(),
        "total": news.len(),
        "platforms": platforms,
        "news": news,
    })))
}

async fn topics_trending(State(state): State<AppState>, Query(q): Params) -> ApiResult {
    let top_n = parse_bounded(&q, "top_n", DEFAULT_TOP_N, 100)?;
    let mode = parse_choice(&q, "mode", &["current", "daily"], "current")?;

    let runs = match mode {
        "daily" => day_runs(&state, state.today()).await?,
        _ => vec![state
            .store
            .latest_items()
            .await?
            .ok_or_else(|| ApiError::not_found("no crawl data yet"))?],
    };
    let topics = query::trending_topics(&runs, &state.taxonomy, state.normalization, top_n);
    Ok(Json(json!({
        "success": true,
        "mode": mode,
        "total": topics.len(),
        "topics": topics,
    })))
}

async fn summary(State(state): State<AppState>, Query(q): Params) -> ApiResult {
    let date = parse_date(&q, "date")?.unwrap_or_else(|| state.today());
    let mode = parse_choice(&q, "mode", &["daily", "current", "incremental"], "daily")?;
    let group_by = match parse_choice(&q, "group_by", &["keyword", "platform"], "keyword")? {
        "platform" => GroupBy::Platform,
        _ => GroupBy::Keyword,
    };
    let per_group = parse_bounded(&q, "max_per_group", DEFAULT_PER_GROUP, 100)?;

    let mut runs = day_runs(&state, date).await?;
    if mode == "current" {
        runs = runs.split_off(runs.len() - 1);
    }
    let s = query::summary(&runs, &state.taxonomy, state.normalization, group_by, per_group);
    Ok(Json(json!({
        "success": true,
        "date": date,
        "mode": mode,
        "group_by": s.group_by,
        "total_groups": s.groups.len(),
        "total_news": s.total_news,
        "groups": s.groups,
    })))
}

async fn rss_latest(State(state): State<AppState>, Query(q): Params) -> ApiResult {
    let feeds = parse_list(&q, "feeds");
    let limit = parse_bounded(&q, "limit", DEFAULT_LIMIT, MAX_LIMIT)?;
    let run = state
        .store
        .latest_items()
        .await?
        .ok_or_else(|| ApiError::not_found("no crawl data yet"))?;

    let rss = query::latest_rss(&run, feeds.as_deref(), limit);
    Ok(Json(json!({
        "success": true,
        "crawled_at": run.timestamp,
        "total": rss.len(),
        "feeds": feeds,
        "rss": rss,
    })))
}

async fn rss_search(State(state): State<AppState>, Query(q): Params) -> ApiResult {
    let keyword = parse_keyword(&q)?;
    let feeds = parse_list(&q, "feeds");
    let days = parse_days(&q)?;
    let limit = parse_bounded(&q, "limit", DEFAULT_LIMIT, MAX_LIMIT)?;

    let today = state.today();
    let since = today - ChronoDuration::days(days - 1);
    let mut runs = Vec::new();
    for date in state.store.list_dates().await? {
        if date >= since && date <= today {
            runs.extend(state.store.load_items(date).await?);
        }
    }

    let rss = query::search_rss(&runs, keyword, state.normalization, feeds.as_deref(), limit);
    Ok(Json(json!({
        "success": true,
        "keyword": keyword,
        "feeds": feeds,
        "days": days,
        "total": rss.len(),
        "rss": rss,
    })))
}

async fn rss_feeds_status(State(state): State<AppState>) -> ApiResult {
    let dates = state.store.list_dates().await?;
    let mut runs = Vec::new();
    for date in &dates {
        runs.extend(state.store.load_items(*date).await?);
    }
    let feeds = query::feed_status(&runs);
    Ok(Json(json!({
        "success": true,
        "latest_date": dates.last(),
        "total_feeds": feeds.len(),
        "feeds": feeds,
    })))
}
