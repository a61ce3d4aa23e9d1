// src/ingest/providers/hotlist.rs
//! Platform hot lists served by a NewsNow-style aggregator:
//! `{"status":"success","items":[{"title":..,"url":..,"mobileUrl":..}]}`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::ingest::normalize_text;
use crate::ingest::types::{Item, SourceProvider};

#[derive(Debug, Deserialize)]
struct HotListResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    items: Vec<HotListEntry>,
}

#[derive(Debug, Deserialize)]
struct HotListEntry {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "mobileUrl")]
    mobile_url: Option<String>,
}

pub struct HotListProvider {
    id: String,
    name: String,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl HotListProvider {
    pub fn from_fixture(id: impl Into<String>, name: impl Into<String>, json: &str) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mode: Mode::Fixture(json.to_string()),
        }
    }

    pub fn from_url(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mode: Mode::Http {
                url: url.into(),
                client: reqwest::Client::new(),
            },
        }
    }

    /// Rank is the 1-based position among entries with a non-empty title.
    fn parse_items(&self, body: &str, now: DateTime<Utc>) -> Result<Vec<Item>> {
        let resp: HotListResponse = serde_json::from_str(body)
            .with_context(|| format!("parsing hot list json for {}", self.id))?;
        if let Some(status) = resp.status.as_deref() {
            if !matches!(status, "success" | "cache") {
                return Err(anyhow!("hot list {} returned status {status}", self.id));
            }
        }

        let mut out = Vec::with_capacity(resp.items.len());
        let mut rank = 0u32;
        for e in resp.items {
            let title = normalize_text(e.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                continue;
            }
            rank += 1;
            let url = e
                .url
                .or(e.mobile_url)
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty());
            out.push(Item::ranked(
                self.id.clone(),
                self.name.clone(),
                title,
                url,
                rank,
                now,
            ));
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceProvider for HotListProvider {
    async fn fetch_latest(&self) -> Result<Vec<Item>> {
        let now = Utc::now();
        match &self.mode {
            Mode::Fixture(s) => self.parse_items(s, now),
            Mode::Http { url, client } => {
                let body = client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("hot list http get {url}"))?
                    .error_for_status()
                    .context("hot list non-2xx")?
                    .text()
                    .await
                    .context("hot list http .text()")?;
                self.parse_items(&body, now)
            }
        }
    }

    fn name(&self) -> &str {
        &self.id
    }
}
