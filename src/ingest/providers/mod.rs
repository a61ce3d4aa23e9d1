pub mod hotlist;
pub mod rss;

pub use hotlist::HotListProvider;
pub use rss::RssProvider;

use crate::config::CrawlerConfig;
use crate::ingest::types::SourceProvider;

/// Build HTTP providers for every configured hot list and feed.
pub fn from_config(cfg: &CrawlerConfig) -> Vec<Box<dyn SourceProvider>> {
    let mut out: Vec<Box<dyn SourceProvider>> = Vec::new();
    for h in &cfg.hotlists {
        out.push(Box::new(HotListProvider::from_url(
            h.id.clone(),
            h.display_name(),
            h.url.clone(),
        )));
    }
    for f in &cfg.feeds {
        out.push(Box::new(RssProvider::from_url(
            f.id.clone(),
            f.display_name(),
            f.url.clone(),
        )));
    }
    out
}
