// src/notify/antiflutter.rs
use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Minimum spacing between two report pushes.
///
/// Only delivered pushes count: `mark_pushed` is called after at least one
/// sink accepted the report, so a failed send leaves the window open.
#[derive(Debug, Clone, Default)]
pub struct AntiFlutter {
    cooldown: ChronoDuration,
    last_push: Option<DateTime<Utc>>,
}

impl AntiFlutter {
    /// Negative `cooldown_secs` disables the window.
    pub fn new(cooldown_secs: i64) -> Self {
        Self {
            cooldown: ChronoDuration::seconds(cooldown_secs.max(0)),
            last_push: None,
        }
    }

    pub fn may_push(&self, now: DateTime<Utc>) -> bool {
        self.last_push
            .map_or(true, |at| now.signed_duration_since(at) >= self.cooldown)
    }

    pub fn mark_pushed(&mut self, now: DateTime<Utc>) {
        self.last_push = Some(now);
    }

    pub fn last_push(&self) -> Option<DateTime<Utc>> {
        self.last_push
    }
}
