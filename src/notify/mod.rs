// src/notify/mod.rs
//! Push channels for report payloads.
//!
//! The strategy decides whether a run *fires*; this layer decides whether a
//! fired run is actually pushed (empty payload, cooldown) and fans it out.

pub mod antiflutter;
pub mod discord;
pub mod email;
pub mod slack;

use std::fmt::Write as _;

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::counter;

use crate::config::NotifyConfig;
use crate::ranking::ReportPayload;
use antiflutter::AntiFlutter;

pub use discord::DiscordNotifier;
pub use email::EmailSender;
pub use slack::SlackNotifier;

const DEFAULT_MAX_TITLES: usize = 5;

/// Rendered message handed to every channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub total: usize,
    pub new: usize,
}

impl Notification {
    pub fn from_payload(payload: &ReportPayload, max_titles: Option<usize>) -> Self {
        let total = payload.total_entries();
        let new = payload.new_entries();
        let subject = format!(
            "[{}] {} · {} matches ({} new)",
            payload.mode, payload.date, total, new
        );
        Self {
            subject,
            body: render_text(payload, max_titles.unwrap_or(DEFAULT_MAX_TITLES)),
            total,
            new,
        }
    }
}

/// Compact plain text: one header per category, then up to `max_titles`
/// lines with `🆕` in front of new items.
pub fn render_text(payload: &ReportPayload, max_titles: usize) -> String {
    if payload.is_empty() {
        return format!("{} {}: no matching items.", payload.mode, payload.date);
    }
    let mut out = String::new();
    for g in &payload.groups {
        let _ = writeln!(out, "【{}】 {} items", g.category, g.total);
        for (i, e) in g.entries.iter().take(max_titles).enumerate() {
            let marker = if e.is_new() { "🆕 " } else { "" };
            let _ = write!(out, "  {}. {}{} ({})", i + 1, marker, e.item.title, e.item.source_name);
            if e.weight > 1 {
                let _ = write!(out, " ×{}", e.weight);
            }
            out.push('\n');
        }
        if g.entries.len() > max_titles {
            let _ = writeln!(out, "  … {} more", g.entries.len() - max_titles);
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, n: &Notification) -> Result<()>;
    fn name(&self) -> &str;
}

/// Writes the notification to the log. Always part of the mux.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, n: &Notification) -> Result<()> {
        tracing::info!(target: "notify", subject = %n.subject, "\n{}", n.body);
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Fan-out over every configured channel.
pub struct NotifierMux {
    sinks: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new(sinks: Vec<Box<dyn Notifier>>) -> Self {
        Self { sinks }
    }

    /// Log sink plus Slack/Discord/email when their env vars are set.
    pub fn from_env() -> Self {
        let mut sinks: Vec<Box<dyn Notifier>> = vec![Box::new(LogNotifier)];
        if let Some(s) = SlackNotifier::from_env() {
            sinks.push(Box::new(s));
        }
        if let Some(d) = DiscordNotifier::from_env() {
            sinks.push(Box::new(d));
        }
        match EmailSender::from_env() {
            Ok(Some(e)) => sinks.push(Box::new(e)),
            Ok(None) => {}
            Err(e) => tracing::warn!(target: "notify", error = %e, "email disabled: bad SMTP config"),
        }
        tracing::info!(
            target: "notify",
            sinks = ?sinks.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "notifiers configured"
        );
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Send to all sinks; failures are logged, not propagated.
    /// Returns how many sinks accepted the message.
    pub async fn send_all(&self, n: &Notification) -> usize {
        let mut ok = 0;
        for s in &self.sinks {
            match s.send(n).await {
                Ok(()) => ok += 1,
                Err(e) => tracing::warn!(target: "notify", sink = s.name(), error = %e, "send failed"),
            }
        }
        ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppressed {
    NotFired,
    Empty,
    Cooldown,
}

impl Suppressed {
    pub fn as_str(self) -> &'static str {
        match self {
            Suppressed::NotFired => "not_fired",
            Suppressed::Empty => "empty",
            Suppressed::Cooldown => "cooldown",
        }
    }
}

/// Applies the push rules in front of a [`NotifierMux`].
pub struct Dispatcher {
    mux: NotifierMux,
    gate: AntiFlutter,
    notify_on_empty: bool,
    max_titles: Option<usize>,
}

impl Dispatcher {
    pub fn new(mux: NotifierMux, cfg: &NotifyConfig) -> Self {
        Self {
            mux,
            gate: AntiFlutter::new(cfg.cooldown_secs),
            notify_on_empty: cfg.notify_on_empty,
            max_titles: cfg.max_titles_per_category,
        }
    }

    /// Pure check, no state change.
    pub fn check(
        &self,
        fires: bool,
        payload: &ReportPayload,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), Suppressed> {
        if !fires {
            return Err(Suppressed::NotFired);
        }
        if payload.is_empty() && !self.notify_on_empty {
            return Err(Suppressed::Empty);
        }
        if !self.gate.may_push(now) {
            return Err(Suppressed::Cooldown);
        }
        Ok(())
    }

    /// Returns the number of sinks reached, or why nothing was sent.
    pub async fn dispatch(
        &mut self,
        fires: bool,
        payload: &ReportPayload,
        now: DateTime<Utc>,
    ) -> std::result::Result<usize, Suppressed> {
        if let Err(reason) = self.check(fires, payload, now) {
            counter!("radar_notifications_suppressed_total", "reason" => reason.as_str())
                .increment(1);
            tracing::debug!(target: "notify", reason = reason.as_str(), "push suppressed");
            return Err(reason);
        }
        let n = Notification::from_payload(payload, self.max_titles);
        let sent = self.mux.send_all(&n).await;
        if sent > 0 {
            self.gate.mark_pushed(now);
            counter!("radar_notifications_total").increment(sent as u64);
        }
        Ok(sent)
    }
}
