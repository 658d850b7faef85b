//! Calendar merge
//!
//! Up to two feeds are fetched, filtered to their own look-ahead window,
//! concatenated, sorted by start and capped at [`MAX_EVENTS`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use homeboard_sources::calendar::{parse_feed, CalendarFeed, FeedEntry};

use crate::config::{CalendarConfig, FeedConfig};
use crate::error::Result;

/// Entries broadcast per merge
pub const MAX_EVENTS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    Shared,
    Holiday,
}

/// An upcoming entry as sent to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub all_day: bool,
    pub summary: String,
    pub source: FeedSource,
    pub uid: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

impl CalendarEvent {
    fn from_entry(entry: FeedEntry, source: FeedSource) -> Self {
        Self {
            start: entry.start,
            end: entry.end,
            all_day: entry.all_day,
            summary: entry.summary.into_text(),
            source,
            uid: entry.uid,
            location: entry.location,
            description: entry.description,
        }
    }
}

/// Whole days from `now` until `start`, truncated toward zero.
///
/// An entry that began less than a day ago still counts as day 0.
pub fn days_until_start(start: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (start - now).num_days()
}

/// Keep entries with `0 <= days_until_start < window_days`.
pub fn select(
    entries: Vec<FeedEntry>,
    source: FeedSource,
    window_days: i64,
    now: DateTime<Utc>,
) -> Vec<CalendarEvent> {
    entries
        .into_iter()
        .filter(|entry| (0..window_days).contains(&days_until_start(entry.start, now)))
        .map(|entry| CalendarEvent::from_entry(entry, source))
        .collect()
}

/// Sort ascending by start (stable) and cap at [`MAX_EVENTS`].
pub fn sort_and_truncate(mut events: Vec<CalendarEvent>) -> Vec<CalendarEvent> {
    events.sort_by_key(|event| event.start);
    events.truncate(MAX_EVENTS);
    events
}

pub struct CalendarEngine {
    feed: Arc<dyn CalendarFeed>,
    config: CalendarConfig,
}

impl CalendarEngine {
    pub fn new(feed: Arc<dyn CalendarFeed>, config: CalendarConfig) -> Self {
        Self { feed, config }
    }

    pub fn enabled(&self) -> bool {
        configured(&self.config.shared).is_some() || configured(&self.config.holiday).is_some()
    }

    /// Fetch and merge every configured feed.
    ///
    /// `Ok(None)` when no feed is configured. Any feed failing fails the
    /// whole merge; there is no partial result.
    pub async fn merge(&self, now: DateTime<Utc>) -> Result<Option<Vec<CalendarEvent>>> {
        if !self.enabled() {
            return Ok(None);
        }

        let (shared, holiday) = tokio::try_join!(
            self.fetch(&self.config.shared, FeedSource::Shared, now),
            self.fetch(&self.config.holiday, FeedSource::Holiday, now),
        )?;

        let mut events = shared;
        events.extend(holiday);
        Ok(Some(sort_and_truncate(events)))
    }

    async fn fetch(
        &self,
        feed: &FeedConfig,
        source: FeedSource,
        now: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let Some(url) = configured(feed) else {
            return Ok(Vec::new());
        };
        let ics = self.feed.fetch(url).await?;
        let entries = parse_feed(&ics, &feed.kind)?;
        debug!(?source, entries = entries.len(), "calendar feed parsed");
        Ok(select(entries, source, feed.days, now))
    }
}

fn configured(feed: &FeedConfig) -> Option<&str> {
    feed.url.as_deref().filter(|url| !url.trim().is_empty())
}
