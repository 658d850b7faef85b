//! iCalendar feeds
//!
//! Feeds are fetched as text and parsed with the `ical` crate. Only the
//! fields the dashboard shows are kept. Start times are normalized to UTC:
//!
//! | `DTSTART` form                         | interpretation            |
//! |----------------------------------------|---------------------------|
//! | `20240105T100000Z`                     | UTC                       |
//! | `TZID=Europe/Oslo:20240105T100000`     | local time in that zone   |
//! | `20240105T100000` (floating)           | UTC                       |
//! | `VALUE=DATE:20240105`                  | all day, midnight UTC     |

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use ical::parser::ical::component::IcalCalendar;
use ical::property::Property;
use std::io::BufReader;
use tracing::debug;

use crate::error::{Result, SourceError};
use crate::http::{self, check_status};

pub const DEFAULT_COMPONENT: &str = "VEVENT";

/// Fetches raw ICS text
#[async_trait]
pub trait CalendarFeed: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub struct HttpCalendarFeed {
    http: reqwest::Client,
}

impl HttpCalendarFeed {
    pub fn new() -> Self {
        Self { http: http::client() }
    }
}

impl Default for HttpCalendarFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CalendarFeed for HttpCalendarFeed {
    async fn fetch(&self, url: &str) -> Result<String> {
        // Subscribed calendars are frequently shared as webcal:// links
        let url = match url.strip_prefix("webcal://") {
            Some(rest) => format!("https://{rest}"),
            None => url.to_string(),
        };
        let response = self.http.get(&url).send().await?;
        Ok(check_status("calendar", response)?.text().await?)
    }
}

/// A summary as it appears in the feed.
///
/// Summaries carrying parameters (`SUMMARY;LANGUAGE=no:Julaften`) are kept
/// apart from plain ones until the caller decides how to present them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    Plain(String),
    WithParams {
        val: String,
        params: Vec<(String, Vec<String>)>,
    },
}

impl Summary {
    pub fn into_text(self) -> String {
        match self {
            Summary::Plain(text) => text,
            Summary::WithParams { val, .. } => val,
        }
    }
}

/// One calendar component, start normalized to UTC
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub uid: Option<String>,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub all_day: bool,
    pub summary: Summary,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// Parse an ICS document, keeping components of type `component`
/// (`VEVENT` or `VTODO`). Components without a usable `DTSTART` are skipped.
pub fn parse_feed(ics: &str, component: &str) -> Result<Vec<FeedEntry>> {
    let parser = ical::IcalParser::new(BufReader::new(ics.as_bytes()));

    let mut entries = Vec::new();
    let mut calendars = 0;
    for calendar in parser {
        let calendar: IcalCalendar =
            calendar.map_err(|e| SourceError::Parse(format!("invalid calendar: {e}")))?;
        calendars += 1;

        let components: Vec<&[Property]> = match component.to_ascii_uppercase().as_str() {
            "VEVENT" => calendar.events.iter().map(|e| e.properties.as_slice()).collect(),
            "VTODO" => calendar.todos.iter().map(|t| t.properties.as_slice()).collect(),
            other => {
                debug!(component = other, "unsupported calendar component type");
                Vec::new()
            }
        };
        entries.extend(components.into_iter().filter_map(entry_from_properties));
    }

    if calendars == 0 {
        return Err(SourceError::Parse("no VCALENDAR in feed".to_string()));
    }
    Ok(entries)
}

fn entry_from_properties(properties: &[Property]) -> Option<FeedEntry> {
    let find = |name: &str| properties.iter().find(|p| p.name.eq_ignore_ascii_case(name));
    let text = |name: &str| find(name).and_then(|p| p.value.as_deref()).map(unescape);

    let dtstart = find("DTSTART")?;
    let (start, all_day) = match parse_date_time(dtstart) {
        Some(parsed) => parsed,
        None => {
            debug!(value = ?dtstart.value, "skipping component with unparseable DTSTART");
            return None;
        }
    };
    let end = find("DTEND").and_then(parse_date_time).map(|(end, _)| end);

    let summary = match find("SUMMARY") {
        Some(property) => {
            let val = property.value.as_deref().map(unescape).unwrap_or_default();
            match &property.params {
                Some(params) if !params.is_empty() => Summary::WithParams {
                    val,
                    params: params.clone(),
                },
                _ => Summary::Plain(val),
            }
        }
        None => Summary::Plain(String::new()),
    };

    Some(FeedEntry {
        uid: text("UID"),
        start,
        end,
        all_day,
        summary,
        location: text("LOCATION"),
        description: text("DESCRIPTION"),
    })
}

fn param<'a>(property: &'a Property, name: &str) -> Option<&'a str> {
    property
        .params
        .as_ref()?
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

/// `(start, all_day)` from a DTSTART/DTEND property
fn parse_date_time(property: &Property) -> Option<(DateTime<Utc>, bool)> {
    let value = property.value.as_deref()?.trim();

    let is_date = param(property, "VALUE").is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
        || (value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()));
    if is_date {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").ok()?;
        return Some((Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?), true));
    }

    if let Some(utc) = value.strip_suffix('Z') {
        let naive = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").ok()?;
        return Some((Utc.from_utc_datetime(&naive), false));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?;
    match param(property, "TZID") {
        Some(tzid) => {
            let tz: Tz = tzid.trim_matches('"').parse().ok()?;
            // Nonexistent local times (spring-forward gap) resolve to the earliest valid instant
            let local = tz
                .from_local_datetime(&naive)
                .earliest()
                .or_else(|| tz.from_local_datetime(&(naive + chrono::Duration::hours(1))).earliest())?;
            Some((local.with_timezone(&Utc), false))
        }
        None => Some((Utc.from_utc_datetime(&naive), false)),
    }
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
