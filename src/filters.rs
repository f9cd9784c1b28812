//! User-side selection: date-range presets resolved into a fetch window, and
//! attribute filters applied to an aggregated record set before display.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::Deserialize;

use crate::ingest::types::{CanonicalRecord, DateWindow, Source};

/// What the user asked to see, before it is pinned to concrete dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateRange {
    #[default]
    Today,
    Yesterday,
    LastDays(u32),
    LastHours(u32),
    Custom {
        start: NaiveDate,
        end: Option<NaiveDate>,
    },
}

impl DateRange {
    /// Preset names as used by the map UI (`today`, `7days`, `6hours`, ...).
    pub fn parse_preset(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "today" => Some(DateRange::Today),
            "yesterday" => Some(DateRange::Yesterday),
            "3days" => Some(DateRange::LastDays(3)),
            "7days" => Some(DateRange::LastDays(7)),
            "14days" => Some(DateRange::LastDays(14)),
            "30days" => Some(DateRange::LastDays(30)),
            "1hour" => Some(DateRange::LastHours(1)),
            "6hours" => Some(DateRange::LastHours(6)),
            "24hours" => Some(DateRange::LastHours(24)),
            _ => None,
        }
    }

    /// Pin the range to dates as seen from `offset`. Presets always end today.
    ///
    /// Providers only take whole dates, so hour presets widen to the day the
    /// lookback starts on.
    pub fn resolve(&self, now: DateTime<Utc>, offset: FixedOffset) -> DateWindow {
        let local_now = now.with_timezone(&offset);
        let today = local_now.date_naive();
        let start = match *self {
            DateRange::Custom { start, end } => return DateWindow::new(start, end),
            DateRange::Today => today,
            DateRange::Yesterday => today - Duration::days(1),
            DateRange::LastDays(n) => today - Duration::days(i64::from(n)),
            DateRange::LastHours(n) => (local_now - Duration::hours(i64::from(n))).date_naive(),
        };
        DateWindow::new(start, Some(today))
    }
}

/// Offset in minutes east of UTC; out-of-range values fall back to UTC.
pub fn local_offset(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60))
        .unwrap_or_else(|| Utc.fix())
}

/// Optional attribute filters chosen by the user.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RecordFilter {
    pub min_magnitude: Option<f64>,
    pub max_magnitude: Option<f64>,
    pub min_depth: Option<f64>,
    pub max_depth: Option<f64>,
    /// Empty means every source.
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl RecordFilter {
    /// Comma-separated provider list; unknown names are ignored.
    pub fn parse_sources(s: &str) -> Vec<Source> {
        let mut out: Vec<Source> = s.split(',').filter_map(Source::parse).collect();
        out.sort();
        out.dedup();
        out
    }

    pub fn is_empty(&self) -> bool {
        self.min_magnitude.is_none()
            && self.max_magnitude.is_none()
            && self.min_depth.is_none()
            && self.max_depth.is_none()
            && self.sources.is_empty()
    }

    pub fn matches(&self, r: &CanonicalRecord) -> bool {
        self.min_magnitude.map_or(true, |m| r.magnitude >= m)
            && self.max_magnitude.map_or(true, |m| r.magnitude <= m)
            && self.min_depth.map_or(true, |d| r.depth >= d)
            && self.max_depth.map_or(true, |d| r.depth <= d)
            && (self.sources.is_empty() || self.sources.contains(&r.source))
    }

    pub fn apply<'a>(&self, records: &'a [CanonicalRecord]) -> Vec<&'a CanonicalRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}
