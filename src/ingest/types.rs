// src/ingest/types.rs
use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Upstream provider identifiers. Adding a provider means adding an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Kandilli,
    Afad,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Kandilli, Source::Afad];

    pub fn as_str(self) -> &'static str {
        match self {
            Source::Kandilli => "kandilli",
            Source::Afad => "afad",
        }
    }

    /// Case-insensitive lookup, used by query-string parsing.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|src| src.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a record's id came from.
///
/// `Synthetic` ids are minted at ingestion time, so the same physical event
/// fetched twice gets two different ids. Dedup does not rely on ids at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Identity {
    Native(String),
    Synthetic { timestamp_ms: i64, nonce: u64 },
}

impl Identity {
    pub fn synthetic_now() -> Self {
        Identity::Synthetic {
            timestamp_ms: Utc::now().timestamp_millis(),
            nonce: rand::random::<u64>(),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Identity::Native(_))
    }

    /// Provider-namespaced record id.
    pub fn record_id(&self, source: Source) -> String {
        match self {
            Identity::Native(v) => format!("{source}-{v}"),
            Identity::Synthetic {
                timestamp_ms,
                nonce,
            } => format!("{source}-syn-{timestamp_ms}-{nonce:016x}"),
        }
    }
}

/// Normalized, provider-agnostic seismic event. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: String,
    pub identity: Identity,
    /// Civil date `YYYY-MM-DD` (UTC).
    pub date: String,
    /// Time of day `HH:MM:SS` (UTC).
    pub time: String,
    /// Epoch milliseconds, whole seconds only.
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// Kilometers, never negative.
    pub depth: f64,
    pub magnitude: f64,
    pub location: String,
    pub source: Source,
}

impl CanonicalRecord {
    /// Build a record from an already-validated provider item.
    ///
    /// A missing source instant falls back to ingestion time. The instant is
    /// truncated to whole seconds so `date` + `time` reproduce `timestamp`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Source,
        identity: Identity,
        occurred_at: Option<DateTime<Utc>>,
        latitude: f64,
        longitude: f64,
        depth: Option<f64>,
        magnitude: f64,
        location: impl Into<String>,
    ) -> Self {
        let instant = occurred_at.unwrap_or_else(Utc::now);
        let secs = instant.timestamp();
        let instant = Utc.timestamp_opt(secs, 0).single().unwrap_or(instant);

        let depth = depth
            .filter(|d| d.is_finite())
            .map(|d| d.max(0.0))
            .unwrap_or(0.0);

        Self {
            id: identity.record_id(source),
            identity,
            date: instant.format("%Y-%m-%d").to_string(),
            time: instant.format("%H:%M:%S").to_string(),
            timestamp: secs * 1000,
            latitude,
            longitude,
            depth,
            magnitude,
            location: location.into(),
            source,
        }
    }

    /// Recompute the instant from the civil `date` + `time` fields.
    pub fn civil_instant(&self) -> Option<DateTime<Utc>> {
        let s = format!("{}T{}Z", self.date, self.time);
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn hour_of_day(&self) -> Option<u32> {
        self.time.split(':').next()?.parse().ok()
    }
}

/// Per-provider loading state for one aggregation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadingStatus {
    Pending,
    Loaded,
    Error,
}

pub type StatusMap = BTreeMap<Source, LoadingStatus>;

/// Requested date window. `end == None` means "from `start` onward".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// Parse `YYYY-MM-DD` strings as received from the query surface.
    pub fn parse(start: &str, end: Option<&str>) -> Result<Self> {
        let start = parse_civil_date(start)?;
        let end = match end.map(str::trim).filter(|s| !s.is_empty()) {
            Some(e) => Some(parse_civil_date(e)?),
            None => None,
        };
        Ok(Self { start, end })
    }

    pub fn start_param(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_param(&self) -> Option<String> {
        self.end.map(|d| d.format("%Y-%m-%d").to_string())
    }
}

fn parse_civil_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("invalid date '{s}' (expected YYYY-MM-DD): {e}"))
}

/// One paginated request against a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub window: DateWindow,
    pub limit: usize,
    pub skip: usize,
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    /// Fetch one page. `Err` means the whole page failed (transport or body
    /// parse); malformed individual items are dropped, never an error.
    async fn try_fetch_page(&self, req: &PageRequest) -> Result<Vec<CanonicalRecord>>;

    fn source(&self) -> Source;

    /// Same as `try_fetch_page`, but failures degrade to an empty page.
    async fn fetch_page(&self, req: &PageRequest) -> Vec<CanonicalRecord> {
        match self.try_fetch_page(req).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    target: "ingest",
                    error = ?e,
                    provider = %self.source(),
                    skip = req.skip,
                    "page fetch failed"
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_matches_civil_fields() {
        let at = Utc.with_ymd_and_hms(2023, 2, 6, 1, 17, 32).unwrap()
            + chrono::Duration::milliseconds(740);
        let r = CanonicalRecord::new(
            Source::Afad,
            Identity::Native("123".into()),
            Some(at),
            37.2,
            37.0,
            Some(8.6),
            7.7,
            "Pazarcik (Kahramanmaras)",
        );
        assert_eq!(r.date, "2023-02-06");
        assert_eq!(r.time, "01:17:32");
        assert_eq!(r.civil_instant().unwrap().timestamp_millis(), r.timestamp);
        assert_eq!(r.id, "afad-123");
    }

    #[test]
    fn missing_instant_falls_back_to_now_and_depth_coerces() {
        let before = Utc::now().timestamp_millis() - 1000;
        let r = CanonicalRecord::new(
            Source::Kandilli,
            Identity::synthetic_now(),
            None,
            38.0,
            30.0,
            Some(-3.0),
            2.1,
            "X",
        );
        assert!(r.timestamp >= before);
        assert_eq!(r.depth, 0.0);
        assert!(r.id.starts_with("kandilli-syn-"));
        assert!(!r.identity.is_native());
    }

    #[test]
    fn window_parsing_rejects_bad_dates() {
        assert!(DateWindow::parse("2024-01-05", None).is_ok());
        assert!(DateWindow::parse("2024-01-05", Some("")).unwrap().end.is_none());
        assert!(DateWindow::parse("05.01.2024", None).is_err());
        assert!(DateWindow::parse("2024-01-05", Some("2024-13-01")).is_err());
    }

    #[test]
    fn status_map_serializes_lowercase() {
        let mut m = StatusMap::new();
        m.insert(Source::Afad, LoadingStatus::Loaded);
        m.insert(Source::Kandilli, LoadingStatus::Error);
        let s = serde_json::to_string(&m).unwrap();
        assert_eq!(s, r#"{"kandilli":"error","afad":"loaded"}"#);
    }
}
