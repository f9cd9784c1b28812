// src/ingest/providers/archive.rs
//! Shared plumbing for the archive JSON endpoints both providers sit behind:
//! HTTP transport, fixture transport, and tolerant item parsing.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use metrics::{counter, histogram};
use serde_json::Value;
use time::{
    format_description::well_known::Rfc3339, macros::format_description, macros::offset,
    OffsetDateTime, PrimitiveDateTime,
};

use crate::ingest::types::{CanonicalRecord, Identity, PageRequest, Source};

pub const UNSPECIFIED_LOCATION: &str = "unspecified location";

/// Which timestamp field a provider trusts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstantPreference {
    CreatedAtFirst,
    DateTimeFirst,
}

pub(crate) enum Transport {
    /// Static body, paged locally by `skip`/`limit`.
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl Transport {
    pub(crate) fn http(url: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("quake-atlas/0.1")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .context("building provider http client")?;
        Ok(Transport::Http {
            url: url.to_string(),
            client,
        })
    }

    pub(crate) async fn fetch(
        &self,
        source: Source,
        prefer: InstantPreference,
        req: &PageRequest,
    ) -> Result<Vec<CanonicalRecord>> {
        match self {
            Transport::Fixture(body) => {
                let all = parse_page(body, source, prefer)?;
                Ok(all.into_iter().skip(req.skip).take(req.limit).collect())
            }
            Transport::Http { url, client } => {
                let mut params: Vec<(&str, String)> = vec![
                    ("date", req.window.start_param()),
                    ("limit", req.limit.to_string()),
                    ("skip", req.skip.to_string()),
                ];
                if let Some(end) = req.window.end_param() {
                    params.push(("date_end", end));
                }
                let body = client
                    .get(url)
                    .header("Accept", "application/json")
                    .query(&params)
                    .send()
                    .await
                    .with_context(|| format!("{source} http get()"))?
                    .error_for_status()
                    .with_context(|| format!("{source} http status"))?
                    .text()
                    .await
                    .with_context(|| format!("{source} http .text()"))?;
                parse_page(&body, source, prefer)
            }
        }
    }
}

/// Parse one archive page body.
///
/// A body that is not JSON is an error. A JSON body without a truthy
/// `status` and a `result` array is an empty page. Items missing
/// coordinates or magnitude are dropped.
pub fn parse_page(
    body: &str,
    source: Source,
    prefer: InstantPreference,
) -> Result<Vec<CanonicalRecord>> {
    let t0 = std::time::Instant::now();
    let root: Value =
        serde_json::from_str(body).with_context(|| format!("parsing {source} archive json"))?;

    let items: &[Value] = match (truthy(root.get("status")), root.get("result")) {
        (true, Some(Value::Array(items))) => items.as_slice(),
        _ => {
            tracing::debug!(
                target: "ingest",
                provider = %source,
                "page without status/result array"
            );
            &[]
        }
    };

    let mut out = Vec::with_capacity(items.len());
    let mut dropped = 0u64;
    for item in items {
        match parse_item(item, source, prefer) {
            Some(rec) => out.push(rec),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        counter!("quake_records_dropped_total", "provider" => source.as_str()).increment(dropped);
    }
    histogram!("quake_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    Ok(out)
}

fn parse_item(item: &Value, source: Source, prefer: InstantPreference) -> Option<CanonicalRecord> {
    let coords = item.get("geojson")?.get("coordinates")?.as_array()?;
    let longitude = number(coords.first()?)?;
    let latitude = number(coords.get(1)?)?;
    let magnitude = number(item.get("mag")?)?;

    let created_at = item.get("created_at").and_then(from_epoch_secs);
    let date_time = item
        .get("date_time")
        .and_then(Value::as_str)
        .and_then(parse_provider_datetime);
    let occurred_at = match prefer {
        InstantPreference::CreatedAtFirst => created_at.or(date_time),
        InstantPreference::DateTimeFirst => date_time.or(created_at),
    };

    let identity = native_id(item.get("earthquake_id"))
        .map(Identity::Native)
        .unwrap_or_else(Identity::synthetic_now);

    let location = item
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNSPECIFIED_LOCATION);

    Some(CanonicalRecord::new(
        source,
        identity,
        occurred_at,
        latitude,
        longitude,
        item.get("depth").and_then(number),
        magnitude,
        location,
    ))
}

fn truthy(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|x| x != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        _ => false,
    }
}

/// JSON number or numeric string; non-finite values rejected.
fn number(v: &Value) -> Option<f64> {
    let x = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    x.is_finite().then_some(x)
}

fn native_id(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// 9999-12-31T23:59:59Z; anything later cannot render as `YYYY-MM-DD`.
const MAX_EPOCH_SECS: i64 = 253_402_300_799;

/// Epoch seconds. Zero, negative and out-of-range values (e.g. epoch
/// milliseconds) count as absent so the next instant source is tried.
fn from_epoch_secs(v: &Value) -> Option<DateTime<Utc>> {
    let secs = number(v)?.trunc();
    if secs <= 0.0 || secs > MAX_EPOCH_SECS as f64 {
        return None;
    }
    Utc.timestamp_opt(secs as i64, 0).single()
}

/// `YYYY-MM-DD HH:MM:SS` in Türkiye time (UTC+03:00), or RFC 3339.
pub fn parse_provider_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    let local = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let odt = PrimitiveDateTime::parse(s, local)
        .map(|p| p.assume_offset(offset!(+3)))
        .or_else(|_| OffsetDateTime::parse(s, &Rfc3339))
        .ok()?;
    Utc.timestamp_opt(odt.unix_timestamp(), 0).single()
}
