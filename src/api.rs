// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::error::ApiError;
use crate::filters::{local_offset, DateRange, RecordFilter};
use crate::ingest::config::{BoundingBox, IngestConfig};
use crate::ingest::scheduler::SnapshotStore;
use crate::ingest::types::{CanonicalRecord, DateWindow, StatusMap};
use crate::ingest::{AggregateOutcome, Aggregator};
use crate::marker::{MarkerCache, MarkerStyle};
use crate::prefs::DisplayPreferences;
use crate::stats::{self, AreaStatistics};
use crate::viewport;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
    pub snapshots: SnapshotStore,
    pub markers: Arc<MarkerCache>,
    pub local_offset: FixedOffset,
}

impl AppState {
    pub fn new(aggregator: Arc<Aggregator>, cfg: &IngestConfig) -> Self {
        Self {
            aggregator,
            snapshots: SnapshotStore::new(),
            markers: Arc::new(MarkerCache::new()),
            local_offset: local_offset(cfg.local_utc_offset_minutes),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/earthquakes", get(earthquakes))
        .route("/api/earthquakes/visible", get(visible))
        .route("/api/stats", get(area_stats))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Attribute filters shared by the list endpoints. Values arrive as raw
/// strings so an empty or non-numeric bound means "no bound" instead of a
/// rejected request.
#[derive(Debug, Deserialize)]
struct FilterParams {
    min_magnitude: Option<String>,
    max_magnitude: Option<String>,
    min_depth: Option<String>,
    max_depth: Option<String>,
    sources: Option<String>,
}

impl FilterParams {
    fn to_filter(&self) -> RecordFilter {
        RecordFilter {
            min_magnitude: lenient_f64(self.min_magnitude.as_deref()),
            max_magnitude: lenient_f64(self.max_magnitude.as_deref()),
            min_depth: lenient_f64(self.min_depth.as_deref()),
            max_depth: lenient_f64(self.max_depth.as_deref()),
            sources: self
                .sources
                .as_deref()
                .map(RecordFilter::parse_sources)
                .unwrap_or_default(),
        }
    }
}

fn lenient_f64(v: Option<&str>) -> Option<f64> {
    v.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|x| x.is_finite())
}

fn required_f64(name: &str, v: Option<&str>) -> Result<f64, ApiError> {
    let raw = v
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{name} parameter is required")))?;
    raw.parse::<f64>()
        .ok()
        .filter(|x| x.is_finite())
        .ok_or_else(|| {
            ApiError::BadRequest(format!("{name} must be a finite number, got '{raw}'"))
        })
}

#[derive(Debug, Deserialize)]
struct EarthquakesQuery {
    date: Option<String>,
    date_end: Option<String>,
    range: Option<String>,
    #[serde(flatten)]
    filter: FilterParams,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EarthquakesResp<'a> {
    earthquakes: Vec<&'a CanonicalRecord>,
    status: &'a StatusMap,
    last_update: DateTime<Utc>,
    count: usize,
    request_id: u64,
    window: DateWindow,
}

/// `date` (+ optional `date_end`) takes precedence over a `range` preset.
fn requested_range(q: &EarthquakesQuery) -> Result<DateRange, ApiError> {
    if let Some(date) = q.date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let w = DateWindow::parse(date, q.date_end.as_deref())
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        return Ok(DateRange::Custom {
            start: w.start,
            end: w.end,
        });
    }
    match q.range.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(name) => DateRange::parse_preset(name)
            .ok_or_else(|| ApiError::BadRequest(format!("unknown range preset '{name}'"))),
        None => Err(ApiError::BadRequest("Date parameter is required".to_string())),
    }
}

async fn earthquakes(
    State(state): State<AppState>,
    Query(q): Query<EarthquakesQuery>,
) -> Result<Response, ApiError> {
    let range = requested_range(&q)?;
    let window = range.resolve(Utc::now(), state.local_offset);
    let generation = state.snapshots.select(range);

    let outcome = Arc::new(state.aggregator.aggregate(window).await);
    let published = state
        .snapshots
        .publish_for(Arc::clone(&outcome), generation);
    tracing::info!(
        target: "api",
        request_id = outcome.request_id,
        ?range,
        kept = outcome.records.len(),
        published,
        "earthquakes served"
    );

    let filter = q.filter.to_filter();
    let earthquakes = filter.apply(&outcome.records);
    let body = EarthquakesResp {
        count: earthquakes.len(),
        earthquakes,
        status: &outcome.status,
        last_update: outcome.fetched_at,
        request_id: outcome.request_id,
        window: outcome.window,
    };
    Ok(Json(body).into_response())
}

#[derive(Debug, Deserialize)]
struct ViewportQuery {
    zoom: Option<String>,
    south: Option<String>,
    west: Option<String>,
    north: Option<String>,
    east: Option<String>,
    marker_scale: Option<String>,
    /// Opaque display-preferences blob; its multiplier applies when
    /// `marker_scale` is absent.
    prefs: Option<String>,
    #[serde(flatten)]
    filter: FilterParams,
}

impl ViewportQuery {
    fn bounds(&self) -> Result<BoundingBox, ApiError> {
        Ok(BoundingBox::new(
            required_f64("south", self.south.as_deref())?,
            required_f64("west", self.west.as_deref())?,
            required_f64("north", self.north.as_deref())?,
            required_f64("east", self.east.as_deref())?,
        ))
    }

    fn multiplier(&self) -> f64 {
        lenient_f64(self.marker_scale.as_deref()).unwrap_or_else(|| {
            DisplayPreferences::from_blob(self.prefs.as_deref()).marker_size_multiplier
        })
    }
}

#[derive(Serialize)]
struct VisibleMarker<'a> {
    #[serde(flatten)]
    record: &'a CanonicalRecord,
    marker: MarkerStyle,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VisibleResp<'a> {
    earthquakes: Vec<VisibleMarker<'a>>,
    count: usize,
    total: usize,
    candidates: usize,
    in_viewport: usize,
    backfilled: usize,
    ceiling: usize,
    request_id: Option<u64>,
}

async fn visible(
    State(state): State<AppState>,
    Query(q): Query<ViewportQuery>,
) -> Result<Response, ApiError> {
    let zoom = required_f64("zoom", q.zoom.as_deref())?;
    let bounds = q.bounds()?;
    let multiplier = q.multiplier();

    let snapshot: Option<Arc<AggregateOutcome>> = state.snapshots.latest();
    let records: &[CanonicalRecord] = snapshot
        .as_deref()
        .map(|s| s.records.as_slice())
        .unwrap_or_default();
    let filter = q.filter.to_filter();
    let filtered = filter.apply(records);
    let total = filtered.len();

    let plan = viewport::plan_display(filtered, zoom, &bounds);
    let earthquakes: Vec<VisibleMarker<'_>> = plan
        .visible
        .iter()
        .map(|&r| {
            let style = state.markers.get(r.magnitude, zoom, multiplier);
            VisibleMarker {
                record: r,
                marker: MarkerStyle::clone(&style),
            }
        })
        .collect();

    let body = VisibleResp {
        count: earthquakes.len(),
        earthquakes,
        total,
        candidates: plan.candidates,
        in_viewport: plan.in_viewport,
        backfilled: plan.backfilled,
        ceiling: plan.ceiling,
        request_id: snapshot.as_ref().map(|s| s.request_id),
    };
    Ok(Json(body).into_response())
}

#[derive(Debug, Deserialize)]
struct AreaQuery {
    south: Option<String>,
    west: Option<String>,
    north: Option<String>,
    east: Option<String>,
}

async fn area_stats(
    State(state): State<AppState>,
    Query(q): Query<AreaQuery>,
) -> Result<Json<AreaStatistics>, ApiError> {
    let area = BoundingBox::new(
        required_f64("south", q.south.as_deref())?,
        required_f64("west", q.west.as_deref())?,
        required_f64("north", q.north.as_deref())?,
        required_f64("east", q.east.as_deref())?,
    );
    let summary = match state.snapshots.latest() {
        Some(s) => stats::for_area(&s.records, &area),
        None => AreaStatistics::empty(),
    };
    Ok(Json(summary))
}
