// src/ingest/mod.rs
pub mod config;
pub mod paginator;
pub mod providers;
pub mod scheduler;
pub mod types;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tokio::task::JoinSet;

use crate::ingest::config::{BoundingBox, DedupGranularity, IngestConfig};
use crate::ingest::paginator::{fetch_all_pages, Paginated};
use crate::ingest::types::{
    CanonicalRecord, DateWindow, LoadingStatus, SourceProvider, StatusMap,
};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("quake_pages_total", "Page requests issued per provider.");
        describe_counter!(
            "quake_provider_errors_total",
            "Page requests that failed (transport or body parse)."
        );
        describe_counter!(
            "quake_records_dropped_total",
            "Provider items dropped for missing coordinates or magnitude."
        );
        describe_counter!(
            "quake_admission_rejected_total",
            "Records outside the region of interest."
        );
        describe_counter!(
            "quake_dedup_merged_total",
            "Records collapsed into a stronger detection of the same event."
        );
        describe_histogram!("quake_parse_ms", "Provider page parse time in milliseconds.");
        describe_histogram!("quake_cycle_ms", "Aggregation cycle wall time in milliseconds.");
        describe_gauge!("quake_last_cycle_ts", "Unix ts when the last cycle finished.");
    });
}

/// Spatial-temporal identity of a physical event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub lat_cell: i64,
    pub lon_cell: i64,
    pub time_bucket: i64,
}

/// Half-up rounding, so negative coordinates bucket the same way positive
/// ones do at the .5 boundary.
fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

pub fn dedup_key(r: &CanonicalRecord, g: &DedupGranularity) -> DedupKey {
    DedupKey {
        lat_cell: round_half_up(r.latitude * g.coord_scale),
        lon_cell: round_half_up(r.longitude * g.coord_scale),
        time_bucket: round_half_up(r.timestamp as f64 / g.time_bucket_ms as f64),
    }
}

/// Keep records inside `region`. Returns (kept, rejected_count).
pub fn admit(
    records: Vec<CanonicalRecord>,
    region: &BoundingBox,
) -> (Vec<CanonicalRecord>, usize) {
    let before = records.len();
    let kept: Vec<_> = records
        .into_iter()
        .filter(|r| region.contains(r.latitude, r.longitude))
        .collect();
    let rejected = before - kept.len();
    (kept, rejected)
}

/// Collapse records sharing a dedup key, keeping the strictly stronger one.
///
/// On a magnitude tie the first-seen record wins. Output order follows the
/// first appearance of each key. Two distinct small events in the same cell
/// and minute are merged too; that false-merge rate is accepted.
pub fn dedupe(
    records: Vec<CanonicalRecord>,
    g: &DedupGranularity,
) -> (Vec<CanonicalRecord>, usize) {
    let total = records.len();
    let mut slots: HashMap<DedupKey, usize> = HashMap::with_capacity(total);
    let mut out: Vec<CanonicalRecord> = Vec::with_capacity(total);

    for r in records {
        let key = dedup_key(&r, g);
        match slots.get(&key) {
            Some(&i) => {
                if out[i].magnitude < r.magnitude {
                    out[i] = r;
                }
            }
            None => {
                slots.insert(key, out.len());
                out.push(r);
            }
        }
    }

    let merged = total - out.len();
    (out, merged)
}

/// Most recent first; stable for equal timestamps.
pub fn sort_recent_first(records: &mut [CanonicalRecord]) {
    records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateSettings {
    pub page_size: usize,
    pub max_pages: usize,
    pub region: BoundingBox,
    pub dedup: DedupGranularity,
}

impl From<&IngestConfig> for AggregateSettings {
    fn from(cfg: &IngestConfig) -> Self {
        Self {
            page_size: cfg.page_size,
            max_pages: cfg.max_pages,
            region: cfg.region,
            dedup: cfg.dedup,
        }
    }
}

impl Default for AggregateSettings {
    fn default() -> Self {
        AggregateSettings::from(&IngestConfig::default())
    }
}

/// Output of one aggregation cycle. Always well-formed, possibly empty.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateOutcome {
    pub request_id: u64,
    pub window: DateWindow,
    pub records: Vec<CanonicalRecord>,
    pub status: StatusMap,
    pub fetched_at: DateTime<Utc>,
}

/// Fans out to every provider, then admits, dedupes and sorts.
pub struct Aggregator {
    providers: Vec<Arc<dyn SourceProvider>>,
    settings: AggregateSettings,
    next_request_id: AtomicU64,
}

impl Aggregator {
    pub fn new(providers: Vec<Arc<dyn SourceProvider>>, settings: AggregateSettings) -> Self {
        ensure_metrics_described();
        Self {
            providers,
            settings,
            next_request_id: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &AggregateSettings {
        &self.settings
    }

    pub async fn aggregate(&self, window: DateWindow) -> AggregateOutcome {
        self.aggregate_with_progress(window, |_| {}).await
    }

    /// Run one cycle. `on_progress` sees the status map each time a
    /// provider settles.
    pub async fn aggregate_with_progress<F>(
        &self,
        window: DateWindow,
        on_progress: F,
    ) -> AggregateOutcome
    where
        F: Fn(&StatusMap),
    {
        let t0 = std::time::Instant::now();
        let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst) + 1;

        let mut status: StatusMap = self
            .providers
            .iter()
            .map(|p| (p.source(), LoadingStatus::Pending))
            .collect();
        on_progress(&status);

        let mut set = JoinSet::new();
        for (idx, provider) in self.providers.iter().enumerate() {
            let provider = Arc::clone(provider);
            let AggregateSettings {
                page_size,
                max_pages,
                ..
            } = self.settings;
            set.spawn(async move {
                let out = fetch_all_pages(provider.as_ref(), window, page_size, max_pages).await;
                (idx, out)
            });
        }

        let mut per_provider: Vec<Option<Paginated>> =
            (0..self.providers.len()).map(|_| None).collect();
        let mut cycle_failed = false;

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, out)) => {
                    let st = if out.failed_outright() {
                        LoadingStatus::Error
                    } else {
                        LoadingStatus::Loaded
                    };
                    status.insert(self.providers[idx].source(), st);
                    on_progress(&status);
                    per_provider[idx] = Some(out);
                }
                Err(e) => {
                    tracing::error!(
                        target: "ingest",
                        error = ?e,
                        request_id,
                        "provider task aborted, dropping cycle"
                    );
                    cycle_failed = true;
                    set.abort_all();
                    break;
                }
            }
        }

        let records = if cycle_failed {
            for st in status.values_mut() {
                if *st == LoadingStatus::Pending {
                    *st = LoadingStatus::Error;
                }
            }
            on_progress(&status);
            Vec::new()
        } else {
            // Provider order, not completion order, so tie-breaking is stable.
            let merged: Vec<CanonicalRecord> = per_provider
                .into_iter()
                .flatten()
                .flat_map(|p| p.records)
                .collect();
            self.reduce(request_id, merged)
        };

        let fetched_at = Utc::now();
        histogram!("quake_cycle_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        gauge!("quake_last_cycle_ts").set(fetched_at.timestamp() as f64);

        AggregateOutcome {
            request_id,
            window,
            records,
            status,
            fetched_at,
        }
    }

    fn reduce(&self, request_id: u64, merged: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
        let fetched = merged.len();
        let (admitted, rejected) = admit(merged, &self.settings.region);
        let (mut unique, collapsed) = dedupe(admitted, &self.settings.dedup);
        sort_recent_first(&mut unique);

        counter!("quake_admission_rejected_total").increment(rejected as u64);
        counter!("quake_dedup_merged_total").increment(collapsed as u64);
        tracing::info!(
            target: "ingest",
            request_id,
            fetched,
            rejected,
            collapsed,
            kept = unique.len(),
            "aggregation cycle finished"
        );
        unique
    }
}
