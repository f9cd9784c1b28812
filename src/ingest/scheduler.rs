// src/ingest/scheduler.rs
//! Publication gate for aggregation results plus the periodic refresh task.
//!
//! User-triggered and timer-triggered cycles may overlap. Each cycle owns its
//! accumulator; only the finished outcome is published, and only if it is
//! newer than what is already there and was started for the selection that
//! is still current.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{FixedOffset, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::filters::DateRange;
use crate::ingest::{AggregateOutcome, Aggregator};

#[derive(Debug, Default)]
struct Inner {
    latest: Option<Arc<AggregateOutcome>>,
    selection: Option<DateRange>,
    /// Bumped on every `select`.
    generation: u64,
}

/// Latest published outcome ("most recent request wins").
#[derive(Debug, Clone, Default)]
pub struct SnapshotStore {
    inner: Arc<RwLock<Inner>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish if `outcome.request_id` is newer than the current snapshot.
    /// Returns false when the outcome is stale and was dropped.
    pub fn publish(&self, outcome: Arc<AggregateOutcome>) -> bool {
        let mut g = self.inner.write().unwrap_or_else(|p| p.into_inner());
        Self::publish_locked(&mut g, outcome)
    }

    /// Like `publish`, but also drops the outcome when the selection has
    /// changed since `generation` was read. Both checks happen under one lock.
    pub fn publish_for(&self, outcome: Arc<AggregateOutcome>, generation: u64) -> bool {
        let mut g = self.inner.write().unwrap_or_else(|p| p.into_inner());
        if g.generation != generation {
            tracing::debug!(
                target: "ingest",
                request_id = outcome.request_id,
                generation,
                current = g.generation,
                "outcome for a superseded selection dropped"
            );
            return false;
        }
        Self::publish_locked(&mut g, outcome)
    }

    fn publish_locked(g: &mut Inner, outcome: Arc<AggregateOutcome>) -> bool {
        let newer = g
            .latest
            .as_ref()
            .map_or(true, |cur| outcome.request_id > cur.request_id);
        if newer {
            g.latest = Some(outcome);
        } else {
            tracing::debug!(
                target: "ingest",
                request_id = outcome.request_id,
                "stale outcome dropped"
            );
        }
        newer
    }

    pub fn latest(&self) -> Option<Arc<AggregateOutcome>> {
        self.inner
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .latest
            .clone()
    }

    /// Remember the range the user last asked for; refresh ticks reuse it.
    /// Returns the new selection generation.
    pub fn select(&self, range: DateRange) -> u64 {
        let mut g = self.inner.write().unwrap_or_else(|p| p.into_inner());
        g.selection = Some(range);
        g.generation += 1;
        g.generation
    }

    pub fn selection(&self) -> Option<DateRange> {
        self.current_selection().0
    }

    /// Selection and its generation, read together.
    pub fn current_selection(&self) -> (Option<DateRange>, u64) {
        let g = self.inner.read().unwrap_or_else(|p| p.into_inner());
        (g.selection, g.generation)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RefreshSchedulerCfg {
    pub interval: Duration,
    pub local_offset: FixedOffset,
}

/// Run one refresh: re-aggregate the current selection and publish.
pub async fn refresh_once(
    aggregator: &Aggregator,
    store: &SnapshotStore,
    offset: FixedOffset,
) -> bool {
    let (selection, generation) = store.current_selection();
    let range = selection.unwrap_or_default();
    let window = range.resolve(Utc::now(), offset);
    let outcome = aggregator
        .aggregate_with_progress(window, |status| {
            tracing::debug!(target: "ingest", ?status, "refresh progress");
        })
        .await;
    let kept = outcome.records.len();
    let request_id = outcome.request_id;
    let published = store.publish_for(Arc::new(outcome), generation);
    tracing::info!(
        target: "ingest",
        request_id,
        kept,
        published,
        ?range,
        "refresh tick"
    );
    published
}

/// Spawn the periodic refresh loop. The first tick fires immediately.
pub fn spawn_refresh_scheduler(
    aggregator: Arc<Aggregator>,
    store: SnapshotStore,
    cfg: RefreshSchedulerCfg,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            refresh_once(&aggregator, &store, cfg.local_offset).await;
        }
    })
}
