// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod error;
pub mod filters;
pub mod ingest;
pub mod marker;
pub mod metrics;
pub mod prefs;
pub mod stats;
pub mod viewport;

use std::sync::Arc;

use axum::Router;

pub use crate::api::{create_router, AppState};
pub use crate::ingest::config::IngestConfig;
pub use crate::ingest::{AggregateOutcome, AggregateSettings, Aggregator};

use crate::ingest::types::SourceProvider;

/// Wire providers into an aggregator and shared HTTP state.
pub fn build_state(cfg: &IngestConfig, providers: Vec<Arc<dyn SourceProvider>>) -> AppState {
    let aggregator = Arc::new(Aggregator::new(providers, AggregateSettings::from(cfg)));
    AppState::new(aggregator, cfg)
}

/// Full application router; `/metrics` is mounted only when a recorder is
/// supplied.
pub fn build_router(state: AppState, metrics: Option<&crate::metrics::Metrics>) -> Router {
    let router = create_router(state);
    match metrics {
        Some(m) => router.merge(m.router()),
        None => router,
    }
}
