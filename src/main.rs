//! Quake Atlas service entrypoint.
//! Boots the Axum HTTP server, the provider adapters, and the background
//! refresh loop.

use std::time::Duration;

use anyhow::Context;
use quake_atlas::filters::local_offset;
use quake_atlas::ingest::providers::default_providers;
use quake_atlas::ingest::scheduler::{spawn_refresh_scheduler, RefreshSchedulerCfg};
use quake_atlas::metrics::Metrics;
use quake_atlas::{build_router, build_state, IngestConfig};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Human-readable logs by default, JSON lines with `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("quake_atlas=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // The host runtime may already own the global subscriber.
    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = IngestConfig::load_default().context("loading ingest config")?;
    tracing::info!(
        page_size = cfg.page_size,
        refresh_secs = cfg.refresh_interval_secs,
        metrics = cfg.metrics_enabled,
        "config loaded"
    );

    let providers = default_providers(&cfg).context("building provider adapters")?;
    let state = build_state(&cfg, providers);

    let metrics = if cfg.metrics_enabled {
        match Metrics::init() {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!(error = ?e, "metrics disabled");
                None
            }
        }
    } else {
        None
    };

    spawn_refresh_scheduler(
        state.aggregator.clone(),
        state.snapshots.clone(),
        RefreshSchedulerCfg {
            interval: Duration::from_secs(cfg.refresh_interval_secs),
            local_offset: local_offset(cfg.local_utc_offset_minutes),
        },
    );

    let router = build_router(state, metrics.as_ref());
    Ok(router.into())
}
