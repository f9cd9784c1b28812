// tests/metrics.rs
#![cfg(feature = "strict-metrics")]
mod common;

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use chrono::NaiveDate;
use common::{rec, spread, ScriptedProvider};
use quake_atlas::ingest::types::{DateWindow, Source, SourceProvider};
use quake_atlas::metrics::Metrics;
use quake_atlas::{build_router, build_state, IngestConfig};
use tower::ServiceExt as _;

#[tokio::test]
async fn metrics_exposed_after_a_cycle() {
    let metrics = Metrics::init().expect("recorder");

    let providers: Vec<Arc<dyn SourceProvider>> = vec![
        Arc::new(ScriptedProvider::always_failing(Source::Kandilli)),
        Arc::new(ScriptedProvider::pages(
            Source::Afad,
            vec![{
                let mut page = spread(Source::Afad, 3, 1_700_000_000_000);
                page.push(rec(Source::Afad, 10.0, 10.0, 5.0, 1_700_000_000_000));
                page
            }],
        )),
    ];
    let state = build_state(&IngestConfig::default(), providers);
    let window = DateWindow::new(NaiveDate::from_ymd_opt(2023, 11, 14).unwrap(), None);
    let out = state.aggregator.aggregate(window).await;
    assert_eq!(out.records.len(), 3);

    let req = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .expect("build GET /metrics");
    let resp = build_router(state, Some(&metrics))
        .oneshot(req)
        .await
        .expect("oneshot /metrics");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    let text = String::from_utf8(bytes.to_vec()).expect("utf8");

    assert!(text.contains("quake_pages_total"));
    assert!(text.contains("quake_provider_errors_total"));
    assert!(text.contains("quake_admission_rejected_total"));
    assert!(text.contains("quake_cycle_ms"));
    assert!(text.contains("quake_last_cycle_ts"));
}
