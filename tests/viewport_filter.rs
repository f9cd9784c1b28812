// tests/viewport_filter.rs
use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use quake_atlas::ingest::config::BoundingBox;
use quake_atlas::ingest::types::{CanonicalRecord, Identity, Source};
use quake_atlas::viewport::{filter_for_display, magnitude_floor, plan_display, select_candidates};

const VIEW: BoundingBox = BoundingBox::new(38.0, 30.0, 39.0, 31.0);

fn quake(i: usize, lat: f64, lon: f64, mag: f64) -> CanonicalRecord {
    CanonicalRecord::new(
        Source::Afad,
        Identity::Native(i.to_string()),
        Utc.timestamp_opt(1_700_000_000 - i as i64 * 60, 0).single(),
        lat,
        lon,
        Some(7.0),
        mag,
        format!("event {i}"),
    )
}

/// `inside` records within `VIEW`, then `outside` records east of it.
fn scene(inside: usize, outside: usize, mag: impl Fn(usize) -> f64) -> Vec<CanonicalRecord> {
    let mut out = Vec::with_capacity(inside + outside);
    for i in 0..inside {
        out.push(quake(i, 38.0 + (i % 10) as f64 * 0.1, 30.0 + (i / 10) as f64 * 0.02, mag(i)));
    }
    for j in 0..outside {
        let i = inside + j;
        out.push(quake(i, 37.0 + (j % 10) as f64 * 0.1, 33.0 + (j / 10) as f64 * 0.1, mag(i)));
    }
    out
}

fn ids(v: &[&CanonicalRecord]) -> Vec<String> {
    v.iter().map(|r| r.id.clone()).collect()
}

#[test]
fn backfill_fills_up_to_the_ceiling_at_zoom_six() {
    let records = scene(150, 250, |_| 3.5);
    let plan = plan_display(&records, 6.0, &VIEW);
    assert_eq!(plan.ceiling, 400);
    assert_eq!(plan.candidates, 400);
    assert_eq!(plan.in_viewport, 150);
    assert_eq!(plan.backfilled, 250);
    assert_eq!(plan.visible.len(), 400);

    let unique: HashSet<&str> = plan.visible.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(unique.len(), 400);
    let on_screen = plan
        .visible
        .iter()
        .filter(|r| VIEW.contains(r.latitude, r.longitude))
        .count();
    assert_eq!(on_screen, 150);
}

#[test]
fn backfill_prefers_the_strongest_off_screen_candidates() {
    // 150 on screen at M3.5; 600 off screen with magnitudes rising by index.
    let records = scene(150, 600, |i| if i < 150 { 3.5 } else { 3.0 + (i - 150) as f64 * 0.01 });
    let plan = plan_display(&records, 6.0, &VIEW);
    assert_eq!(plan.visible.len(), 400);
    assert_eq!(plan.backfilled, 250);
    let weakest_backfill = plan
        .visible
        .iter()
        .filter(|r| !VIEW.contains(r.latitude, r.longitude))
        .map(|r| r.magnitude)
        .fold(f64::INFINITY, f64::min);
    let strongest_left_out = records
        .iter()
        .filter(|r| !VIEW.contains(r.latitude, r.longitude))
        .filter(|r| !plan.visible.iter().any(|v| v.id == r.id))
        .map(|r| r.magnitude)
        .fold(f64::NEG_INFINITY, f64::max);
    assert!(weakest_backfill >= strongest_left_out);
}

#[test]
fn no_backfill_below_zoom_six() {
    let records = scene(150, 250, |_| 4.5);
    let plan = plan_display(&records, 5.5, &VIEW);
    assert_eq!(plan.backfilled, 0);
    assert_eq!(plan.visible.len(), 150);
    assert!(plan
        .visible
        .iter()
        .all(|r| VIEW.contains(r.latitude, r.longitude)));
}

#[test]
fn in_viewport_admission_stops_at_the_ceiling() {
    let records = scene(500, 0, |i| 3.0 + (i % 40) as f64 * 0.05);
    let visible = filter_for_display(&records, 6.5, &VIEW);
    assert_eq!(visible.len(), 400);
    let min_kept = visible.iter().map(|r| r.magnitude).fold(f64::INFINITY, f64::min);
    let max_dropped = records
        .iter()
        .filter(|r| !visible.iter().any(|v| v.id == r.id))
        .map(|r| r.magnitude)
        .fold(f64::NEG_INFINITY, f64::max);
    assert!(min_kept >= max_dropped);
}

#[test]
fn floor_and_cap_apply_before_viewport() {
    let mut records = scene(300, 0, |_| 4.2);
    records.push(quake(9_999, 38.5, 30.5, 3.9));
    let candidates = select_candidates(&records, 4.0);
    assert_eq!(candidates.len(), 200);
    assert!(candidates.iter().all(|r| r.magnitude >= 4.0));
}

#[test]
fn candidates_are_strongest_first_and_stable_on_ties() {
    let records = vec![
        quake(0, 38.1, 30.1, 4.0),
        quake(1, 38.2, 30.2, 5.0),
        quake(2, 38.3, 30.3, 4.0),
    ];
    let c = select_candidates(&records, 9.0);
    assert_eq!(ids(&c), vec!["afad-1", "afad-0", "afad-2"]);
}

#[test]
fn filtering_is_idempotent() {
    let records = scene(180, 400, |i| 2.0 + (i % 50) as f64 * 0.1);
    for zoom in [3.0, 5.0, 6.0, 7.2, 9.0] {
        let a = ids(&filter_for_display(&records, zoom, &VIEW));
        let b = ids(&filter_for_display(&records, zoom, &VIEW));
        assert_eq!(a, b, "zoom {zoom}");
    }
}

#[test]
fn magnitude_floor_is_monotonic() {
    let zooms: Vec<f64> = (0..=40).map(|z| f64::from(z) * 0.5).collect();
    for pair in zooms.windows(2) {
        let coarse = magnitude_floor(pair[0]).unwrap_or(f64::NEG_INFINITY);
        let fine = magnitude_floor(pair[1]).unwrap_or(f64::NEG_INFINITY);
        assert!(coarse >= fine, "floor({}) < floor({})", pair[0], pair[1]);
    }
}

#[test]
fn input_is_left_untouched() {
    let records = scene(50, 50, |i| 2.0 + (i % 30) as f64 * 0.2);
    let before = records.clone();
    let _ = plan_display(&records, 7.0, &VIEW);
    assert_eq!(records, before);
}

#[test]
fn degenerate_bounds_admit_nothing_on_screen() {
    let records = scene(20, 20, |_| 4.5);
    let inverted = BoundingBox::new(39.0, 31.0, 38.0, 30.0);
    let plan = plan_display(&records, 5.0, &inverted);
    assert_eq!(plan.in_viewport, 0);
    assert!(plan.visible.is_empty());

    let plan = plan_display(&records, f64::NAN, &VIEW);
    assert_eq!(plan.ceiling, 200);
    assert_eq!(plan.visible.len(), 20);
}

#[test]
fn empty_input_is_empty_output() {
    let plan = plan_display(std::iter::empty(), 8.0, &VIEW);
    assert!(plan.visible.is_empty());
    assert_eq!(plan.candidates, 0);
}
