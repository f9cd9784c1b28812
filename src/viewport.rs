//! # Viewport Density Filter
//! Picks the subset of records the map should actually draw for a given zoom
//! level and visible rectangle.
//!
//! Three reductions, in order:
//! 1. a magnitude floor that rises as the map zooms out,
//! 2. a global cap on candidates, strongest first,
//! 3. viewport admission up to a render ceiling, backfilled with off-screen
//!    candidates at zoom ≥ 6 so marker counts stay stable while panning.
//!
//! Pure and synchronous: no I/O, no shared state, inputs are never mutated.
//! Out-of-range zoom (including NaN) behaves like the coarsest level;
//! degenerate bounds simply admit nothing on screen.

use serde::Serialize;

use crate::ingest::config::BoundingBox;
use crate::ingest::types::CanonicalRecord;

/// Backfill only kicks in at or above this zoom.
pub const BACKFILL_MIN_ZOOM: f64 = 6.0;

/// Smallest magnitude shown at `zoom`; `None` means everything is shown.
///
/// Monotonic: a coarser zoom never has a lower floor.
pub fn magnitude_floor(zoom: f64) -> Option<f64> {
    if zoom >= 8.0 {
        None
    } else if zoom >= 7.0 {
        Some(2.5)
    } else if zoom >= 6.0 {
        Some(3.0)
    } else if zoom >= 5.0 {
        Some(3.5)
    } else {
        Some(4.0)
    }
}

/// Ceiling on the candidate set after the magnitude floor.
pub fn candidate_cap(zoom: f64) -> usize {
    if zoom >= 7.0 {
        2000
    } else if zoom >= 6.0 {
        1000
    } else if zoom >= 5.0 {
        500
    } else {
        200
    }
}

/// Maximum number of markers handed to the renderer.
pub fn render_ceiling(zoom: f64) -> usize {
    if zoom >= 8.0 {
        1500
    } else if zoom >= 7.0 {
        800
    } else if zoom >= 6.0 {
        400
    } else {
        200
    }
}

/// Stages 1 and 2: floor by zoom, then strongest-first up to the cap.
/// Equal magnitudes keep their input order.
pub fn select_candidates<'a, I>(records: I, zoom: f64) -> Vec<&'a CanonicalRecord>
where
    I: IntoIterator<Item = &'a CanonicalRecord>,
{
    let floor = magnitude_floor(zoom);
    let mut candidates: Vec<&CanonicalRecord> = records
        .into_iter()
        .filter(|r| floor.map_or(true, |f| r.magnitude >= f))
        .collect();
    candidates.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));
    candidates.truncate(candidate_cap(zoom));
    candidates
}

/// Result of one display pass, with counters for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct DisplaySelection<'a> {
    /// Records to draw, in candidate order (strongest first).
    pub visible: Vec<&'a CanonicalRecord>,
    pub candidates: usize,
    pub in_viewport: usize,
    pub backfilled: usize,
    pub ceiling: usize,
}

/// Full three-stage pass.
pub fn plan_display<'a, I>(records: I, zoom: f64, bounds: &BoundingBox) -> DisplaySelection<'a>
where
    I: IntoIterator<Item = &'a CanonicalRecord>,
{
    let candidates = select_candidates(records, zoom);
    let ceiling = render_ceiling(zoom);

    let mut chosen = vec![false; candidates.len()];
    let mut in_viewport = 0usize;
    for (i, r) in candidates.iter().enumerate() {
        if in_viewport >= ceiling {
            break;
        }
        if bounds.contains(r.latitude, r.longitude) {
            chosen[i] = true;
            in_viewport += 1;
        }
    }

    let mut backfilled = 0usize;
    if in_viewport < ceiling && zoom >= BACKFILL_MIN_ZOOM {
        for slot in chosen.iter_mut() {
            if in_viewport + backfilled >= ceiling {
                break;
            }
            if !*slot {
                *slot = true;
                backfilled += 1;
            }
        }
    }

    let total = candidates.len();
    let visible = candidates
        .into_iter()
        .zip(chosen)
        .filter_map(|(r, keep)| keep.then_some(r))
        .collect();

    tracing::trace!(
        target: "viewport",
        zoom,
        candidates = total,
        in_viewport,
        backfilled,
        "display pass"
    );

    DisplaySelection {
        visible,
        candidates: total,
        in_viewport,
        backfilled,
        ceiling,
    }
}

/// The records to render for `zoom` and the visible `bounds`.
pub fn filter_for_display<'a, I>(
    records: I,
    zoom: f64,
    bounds: &BoundingBox,
) -> Vec<&'a CanonicalRecord>
where
    I: IntoIterator<Item = &'a CanonicalRecord>,
{
    plan_display(records, zoom, bounds).visible
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_step_at_integer_zooms() {
        assert_eq!(magnitude_floor(8.0), None);
        assert_eq!(magnitude_floor(7.99), Some(2.5));
        assert_eq!(magnitude_floor(6.0), Some(3.0));
        assert_eq!(magnitude_floor(5.5), Some(3.5));
        assert_eq!(magnitude_floor(4.99), Some(4.0));
        assert_eq!(candidate_cap(7.0), 2000);
        assert_eq!(candidate_cap(6.0), 1000);
        assert_eq!(candidate_cap(5.0), 500);
        assert_eq!(candidate_cap(1.0), 200);
        assert_eq!(render_ceiling(12.0), 1500);
        assert_eq!(render_ceiling(7.5), 800);
        assert_eq!(render_ceiling(6.0), 400);
        assert_eq!(render_ceiling(5.9), 200);
    }

    #[test]
    fn nan_zoom_is_coarsest() {
        assert_eq!(magnitude_floor(f64::NAN), Some(4.0));
        assert_eq!(candidate_cap(f64::NAN), 200);
        assert_eq!(render_ceiling(f64::NAN), 200);
    }
}
