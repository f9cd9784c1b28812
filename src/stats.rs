//! Summary statistics for the records inside a user-selected rectangle.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::ingest::config::BoundingBox;
use crate::ingest::types::{CanonicalRecord, Source};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Band {
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayPoint {
    pub date: String,
    pub count: usize,
    pub avg_magnitude: f64,
    pub avg_depth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationCount {
    pub location: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaStatistics {
    pub count: usize,
    pub max_magnitude: f64,
    pub min_magnitude: f64,
    pub avg_magnitude: f64,
    pub max_depth: f64,
    pub min_depth: f64,
    pub avg_depth: f64,
    pub magnitude_bands: Vec<Band>,
    pub sources: BTreeMap<Source, usize>,
    pub depth_bands: Vec<Band>,
    pub timeline: Vec<DayPoint>,
    /// Index = hour of day (UTC).
    pub hourly: Vec<usize>,
    pub top_locations: Vec<LocationCount>,
    /// Mean gap between consecutive events, hours.
    pub avg_interval_hours: f64,
    pub strong_count: usize,
    pub shallow_count: usize,
    /// Events per distinct day.
    pub activity_level: f64,
    pub risk_score: f64,
}

const TOP_LOCATIONS: usize = 10;

/// Half-open `[lo, hi)` magnitude bands, strongest first.
const MAGNITUDE_BANDS: [(&str, f64, f64); 6] = [
    ("M 7.0+", 7.0, f64::INFINITY),
    ("M 6.0-6.9", 6.0, 7.0),
    ("M 5.0-5.9", 5.0, 6.0),
    ("M 4.0-4.9", 4.0, 5.0),
    ("M 3.0-3.9", 3.0, 4.0),
    ("M < 3.0", f64::NEG_INFINITY, 3.0),
];

/// Half-open `[lo, hi)` depth bands in km, shallowest first.
const DEPTH_BANDS: [(&str, f64, f64); 5] = [
    ("0-10 km", 0.0, 10.0),
    ("10-20 km", 10.0, 20.0),
    ("20-30 km", 20.0, 30.0),
    ("30-50 km", 30.0, 50.0),
    ("50+ km", 50.0, f64::INFINITY),
];

impl AreaStatistics {
    /// Statistics for an empty selection. Band and hourly layouts match a
    /// populated result with every count at zero.
    pub fn empty() -> Self {
        Self {
            count: 0,
            max_magnitude: 0.0,
            min_magnitude: 0.0,
            avg_magnitude: 0.0,
            max_depth: 0.0,
            min_depth: 0.0,
            avg_depth: 0.0,
            magnitude_bands: bands(&MAGNITUDE_BANDS, &[], |r| r.magnitude),
            sources: BTreeMap::new(),
            depth_bands: bands(&DEPTH_BANDS, &[], |r| r.depth),
            timeline: Vec::new(),
            hourly: vec![0; 24],
            top_locations: Vec::new(),
            avg_interval_hours: 0.0,
            strong_count: 0,
            shallow_count: 0,
            activity_level: 0.0,
            risk_score: 0.0,
        }
    }
}

/// Statistics over the records inside `area`.
pub fn for_area(records: &[CanonicalRecord], area: &BoundingBox) -> AreaStatistics {
    let selected: Vec<&CanonicalRecord> = records
        .iter()
        .filter(|r| area.contains(r.latitude, r.longitude))
        .collect();
    compute(&selected)
}

fn bands(
    table: &[(&'static str, f64, f64)],
    records: &[&CanonicalRecord],
    value: impl Fn(&CanonicalRecord) -> f64,
) -> Vec<Band> {
    table
        .iter()
        .map(|&(label, lo, hi)| Band {
            label,
            count: records
                .iter()
                .filter(|r| {
                    let v = value(**r);
                    v >= lo && v < hi
                })
                .count(),
        })
        .collect()
}

pub fn compute(records: &[&CanonicalRecord]) -> AreaStatistics {
    if records.is_empty() {
        return AreaStatistics::empty();
    }
    let n = records.len();
    let nf = n as f64;

    let mags = records.iter().map(|r| r.magnitude);
    let depths = records.iter().map(|r| r.depth);
    let avg_magnitude = mags.clone().sum::<f64>() / nf;
    let avg_depth = depths.clone().sum::<f64>() / nf;

    let magnitude_bands = bands(&MAGNITUDE_BANDS, records, |r| r.magnitude);
    let depth_bands = bands(&DEPTH_BANDS, records, |r| r.depth);

    let mut sources = BTreeMap::new();
    let mut hourly = vec![0usize; 24];
    let mut by_day: BTreeMap<&str, (usize, f64, f64)> = BTreeMap::new();
    let mut by_location: HashMap<String, usize> = HashMap::new();
    for r in records {
        *sources.entry(r.source).or_insert(0) += 1;
        if let Some(h) = r.hour_of_day().filter(|h| *h < 24) {
            hourly[h as usize] += 1;
        }
        let day = by_day.entry(r.date.as_str()).or_insert((0, 0.0, 0.0));
        day.0 += 1;
        day.1 += r.magnitude;
        day.2 += r.depth;
        *by_location.entry(location_key(&r.location)).or_insert(0) += 1;
    }

    let timeline: Vec<DayPoint> = by_day
        .into_iter()
        .map(|(date, (count, mag_sum, depth_sum))| DayPoint {
            date: date.to_string(),
            count,
            avg_magnitude: mag_sum / count as f64,
            avg_depth: depth_sum / count as f64,
        })
        .collect();

    let mut top_locations: Vec<LocationCount> = by_location
        .into_iter()
        .map(|(location, count)| LocationCount { location, count })
        .collect();
    top_locations.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.location.cmp(&b.location))
    });
    top_locations.truncate(TOP_LOCATIONS);

    AreaStatistics {
        count: n,
        max_magnitude: mags.clone().fold(f64::NEG_INFINITY, f64::max),
        min_magnitude: mags.fold(f64::INFINITY, f64::min),
        avg_magnitude,
        max_depth: depths.clone().fold(f64::NEG_INFINITY, f64::max),
        min_depth: depths.fold(f64::INFINITY, f64::min),
        avg_depth,
        magnitude_bands,
        sources,
        depth_bands,
        activity_level: nf / timeline.len().max(1) as f64,
        timeline,
        hourly,
        top_locations,
        avg_interval_hours: mean_interval_hours(records),
        strong_count: records.iter().filter(|r| r.magnitude >= 5.0).count(),
        shallow_count: records.iter().filter(|r| r.depth < 10.0).count(),
        risk_score: nf * avg_magnitude / 10.0,
    }
}

/// Grouping label: the text before the first comma, else before the first
/// dash.
fn location_key(location: &str) -> String {
    let by_comma = location.split(',').next().unwrap_or_default().trim();
    let key = if by_comma.is_empty() {
        location.split('-').next().unwrap_or_default().trim()
    } else {
        by_comma
    };
    if key.is_empty() {
        "unknown".to_string()
    } else {
        key.to_string()
    }
}

fn mean_interval_hours(records: &[&CanonicalRecord]) -> f64 {
    let mut instants: Vec<i64> = records
        .iter()
        .filter_map(|r| {
            let stamp = format!("{} {}", r.date, r.time);
            NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.and_utc().timestamp_millis())
        })
        .collect();
    if instants.len() < 2 {
        return 0.0;
    }
    instants.sort_unstable();
    let gaps: Vec<f64> = instants
        .windows(2)
        .map(|w| (w[1] - w[0]) as f64 / 3_600_000.0)
        .collect();
    gaps.iter().sum::<f64>() / gaps.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Identity;
    use chrono::{TimeZone, Utc};

    fn rec(
        lat: f64,
        mag: f64,
        depth: f64,
        hour: u32,
        location: &str,
        source: Source,
    ) -> CanonicalRecord {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).single();
        CanonicalRecord::new(
            source,
            Identity::Native(format!("{lat}-{hour}")),
            at,
            lat,
            30.0,
            Some(depth),
            mag,
            location,
        )
    }

    #[test]
    fn empty_selection_keeps_the_populated_shape() {
        let far = rec(10.0, 4.0, 5.0, 2, "far away", Source::Afad);
        let s = for_area(&[far], &BoundingBox::turkey());
        assert_eq!(s, AreaStatistics::empty());
        assert_eq!(s.count, 0);
        assert_eq!(s.hourly, vec![0; 24]);
        assert_eq!(s.magnitude_bands.len(), 6);
        assert_eq!(s.depth_bands.len(), 5);
        assert!(s.magnitude_bands.iter().all(|b| b.count == 0));
        assert!(s.depth_bands.iter().all(|b| b.count == 0));

        let populated = for_area(
            &[rec(38.0, 4.0, 5.0, 2, "Sindirgi", Source::Afad)],
            &BoundingBox::turkey(),
        );
        let labels = |b: &[Band]| b.iter().map(|b| b.label).collect::<Vec<_>>();
        assert_eq!(labels(&s.magnitude_bands), labels(&populated.magnitude_bands));
        assert_eq!(labels(&s.depth_bands), labels(&populated.depth_bands));
        assert_eq!(s.hourly.len(), populated.hourly.len());
    }

    #[test]
    fn summary_over_selected_area() {
        let recs = vec![
            rec(38.0, 5.2, 7.0, 1, "Sindirgi, Balikesir", Source::Afad),
            rec(38.1, 3.1, 12.0, 3, "Sindirgi, Balikesir", Source::Kandilli),
            rec(39.0, 2.0, 55.0, 5, "Ege Denizi", Source::Afad),
            rec(20.0, 6.0, 10.0, 5, "far away", Source::Afad),
        ];
        let area = BoundingBox::new(37.0, 25.0, 40.0, 35.0);
        let s = for_area(&recs, &area);
        assert_eq!(s.count, 3);
        assert_eq!(s.max_magnitude, 5.2);
        assert_eq!(s.min_depth, 7.0);
        assert_eq!(s.strong_count, 1);
        assert_eq!(s.shallow_count, 1);
        assert_eq!(s.sources[&Source::Afad], 2);
        assert_eq!(s.hourly[3], 1);
        assert_eq!(s.top_locations[0].location, "Sindirgi");
        assert_eq!(s.top_locations[0].count, 2);
        assert_eq!(s.timeline.len(), 1);
        assert!((s.avg_interval_hours - 2.0).abs() < 1e-9);
        assert!((s.activity_level - 3.0).abs() < 1e-9);
        assert_eq!(s.depth_bands[4].count, 1);
    }
}
