//! Marker styling for the map renderer, with a memoizing cache.
//!
//! The cache is an explicit object owned by whoever renders; nothing here is
//! global. Entries are only ever added. The key space is small (magnitude in
//! tenths, integer zoom, multiplier in tenths), so unbounded growth is fine.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerStyle {
    /// Fill colour, `#rrggbb`.
    pub color: &'static str,
    /// Darker companion used for the gradient edge.
    pub edge_color: &'static str,
    /// Diameter in CSS pixels.
    pub size_px: u32,
}

fn colors_for(magnitude: f64) -> (&'static str, &'static str) {
    if magnitude >= 7.0 {
        ("#dc2626", "#991b1b")
    } else if magnitude >= 6.0 {
        ("#ea580c", "#9a3412")
    } else if magnitude >= 5.0 {
        ("#f59e0b", "#d97706")
    } else if magnitude >= 4.0 {
        ("#eab308", "#ca8a04")
    } else if magnitude >= 3.0 {
        ("#84cc16", "#65a30d")
    } else {
        ("#22c55e", "#16a34a")
    }
}

/// Marker diameter: magnitude band base size, shrunk at close zoom, times the
/// user multiplier. Never below 6 px.
pub fn marker_size(magnitude: f64, zoom: f64, multiplier: f64) -> u32 {
    let base = if magnitude >= 7.0 {
        24.0
    } else if magnitude >= 6.0 {
        20.0
    } else if magnitude >= 5.0 {
        18.0
    } else if magnitude >= 4.0 {
        16.0
    } else if magnitude >= 3.0 {
        14.0
    } else {
        8.0
    };
    let scale = if zoom >= 10.0 {
        0.65
    } else if zoom >= 9.0 {
        0.75
    } else if zoom >= 8.0 {
        0.85
    } else {
        1.0
    };
    let px = (base * scale * multiplier).round();
    if px.is_finite() {
        px.max(6.0) as u32
    } else {
        6
    }
}

pub fn marker_style(magnitude: f64, zoom: f64, multiplier: f64) -> MarkerStyle {
    let (color, edge_color) = colors_for(magnitude);
    MarkerStyle {
        color,
        edge_color,
        size_px: marker_size(magnitude, zoom, multiplier),
    }
}

/// Quantized cache key: (magnitude × 10, floor(zoom), multiplier × 10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerKey {
    pub magnitude_tenths: i32,
    pub zoom_level: i32,
    pub multiplier_tenths: i32,
}

impl MarkerKey {
    pub fn new(magnitude: f64, zoom: f64, multiplier: f64) -> Self {
        Self {
            magnitude_tenths: (magnitude * 10.0).round() as i32,
            zoom_level: zoom.floor() as i32,
            multiplier_tenths: (multiplier * 10.0).round() as i32,
        }
    }
}

#[derive(Debug, Default)]
pub struct MarkerCache {
    entries: RwLock<HashMap<MarkerKey, Arc<MarkerStyle>>>,
}

impl MarkerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Style for the quantized key. The style is computed from the quantized
    /// values, so every lookup of a key yields the same entry.
    pub fn get(&self, magnitude: f64, zoom: f64, multiplier: f64) -> Arc<MarkerStyle> {
        let key = MarkerKey::new(magnitude, zoom, multiplier);
        if let Some(hit) = self
            .entries
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&key)
        {
            return Arc::clone(hit);
        }

        let style = Arc::new(marker_style(
            f64::from(key.magnitude_tenths) / 10.0,
            f64::from(key.zoom_level),
            f64::from(key.multiplier_tenths) / 10.0,
        ));
        let mut w = self.entries.write().unwrap_or_else(|p| p.into_inner());
        Arc::clone(w.entry(key).or_insert(style))
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
