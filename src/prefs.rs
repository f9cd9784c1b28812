//! Client display preferences, round-tripped as an opaque JSON blob.
//!
//! Reading never fails: an absent or malformed blob yields the defaults, and
//! missing or invalid fields fall back one by one.

use serde::{Deserialize, Serialize};

pub const MIN_MARKER_MULTIPLIER: f64 = 0.5;
pub const MAX_MARKER_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapStyle {
    #[default]
    Light,
    Satellite,
    Terrain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerToggles {
    pub tectonic_plates: bool,
    pub faults: bool,
    pub wave_animation: bool,
    pub cities: bool,
}

impl Default for LayerToggles {
    fn default() -> Self {
        Self {
            tectonic_plates: true,
            faults: true,
            wave_animation: true,
            cities: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayPreferences {
    pub map_style: MapStyle,
    pub marker_size_multiplier: f64,
    pub show_legend: bool,
    pub list_open: bool,
    pub layers: LayerToggles,
}

impl Default for DisplayPreferences {
    fn default() -> Self {
        Self {
            map_style: MapStyle::Light,
            marker_size_multiplier: 1.0,
            show_legend: true,
            list_open: true,
            layers: LayerToggles::default(),
        }
    }
}

impl DisplayPreferences {
    pub fn from_blob(blob: Option<&str>) -> Self {
        let Some(raw) = blob.map(str::trim).filter(|s| !s.is_empty()) else {
            return Self::default();
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) else {
            tracing::debug!("preferences blob is not json, using defaults");
            return Self::default();
        };
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        // Field-by-field so one bad field does not discard the rest.
        let mut prefs = Self::default();
        if let Some(v) = obj.get("map_style").and_then(|v| MapStyle::deserialize(v).ok()) {
            prefs.map_style = v;
        }
        if let Some(v) = obj.get("marker_size_multiplier").and_then(|v| v.as_f64()) {
            prefs.marker_size_multiplier = v;
        }
        if let Some(v) = obj.get("show_legend").and_then(|v| v.as_bool()) {
            prefs.show_legend = v;
        }
        if let Some(v) = obj.get("list_open").and_then(|v| v.as_bool()) {
            prefs.list_open = v;
        }
        if let Some(v) = obj.get("layers").and_then(|v| LayerToggles::deserialize(v).ok()) {
            prefs.layers = v;
        }
        prefs.sanitized()
    }

    pub fn to_blob(&self) -> String {
        serde_json::to_string(&self.clone().sanitized()).unwrap_or_default()
    }

    fn sanitized(mut self) -> Self {
        let m = self.marker_size_multiplier;
        if !(m.is_finite() && (MIN_MARKER_MULTIPLIER..=MAX_MARKER_MULTIPLIER).contains(&m)) {
            self.marker_size_multiplier = 1.0;
        }
        self
    }
}
