// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "QUAKE_CONFIG_PATH";
const ENV_PAGE_SIZE: &str = "QUAKE_PAGE_SIZE";
const ENV_REFRESH_SECS: &str = "QUAKE_REFRESH_SECS";
const ENV_AFAD_URL: &str = "QUAKE_AFAD_URL";
const ENV_KANDILLI_URL: &str = "QUAKE_KANDILLI_URL";

pub const DEFAULT_AFAD_URL: &str = "https://api.orhanaydogdu.com.tr/deprem/afad/archive";
pub const DEFAULT_KANDILLI_URL: &str = "https://api.orhanaydogdu.com.tr/deprem/kandilli/archive";

/// A geographic rectangle in WGS84 degrees. Edges are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub const fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// Region of interest: Türkiye and its immediate surroundings.
    pub const fn turkey() -> Self {
        Self::new(35.5, 25.5, 42.0, 45.0)
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.south
            && latitude <= self.north
            && longitude >= self.west
            && longitude <= self.east
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::turkey()
    }
}

/// Granularity of the spatial-temporal dedup key.
///
/// Coordinates are multiplied by `coord_scale` and rounded (10.0 ⇒ 0.1°
/// cells); timestamps are divided by `time_bucket_ms` and rounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupGranularity {
    pub coord_scale: f64,
    pub time_bucket_ms: i64,
}

impl Default for DedupGranularity {
    fn default() -> Self {
        Self {
            coord_scale: 10.0,
            time_bucket_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderEndpoints {
    pub afad_url: String,
    pub kandilli_url: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            afad_url: DEFAULT_AFAD_URL.to_string(),
            kandilli_url: DEFAULT_KANDILLI_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub page_size: usize,
    pub max_pages: usize,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub region: BoundingBox,
    pub dedup: DedupGranularity,
    /// Offset used to resolve "today"-style presets.
    pub local_utc_offset_minutes: i32,
    pub providers: ProviderEndpoints,
    pub metrics_enabled: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_pages: 500,
            refresh_interval_secs: 60,
            request_timeout_secs: 30,
            region: BoundingBox::turkey(),
            dedup: DedupGranularity::default(),
            local_utc_offset_minutes: 180,
            providers: ProviderEndpoints::default(),
            metrics_enabled: false,
        }
    }
}

impl IngestConfig {
    /// Load from an explicit path (TOML or JSON by extension), then apply env
    /// overrides and sanitize.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading ingest config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = parse_config(&content, &ext)?;
        cfg.apply_env();
        cfg.sanitize();
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $QUAKE_CONFIG_PATH
    /// 2) config/quake.toml
    /// 3) config/quake.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        for candidate in ["config/quake.toml", "config/quake.json"] {
            let p = PathBuf::from(candidate);
            if p.exists() {
                return Self::load_from(&p);
            }
        }
        let mut cfg = Self::default();
        cfg.apply_env();
        cfg.sanitize();
        Ok(cfg)
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_parse::<usize>(ENV_PAGE_SIZE) {
            self.page_size = v;
        }
        if let Some(v) = env_parse::<u64>(ENV_REFRESH_SECS) {
            self.refresh_interval_secs = v;
        }
        if let Ok(v) = std::env::var(ENV_AFAD_URL) {
            if !v.trim().is_empty() {
                self.providers.afad_url = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var(ENV_KANDILLI_URL) {
            if !v.trim().is_empty() {
                self.providers.kandilli_url = v.trim().to_string();
            }
        }
    }

    fn sanitize(&mut self) {
        let defaults = Self::default();
        self.page_size = self.page_size.max(1);
        self.max_pages = self.max_pages.max(1);
        self.refresh_interval_secs = self.refresh_interval_secs.max(5);
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = defaults.request_timeout_secs;
        }
        if !(self.dedup.coord_scale.is_finite() && self.dedup.coord_scale > 0.0) {
            self.dedup.coord_scale = defaults.dedup.coord_scale;
        }
        if self.dedup.time_bucket_ms <= 0 {
            self.dedup.time_bucket_ms = defaults.dedup.time_bucket_ms;
        }
        let r = &mut self.region;
        if r.south > r.north {
            std::mem::swap(&mut r.south, &mut r.north);
        }
        if r.west > r.east {
            std::mem::swap(&mut r.west, &mut r.east);
        }
        if !(-840..=840).contains(&self.local_utc_offset_minutes) {
            self.local_utc_offset_minutes = defaults.local_utc_offset_minutes;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<IngestConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing ingest config json");
    }
    match toml::from_str::<IngestConfig>(s) {
        Ok(cfg) => Ok(cfg),
        Err(toml_err) => serde_json::from_str(s)
            .map_err(|_| anyhow!("unsupported ingest config format: {toml_err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = parse_config(
            r#"
page_size = 50

[region]
south = 36.0
west = 26.0
north = 41.0
east = 44.0
"#,
            "toml",
        )
        .unwrap();
        assert_eq!(cfg.page_size, 50);
        assert_eq!(cfg.region, BoundingBox::new(36.0, 26.0, 41.0, 44.0));
        assert_eq!(cfg.dedup, DedupGranularity::default());
        assert_eq!(cfg.providers.afad_url, DEFAULT_AFAD_URL);
    }

    #[test]
    fn sanitize_repairs_nonsense() {
        let mut cfg = IngestConfig {
            page_size: 0,
            refresh_interval_secs: 1,
            region: BoundingBox::new(42.0, 45.0, 35.5, 25.5),
            dedup: DedupGranularity {
                coord_scale: -1.0,
                time_bucket_ms: 0,
            },
            ..IngestConfig::default()
        };
        cfg.sanitize();
        assert_eq!(cfg.page_size, 1);
        assert_eq!(cfg.refresh_interval_secs, 5);
        assert_eq!(cfg.region, BoundingBox::turkey());
        assert_eq!(cfg.dedup, DedupGranularity::default());
    }

    #[test]
    fn bounding_box_edges_are_inclusive() {
        let b = BoundingBox::turkey();
        assert!(b.contains(35.5, 25.5));
        assert!(b.contains(42.0, 45.0));
        assert!(!b.contains(10.0, 10.0));
        assert!(!b.contains(f64::NAN, 30.0));
    }
}
