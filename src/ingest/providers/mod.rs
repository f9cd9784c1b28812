// src/ingest/providers/mod.rs
pub mod afad;
pub mod archive;
pub mod kandilli;

use std::sync::Arc;

use anyhow::Result;

use crate::ingest::config::IngestConfig;
use crate::ingest::types::SourceProvider;

/// Live adapters in concatenation order. Kandilli comes first, so on a
/// magnitude tie during dedup its record is the one kept.
pub fn default_providers(cfg: &IngestConfig) -> Result<Vec<Arc<dyn SourceProvider>>> {
    Ok(vec![
        Arc::new(kandilli::KandilliProvider::from_url(
            &cfg.providers.kandilli_url,
            cfg.request_timeout_secs,
        )?),
        Arc::new(afad::AfadProvider::from_url(
            &cfg.providers.afad_url,
            cfg.request_timeout_secs,
        )?),
    ])
}
