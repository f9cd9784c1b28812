// src/ingest/providers/afad.rs
use anyhow::Result;
use async_trait::async_trait;

use crate::ingest::providers::archive::{InstantPreference, Transport};
use crate::ingest::types::{CanonicalRecord, PageRequest, Source, SourceProvider};

/// AFAD archive adapter. Trusts the epoch `created_at` before `date_time`.
pub struct AfadProvider {
    transport: Transport,
}

impl AfadProvider {
    pub fn from_url(url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            transport: Transport::http(url, timeout_secs)?,
        })
    }

    /// Serve a captured archive body; pages are cut locally by `skip`/`limit`.
    pub fn from_fixture_str(body: &str) -> Self {
        Self {
            transport: Transport::Fixture(body.to_string()),
        }
    }

    pub fn parse_page(body: &str) -> Result<Vec<CanonicalRecord>> {
        crate::ingest::providers::archive::parse_page(
            body,
            Source::Afad,
            InstantPreference::CreatedAtFirst,
        )
    }
}

#[async_trait]
impl SourceProvider for AfadProvider {
    async fn try_fetch_page(&self, req: &PageRequest) -> Result<Vec<CanonicalRecord>> {
        self.transport
            .fetch(Source::Afad, InstantPreference::CreatedAtFirst, req)
            .await
    }

    fn source(&self) -> Source {
        Source::Afad
    }
}
