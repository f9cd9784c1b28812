// src/ingest/providers/kandilli.rs
use anyhow::Result;
use async_trait::async_trait;

use crate::ingest::providers::archive::{InstantPreference, Transport};
use crate::ingest::types::{CanonicalRecord, PageRequest, Source, SourceProvider};

/// Kandilli Observatory archive adapter.
///
/// Kandilli publishes its own local-time `date_time`; `created_at` is only a
/// fallback.
pub struct KandilliProvider {
    transport: Transport,
}

impl KandilliProvider {
    pub fn from_url(url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            transport: Transport::http(url, timeout_secs)?,
        })
    }

    pub fn from_fixture_str(body: &str) -> Self {
        Self {
            transport: Transport::Fixture(body.to_string()),
        }
    }

    pub fn parse_page(body: &str) -> Result<Vec<CanonicalRecord>> {
        crate::ingest::providers::archive::parse_page(
            body,
            Source::Kandilli,
            InstantPreference::DateTimeFirst,
        )
    }
}

#[async_trait]
impl SourceProvider for KandilliProvider {
    async fn try_fetch_page(&self, req: &PageRequest) -> Result<Vec<CanonicalRecord>> {
        self.transport
            .fetch(Source::Kandilli, InstantPreference::DateTimeFirst, req)
            .await
    }

    fn source(&self) -> Source {
        Source::Kandilli
    }
}
