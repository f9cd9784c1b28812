// src/ingest/paginator.rs
//! Drives one provider across successive pages until it runs dry.
//!
//! Stops on the first empty page, the first short page, or the first failed
//! page. Failed pages are never retried.

use metrics::counter;

use crate::ingest::types::{CanonicalRecord, DateWindow, PageRequest, SourceProvider};

/// Result of paginating one provider for one cycle.
#[derive(Debug, Default)]
pub struct Paginated {
    pub records: Vec<CanonicalRecord>,
    /// Number of page requests issued.
    pub calls: usize,
    /// True if any page request failed (pagination stopped there).
    pub failed: bool,
}

impl Paginated {
    /// A provider whose very first request failed produced nothing usable.
    pub fn failed_outright(&self) -> bool {
        self.failed && self.records.is_empty()
    }
}

/// Concatenate all pages for `window` at increasing offsets.
///
/// `max_pages` bounds a provider that ignores `limit` and keeps returning
/// full pages forever.
pub async fn fetch_all_pages(
    provider: &dyn SourceProvider,
    window: DateWindow,
    page_size: usize,
    max_pages: usize,
) -> Paginated {
    let page_size = page_size.max(1);
    let provider_name = provider.source().as_str();
    let mut out = Paginated::default();
    let mut skip = 0usize;

    loop {
        if out.calls >= max_pages.max(1) {
            tracing::warn!(
                target: "ingest",
                provider = provider_name,
                pages = out.calls,
                "page limit reached, stopping pagination"
            );
            break;
        }

        let req = PageRequest {
            window,
            limit: page_size,
            skip,
        };
        out.calls += 1;
        counter!("quake_pages_total", "provider" => provider_name).increment(1);

        let page = match provider.try_fetch_page(&req).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(
                    target: "ingest",
                    error = ?e,
                    provider = provider_name,
                    skip,
                    "page failed, treating provider as exhausted"
                );
                counter!("quake_provider_errors_total", "provider" => provider_name).increment(1);
                out.failed = true;
                break;
            }
        };

        let n = page.len();
        out.records.extend(page);

        if n == 0 || n < page_size {
            break;
        }
        skip += page_size;
    }

    tracing::debug!(
        target: "ingest",
        provider = provider_name,
        pages = out.calls,
        records = out.records.len(),
        failed = out.failed,
        "pagination finished"
    );
    out
}
