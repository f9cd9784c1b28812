// tests/common/mod.rs
//
// Scripted providers and record builders shared by the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use quake_atlas::ingest::types::{CanonicalRecord, Identity, PageRequest, Source, SourceProvider};

pub fn rec(source: Source, lat: f64, lon: f64, mag: f64, ts_ms: i64) -> CanonicalRecord {
    CanonicalRecord::new(
        source,
        Identity::Native(format!("{lat}:{lon}:{ts_ms}:{mag}")),
        Utc.timestamp_millis_opt(ts_ms).single(),
        lat,
        lon,
        Some(10.0),
        mag,
        "test",
    )
}

/// `n` distinct in-region records that never collide under dedup.
pub fn spread(source: Source, n: usize, base_ts: i64) -> Vec<CanonicalRecord> {
    (0..n)
        .map(|i| {
            rec(
                source,
                36.0 + (i % 12) as f64 * 0.5,
                27.0 + (i / 12) as f64 * 0.5,
                2.0 + (i % 30) as f64 * 0.1,
                base_ts - i as i64 * 3_600_000,
            )
        })
        .collect()
}

pub enum Step {
    Page(Vec<CanonicalRecord>),
    Fail,
    Panic,
}

/// Replays a fixed script of pages; once exhausted, returns empty pages.
pub struct ScriptedProvider {
    source: Source,
    steps: Mutex<Vec<Step>>,
    calls: AtomicUsize,
    skips: Mutex<Vec<usize>>,
}

impl ScriptedProvider {
    pub fn new(source: Source, steps: Vec<Step>) -> Self {
        let mut steps = steps;
        steps.reverse();
        Self {
            source,
            steps: Mutex::new(steps),
            calls: AtomicUsize::new(0),
            skips: Mutex::new(Vec::new()),
        }
    }

    pub fn pages(source: Source, pages: Vec<Vec<CanonicalRecord>>) -> Self {
        Self::new(source, pages.into_iter().map(Step::Page).collect())
    }

    pub fn always_failing(source: Source) -> AlwaysFailing {
        AlwaysFailing {
            source,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn skips(&self) -> Vec<usize> {
        self.skips.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceProvider for ScriptedProvider {
    async fn try_fetch_page(&self, req: &PageRequest) -> Result<Vec<CanonicalRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.skips.lock().unwrap().push(req.skip);
        let step = self.steps.lock().unwrap().pop();
        match step {
            Some(Step::Page(p)) => Ok(p),
            Some(Step::Fail) => Err(anyhow!("scripted failure")),
            Some(Step::Panic) => panic!("scripted panic"),
            None => Ok(Vec::new()),
        }
    }

    fn source(&self) -> Source {
        self.source
    }
}

pub struct AlwaysFailing {
    source: Source,
    calls: AtomicUsize,
}

impl AlwaysFailing {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceProvider for AlwaysFailing {
    async fn try_fetch_page(&self, _req: &PageRequest) -> Result<Vec<CanonicalRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("connection refused"))
    }

    fn source(&self) -> Source {
        self.source
    }
}

/// Returns a full page on every call, ignoring `skip`.
pub struct Bottomless {
    pub source: Source,
    pub calls: AtomicUsize,
}

#[async_trait]
impl SourceProvider for Bottomless {
    async fn try_fetch_page(&self, req: &PageRequest) -> Result<Vec<CanonicalRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(spread(self.source, req.limit, 1_700_000_000_000))
    }

    fn source(&self) -> Source {
        self.source
    }
}
