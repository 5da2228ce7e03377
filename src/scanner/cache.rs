//! Caller-owned scan cache
//!
//! The scanner never keeps results between calls; callers hold a `ScanCache`
//! and hand it back to `Scanner::scan_cached`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::CompositeResult;

/// Parameters a cached scan was produced with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub min_score: f64,
    pub max_instruments: usize,
}

#[derive(Debug, Clone)]
pub struct ScanCache {
    request: ScanRequest,
    results: Vec<CompositeResult>,
    scanned_at: DateTime<Utc>,
    ttl: Duration,
}

impl ScanCache {
    pub fn new(request: ScanRequest, results: Vec<CompositeResult>, ttl: Duration) -> Self {
        Self::at(request, results, ttl, Utc::now())
    }

    /// Build a cache stamped with an explicit scan time
    pub fn at(
        request: ScanRequest,
        results: Vec<CompositeResult>,
        ttl: Duration,
        scanned_at: DateTime<Utc>,
    ) -> Self {
        Self {
            request,
            results,
            scanned_at,
            ttl,
        }
    }

    pub fn request(&self) -> &ScanRequest {
        &self.request
    }

    pub fn results(&self) -> &[CompositeResult] {
        &self.results
    }

    pub fn scanned_at(&self) -> DateTime<Utc> {
        self.scanned_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| self.scanned_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    /// `now - scanned_at < ttl`
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }

    /// Fresh, non-empty and produced by the same request
    pub fn serves(&self, request: &ScanRequest, now: DateTime<Utc>) -> bool {
        self.request == *request && !self.results.is_empty() && self.is_fresh_at(now)
    }

    /// Look up one instrument's record, ignoring case
    pub fn find(&self, symbol: &str) -> Option<&CompositeResult> {
        self.results
            .iter()
            .find(|r| r.symbol.eq_ignore_ascii_case(symbol))
    }
}
