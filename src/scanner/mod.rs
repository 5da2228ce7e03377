//! Market scanner
//!
//! Runs the multi-timeframe analyzer over a bounded universe with bounded
//! concurrency and keeps the instruments that reach a minimum score. Failed
//! instruments are logged and skipped; they never abort a scan.
//!
//! Consumers (notifiers, advisors, order routers) subscribe to [`ScanEvent`]s
//! instead of being called from here.

pub mod analyzer;
pub mod cache;

pub use analyzer::{composite_from, MultiTimeframeAnalyzer};
pub use cache::{ScanCache, ScanRequest};

use anyhow::Result;
use futures_util::{future, stream, StreamExt};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::AnalysisResult;
use crate::market_data::CandleSource;
use crate::types::CompositeResult;

/// Progress messages published while a scan runs
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Instrument reached the minimum score
    Qualified(CompositeResult),
    /// Instrument failed or scored below the minimum
    Skipped { symbol: String, reason: String },
    /// Scan ended (completed or cancelled)
    Finished { scanned: usize, qualified: usize },
}

pub struct Scanner {
    analyzer: Arc<MultiTimeframeAnalyzer>,
    concurrency: usize,
    cache_ttl: Duration,
    events: Option<mpsc::Sender<ScanEvent>>,
    cancel: Option<watch::Receiver<bool>>,
}

impl Scanner {
    pub fn new(analyzer: MultiTimeframeAnalyzer) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            concurrency: 4,
            cache_ttl: Duration::from_secs(300),
            events: None,
            cancel: None,
        }
    }

    pub fn from_config(source: Arc<dyn CandleSource>, config: &AppConfig) -> Result<Self> {
        let analyzer = MultiTimeframeAnalyzer::from_config(source, config)?;
        Ok(Self::new(analyzer)
            .with_concurrency(config.scanner.concurrency)
            .with_cache_ttl(Duration::from_secs(config.scanner.cache_ttl_secs)))
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Publish scan progress on `tx`; the receiver must be drained
    pub fn with_event_sink(mut self, tx: mpsc::Sender<ScanEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Stop starting new instruments once `rx` reads `true`
    pub fn with_cancellation(mut self, rx: watch::Receiver<bool>) -> Self {
        self.cancel = Some(rx);
        self
    }

    pub fn analyzer(&self) -> &MultiTimeframeAnalyzer {
        &self.analyzer
    }

    /// Scan the source's tradable universe, in exchange order
    pub async fn scan(
        &self,
        min_score: f64,
        max_instruments: usize,
    ) -> AnalysisResult<Vec<CompositeResult>> {
        let source = self.analyzer.source();
        let symbols = source.list_instruments().await?;
        info!(
            source = source.name(),
            available = symbols.len(),
            "📋 Universe loaded"
        );

        Ok(self.scan_universe(symbols, min_score, max_instruments).await)
    }

    /// Scan a caller-supplied universe. Output order is unspecified.
    pub async fn scan_universe(
        &self,
        symbols: Vec<String>,
        min_score: f64,
        max_instruments: usize,
    ) -> Vec<CompositeResult> {
        let universe: Vec<String> = symbols.into_iter().take(max_instruments).collect();
        info!(
            instruments = universe.len(),
            min_score,
            concurrency = self.concurrency,
            "🔍 Scan started"
        );

        let analyzer = &self.analyzer;
        let outcomes = stream::iter(universe)
            .take_while(|_| future::ready(!self.is_cancelled()))
            .map(|symbol| async move {
                let outcome = analyzer.analyze(&symbol).await;
                (symbol, outcome)
            })
            .buffer_unordered(self.concurrency);
        futures_util::pin_mut!(outcomes);

        let mut scanned = 0;
        let mut qualified = Vec::new();

        while let Some((symbol, outcome)) = outcomes.next().await {
            scanned += 1;
            match outcome {
                Ok(result) if result.score >= min_score => {
                    info!(symbol = %symbol, score = result.score, "✅ Qualified");
                    self.emit(ScanEvent::Qualified(result.clone())).await;
                    qualified.push(result);
                }
                Ok(result) => {
                    debug!(symbol = %symbol, score = result.score, "Below minimum score");
                    self.emit(ScanEvent::Skipped {
                        symbol,
                        reason: format!("score {:.2} below {:.2}", result.score, min_score),
                    })
                    .await;
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "⚠️ Instrument skipped");
                    self.emit(ScanEvent::Skipped {
                        symbol,
                        reason: e.to_string(),
                    })
                    .await;
                }
            }
        }

        if self.is_cancelled() {
            warn!(scanned, "🛑 Scan cancelled");
        }
        info!(scanned, qualified = qualified.len(), "🏁 Scan finished");
        self.emit(ScanEvent::Finished {
            scanned,
            qualified: qualified.len(),
        })
        .await;

        qualified
    }

    /// Reuse `cache` when it still serves `request`, otherwise scan again
    pub async fn scan_cached(
        &self,
        cache: Option<ScanCache>,
        request: ScanRequest,
        force_refresh: bool,
    ) -> AnalysisResult<ScanCache> {
        if let Some(cache) = cache {
            if !force_refresh && cache.serves(&request, chrono::Utc::now()) {
                debug!(
                    results = cache.results().len(),
                    expires_at = %cache.expires_at(),
                    "Serving cached scan"
                );
                return Ok(cache);
            }
        }

        let results = self
            .scan(request.min_score, request.max_instruments)
            .await?;
        Ok(ScanCache::new(request, results, self.cache_ttl))
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    async fn emit(&self, event: ScanEvent) {
        if let Some(tx) = &self.events {
            if tx.send(event).await.is_err() {
                debug!("Scan event receiver dropped");
            }
        }
    }
}

/// Highest-scoring result, if any
pub fn best_by_score(results: &[CompositeResult]) -> Option<&CompositeResult> {
    results.iter().max_by(|a, b| a.score.total_cmp(&b.score))
}

/// Sort by descending score, ties broken by symbol
pub fn rank_by_score(mut results: Vec<CompositeResult>) -> Vec<CompositeResult> {
    results.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.symbol.cmp(&b.symbol),
        other => other,
    });
    results
}
