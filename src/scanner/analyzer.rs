//! Multi-timeframe analyzer
//!
//! Runs fetch → validate → indicators → levels → score for every configured
//! timeframe of one instrument, in order, and averages the scores. Any failed
//! timeframe drops the whole instrument.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::config::AppConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::features::{IndicatorEngine, LevelParams};
use crate::market_data::CandleSource;
use crate::scoring::score_timeframe;
use crate::types::{Candle, CandleSeries, CompositeResult, Timeframe, TimeframeResult, MIN_HISTORY};

pub struct MultiTimeframeAnalyzer {
    source: Arc<dyn CandleSource>,
    timeframes: Vec<Timeframe>,
    candle_limit: usize,
    pacing: Duration,
    fetch_timeout: Duration,
    fetch_retries: u32,
    engine: IndicatorEngine,
    level_params: LevelParams,
}

impl MultiTimeframeAnalyzer {
    pub fn new(source: Arc<dyn CandleSource>, timeframes: Vec<Timeframe>) -> Self {
        Self {
            source,
            timeframes,
            candle_limit: MIN_HISTORY,
            pacing: Duration::from_millis(150),
            fetch_timeout: Duration::from_secs(10),
            fetch_retries: 1,
            engine: IndicatorEngine::default(),
            level_params: LevelParams::default(),
        }
    }

    pub fn from_config(source: Arc<dyn CandleSource>, config: &AppConfig) -> Result<Self> {
        let ds = &config.data_source;
        Ok(Self::new(source, config.scanner.timeframes()?)
            .with_candle_limit(ds.candle_limit)
            .with_pacing(Duration::from_millis(ds.fetch_pacing_ms))
            .with_fetch_policy(Duration::from_millis(ds.request_timeout_ms), ds.fetch_retries)
            .with_engine(IndicatorEngine::new(config.indicators.clone()))
            .with_level_params(config.levels))
    }

    pub fn with_candle_limit(mut self, limit: usize) -> Self {
        self.candle_limit = limit;
        self
    }

    /// Delay between successive fetches of the same instrument
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_fetch_policy(mut self, fetch_timeout: Duration, retries: u32) -> Self {
        self.fetch_timeout = fetch_timeout;
        self.fetch_retries = retries;
        self
    }

    pub fn with_engine(mut self, engine: IndicatorEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_level_params(mut self, params: LevelParams) -> Self {
        self.level_params = params;
        self
    }

    pub fn source(&self) -> &Arc<dyn CandleSource> {
        &self.source
    }

    pub fn timeframes(&self) -> &[Timeframe] {
        &self.timeframes
    }

    /// Analyze one instrument across every configured timeframe.
    ///
    /// `Err` is the "no result" outcome; a composite is never built from a
    /// subset of timeframes.
    pub async fn analyze(&self, symbol: &str) -> AnalysisResult<CompositeResult> {
        let mut results = Vec::with_capacity(self.timeframes.len());

        for (i, &timeframe) in self.timeframes.iter().enumerate() {
            if i > 0 && !self.pacing.is_zero() {
                sleep(self.pacing).await;
            }

            let result = self
                .analyze_timeframe(symbol, timeframe)
                .await
                .map_err(|source| AnalysisError::PartialTimeframeFailure {
                    symbol: symbol.to_string(),
                    timeframe,
                    source: Box::new(source),
                })?;
            results.push(result);
        }

        let composite = composite_from(symbol, results).ok_or(AnalysisError::InsufficientHistory {
            required: 1,
            actual: 0,
        })?;

        tracing::debug!(
            symbol = %symbol,
            score = composite.score,
            timeframes = ?composite.timeframe_scores,
            "Instrument analyzed"
        );

        Ok(composite)
    }

    async fn analyze_timeframe(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> AnalysisResult<TimeframeResult> {
        let candles = self.fetch(symbol, timeframe).await?;
        let series = CandleSeries::new(symbol, timeframe, candles)?;
        score_timeframe(&series, &self.engine, &self.level_params)
    }

    /// Fetch with a per-attempt timeout; only data-source failures are retried
    async fn fetch(&self, symbol: &str, timeframe: Timeframe) -> AnalysisResult<Vec<Candle>> {
        let attempts = self.fetch_retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            let request = self
                .source
                .fetch_candles(symbol, timeframe, self.candle_limit);

            let error = match timeout(self.fetch_timeout, request).await {
                Ok(Ok(candles)) => return Ok(candles),
                Ok(Err(e)) if !e.is_transient() => return Err(e),
                Ok(Err(e)) => e,
                Err(_) => AnalysisError::DataSourceUnavailable {
                    symbol: symbol.to_string(),
                    timeframe,
                    reason: format!("timed out after {:?}", self.fetch_timeout),
                },
            };

            tracing::warn!(
                symbol = %symbol,
                timeframe = %timeframe,
                attempt,
                attempts,
                error = %error,
                "⚠️ Candle fetch failed"
            );
            last_error = Some(error);

            if attempt < attempts && !self.pacing.is_zero() {
                sleep(self.pacing).await;
            }
        }

        Err(last_error.unwrap_or_else(|| AnalysisError::DataSourceUnavailable {
            symbol: symbol.to_string(),
            timeframe,
            reason: "no fetch attempted".to_string(),
        }))
    }
}

/// Fold per-timeframe results into one composite.
///
/// The score is the unrounded mean; fields and levels come from the last
/// result. Returns `None` for an empty slice.
pub fn composite_from(symbol: &str, results: Vec<TimeframeResult>) -> Option<CompositeResult> {
    let detail = results.last()?.clone();
    let total: u32 = results.iter().map(|r| r.score).sum();
    let score = total as f64 / results.len() as f64;

    Some(CompositeResult {
        symbol: symbol.to_string(),
        timestamp: Utc::now(),
        score,
        timeframe_scores: results.iter().map(|r| (r.timeframe, r.score)).collect(),
        detail_timeframe: detail.timeframe,
        fields: detail.fields,
        levels: detail.levels,
    })
}
