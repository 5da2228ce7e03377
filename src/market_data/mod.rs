//! Market data sources
//!
//! The analyzer only talks to the [`CandleSource`] trait; Binance REST is the
//! production implementation.

pub mod binance;

pub use binance::BinanceSource;

use async_trait::async_trait;

use crate::error::AnalysisResult;
use crate::types::{Candle, Timeframe};

/// Trait for candle data providers
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Get the source name
    fn name(&self) -> &'static str;

    /// Fetch the most recent `count` candles, oldest first.
    ///
    /// Must fail explicitly rather than pad or truncate.
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> AnalysisResult<Vec<Candle>>;

    /// List tradable instruments in exchange order
    async fn list_instruments(&self) -> AnalysisResult<Vec<String>>;
}
