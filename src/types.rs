//! Core types used throughout CoinScan
//!
//! Defines candles, validated series, indicator snapshots and the per-timeframe
//! and composite results handed between pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AnalysisError, AnalysisResult};

/// Minimum number of candles a series needs before it can be analyzed
pub const MIN_HISTORY: usize = 200;

/// Supported kline intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1w")]
    Week1,
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::Hour1
    }
}

impl Timeframe {
    /// Default analysis order: short, medium, long
    pub const DEFAULT_SET: [Timeframe; 3] = [Timeframe::Hour1, Timeframe::Hour4, Timeframe::Day1];

    /// Interval string understood by the exchange
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Min15 => "15m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour4 => "4h",
            Timeframe::Day1 => "1d",
            Timeframe::Week1 => "1w",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "15m" | "15min" => Some(Timeframe::Min15),
            "1h" | "1hour" => Some(Timeframe::Hour1),
            "4h" | "4hour" => Some(Timeframe::Hour4),
            "1d" | "1day" => Some(Timeframe::Day1),
            "1w" | "1week" => Some(Timeframe::Week1),
            _ => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Candlestick data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time (start of period, ms)
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Volume in base currency
    pub volume: f64,
}

impl Candle {
    /// Typical price (h + l + c) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    fn first_non_finite(&self) -> Option<&'static str> {
        [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ]
        .into_iter()
        .find(|(_, v)| !v.is_finite())
        .map(|(name, _)| name)
    }
}

/// Validated, chronologically ordered candles for one (symbol, timeframe)
#[derive(Debug, Clone)]
pub struct CandleSeries {
    symbol: String,
    timeframe: Timeframe,
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a series, rejecting short, non-numeric or unordered input.
    ///
    /// The input is never truncated or padded.
    pub fn new(
        symbol: impl Into<String>,
        timeframe: Timeframe,
        candles: Vec<Candle>,
    ) -> AnalysisResult<Self> {
        if candles.len() < MIN_HISTORY {
            return Err(AnalysisError::InsufficientHistory {
                required: MIN_HISTORY,
                actual: candles.len(),
            });
        }

        for (index, candle) in candles.iter().enumerate() {
            if let Some(field) = candle.first_non_finite() {
                return Err(AnalysisError::invalid_sample(
                    index,
                    format!("non-numeric {}", field),
                ));
            }
            if candle.high < candle.low {
                return Err(AnalysisError::invalid_sample(
                    index,
                    format!("high {} below low {}", candle.high, candle.low),
                ));
            }
            if index > 0 && candle.open_time <= candles[index - 1].open_time {
                return Err(AnalysisError::invalid_sample(
                    index,
                    format!(
                        "open_time {} not after {}",
                        candle.open_time,
                        candles[index - 1].open_time
                    ),
                ));
            }
        }

        Ok(Self {
            symbol: symbol.into(),
            timeframe,
            candles,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Never true for a constructed series
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> &Candle {
        // Constructor guarantees at least MIN_HISTORY candles
        &self.candles[self.candles.len() - 1]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }
}

/// Raw indicator values at the last sample, plus the previous sample's
/// values needed for rising/falling comparisons
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub close: f64,
    /// RSI (Wilder's smoothing, 0-100)
    pub rsi: f64,
    pub prev_rsi: f64,
    /// Stochastic RSI %K (0.0-1.0)
    pub stoch_rsi: f64,
    pub macd: f64,
    pub prev_macd: f64,
    pub macd_signal: f64,
    pub ema_short: f64,
    pub ema_long: f64,
    pub atr: f64,
    pub bb_upper: f64,
    pub bb_lower: f64,
    /// close - close[lag]
    pub momentum: f64,
    pub volume: f64,
    pub volume_avg: f64,
    pub obv: f64,
    /// ADX (0-100)
    pub adx: f64,
    pub cci: f64,
    /// Williams %R (-100..0)
    pub williams_r: f64,
}

/// Retracement levels and rolling support/resistance
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceLevels {
    pub fib_0: f64,
    pub fib_23_6: f64,
    pub fib_38_2: f64,
    pub fib_50: f64,
    pub fib_61_8: f64,
    pub fib_100: f64,
    pub support: f64,
    pub resistance: f64,
}

impl PriceLevels {
    /// Round every level for publication (4 decimals)
    pub fn rounded(&self) -> Self {
        Self {
            fib_0: round_to(self.fib_0, 4),
            fib_23_6: round_to(self.fib_23_6, 4),
            fib_38_2: round_to(self.fib_38_2, 4),
            fib_50: round_to(self.fib_50, 4),
            fib_61_8: round_to(self.fib_61_8, 4),
            fib_100: round_to(self.fib_100, 4),
            support: round_to(self.support, 4),
            resistance: round_to(self.resistance, 4),
        }
    }
}

/// Publication-ready indicator values (rounded)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishedFields {
    pub rsi: f64,
    pub stoch_rsi: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub ema50: f64,
    pub ema200: f64,
    pub atr: f64,
    pub bb_upper: f64,
    pub bb_lower: f64,
    pub momentum: f64,
    pub volume: f64,
    pub vol_avg: f64,
    pub obv: f64,
    pub adx: f64,
    pub cci: f64,
    pub williams_r: f64,
}

impl PublishedFields {
    /// 2 decimals for price-scale values, 4 for oscillators and ratios
    pub fn from_snapshot(s: &IndicatorSnapshot) -> Self {
        Self {
            rsi: round_to(s.rsi, 2),
            stoch_rsi: round_to(s.stoch_rsi, 4),
            macd: round_to(s.macd, 4),
            macd_signal: round_to(s.macd_signal, 4),
            ema50: round_to(s.ema_short, 2),
            ema200: round_to(s.ema_long, 2),
            atr: round_to(s.atr, 4),
            bb_upper: round_to(s.bb_upper, 2),
            bb_lower: round_to(s.bb_lower, 2),
            momentum: round_to(s.momentum, 4),
            volume: round_to(s.volume, 2),
            vol_avg: round_to(s.volume_avg, 2),
            obv: round_to(s.obv, 2),
            adx: round_to(s.adx, 4),
            cci: round_to(s.cci, 4),
            williams_r: round_to(s.williams_r, 4),
        }
    }
}

/// Score and detail for one (instrument, timeframe)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeResult {
    pub timeframe: Timeframe,
    pub score: u32,
    pub fields: PublishedFields,
    pub levels: PriceLevels,
}

/// Aggregated record for one instrument across all analyzed timeframes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeResult {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    /// Arithmetic mean of the per-timeframe scores
    pub score: f64,
    pub timeframe_scores: Vec<(Timeframe, u32)>,
    /// Timeframe the detail fields were taken from
    pub detail_timeframe: Timeframe,
    pub fields: PublishedFields,
    pub levels: PriceLevels,
}

impl CompositeResult {
    /// One-line human summary
    pub fn summary(&self) -> String {
        format!(
            "{} score={:.2} rsi={} macd={} (signal {}) ema50={} ema200={} support={} resistance={} atr={}",
            self.symbol,
            self.score,
            self.fields.rsi,
            self.fields.macd,
            self.fields.macd_signal,
            self.fields.ema50,
            self.fields.ema200,
            self.levels.support,
            self.levels.resistance,
            self.fields.atr,
        )
    }
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
