//! Feature Engine - Technical indicators over a validated candle series
//!
//! Computes the indicator snapshot used by the scorer:
//! - RSI (Wilder's smoothing) and Stochastic RSI %K
//! - MACD (EMA-based signal line)
//! - EMA short/long trend pair
//! - ATR and Bollinger Bands
//! - Momentum over a fixed lag
//! - Volume SMA and OBV
//! - ADX, CCI and Williams %R
//!
//! Values are kept unrounded here; rounding happens when results are published.

pub mod indicators;
pub mod levels;

pub use levels::LevelParams;

use serde::Deserialize;

use crate::error::{AnalysisError, AnalysisResult};
use crate::types::{CandleSeries, IndicatorSnapshot};

/// Indicator periods
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub stoch_period: usize,
    pub stoch_smooth: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub ema_short: usize,
    pub ema_long: usize,
    pub atr_period: usize,
    pub bb_period: usize,
    pub bb_std: f64,
    pub momentum_lag: usize,
    pub volume_avg_period: usize,
    pub adx_period: usize,
    pub cci_period: usize,
    pub williams_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            stoch_period: 14,
            stoch_smooth: 3,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            ema_short: 50,
            ema_long: 200,
            atr_period: 14,
            bb_period: 20,
            bb_std: 2.0,
            momentum_lag: 10,
            volume_avg_period: 50,
            adx_period: 14,
            cci_period: 20,
            williams_period: 14,
        }
    }
}

/// Stateless indicator engine: every call is a pure function of the series
#[derive(Debug, Clone, Default)]
pub struct IndicatorEngine {
    params: IndicatorParams,
}

impl IndicatorEngine {
    pub fn new(params: IndicatorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    /// Compute the snapshot for the last two samples of `series`
    pub fn compute(&self, series: &CandleSeries) -> AnalysisResult<IndicatorSnapshot> {
        let p = &self.params;
        let candles = series.candles();
        let closes = series.closes();
        let volumes = series.volumes();
        let last = series.last();

        let insufficient = || AnalysisError::InsufficientHistory {
            required: self.required_history(),
            actual: series.len(),
        };
        let latest = |values: &[f64]| values.last().copied().ok_or_else(insufficient);
        let latest_two = |values: &[f64]| match values {
            [.., prev, last] => Ok((*last, *prev)),
            _ => Err(insufficient()),
        };

        let rsi_series = indicators::rsi(&closes, p.rsi_period);
        let (rsi, prev_rsi) = latest_two(&rsi_series)?;
        let stoch_rsi = latest(&indicators::stoch_rsi_k(
            &rsi_series,
            p.stoch_period,
            p.stoch_smooth,
        ))?;

        let macd = indicators::macd(&closes, p.macd_fast, p.macd_slow, p.macd_signal);
        let (macd_line, prev_macd) = latest_two(&macd.line)?;
        let macd_signal = latest(&macd.signal)?;

        let bands = indicators::bollinger(&closes, p.bb_period, p.bb_std);

        let snapshot = IndicatorSnapshot {
            close: last.close,
            rsi,
            prev_rsi,
            stoch_rsi,
            macd: macd_line,
            prev_macd,
            macd_signal,
            ema_short: latest(&indicators::ema(&closes, p.ema_short))?,
            ema_long: latest(&indicators::ema(&closes, p.ema_long))?,
            atr: latest(&indicators::atr(candles, p.atr_period))?,
            bb_upper: latest(&bands.upper)?,
            bb_lower: latest(&bands.lower)?,
            momentum: latest(&indicators::momentum(&closes, p.momentum_lag))?,
            volume: last.volume,
            volume_avg: latest(&indicators::sma(&volumes, p.volume_avg_period))?,
            obv: latest(&indicators::obv(candles))?,
            adx: latest(&indicators::adx(candles, p.adx_period))?,
            cci: latest(&indicators::cci(candles, p.cci_period))?,
            williams_r: latest(&indicators::williams_r(candles, p.williams_period))?,
        };

        if let Some(name) = first_non_finite(&snapshot) {
            return Err(AnalysisError::invalid_sample(
                series.len() - 1,
                format!("indicator {} is not finite", name),
            ));
        }

        tracing::debug!(
            symbol = %series.symbol(),
            timeframe = %series.timeframe(),
            candle_count = series.len(),
            rsi = snapshot.rsi,
            macd = snapshot.macd,
            adx = snapshot.adx,
            "Indicator snapshot computed"
        );

        Ok(snapshot)
    }

    /// Smallest series length that yields every indicator for two samples
    pub fn required_history(&self) -> usize {
        let p = &self.params;
        [
            p.rsi_period + 2,
            p.rsi_period + p.stoch_period + p.stoch_smooth - 1,
            p.macd_slow + 1,
            p.macd_slow + p.macd_signal - 1,
            p.ema_short,
            p.ema_long,
            p.atr_period + 1,
            p.bb_period,
            p.momentum_lag + 1,
            p.volume_avg_period,
            p.adx_period * 2,
            p.cci_period,
            p.williams_period,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

fn first_non_finite(s: &IndicatorSnapshot) -> Option<&'static str> {
    [
        ("rsi", s.rsi),
        ("prev_rsi", s.prev_rsi),
        ("stoch_rsi", s.stoch_rsi),
        ("macd", s.macd),
        ("prev_macd", s.prev_macd),
        ("macd_signal", s.macd_signal),
        ("ema_short", s.ema_short),
        ("ema_long", s.ema_long),
        ("atr", s.atr),
        ("bb_upper", s.bb_upper),
        ("bb_lower", s.bb_lower),
        ("momentum", s.momentum),
        ("volume_avg", s.volume_avg),
        ("obv", s.obv),
        ("adx", s.adx),
        ("cci", s.cci),
        ("williams_r", s.williams_r),
    ]
    .into_iter()
    .find(|(_, v)| !v.is_finite())
    .map(|(name, _)| name)
}
