//! Price levels: Fibonacci retracements and rolling support/resistance

use serde::Deserialize;

use crate::features::indicators::{rolling_max, rolling_min};
use crate::types::{Candle, PriceLevels};

/// Retracement fractions, measured from the top of the range
pub const FIB_FRACTIONS: [f64; 4] = [0.236, 0.382, 0.5, 0.618];

/// Level calculator windows
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LevelParams {
    /// Samples used for the high/low retracement range
    pub fib_lookback: usize,
    /// Trailing window for support/resistance
    pub sr_window: usize,
}

impl Default for LevelParams {
    fn default() -> Self {
        Self {
            fib_lookback: 100,
            sr_window: 20,
        }
    }
}

/// Retracement levels as (fib_0, fib_23_6, fib_38_2, fib_50, fib_61_8, fib_100).
///
/// Uses the last `lookback` candles, or all of them when fewer are given.
pub fn fibonacci_levels(candles: &[Candle], lookback: usize) -> Option<[f64; 6]> {
    let recent = &candles[candles.len().saturating_sub(lookback.max(1))..];
    if recent.is_empty() {
        return None;
    }

    let high = recent.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let low = recent.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let diff = high - low;
    let level = |fraction: f64| high - fraction * diff;

    Some([
        low,
        level(FIB_FRACTIONS[0]),
        level(FIB_FRACTIONS[1]),
        level(FIB_FRACTIONS[2]),
        level(FIB_FRACTIONS[3]),
        high,
    ])
}

/// Rolling (support, resistance) at the latest candle.
///
/// The window shrinks to the available history when it is larger.
pub fn support_resistance(candles: &[Candle], window: usize) -> Option<(f64, f64)> {
    let window = window.max(1).min(candles.len());
    if window == 0 {
        return None;
    }

    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let support = *rolling_min(&lows, window).last()?;
    let resistance = *rolling_max(&highs, window).last()?;
    Some((support, resistance))
}

impl PriceLevels {
    /// Compute retracement and support/resistance levels (unrounded)
    pub fn compute(candles: &[Candle], params: &LevelParams) -> Option<Self> {
        let [fib_0, fib_23_6, fib_38_2, fib_50, fib_61_8, fib_100] =
            fibonacci_levels(candles, params.fib_lookback)?;
        let (support, resistance) = support_resistance(candles, params.sr_window)?;

        Some(Self {
            fib_0,
            fib_23_6,
            fib_38_2,
            fib_50,
            fib_61_8,
            fib_100,
            support,
            resistance,
        })
    }
}
