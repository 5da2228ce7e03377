//! Technical indicators as pure functions over price slices
//!
//! Every function returns a right-aligned series: the last element belongs to
//! the last input sample and warm-up samples are omitted. An empty vector
//! means there was not enough data (or a zero period).

use crate::types::Candle;

/// Simple moving average
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    values
        .windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect()
}

/// Exponential moving average.
///
/// Multiplier `k = 2 / (period + 1)`, seeded with the SMA of the first
/// `period` values.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut result = Vec::with_capacity(values.len() - period + 1);
    result.push(seed);
    let mut ema = seed;
    for &value in &values[period..] {
        ema = (value - ema) * multiplier + ema;
        result.push(ema);
    }
    result
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            return 50.0; // No movement = neutral
        }
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// Relative Strength Index using Wilder's smoothing
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let p = period as f64;

    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / p;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / p;

    let mut result = Vec::with_capacity(changes.len() - period + 1);
    result.push(rsi_from_averages(avg_gain, avg_loss));

    for &change in &changes[period..] {
        avg_gain = (avg_gain * (p - 1.0) + change.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-change).max(0.0)) / p;
        result.push(rsi_from_averages(avg_gain, avg_loss));
    }
    result
}

/// Stochastic RSI %K: position of RSI inside its `period` range, smoothed
/// with an SMA of `smooth` samples. Output is in 0.0..=1.0.
pub fn stoch_rsi_k(rsi: &[f64], period: usize, smooth: usize) -> Vec<f64> {
    if period == 0 || rsi.len() < period {
        return Vec::new();
    }

    let raw: Vec<f64> = rsi
        .windows(period)
        .map(|w| {
            let current = w[w.len() - 1];
            let min = w.iter().copied().fold(f64::INFINITY, f64::min);
            let max = w.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let range = max - min;
            if range == 0.0 {
                0.5
            } else {
                (current - min) / range
            }
        })
        .collect();

    sma(&raw, smooth.max(1))
}

/// MACD line and its signal line (both right-aligned)
#[derive(Debug, Clone, Default)]
pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
}

pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    if fast == 0 || fast > slow {
        return Macd::default();
    }

    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    if slow_ema.is_empty() {
        return Macd::default();
    }

    // fast_ema is longer by (slow - fast); align on the right
    let offset = slow - fast;
    let line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(i, slow_val)| fast_ema[i + offset] - slow_val)
        .collect();
    let signal = ema(&line, signal);

    Macd { line, signal }
}

/// True range for every candle after the first
fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .windows(2)
        .map(|w| {
            let (prev, curr) = (&w[0], &w[1]);
            (curr.high - curr.low)
                .max((curr.high - prev.close).abs())
                .max((curr.low - prev.close).abs())
        })
        .collect()
}

/// Wilder's running average: first value is the mean of `period` inputs
fn wilder_average(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let p = period as f64;
    let mut avg = values[..period].iter().sum::<f64>() / p;
    let mut result = Vec::with_capacity(values.len() - period + 1);
    result.push(avg);
    for &value in &values[period..] {
        avg = (avg * (p - 1.0) + value) / p;
        result.push(avg);
    }
    result
}

/// Average True Range (Wilder's smoothing)
pub fn atr(candles: &[Candle], period: usize) -> Vec<f64> {
    wilder_average(&true_ranges(candles), period)
}

/// Bollinger Bands (SMA with population standard deviation)
#[derive(Debug, Clone, Default)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger(closes: &[f64], period: usize, multiplier: f64) -> BollingerBands {
    if period == 0 || closes.len() < period {
        return BollingerBands::default();
    }

    let mut bands = BollingerBands::default();
    for window in closes.windows(period) {
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance = window.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / period as f64;
        let std = variance.sqrt();
        bands.upper.push(mean + multiplier * std);
        bands.middle.push(mean);
        bands.lower.push(mean - multiplier * std);
    }
    bands
}

/// Price momentum: close[t] - close[t - lag]
pub fn momentum(closes: &[f64], lag: usize) -> Vec<f64> {
    if lag == 0 || closes.len() <= lag {
        return Vec::new();
    }

    closes
        .iter()
        .skip(lag)
        .zip(closes.iter())
        .map(|(current, past)| current - past)
        .collect()
}

/// On Balance Volume.
///
/// A lower close subtracts the candle's volume; anything else (including the
/// first candle and unchanged closes) adds it.
pub fn obv(candles: &[Candle]) -> Vec<f64> {
    let mut result = Vec::with_capacity(candles.len());
    let mut total = 0.0;
    for (i, candle) in candles.iter().enumerate() {
        let falling = i > 0 && candle.close < candles[i - 1].close;
        total += if falling { -candle.volume } else { candle.volume };
        result.push(total);
    }
    result
}

/// Average Directional Index (Wilder).
///
/// Needs at least `2 * period` candles.
pub fn adx(candles: &[Candle], period: usize) -> Vec<f64> {
    if period == 0 || candles.len() < period * 2 {
        return Vec::new();
    }

    let trs = true_ranges(candles);
    let (plus_dm, minus_dm): (Vec<f64>, Vec<f64>) = candles
        .windows(2)
        .map(|w| {
            let (prev, curr) = (&w[0], &w[1]);
            let up_move = curr.high - prev.high;
            let down_move = prev.low - curr.low;
            let plus = if up_move > down_move && up_move > 0.0 {
                up_move
            } else {
                0.0
            };
            let minus = if down_move > up_move && down_move > 0.0 {
                down_move
            } else {
                0.0
            };
            (plus, minus)
        })
        .unzip();

    let p = period as f64;
    let mut smoothed_tr = trs[..period].iter().sum::<f64>();
    let mut smoothed_plus = plus_dm[..period].iter().sum::<f64>();
    let mut smoothed_minus = minus_dm[..period].iter().sum::<f64>();

    let dx = |tr: f64, plus: f64, minus: f64| -> f64 {
        if tr == 0.0 {
            return 0.0;
        }
        let plus_di = 100.0 * plus / tr;
        let minus_di = 100.0 * minus / tr;
        let di_sum = plus_di + minus_di;
        if di_sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / di_sum
        }
    };

    let mut dx_values = Vec::with_capacity(trs.len() - period + 1);
    dx_values.push(dx(smoothed_tr, smoothed_plus, smoothed_minus));

    for i in period..trs.len() {
        smoothed_tr = smoothed_tr - smoothed_tr / p + trs[i];
        smoothed_plus = smoothed_plus - smoothed_plus / p + plus_dm[i];
        smoothed_minus = smoothed_minus - smoothed_minus / p + minus_dm[i];
        dx_values.push(dx(smoothed_tr, smoothed_plus, smoothed_minus));
    }

    wilder_average(&dx_values, period)
}

/// Commodity Channel Index with the usual 0.015 constant
pub fn cci(candles: &[Candle], period: usize) -> Vec<f64> {
    if period == 0 || candles.len() < period {
        return Vec::new();
    }

    let typical: Vec<f64> = candles.iter().map(Candle::typical_price).collect();
    typical
        .windows(period)
        .map(|w| {
            let mean = w.iter().sum::<f64>() / period as f64;
            let mean_dev = w.iter().map(|tp| (tp - mean).abs()).sum::<f64>() / period as f64;
            if mean_dev == 0.0 {
                0.0
            } else {
                (w[w.len() - 1] - mean) / (0.015 * mean_dev)
            }
        })
        .collect()
}

/// Williams %R in -100..=0
pub fn williams_r(candles: &[Candle], period: usize) -> Vec<f64> {
    if period == 0 || candles.len() < period {
        return Vec::new();
    }

    candles
        .windows(period)
        .map(|w| {
            let highest = w.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
            let lowest = w.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
            let range = highest - lowest;
            if range == 0.0 {
                -50.0
            } else {
                -100.0 * (highest - w[w.len() - 1].close) / range
            }
        })
        .collect()
}

/// Rolling minimum over a trailing window
pub fn rolling_min(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }
    values
        .windows(window)
        .map(|w| w.iter().copied().fold(f64::INFINITY, f64::min))
        .collect()
}

/// Rolling maximum over a trailing window
pub fn rolling_max(values: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || values.len() < window {
        return Vec::new();
    }
    values
        .windows(window)
        .map(|w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        .collect()
}
