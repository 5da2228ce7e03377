//! Configuration management for CoinScan
//!
//! Loads from config files + environment variables via .env

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::features::{IndicatorParams, LevelParams};
use crate::market_data::binance::{BINANCE_REST_URL, MAX_KLINES_LIMIT};
use crate::types::Timeframe;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub scanner: ScannerConfig,
    pub data_source: DataSourceConfig,
    pub indicators: IndicatorParams,
    pub levels: LevelParams,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// Minimum composite score kept by a scan
    pub min_score: f64,
    /// Upper bound on instruments analyzed per scan
    pub max_instruments: usize,
    /// Instruments analyzed at once
    pub concurrency: usize,
    /// Scan cache time-to-live in seconds
    pub cache_ttl_secs: u64,
    /// Timeframes to analyze, shortest first (1h, 4h, 1d)
    pub timeframes: Vec<String>,
}

impl ScannerConfig {
    /// Parse the configured timeframe strings, preserving order
    pub fn timeframes(&self) -> Result<Vec<Timeframe>> {
        if self.timeframes.is_empty() {
            bail!("scanner.timeframes must not be empty");
        }

        self.timeframes
            .iter()
            .map(|tf| {
                Timeframe::from_str(tf)
                    .with_context(|| format!("Unknown timeframe in scanner.timeframes: {}", tf))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataSourceConfig {
    /// Binance REST base URL
    pub base_url: String,
    /// Quote asset used to build the universe (USDT)
    pub quote_asset: String,
    /// Candles requested per timeframe
    pub candle_limit: usize,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Delay between fetches of the same instrument in milliseconds
    pub fetch_pacing_ms: u64,
    /// Retries after a failed or timed-out fetch
    pub fetch_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let defaults = IndicatorParams::default();
        let levels = LevelParams::default();

        let config = Config::builder()
            // Scanner defaults
            .set_default("scanner.min_score", 8.0)?
            .set_default("scanner.max_instruments", 100)?
            .set_default("scanner.concurrency", 4)?
            .set_default("scanner.cache_ttl_secs", 300)?
            .set_default("scanner.timeframes", vec!["1h", "4h", "1d"])?
            // Data source defaults
            .set_default("data_source.base_url", BINANCE_REST_URL)?
            .set_default("data_source.quote_asset", "USDT")?
            .set_default("data_source.candle_limit", 200)?
            .set_default("data_source.request_timeout_ms", 10_000)?
            .set_default("data_source.fetch_pacing_ms", 150)?
            .set_default("data_source.fetch_retries", 1)?
            // Indicator defaults
            .set_default("indicators.rsi_period", defaults.rsi_period as i64)?
            .set_default("indicators.stoch_period", defaults.stoch_period as i64)?
            .set_default("indicators.stoch_smooth", defaults.stoch_smooth as i64)?
            .set_default("indicators.macd_fast", defaults.macd_fast as i64)?
            .set_default("indicators.macd_slow", defaults.macd_slow as i64)?
            .set_default("indicators.macd_signal", defaults.macd_signal as i64)?
            .set_default("indicators.ema_short", defaults.ema_short as i64)?
            .set_default("indicators.ema_long", defaults.ema_long as i64)?
            .set_default("indicators.atr_period", defaults.atr_period as i64)?
            .set_default("indicators.bb_period", defaults.bb_period as i64)?
            .set_default("indicators.bb_std", defaults.bb_std)?
            .set_default("indicators.momentum_lag", defaults.momentum_lag as i64)?
            .set_default(
                "indicators.volume_avg_period",
                defaults.volume_avg_period as i64,
            )?
            .set_default("indicators.adx_period", defaults.adx_period as i64)?
            .set_default("indicators.cci_period", defaults.cci_period as i64)?
            .set_default("indicators.williams_period", defaults.williams_period as i64)?
            // Level defaults
            .set_default("levels.fib_lookback", levels.fib_lookback as i64)?
            .set_default("levels.sr_window", levels.sr_window as i64)?
            // Logging defaults
            .set_default("logging.level", "coinscan=info")?
            .set_default("logging.json", false)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (COINSCAN__*)
            .add_source(Environment::with_prefix("COINSCAN").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;
        Ok(app_config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        self.scanner.timeframes()?;

        if self.scanner.concurrency == 0 {
            bail!("scanner.concurrency must be at least 1");
        }
        if self.data_source.candle_limit < crate::types::MIN_HISTORY {
            bail!(
                "data_source.candle_limit must be at least {} (got {})",
                crate::types::MIN_HISTORY,
                self.data_source.candle_limit
            );
        }
        if self.data_source.candle_limit > MAX_KLINES_LIMIT {
            bail!(
                "data_source.candle_limit must be at most {} (got {})",
                MAX_KLINES_LIMIT,
                self.data_source.candle_limit
            );
        }
        if self.indicators.macd_fast == 0 || self.indicators.macd_fast >= self.indicators.macd_slow
        {
            bail!("indicators.macd_fast must be in 1..macd_slow");
        }

        Ok(())
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "source={} quote={} timeframes={:?} min_score={:.1} max_instruments={} concurrency={} cache_ttl={}s",
            self.data_source.base_url,
            self.data_source.quote_asset,
            self.scanner.timeframes,
            self.scanner.min_score,
            self.scanner.max_instruments,
            self.scanner.concurrency,
            self.scanner.cache_ttl_secs
        )
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scanner: ScannerConfig {
                min_score: 8.0,
                max_instruments: 100,
                concurrency: 4,
                cache_ttl_secs: 300,
                timeframes: Timeframe::DEFAULT_SET
                    .iter()
                    .map(|tf| tf.as_str().to_string())
                    .collect(),
            },
            data_source: DataSourceConfig {
                base_url: BINANCE_REST_URL.to_string(),
                quote_asset: "USDT".to_string(),
                candle_limit: 200,
                request_timeout_ms: 10_000,
                fetch_pacing_ms: 150,
                fetch_retries: 1,
            },
            indicators: IndicatorParams::default(),
            levels: LevelParams::default(),
            logging: LoggingConfig {
                level: "coinscan=info".to_string(),
                json: false,
            },
        }
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
