//! Binance REST client for historical klines and the tradable universe

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::DataSourceConfig;
use crate::error::{AnalysisError, AnalysisResult};
use crate::market_data::CandleSource;
use crate::types::{Candle, Timeframe};

pub const BINANCE_REST_URL: &str = "https://api.binance.com";
const KLINES_PATH: &str = "/api/v3/klines";
const EXCHANGE_INFO_PATH: &str = "/api/v3/exchangeInfo";
/// Largest `limit` the klines endpoint accepts
pub const MAX_KLINES_LIMIT: usize = 1000;

#[derive(Debug, Clone)]
pub struct BinanceSource {
    client: reqwest::Client,
    base_url: String,
    quote_asset: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    status: String,
    quote_asset: String,
}

impl BinanceSource {
    pub fn new(
        base_url: impl Into<String>,
        quote_asset: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            quote_asset: quote_asset.into(),
        })
    }

    pub fn from_config(config: &DataSourceConfig) -> Result<Self> {
        Self::new(
            config.base_url.clone(),
            config.quote_asset.clone(),
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    fn unavailable(symbol: &str, timeframe: Timeframe, reason: impl ToString) -> AnalysisError {
        AnalysisError::DataSourceUnavailable {
            symbol: symbol.to_string(),
            timeframe,
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl CandleSource for BinanceSource {
    fn name(&self) -> &'static str {
        "Binance"
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> AnalysisResult<Vec<Candle>> {
        let limit = count.min(MAX_KLINES_LIMIT);
        let url = format!("{}{}", self.base_url, KLINES_PATH);
        let limit_param = limit.to_string();

        tracing::debug!(
            symbol = %symbol,
            timeframe = %timeframe,
            limit,
            "📥 Fetching klines from Binance"
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", timeframe.as_str()),
                ("limit", limit_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Self::unavailable(symbol, timeframe, e))?;

        if !response.status().is_success() {
            return Err(Self::unavailable(
                symbol,
                timeframe,
                format!("Binance API returned error: {}", response.status()),
            ));
        }

        // [[open_time, open, high, low, close, volume, close_time, ...], ...]
        let klines: Vec<Vec<serde_json::Value>> = response
            .json()
            .await
            .map_err(|e| {
                Self::unavailable(symbol, timeframe, format!("bad klines payload: {}", e))
            })?;

        let candles = parse_klines(&klines)?;
        if candles.len() < count {
            return Err(AnalysisError::InsufficientHistory {
                required: count,
                actual: candles.len(),
            });
        }

        tracing::debug!(
            symbol = %symbol,
            timeframe = %timeframe,
            count = candles.len(),
            "✅ Klines fetched"
        );

        Ok(candles)
    }

    async fn list_instruments(&self) -> AnalysisResult<Vec<String>> {
        let url = format!("{}{}", self.base_url, EXCHANGE_INFO_PATH);
        let unavailable = |reason: String| AnalysisError::DataSourceUnavailable {
            symbol: "*".to_string(),
            timeframe: Timeframe::default(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(unavailable(format!(
                "Binance API returned error: {}",
                response.status()
            )));
        }

        let info: ExchangeInfo = response
            .json()
            .await
            .map_err(|e| unavailable(format!("bad exchangeInfo payload: {}", e)))?;

        let symbols = tradable_symbols(info, &self.quote_asset);
        tracing::info!(
            quote = %self.quote_asset,
            count = symbols.len(),
            "Loaded tradable instruments"
        );
        Ok(symbols)
    }
}

/// Parse the klines array-of-arrays payload; prices and volume arrive as strings
fn parse_klines(klines: &[Vec<serde_json::Value>]) -> AnalysisResult<Vec<Candle>> {
    klines
        .iter()
        .enumerate()
        .map(|(index, kline)| {
            if kline.len() < 6 {
                return Err(AnalysisError::invalid_sample(
                    index,
                    format!("kline has {} fields", kline.len()),
                ));
            }

            let open_time = kline[0]
                .as_i64()
                .ok_or_else(|| AnalysisError::invalid_sample(index, "missing open_time"))?;
            let number = |pos: usize, name: &str| -> AnalysisResult<f64> {
                kline[pos]
                    .as_str()
                    .and_then(|s| s.parse::<f64>().ok())
                    .or_else(|| kline[pos].as_f64())
                    .ok_or_else(|| {
                        AnalysisError::invalid_sample(index, format!("non-numeric {}", name))
                    })
            };

            Ok(Candle {
                open_time,
                open: number(1, "open")?,
                high: number(2, "high")?,
                low: number(3, "low")?,
                close: number(4, "close")?,
                volume: number(5, "volume")?,
            })
        })
        .collect()
}

fn tradable_symbols(info: ExchangeInfo, quote_asset: &str) -> Vec<String> {
    info.symbols
        .into_iter()
        .filter(|s| s.quote_asset == quote_asset && s.status == "TRADING")
        .map(|s| s.symbol)
        .collect()
}
