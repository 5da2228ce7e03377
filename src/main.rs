//! CoinScan - multi-timeframe market scanner
//!
//! Usage:
//!   coinscan [scan [MIN_SCORE] [MAX_INSTRUMENTS]]
//!   coinscan analyze SYMBOL

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use coinscan::config::{AppConfig, LoggingConfig};
use coinscan::market_data::{BinanceSource, CandleSource};
use coinscan::scanner::{best_by_score, rank_by_score, ScanEvent, Scanner};

#[derive(Debug, PartialEq)]
enum Command {
    Scan {
        min_score: Option<f64>,
        max_instruments: Option<usize>,
    },
    Analyze {
        symbol: String,
    },
}

impl Command {
    fn parse(args: &[String]) -> Result<Self> {
        match args.first().map(String::as_str) {
            None => Ok(Command::Scan {
                min_score: None,
                max_instruments: None,
            }),
            Some("scan") => {
                let min_score = args
                    .get(1)
                    .map(|s| s.parse::<f64>())
                    .transpose()
                    .context("MIN_SCORE must be a number")?;
                let max_instruments = args
                    .get(2)
                    .map(|s| s.parse::<usize>())
                    .transpose()
                    .context("MAX_INSTRUMENTS must be a positive integer")?;
                Ok(Command::Scan {
                    min_score,
                    max_instruments,
                })
            }
            Some("analyze") => match args.get(1) {
                Some(symbol) => Ok(Command::Analyze {
                    symbol: symbol.to_uppercase(),
                }),
                None => bail!("usage: coinscan analyze SYMBOL"),
            },
            Some(other) => bail!("unknown command: {} (expected scan or analyze)", other),
        }
    }
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    // Results go to stdout; logs stay on stderr
    if config.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = Command::parse(&args)?;

    info!("🚀 Starting CoinScan v{}", env!("CARGO_PKG_VERSION"));
    info!(config = %config, "Configuration loaded");

    let source: Arc<dyn CandleSource> = Arc::new(BinanceSource::from_config(&config.data_source)?);

    match command {
        Command::Analyze { symbol } => {
            let scanner = Scanner::from_config(source, &config)?;
            let result = scanner
                .analyzer()
                .analyze(&symbol)
                .await
                .with_context(|| format!("No result for {}", symbol))?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Scan {
            min_score,
            max_instruments,
        } => {
            let min_score = min_score.unwrap_or(config.scanner.min_score);
            let max_instruments = max_instruments.unwrap_or(config.scanner.max_instruments);

            // Ctrl-C stops new instruments; in-flight ones finish
            let (cancel_tx, cancel_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("🛑 Ctrl-C received, finishing in-flight instruments");
                    let _ = cancel_tx.send(true);
                }
            });

            let (event_tx, mut event_rx) = mpsc::channel::<ScanEvent>(64);
            let consumer = tokio::spawn(async move {
                while let Some(event) = event_rx.recv().await {
                    match event {
                        ScanEvent::Qualified(result) => {
                            info!(symbol = %result.symbol, score = result.score, "📈 Candidate")
                        }
                        ScanEvent::Skipped { .. } => {}
                        ScanEvent::Finished { scanned, qualified } => {
                            info!(scanned, qualified, "Scan summary")
                        }
                    }
                }
            });

            let scanner = Scanner::from_config(source, &config)?
                .with_event_sink(event_tx)
                .with_cancellation(cancel_rx);
            let results = scanner.scan(min_score, max_instruments).await?;
            drop(scanner);
            let _ = consumer.await;

            match best_by_score(&results) {
                Some(best) => println!("Best: {}", best.summary()),
                None => println!("No instrument reached score {:.1}", min_score),
            }
            for result in rank_by_score(results) {
                println!("  {}", result.summary());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_default_is_scan() {
        assert_eq!(
            Command::parse(&[]).unwrap(),
            Command::Scan {
                min_score: None,
                max_instruments: None
            }
        );
    }

    #[test]
    fn test_parse_scan_arguments() {
        assert_eq!(
            Command::parse(&args(&["scan", "9.5", "20"])).unwrap(),
            Command::Scan {
                min_score: Some(9.5),
                max_instruments: Some(20)
            }
        );
        assert!(Command::parse(&args(&["scan", "high"])).is_err());
    }

    #[test]
    fn test_parse_analyze() {
        assert_eq!(
            Command::parse(&args(&["analyze", "btcusdt"])).unwrap(),
            Command::Analyze {
                symbol: "BTCUSDT".to_string()
            }
        );
        assert!(Command::parse(&args(&["analyze"])).is_err());
        assert!(Command::parse(&args(&["trade"])).is_err());
    }
}
