//! CoinScan Library
//!
//! Multi-timeframe technical-analysis scoring and market scanning

pub mod config;
pub mod error;
pub mod features;
pub mod market_data;
pub mod scanner;
pub mod scoring;
pub mod types;
