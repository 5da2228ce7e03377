//! Error taxonomy for the analysis pipeline
//!
//! Validation, indicator and scoring failures are deterministic and local to
//! one series. Data-source failures are the only non-deterministic class and
//! never leave the instrument that produced them.

use thiserror::Error;

use crate::types::Timeframe;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Series shorter than the minimum usable history
    #[error("insufficient history: need {required} candles, got {actual}")]
    InsufficientHistory { required: usize, actual: usize },

    /// Missing, non-numeric or out-of-order sample
    #[error("invalid sample at index {index}: {reason}")]
    InvalidSample { index: usize, reason: String },

    /// Fetch failed or timed out
    #[error("data source unavailable for {symbol} {timeframe}: {reason}")]
    DataSourceUnavailable {
        symbol: String,
        timeframe: Timeframe,
        reason: String,
    },

    /// One of the required timeframes failed, so the instrument has no composite
    #[error("{symbol}: timeframe {timeframe} failed: {source}")]
    PartialTimeframeFailure {
        symbol: String,
        timeframe: Timeframe,
        #[source]
        source: Box<AnalysisError>,
    },
}

impl AnalysisError {
    pub fn invalid_sample(index: usize, reason: impl Into<String>) -> Self {
        AnalysisError::InvalidSample {
            index,
            reason: reason.into(),
        }
    }

    /// True for failures caused by the data source rather than the data itself
    pub fn is_transient(&self) -> bool {
        match self {
            AnalysisError::DataSourceUnavailable { .. } => true,
            AnalysisError::PartialTimeframeFailure { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;
