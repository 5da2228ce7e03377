//! Timeframe scorer
//!
//! The score is a fold over an explicit list of (predicate, points) rules.
//! Every rule is evaluated; the two RSI bands cannot both match because their
//! predicates are disjoint.

use crate::error::{AnalysisError, AnalysisResult};
use crate::features::{IndicatorEngine, LevelParams};
use crate::types::{CandleSeries, IndicatorSnapshot, PriceLevels, PublishedFields, TimeframeResult};

/// A named scoring rule
pub struct ScoringRule {
    pub name: &'static str,
    pub points: u32,
    pub predicate: fn(&IndicatorSnapshot) -> bool,
}

impl std::fmt::Debug for ScoringRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringRule")
            .field("name", &self.name)
            .field("points", &self.points)
            .finish()
    }
}

pub const SCORING_RULES: &[ScoringRule] = &[
    ScoringRule {
        name: "rsi_oversold",
        points: 3,
        predicate: |s| s.rsi < 30.0,
    },
    ScoringRule {
        name: "rsi_soft",
        points: 1,
        predicate: |s| (30.0..50.0).contains(&s.rsi),
    },
    ScoringRule {
        name: "stoch_rsi_oversold",
        points: 2,
        predicate: |s| s.stoch_rsi < 0.2,
    },
    ScoringRule {
        name: "macd_above_signal",
        points: 2,
        predicate: |s| s.macd > s.macd_signal,
    },
    ScoringRule {
        name: "ema_uptrend",
        points: 2,
        predicate: |s| s.ema_short > s.ema_long,
    },
    ScoringRule {
        name: "volume_above_average",
        points: 1,
        predicate: |s| s.volume > s.volume_avg,
    },
    ScoringRule {
        name: "rsi_rising",
        points: 1,
        predicate: |s| s.rsi > s.prev_rsi,
    },
    ScoringRule {
        name: "macd_rising",
        points: 1,
        predicate: |s| s.macd > s.prev_macd,
    },
    ScoringRule {
        name: "adx_trending",
        points: 2,
        predicate: |s| s.adx > 25.0,
    },
    ScoringRule {
        name: "cci_oversold",
        points: 1,
        predicate: |s| s.cci < -100.0,
    },
    ScoringRule {
        name: "williams_oversold",
        points: 1,
        predicate: |s| s.williams_r < -80.0,
    },
];

/// Highest score a single timeframe can reach; the two RSI bands never add up
pub const MAX_SCORE: u32 = 16;

/// Score an indicator snapshot
pub fn score(snapshot: &IndicatorSnapshot) -> u32 {
    SCORING_RULES
        .iter()
        .filter(|rule| (rule.predicate)(snapshot))
        .map(|rule| rule.points)
        .sum()
}

/// Names of the rules that matched
pub fn matched_rules(snapshot: &IndicatorSnapshot) -> Vec<&'static str> {
    SCORING_RULES
        .iter()
        .filter(|rule| (rule.predicate)(snapshot))
        .map(|rule| rule.name)
        .collect()
}

/// Run indicators, levels and scoring for one validated series
pub fn score_timeframe(
    series: &CandleSeries,
    engine: &IndicatorEngine,
    level_params: &LevelParams,
) -> AnalysisResult<TimeframeResult> {
    let snapshot = engine.compute(series)?;
    let levels = PriceLevels::compute(series.candles(), level_params).ok_or(
        AnalysisError::InsufficientHistory {
            required: 1,
            actual: series.len(),
        },
    )?;
    let score = score(&snapshot);

    tracing::debug!(
        symbol = %series.symbol(),
        timeframe = %series.timeframe(),
        score,
        rules = ?matched_rules(&snapshot),
        "Timeframe scored"
    );

    Ok(TimeframeResult {
        timeframe: series.timeframe(),
        score,
        fields: PublishedFields::from_snapshot(&snapshot),
        levels: levels.rounded(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Snapshot where no rule matches
    fn neutral() -> IndicatorSnapshot {
        IndicatorSnapshot {
            close: 100.0,
            rsi: 60.0,
            prev_rsi: 65.0,
            stoch_rsi: 0.5,
            macd: -1.0,
            prev_macd: -0.5,
            macd_signal: 0.0,
            ema_short: 90.0,
            ema_long: 100.0,
            volume: 100.0,
            volume_avg: 200.0,
            adx: 15.0,
            cci: 0.0,
            williams_r: -50.0,
            ..Default::default()
        }
    }

    /// Snapshot where every rule (with the oversold RSI band) matches
    fn all_bullish() -> IndicatorSnapshot {
        IndicatorSnapshot {
            rsi: 25.0,
            prev_rsi: 20.0,
            stoch_rsi: 0.1,
            macd: 1.0,
            prev_macd: 0.5,
            macd_signal: 0.0,
            ema_short: 110.0,
            ema_long: 100.0,
            volume: 300.0,
            volume_avg: 200.0,
            adx: 30.0,
            cci: -150.0,
            williams_r: -90.0,
            ..neutral()
        }
    }

    #[test]
    fn test_neutral_scores_zero() {
        assert_eq!(score(&neutral()), 0);
        assert!(matched_rules(&neutral()).is_empty());
    }

    #[test]
    fn test_max_score() {
        assert_eq!(score(&all_bullish()), MAX_SCORE);
        assert_eq!(matched_rules(&all_bullish()).len(), SCORING_RULES.len() - 1);
    }

    #[test]
    fn test_rsi_bands_exclusive() {
        let mut s = neutral();
        s.rsi = 29.99;
        assert_eq!(matched_rules(&s), vec!["rsi_oversold"]);
        s.rsi = 30.0;
        assert_eq!(matched_rules(&s), vec!["rsi_soft"]);
        s.rsi = 49.99;
        assert_eq!(score(&s), 1);
        s.rsi = 50.0;
        assert_eq!(score(&s), 0);
    }

    fn tweak(apply: impl FnOnce(&mut IndicatorSnapshot)) -> u32 {
        let mut s = neutral();
        apply(&mut s);
        score(&s)
    }

    #[test]
    fn test_rule_points() {
        assert_eq!(tweak(|s| s.stoch_rsi = 0.19), 2);
        assert_eq!(tweak(|s| s.macd_signal = -2.0), 2);
        assert_eq!(tweak(|s| s.ema_short = 101.0), 2);
        assert_eq!(tweak(|s| s.volume = 201.0), 1);
        assert_eq!(tweak(|s| s.prev_rsi = 59.0), 1);
        assert_eq!(tweak(|s| s.prev_macd = -1.5), 1);
        assert_eq!(tweak(|s| s.adx = 25.1), 2);
        assert_eq!(tweak(|s| s.cci = -100.1), 1);
        assert_eq!(tweak(|s| s.williams_r = -80.1), 1);
    }

    #[test]
    fn test_thresholds_are_strict() {
        let total = tweak(|s| {
            s.adx = 25.0;
            s.cci = -100.0;
            s.williams_r = -80.0;
            s.stoch_rsi = 0.2;
            s.volume = s.volume_avg;
        });
        assert_eq!(total, 0);
    }

    #[test]
    fn test_monotonic_when_adding_conditions() {
        // Switch rules on one at a time; the score never decreases
        let mut s = neutral();
        let mut scores = vec![score(&s)];
        s.stoch_rsi = 0.1;
        scores.push(score(&s));
        s.macd_signal = -2.0;
        scores.push(score(&s));
        s.ema_short = 120.0;
        scores.push(score(&s));
        s.volume = 500.0;
        scores.push(score(&s));
        s.adx = 40.0;
        scores.push(score(&s));
        s.cci = -200.0;
        scores.push(score(&s));
        s.williams_r = -95.0;
        scores.push(score(&s));
        s.prev_rsi = 10.0;
        scores.push(score(&s));

        assert!(scores.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(*scores.last().unwrap(), 12);
    }

    #[test]
    fn test_score_is_bounded() {
        let rsi_values = [5.0, 29.0, 30.0, 45.0, 50.0, 95.0];
        for rsi in rsi_values {
            let mut s = all_bullish();
            s.rsi = rsi;
            assert!(score(&s) <= MAX_SCORE);
            assert!(score(&s) <= 17);
        }
    }

    #[test]
    fn test_scoring_does_not_mutate() {
        let s = all_bullish();
        let copy = s.clone();
        let _ = score(&s);
        assert_eq!(s, copy);
    }
}
