//! The regime classifier's statistical internals are out of scope for this
//! crate (a real implementation fits a hidden Markov model over realized
//! volatility, returns, and volume features). This module defines only the
//! typed boundary the rest of the pipeline depends on, plus a deterministic
//! placeholder suitable for tests and local runs.

use crate::domain::{MarketRegime, OhlcvCandle};

pub trait RegimeDetector: Send + Sync {
    fn current_regime(&self, candles: &[OhlcvCandle]) -> MarketRegime;
}

/// Classifies by realized volatility of close-to-close returns against two
/// fixed thresholds. Not a substitute for the statistical model this
/// collaborator boundary exists for.
pub struct VolatilityThresholdRegimeDetector {
    pub high_volatility_threshold: f64,
    pub trend_threshold: f64,
}

impl Default for VolatilityThresholdRegimeDetector {
    fn default() -> Self {
        Self { high_volatility_threshold: 0.03, trend_threshold: 0.01 }
    }
}

impl RegimeDetector for VolatilityThresholdRegimeDetector {
    fn current_regime(&self, candles: &[OhlcvCandle]) -> MarketRegime {
        if candles.len() < 2 {
            return MarketRegime::MeanReverting;
        }
        let returns: Vec<f64> = candles.windows(2).map(|w| (w[1].close - w[0].close) / w[0].close).collect();
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
        let volatility = variance.sqrt();

        if volatility >= self.high_volatility_threshold {
            MarketRegime::HighVolatility
        } else if mean >= self.trend_threshold {
            MarketRegime::TrendingBull
        } else if mean <= -self.trend_threshold {
            MarketRegime::TrendingBear
        } else {
            MarketRegime::MeanReverting
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn short_history_defaults_to_mean_reverting() {
        let detector = VolatilityThresholdRegimeDetector::default();
        assert_eq!(detector.current_regime(&[]), MarketRegime::MeanReverting);
    }

    #[test]
    fn rising_prices_classify_as_trending_bull() {
        let detector = VolatilityThresholdRegimeDetector::default();
        let candles: Vec<OhlcvCandle> = (0..10)
            .map(|i| OhlcvCandle::new(Utc::now(), 100.0 + i as f64, 101.0 + i as f64, 99.0 + i as f64, 100.0 + i as f64 * 1.02, 10.0).unwrap())
            .collect();
        assert_eq!(detector.current_regime(&candles), MarketRegime::TrendingBull);
    }
}
