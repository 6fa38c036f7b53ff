//! Holdout metric computation and the non-negotiable champion/candidate
//! promotion gate. Grounded in `training/evaluator.py`; the consistency
//! subsampling is reimplemented over `rand_chacha::ChaCha8Rng` (see
//! `dataset_builder`'s module doc for why bit-for-bit parity with
//! `random.Random` is not the goal — reproducibility is scoped to this
//! crate's own seeded runs).

use crate::domain::{EvaluationMetrics, MarketRegime, PromotionDecision};
use crate::error::PipelineError;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoldoutPrediction {
    pub regime: MarketRegime,
    pub predicted_profitable: bool,
    pub actual_profitable: bool,
    pub confidence: f64,
    pub abstained: bool,
}

pub struct Evaluator {
    seed: u64,
}

impl Evaluator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn compute_metrics(&self, predictions: &[HoldoutPrediction]) -> Result<EvaluationMetrics, PipelineError> {
        if predictions.is_empty() {
            return Err(PipelineError::EmptyPredictionSet);
        }

        let signal_rows: Vec<&HoldoutPrediction> = predictions.iter().filter(|p| !p.abstained).collect();
        let total = predictions.len();
        let signal_total = signal_rows.len().max(1);
        let matches = signal_rows.iter().filter(|p| p.predicted_profitable == p.actual_profitable).count();
        let signal_accuracy = matches as f64 / signal_total as f64;
        let abstain_rate = (total - signal_rows.len()) as f64 / total as f64;

        let mut brier_sum = 0.0;
        for row in predictions {
            let probability = if row.abstained {
                0.5
            } else if row.predicted_profitable {
                row.confidence
            } else {
                1.0 - row.confidence
            };
            let target = if row.actual_profitable { 1.0 } else { 0.0 };
            brier_sum += (probability - target).powi(2);
        }
        let brier_score = brier_sum / total as f64;

        let mut regime_accuracy = HashMap::new();
        for regime in MarketRegime::ALL {
            let regime_rows: Vec<&&HoldoutPrediction> = signal_rows.iter().filter(|p| p.regime == regime).collect();
            if regime_rows.is_empty() {
                regime_accuracy.insert(regime, 0.0);
                continue;
            }
            let regime_matches = regime_rows.iter().filter(|p| p.predicted_profitable == p.actual_profitable).count();
            regime_accuracy.insert(regime, regime_matches as f64 / regime_rows.len() as f64);
        }

        let consistency_variance = self.consistency_variance(predictions);

        Ok(EvaluationMetrics { signal_accuracy, abstain_rate, brier_score, regime_accuracy, consistency_variance })
    }

    /// Draws 5 subsamples of 70% of `predictions` with a fixed seed and
    /// returns the population variance of their non-abstained accuracies.
    fn consistency_variance(&self, predictions: &[HoldoutPrediction]) -> f64 {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let sample_size = ((predictions.len() as f64) * 0.7).ceil().max(1.0) as usize;
        let sample_size = sample_size.min(predictions.len());

        let mut accuracies = Vec::with_capacity(5);
        for _ in 0..5 {
            let indices = rand::seq::index::sample(&mut rng, predictions.len(), sample_size);
            let signals: Vec<&HoldoutPrediction> =
                indices.iter().map(|i| &predictions[i]).filter(|p| !p.abstained).collect();
            if signals.is_empty() {
                accuracies.push(0.0);
                continue;
            }
            let matches = signals.iter().filter(|p| p.predicted_profitable == p.actual_profitable).count();
            accuracies.push(matches as f64 / signals.len() as f64);
        }
        let mean = accuracies.iter().sum::<f64>() / accuracies.len() as f64;
        accuracies.iter().map(|a| (a - mean).powi(2)).sum::<f64>() / accuracies.len() as f64
    }

    /// Applies the non-negotiable promotion criteria: a candidate must
    /// clear every check, each failure surfaces its own reason string.
    pub fn evaluate_promotion(
        &self,
        champion: &EvaluationMetrics,
        candidate: &EvaluationMetrics,
        champion_dataset_version: &str,
        candidate_dataset_version: &str,
    ) -> PromotionDecision {
        let mut reasons = Vec::new();

        if candidate.signal_accuracy - champion.signal_accuracy < 0.02 {
            reasons.push("Signal accuracy improvement is below 2%.".to_string());
        }
        if candidate.brier_score > champion.brier_score {
            reasons.push("Brier score degraded versus champion.".to_string());
        }
        if !(0.15..=0.40).contains(&candidate.abstain_rate) {
            reasons.push("Candidate abstain rate is outside healthy 15%-40% range.".to_string());
        }
        for regime in MarketRegime::ALL {
            let champion_score = champion.regime_accuracy.get(&regime).copied().unwrap_or(0.0);
            let candidate_score = candidate.regime_accuracy.get(&regime).copied().unwrap_or(0.0);
            if champion_score - candidate_score > 0.05 {
                reasons.push(format!("Regime degradation exceeds 5% for {}.", regime.as_str()));
            }
        }
        if candidate.consistency_variance >= 0.05 {
            reasons.push("Candidate consistency variance is not stable (<0.05 required).".to_string());
        }
        if extract_numeric_version(candidate_dataset_version) <= extract_numeric_version(champion_dataset_version) {
            reasons.push("Candidate dataset_version must be newer than champion.".to_string());
        }

        PromotionDecision { approved: reasons.is_empty(), reasons }
    }
}

/// Extracts the first contiguous run of decimal digits from `value`; `-1`
/// if none is present (so an un-versioned string never out-ranks a real one).
fn extract_numeric_version(value: &str) -> i64 {
    let digits: String = value.chars().skip_while(|c| !c.is_ascii_digit()).take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(-1)
}
