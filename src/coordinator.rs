//! Weighted vote aggregation across agent responses, gated by the risk
//! agent's veto.

use crate::domain::{AgentResponse, AgentStatus, RiskAssessment, TradeDecision, TradeDirection};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub signal_timeout_seconds: u64,
    pub min_confidence: f64,
    pub default_position_size: f64,
    pub min_agent_weight: f64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            signal_timeout_seconds: 30,
            min_confidence: 0.60,
            default_position_size: 0.01,
            min_agent_weight: 0.05,
        }
    }
}

pub struct Coordinator {
    config: CoordinatorConfig,
    weights: HashMap<String, f64>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig, raw_weights: HashMap<String, f64>) -> Self {
        let weights = normalize_weights(&raw_weights, config.min_agent_weight);
        Self { config, weights }
    }

    pub fn aggregate(
        &self,
        task_id: impl Into<String>,
        asset: impl Into<String>,
        responses: &[AgentResponse],
        risk_assessment: &RiskAssessment,
    ) -> TradeDecision {
        let asset = asset.into();
        let mut votes: HashMap<TradeDirection, f64> = HashMap::new();

        for response in responses {
            if response.status != AgentStatus::Success || response.confidence < self.config.min_confidence {
                continue;
            }
            let weight = self.weights.get(&response.agent_id).copied().unwrap_or(self.config.min_agent_weight);
            *votes.entry(response.payload.direction()).or_insert(0.0) += response.confidence * weight;
        }

        // `Iterator::max_by` returns the *last* maximal element on ties, which
        // would break the declared-order tie-break; fold manually so the
        // first direction in `VOTE_ORDER` wins ties instead.
        let mut best: Option<(TradeDirection, f64)> = None;
        for d in TradeDirection::VOTE_ORDER {
            if let Some(v) = votes.get(&d) {
                let replace = match best {
                    Some((_, current)) => *v > current,
                    None => true,
                };
                if replace {
                    best = Some((d, *v));
                }
            }
        }
        let (direction, confidence) = best.unwrap_or((TradeDirection::Abstain, 0.0));

        let approved = risk_assessment.approved && direction.is_executable();
        let veto_reason = if approved { None } else { Some(risk_assessment.reason.clone()) };
        let position_size = if approved {
            self.config.default_position_size.min(risk_assessment.adjusted_size)
        } else {
            0.0
        };

        debug!(
            asset = %asset,
            direction = direction.as_str(),
            approved,
            "coordinator aggregated decision"
        );

        TradeDecision {
            task_id: task_id.into(),
            asset,
            direction,
            confidence: confidence.min(1.0),
            approved,
            veto_reason,
            position_size,
            weighted_votes: votes.into_iter().map(|(d, v)| (d.as_str().to_string(), v)).collect(),
        }
    }
}

/// Floor each weight at `min_agent_weight` and renormalize to sum to 1. If
/// all weights are non-positive after flooring, fall back to an even split.
fn normalize_weights(raw: &HashMap<String, f64>, min_agent_weight: f64) -> HashMap<String, f64> {
    if raw.is_empty() {
        return HashMap::new();
    }
    let floored: HashMap<String, f64> =
        raw.iter().map(|(k, v)| (k.clone(), v.max(min_agent_weight))).collect();
    let total: f64 = floored.values().sum();
    if total <= 0.0 {
        let even = 1.0 / floored.len() as f64;
        return floored.keys().map(|k| (k.clone(), even)).collect();
    }
    floored.into_iter().map(|(k, v)| (k, v / total)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BaseSignal, MarketRegime, Signal};
    use chrono::Utc;

    fn response(agent_id: &str, direction: TradeDirection, confidence: f64) -> AgentResponse {
        AgentResponse::new(
            agent_id,
            Utc::now(),
            "task-1",
            AgentStatus::Success,
            Signal::Base(BaseSignal::new("BTC-USD", direction).unwrap()),
            confidence,
            "reasoning",
            vec!["src".into()],
            10,
            "v1",
            MarketRegime::TrendingBull,
        )
        .unwrap()
    }

    #[test]
    fn empty_weights_yield_empty_map() {
        let coordinator = Coordinator::new(CoordinatorConfig::default(), HashMap::new());
        assert!(coordinator.weights.is_empty());
    }

    #[test]
    fn non_positive_weights_fall_back_to_even_split() {
        let mut raw = HashMap::new();
        raw.insert("a".to_string(), -1.0);
        raw.insert("b".to_string(), 0.0);
        let coordinator = Coordinator::new(CoordinatorConfig { min_agent_weight: 0.0, ..Default::default() }, raw);
        assert_eq!(coordinator.weights.get("a"), Some(&0.5));
        assert_eq!(coordinator.weights.get("b"), Some(&0.5));
    }

    #[test]
    fn veto_blocks_even_with_majority_buy_votes() {
        let mut raw = HashMap::new();
        raw.insert("technical".to_string(), 1.0);
        let coordinator = Coordinator::new(CoordinatorConfig::default(), raw);
        let responses = vec![response("technical", TradeDirection::Buy, 0.9)];
        let risk = RiskAssessment::new(false, "Daily drawdown breach: trading halted.", 0.0).unwrap();
        let decision = coordinator.aggregate("task-1", "BTC-USD", &responses, &risk);
        assert!(!decision.approved);
        assert_eq!(decision.veto_reason.as_deref(), Some("Daily drawdown breach: trading halted."));
        assert_eq!(decision.position_size, 0.0);
    }

    #[test]
    fn tie_breaks_by_declared_vote_order() {
        let mut raw = HashMap::new();
        raw.insert("a".to_string(), 1.0);
        raw.insert("b".to_string(), 1.0);
        let coordinator = Coordinator::new(CoordinatorConfig::default(), raw);
        let responses = vec![response("a", TradeDirection::Sell, 0.7), response("b", TradeDirection::Buy, 0.7)];
        let risk = RiskAssessment::new(true, "Approved", 1.0).unwrap();
        let decision = coordinator.aggregate("task-1", "BTC-USD", &responses, &risk);
        // equal weighted votes for buy and sell -> buy wins by declared order
        assert_eq!(decision.direction, TradeDirection::Buy);
    }

    #[test]
    fn no_successful_responses_abstains() {
        let coordinator = Coordinator::new(CoordinatorConfig::default(), HashMap::new());
        let risk = RiskAssessment::new(true, "Approved", 1.0).unwrap();
        let decision = coordinator.aggregate("task-1", "BTC-USD", &[], &risk);
        assert_eq!(decision.direction, TradeDirection::Abstain);
        assert!(!decision.approved);
    }
}
