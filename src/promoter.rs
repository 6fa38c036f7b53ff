//! Resolves promotion after the evaluation gate and a shadow-deployment
//! agreement window. Grounded in `training/promoter.py`.

use crate::domain::PromotionDecision;
use chrono::{DateTime, Duration, Utc};

pub const SHADOW_DURATION_HOURS: i64 = 48;
pub const MIN_SHADOW_AGREEMENT: f64 = 0.85;
pub const RETAIN_PREVIOUS_CHAMPION_DAYS: u32 = 90;

#[derive(Debug, Clone, PartialEq)]
pub struct ShadowDeploymentResult {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub agreement_rate: f64,
    pub total_samples: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromotionResult {
    pub promoted: bool,
    pub reason: String,
    pub retain_previous_for_days: u32,
    pub reset_failure_streak: bool,
}

#[derive(Default)]
pub struct Promoter;

impl Promoter {
    pub fn new() -> Self {
        Self
    }

    pub fn begin_shadow_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Utc::now();
        (start, start + Duration::hours(SHADOW_DURATION_HOURS))
    }

    pub fn resolve(&self, evaluation_decision: &PromotionDecision, shadow_result: &ShadowDeploymentResult) -> PromotionResult {
        if !evaluation_decision.approved {
            return PromotionResult {
                promoted: false,
                reason: "Evaluation gate rejected candidate.".to_string(),
                retain_previous_for_days: RETAIN_PREVIOUS_CHAMPION_DAYS,
                reset_failure_streak: false,
            };
        }
        if shadow_result.agreement_rate < MIN_SHADOW_AGREEMENT {
            return PromotionResult {
                promoted: false,
                reason: "Shadow agreement below 85%; human review required.".to_string(),
                retain_previous_for_days: RETAIN_PREVIOUS_CHAMPION_DAYS,
                reset_failure_streak: false,
            };
        }
        PromotionResult {
            promoted: true,
            reason: "Candidate promoted to champion after successful shadow deployment.".to_string(),
            retain_previous_for_days: RETAIN_PREVIOUS_CHAMPION_DAYS,
            reset_failure_streak: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shadow(agreement_rate: f64) -> ShadowDeploymentResult {
        let start = Utc::now();
        ShadowDeploymentResult { started_at: start, ended_at: start + Duration::hours(48), agreement_rate, total_samples: 500 }
    }

    #[test]
    fn evaluation_rejection_blocks_promotion_regardless_of_shadow() {
        let promoter = Promoter::new();
        let result = promoter.resolve(&PromotionDecision { approved: false, reasons: vec!["bad".into()] }, &shadow(0.99));
        assert!(!result.promoted);
        assert_eq!(result.reason, "Evaluation gate rejected candidate.");
        assert!(!result.reset_failure_streak);
    }

    #[test]
    fn low_shadow_agreement_requires_human_review() {
        let promoter = Promoter::new();
        let result = promoter.resolve(&PromotionDecision { approved: true, reasons: vec![] }, &shadow(0.80));
        assert!(!result.promoted);
        assert!(result.reason.to_lowercase().contains("human review"));
    }

    #[test]
    fn clears_both_gates_and_promotes() {
        let promoter = Promoter::new();
        let result = promoter.resolve(&PromotionDecision { approved: true, reasons: vec![] }, &shadow(0.9));
        assert!(result.promoted);
        assert!(result.reset_failure_streak);
        assert_eq!(result.retain_previous_for_days, 90);
    }

    #[test]
    fn shadow_window_spans_48_hours() {
        let promoter = Promoter::new();
        let (start, end) = promoter.begin_shadow_window();
        assert_eq!((end - start).num_hours(), 48);
    }
}
