//! Hard-limit risk veto. Unlike `risk.rs` in the reference backend (which
//! sizes positions via Kelly/VaR), this agent enforces a small ordered set
//! of non-negotiable limits and never attempts to optimize size upward.

use crate::domain::{RiskAssessment, RiskContext};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RiskLimits {
    pub max_position_pct: f64,
    pub max_daily_drawdown_pct: f64,
    pub max_correlated_exposure_pct: f64,
    pub no_trade_event_window_minutes: i64,
    pub min_history_days: i64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_pct: 0.02,
            max_daily_drawdown_pct: 0.05,
            max_correlated_exposure_pct: 0.10,
            no_trade_event_window_minutes: 5,
            min_history_days: 30,
        }
    }
}

impl From<&crate::config::Config> for RiskLimits {
    fn from(cfg: &crate::config::Config) -> Self {
        Self {
            max_position_pct: cfg.max_position_pct,
            max_daily_drawdown_pct: cfg.max_daily_drawdown_pct,
            max_correlated_exposure_pct: cfg.max_correlated_exposure_pct,
            no_trade_event_window_minutes: cfg.no_trade_event_window_minutes,
            min_history_days: cfg.min_history_days,
        }
    }
}

pub struct RiskAgent {
    limits: RiskLimits,
}

impl RiskAgent {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    /// Evaluate a proposed position against the ordered set of hard
    /// limits. Checks are evaluated in this exact order and the first
    /// breach wins; an approval always carries an `adjusted_size` in
    /// `[0, 1]`.
    pub fn assess(&self, ctx: &RiskContext) -> RiskAssessment {
        let limits = &self.limits;

        if ctx.current_daily_drawdown_pct >= limits.max_daily_drawdown_pct {
            warn!(drawdown = ctx.current_daily_drawdown_pct, "risk veto: daily drawdown breach");
            return reject("Daily drawdown breach: trading halted.");
        }

        if ctx.minutes_to_major_event.abs() <= limits.no_trade_event_window_minutes {
            warn!(minutes_to_major_event = ctx.minutes_to_major_event, "risk veto: event window");
            return reject("Within major economic event no-trade window.");
        }

        if ctx.instrument_history_days < limits.min_history_days {
            warn!(history_days = ctx.instrument_history_days, "risk veto: insufficient history");
            return reject("Instrument has fewer than 30 days of history.");
        }

        if ctx.sector_exposure_pct > limits.max_correlated_exposure_pct {
            warn!(sector_exposure_pct = ctx.sector_exposure_pct, "risk veto: correlated exposure");
            return reject("Sector correlated exposure exceeds 10%.");
        }

        let max_position_value = ctx.portfolio_value * limits.max_position_pct;
        if ctx.proposed_position_value > max_position_value {
            return RiskAssessment::new(true, "Position size adjusted to risk limit.", limits.max_position_pct)
                .expect("max_position_pct is always in [0, 1]");
        }

        let adjusted_size = if ctx.portfolio_value > 0.0 {
            ctx.proposed_position_value / ctx.portfolio_value
        } else {
            0.0
        };
        RiskAssessment::new(true, "Approved", adjusted_size.min(1.0))
            .expect("adjusted_size is derived from a sub-limit position value")
    }
}

fn reject(reason: &'static str) -> RiskAssessment {
    RiskAssessment::new(false, reason, 0.0).expect("reject path always uses adjusted_size = 0.0")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(
        portfolio_value: f64,
        proposed_position_value: f64,
        drawdown: f64,
        sector_exposure: f64,
        minutes_to_event: i64,
        history_days: i64,
    ) -> RiskContext {
        RiskContext::new(
            portfolio_value,
            proposed_position_value,
            drawdown,
            sector_exposure,
            minutes_to_event,
            history_days,
        )
        .unwrap()
    }

    #[test]
    fn drawdown_breach_rejects_first() {
        let agent = RiskAgent::new(RiskLimits::default());
        let assessment = agent.assess(&ctx(100_000.0, 100.0, 0.06, 0.0, 1000, 365));
        assert!(!assessment.approved);
        assert_eq!(assessment.reason, "Daily drawdown breach: trading halted.");
        assert_eq!(assessment.adjusted_size, 0.0);
    }

    #[test]
    fn event_window_rejects() {
        let agent = RiskAgent::new(RiskLimits::default());
        let assessment = agent.assess(&ctx(100_000.0, 100.0, 0.0, 0.0, 3, 365));
        assert_eq!(assessment.reason, "Within major economic event no-trade window.");
    }

    #[test]
    fn insufficient_history_rejects() {
        let agent = RiskAgent::new(RiskLimits::default());
        let assessment = agent.assess(&ctx(100_000.0, 100.0, 0.0, 0.0, 1000, 10));
        assert_eq!(assessment.reason, "Instrument has fewer than 30 days of history.");
    }

    #[test]
    fn correlated_exposure_rejects() {
        let agent = RiskAgent::new(RiskLimits::default());
        let assessment = agent.assess(&ctx(100_000.0, 100.0, 0.0, 0.15, 1000, 365));
        assert_eq!(assessment.reason, "Sector correlated exposure exceeds 10%.");
    }

    #[test]
    fn oversized_position_clamped() {
        let agent = RiskAgent::new(RiskLimits::default());
        let assessment = agent.assess(&ctx(100_000.0, 10_000.0, 0.0, 0.0, 1000, 365));
        assert!(assessment.approved);
        assert_eq!(assessment.reason, "Position size adjusted to risk limit.");
        assert_eq!(assessment.adjusted_size, 0.02);
    }

    #[test]
    fn compliant_position_approved_with_exact_fraction() {
        let agent = RiskAgent::new(RiskLimits::default());
        let assessment = agent.assess(&ctx(100_000.0, 500.0, 0.0, 0.0, 1000, 365));
        assert!(assessment.approved);
        assert_eq!(assessment.reason, "Approved");
        assert_eq!(assessment.adjusted_size, 0.005);
    }
}
