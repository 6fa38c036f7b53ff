//! Turns an approved `TradeDecision` into an order, retrying transient
//! broker failures with exponential backoff.

use crate::domain::{TradeDecision, TradeDirection};
use crate::order_manager::{OrderManager, OrderRequest, OrderSide, OrderType};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub success: bool,
    pub order_id: Option<String>,
    pub reason: String,
}

impl ExecutionResult {
    fn success(order_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { success: true, order_id: Some(order_id.into()), reason: reason.into() }
    }

    fn failure(reason: impl Into<String>) -> Self {
        Self { success: false, order_id: None, reason: reason.into() }
    }
}

pub struct ExecutionAgent {
    pub live_trading: bool,
    pub max_retries: u32,
    pub initial_retry_delay_seconds: f64,
    pub exchange: String,
    order_manager: Box<dyn OrderManager>,
}

impl ExecutionAgent {
    pub fn new(
        live_trading: bool,
        max_retries: u32,
        initial_retry_delay_seconds: f64,
        exchange: impl Into<String>,
        order_manager: Box<dyn OrderManager>,
    ) -> Self {
        Self { live_trading, max_retries, initial_retry_delay_seconds, exchange: exchange.into(), order_manager }
    }

    pub async fn execute(&self, decision: &TradeDecision) -> ExecutionResult {
        if !decision.approved {
            return ExecutionResult::failure("Risk not approved.");
        }
        let side = match decision.direction {
            TradeDirection::Buy => OrderSide::Buy,
            TradeDirection::Sell => OrderSide::Sell,
            _ => return ExecutionResult::failure("No executable direction."),
        };

        if !self.live_trading {
            return ExecutionResult::success(format!("paper-{}", decision.task_id), "Paper order simulated.");
        }

        let request = OrderRequest {
            symbol: decision.asset.clone(),
            side,
            quantity: decision.position_size.max(0.0),
            order_type: OrderType::Market,
            exchange: self.exchange.clone(),
            price: None,
        };

        let mut delay = self.initial_retry_delay_seconds;
        for attempt in 1..=self.max_retries {
            let response = self.order_manager.place_order(request.clone()).await;
            if response.accepted {
                info!(task_id = %decision.task_id, attempt, "order accepted");
                return ExecutionResult::success(
                    response.order_id.unwrap_or_default(),
                    "Order accepted by broker.",
                );
            }
            if !response.retryable {
                return ExecutionResult::failure(response.reason);
            }
            warn!(task_id = %decision.task_id, attempt, reason = %response.reason, "retrying order");
            if attempt < self.max_retries {
                tokio::time::sleep(std::time::Duration::from_secs_f64(delay)).await;
                delay *= 2.0;
            }
        }
        ExecutionResult::failure("Exhausted retries.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BaseSignal, MarketRegime};
    use crate::order_manager::{OrderResponse, PaperOrderManager};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn decision(approved: bool, direction: TradeDirection, position_size: f64) -> TradeDecision {
        let _ = BaseSignal::new("BTC-USD", direction);
        TradeDecision {
            task_id: "task-1".into(),
            asset: "BTC-USD".into(),
            direction,
            confidence: 0.9,
            approved,
            veto_reason: None,
            position_size,
            weighted_votes: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn unapproved_decision_fails_without_calling_broker() {
        let agent = ExecutionAgent::new(true, 3, 0.0, "alpaca", Box::new(PaperOrderManager));
        let result = agent.execute(&decision(false, TradeDirection::Buy, 0.01)).await;
        assert!(!result.success);
        assert_eq!(result.reason, "Risk not approved.");
    }

    #[tokio::test]
    async fn paper_mode_never_calls_broker() {
        let agent = ExecutionAgent::new(false, 3, 0.0, "alpaca", Box::new(PaperOrderManager));
        let result = agent.execute(&decision(true, TradeDirection::Buy, 0.01)).await;
        assert!(result.success);
        assert_eq!(result.order_id.as_deref(), Some("paper-task-1"));
    }

    #[tokio::test]
    async fn hold_direction_is_not_executable() {
        let agent = ExecutionAgent::new(true, 3, 0.0, "alpaca", Box::new(PaperOrderManager));
        let result = agent.execute(&decision(true, TradeDirection::Hold, 0.01)).await;
        assert!(!result.success);
        assert_eq!(result.reason, "No executable direction.");
    }

    struct FlakyManager {
        accept_after: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OrderManager for FlakyManager {
        async fn place_order(&self, _request: OrderRequest) -> OrderResponse {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call + 1 >= self.accept_after {
                OrderResponse::accept("live-1", "ok")
            } else {
                OrderResponse::reject("timeout", true)
            }
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        let manager = FlakyManager { accept_after: 2, calls: AtomicUsize::new(0) };
        let agent = ExecutionAgent::new(true, 3, 0.0, "alpaca", Box::new(manager));
        let result = agent.execute(&decision(true, TradeDirection::Buy, 0.01)).await;
        assert!(result.success);
    }

    struct AlwaysRejects;

    #[async_trait]
    impl OrderManager for AlwaysRejects {
        async fn place_order(&self, _request: OrderRequest) -> OrderResponse {
            OrderResponse::reject("bad symbol", false)
        }
    }

    #[tokio::test]
    async fn non_retryable_rejection_fails_immediately() {
        let agent = ExecutionAgent::new(true, 3, 0.0, "alpaca", Box::new(AlwaysRejects));
        let result = agent.execute(&decision(true, TradeDirection::Buy, 0.01)).await;
        assert!(!result.success);
        assert_eq!(result.reason, "bad symbol");
    }

    struct AlwaysRetryable;

    #[async_trait]
    impl OrderManager for AlwaysRetryable {
        async fn place_order(&self, _request: OrderRequest) -> OrderResponse {
            OrderResponse::reject("timeout", true)
        }
    }

    #[tokio::test]
    async fn exhausts_retries_and_fails() {
        let agent = ExecutionAgent::new(true, 2, 0.0, "alpaca", Box::new(AlwaysRetryable));
        let result = agent.execute(&decision(true, TradeDirection::Buy, 0.01)).await;
        assert!(!result.success);
        assert_eq!(result.reason, "Exhausted retries.");
    }
}
