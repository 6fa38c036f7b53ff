//! Shared agent envelope: a typed success/failure result and a standard
//! way to build an `error`-status response when an agent cannot run at all.

use crate::domain::{AgentResponse, AgentStatus, BaseSignal, MarketRegime, Signal, TradeDirection};
use async_trait::async_trait;
use chrono::Utc;

#[derive(Debug, Clone)]
pub struct AgentResult<T> {
    pub ok: bool,
    pub value: Option<T>,
    pub error: Option<String>,
}

impl<T> AgentResult<T> {
    pub fn success(value: T) -> Self {
        Self { ok: true, value: Some(value), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { ok: false, value: None, error: Some(error.into()) }
    }
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn agent_id(&self) -> &str;
    fn adapter_version(&self) -> &str;
    async fn run(&self, task_id: &str, asset: &str) -> AgentResponse;
}

/// Standardized `status = "error"` response for agents that cannot produce
/// a real signal (malformed input, unavailable dependency).
pub fn build_error_response(agent_id: &str, adapter_version: &str, task_id: &str, asset: &str, reason: &str) -> AgentResponse {
    AgentResponse::new(
        agent_id,
        Utc::now(),
        task_id,
        AgentStatus::Error,
        Signal::Base(BaseSignal::new(asset, TradeDirection::Abstain).unwrap_or_else(|_| {
            BaseSignal::new("UNKNOWN", TradeDirection::Abstain).expect("UNKNOWN is a valid non-empty asset")
        })),
        0.0,
        reason,
        vec![],
        0,
        adapter_version,
        MarketRegime::MeanReverting,
    )
    .expect("all fields above satisfy their own invariants")
}
