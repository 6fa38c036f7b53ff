use super::base::Agent;
use crate::domain::{AgentResponse, AgentStatus, MarketRegime, Signal, SentimentSignal, TradeDirection};
use async_trait::async_trait;
use chrono::Utc;

/// Abstains unconditionally until a verified news/filings/macro source
/// bundle is injected. Deliberately conservative, mirroring the reference
/// implementation's stub behavior.
pub struct ResearchAgent {
    agent_id: String,
    adapter_version: String,
}

impl ResearchAgent {
    pub fn new(adapter_version: impl Into<String>) -> Self {
        Self { agent_id: "research-agent".to_string(), adapter_version: adapter_version.into() }
    }
}

#[async_trait]
impl Agent for ResearchAgent {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    fn adapter_version(&self) -> &str {
        &self.adapter_version
    }

    async fn run(&self, task_id: &str, _asset: &str) -> AgentResponse {
        let signal = SentimentSignal::new("UNKNOWN", TradeDirection::Abstain, 0.0, 0.0, vec![])
            .expect("abstain signal always satisfies its own invariants");
        AgentResponse::new(
            &self.agent_id,
            Utc::now(),
            task_id,
            AgentStatus::Abstain,
            Signal::Sentiment(signal),
            0.0,
            "No validated source bundle provided; abstaining.",
            vec![],
            0,
            &self.adapter_version,
            MarketRegime::MeanReverting,
        )
        .expect("all fields satisfy their own invariants")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_abstains() {
        let agent = ResearchAgent::new("v1");
        let response = agent.run("task-1", "BTC-USD").await;
        assert_eq!(response.status, AgentStatus::Abstain);
        assert_eq!(response.payload.direction(), TradeDirection::Abstain);
    }
}
