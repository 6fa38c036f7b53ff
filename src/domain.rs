//! Shared domain types for the trading pipeline: market data, agent
//! signals, decisions, and the training artifacts derived from them.
//!
//! Every type that carries a numeric or string invariant is constructed
//! through a fallible `new`/`try_new` that returns [`ValidationError`]
//! rather than a derive macro, matching the rest of this codebase.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketRegime {
    TrendingBull,
    TrendingBear,
    MeanReverting,
    HighVolatility,
}

impl MarketRegime {
    /// Fixed declared order used wherever iteration order must be stable
    /// (regime balancing, regime-accuracy reporting).
    pub const ALL: [MarketRegime; 4] = [
        MarketRegime::TrendingBull,
        MarketRegime::TrendingBear,
        MarketRegime::MeanReverting,
        MarketRegime::HighVolatility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketRegime::TrendingBull => "trending_bull",
            MarketRegime::TrendingBear => "trending_bear",
            MarketRegime::MeanReverting => "mean_reverting",
            MarketRegime::HighVolatility => "high_volatility",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeDirection {
    Buy,
    Sell,
    Hold,
    Abstain,
}

impl TradeDirection {
    /// Declared tie-break order for the coordinator's vote aggregation:
    /// buy, sell, hold, abstain.
    pub const VOTE_ORDER: [TradeDirection; 4] = [
        TradeDirection::Buy,
        TradeDirection::Sell,
        TradeDirection::Hold,
        TradeDirection::Abstain,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeDirection::Buy => "buy",
            TradeDirection::Sell => "sell",
            TradeDirection::Hold => "hold",
            TradeDirection::Abstain => "abstain",
        }
    }

    pub fn is_executable(&self) -> bool {
        matches!(self, TradeDirection::Buy | TradeDirection::Sell)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::OneMinute => "1m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHours => "4h",
            Timeframe::OneDay => "1d",
        }
    }

    /// Timeframes the freshness policy treats as intraday.
    pub fn is_intraday(&self) -> bool {
        !matches!(self, Timeframe::OneDay)
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::OneHour
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Equity,
    Crypto,
    Etf,
    Fx,
    Other,
}

impl Default for AssetClass {
    fn default() -> Self {
        AssetClass::Other
    }
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Equity => "equity",
            AssetClass::Crypto => "crypto",
            AssetClass::Etf => "etf",
            AssetClass::Fx => "fx",
            AssetClass::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Success,
    Abstain,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvCandle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvCandle {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, ValidationError> {
        for (field, value) in [("open", open), ("high", high), ("low", low), ("close", close)] {
            if value <= 0.0 {
                return Err(ValidationError::NotPositive { field, value });
            }
        }
        if volume < 0.0 {
            return Err(ValidationError::BelowMin { field: "volume", min: 0.0, value: volume });
        }
        Ok(Self { timestamp, open, high, low, close, volume })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseSignal {
    pub asset: String,
    pub direction: TradeDirection,
    #[serde(default)]
    pub timeframe: Timeframe,
}

impl BaseSignal {
    pub fn new(asset: impl Into<String>, direction: TradeDirection) -> Result<Self, ValidationError> {
        let asset = asset.into();
        if asset.is_empty() {
            return Err(ValidationError::Empty { field: "asset" });
        }
        Ok(Self { asset, direction, timeframe: Timeframe::default() })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentSignal {
    pub asset: String,
    pub direction: TradeDirection,
    pub score: f64,
    pub confidence: f64,
    pub sources: Vec<String>,
}

impl SentimentSignal {
    pub fn new(
        asset: impl Into<String>,
        direction: TradeDirection,
        score: f64,
        confidence: f64,
        sources: Vec<String>,
    ) -> Result<Self, ValidationError> {
        let asset = asset.into();
        if asset.is_empty() {
            return Err(ValidationError::Empty { field: "asset" });
        }
        require_range("score", score, -1.0, 1.0)?;
        require_range("confidence", confidence, 0.0, 1.0)?;
        Ok(Self { asset, direction, score, confidence, sources })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSignal {
    pub asset: String,
    pub direction: TradeDirection,
    pub strength: f64,
    pub indicators_used: Vec<String>,
}

impl TechnicalSignal {
    pub fn new(
        asset: impl Into<String>,
        direction: TradeDirection,
        strength: f64,
        indicators_used: Vec<String>,
    ) -> Result<Self, ValidationError> {
        let asset = asset.into();
        if asset.is_empty() {
            return Err(ValidationError::Empty { field: "asset" });
        }
        require_range("strength", strength, 0.0, 1.0)?;
        Ok(Self { asset, direction, strength, indicators_used })
    }
}

/// Tagged union over the signal payload kinds an agent can emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signal {
    Base(BaseSignal),
    Sentiment(SentimentSignal),
    Technical(TechnicalSignal),
}

impl Signal {
    pub fn asset(&self) -> &str {
        match self {
            Signal::Base(s) => &s.asset,
            Signal::Sentiment(s) => &s.asset,
            Signal::Technical(s) => &s.asset,
        }
    }

    pub fn direction(&self) -> TradeDirection {
        match self {
            Signal::Base(s) => s.direction,
            Signal::Sentiment(s) => s.direction,
            Signal::Technical(s) => s.direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskContext {
    pub portfolio_value: f64,
    pub proposed_position_value: f64,
    pub current_daily_drawdown_pct: f64,
    pub sector_exposure_pct: f64,
    pub minutes_to_major_event: i64,
    pub instrument_history_days: i64,
}

impl RiskContext {
    pub fn new(
        portfolio_value: f64,
        proposed_position_value: f64,
        current_daily_drawdown_pct: f64,
        sector_exposure_pct: f64,
        minutes_to_major_event: i64,
        instrument_history_days: i64,
    ) -> Result<Self, ValidationError> {
        if portfolio_value <= 0.0 {
            return Err(ValidationError::NotPositive { field: "portfolio_value", value: portfolio_value });
        }
        if proposed_position_value < 0.0 {
            return Err(ValidationError::BelowMin {
                field: "proposed_position_value",
                min: 0.0,
                value: proposed_position_value,
            });
        }
        if current_daily_drawdown_pct < 0.0 {
            return Err(ValidationError::BelowMin {
                field: "current_daily_drawdown_pct",
                min: 0.0,
                value: current_daily_drawdown_pct,
            });
        }
        require_range("sector_exposure_pct", sector_exposure_pct, 0.0, 1.0)?;
        if instrument_history_days < 0 {
            return Err(ValidationError::BelowMin {
                field: "instrument_history_days",
                min: 0.0,
                value: instrument_history_days as f64,
            });
        }
        Ok(Self {
            portfolio_value,
            proposed_position_value,
            current_daily_drawdown_pct,
            sector_exposure_pct,
            minutes_to_major_event,
            instrument_history_days,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub approved: bool,
    pub reason: String,
    pub adjusted_size: f64,
}

impl RiskAssessment {
    pub fn new(approved: bool, reason: impl Into<String>, adjusted_size: f64) -> Result<Self, ValidationError> {
        require_range("adjusted_size", adjusted_size, 0.0, 1.0)?;
        Ok(Self { approved, reason: reason.into(), adjusted_size })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDecision {
    pub task_id: String,
    pub asset: String,
    pub direction: TradeDirection,
    pub confidence: f64,
    pub approved: bool,
    pub veto_reason: Option<String>,
    pub position_size: f64,
    pub weighted_votes: HashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    pub task_id: String,
    pub status: AgentStatus,
    pub payload: Signal,
    pub confidence: f64,
    pub reasoning: String,
    pub data_sources: Vec<String>,
    pub latency_ms: i64,
    pub adapter_version: String,
    pub market_regime: MarketRegime,
}

impl AgentResponse {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        task_id: impl Into<String>,
        status: AgentStatus,
        payload: Signal,
        confidence: f64,
        reasoning: impl Into<String>,
        data_sources: Vec<String>,
        latency_ms: i64,
        adapter_version: impl Into<String>,
        market_regime: MarketRegime,
    ) -> Result<Self, ValidationError> {
        let agent_id = agent_id.into();
        let task_id = task_id.into();
        let reasoning = reasoning.into();
        let adapter_version = adapter_version.into();
        if agent_id.is_empty() {
            return Err(ValidationError::Empty { field: "agent_id" });
        }
        if task_id.is_empty() {
            return Err(ValidationError::Empty { field: "task_id" });
        }
        if reasoning.is_empty() {
            return Err(ValidationError::Empty { field: "reasoning" });
        }
        if adapter_version.is_empty() {
            return Err(ValidationError::Empty { field: "adapter_version" });
        }
        require_range("confidence", confidence, 0.0, 1.0)?;
        if latency_ms < 0 {
            return Err(ValidationError::BelowMin { field: "latency_ms", min: 0.0, value: latency_ms as f64 });
        }
        Ok(Self {
            agent_id,
            timestamp,
            task_id,
            status,
            payload,
            confidence,
            reasoning,
            data_sources,
            latency_ms,
            adapter_version,
            market_regime,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionLogRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub task_id: String,
    pub asset: String,
    #[serde(default)]
    pub asset_class: AssetClass,
    #[serde(default)]
    pub timeframe: Timeframe,
    pub signal_type: String,
    pub signal_value: Signal,
    pub confidence: f64,
    pub reasoning: String,
    pub data_sources: Vec<String>,
    pub market_regime: MarketRegime,
    pub outcome_pnl: Option<f64>,
    pub outcome_latency_days: Option<i64>,
    #[serde(default)]
    pub contributed_to_trade: bool,
    pub trade_was_profitable: Option<bool>,
}

impl DecisionLogRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        timestamp: DateTime<Utc>,
        agent_id: impl Into<String>,
        task_id: impl Into<String>,
        asset: impl Into<String>,
        asset_class: AssetClass,
        timeframe: Timeframe,
        signal_type: impl Into<String>,
        signal_value: Signal,
        confidence: f64,
        reasoning: impl Into<String>,
        data_sources: Vec<String>,
        market_regime: MarketRegime,
        outcome_pnl: Option<f64>,
        outcome_latency_days: Option<i64>,
        contributed_to_trade: bool,
        trade_was_profitable: Option<bool>,
    ) -> Result<Self, ValidationError> {
        let signal_type = signal_type.into();
        if signal_type.is_empty() {
            return Err(ValidationError::Empty { field: "signal_type" });
        }
        require_range("confidence", confidence, 0.0, 1.0)?;
        // The label-consistency invariant: any record carrying a realized
        // outcome must also carry the profitability label.
        if outcome_pnl.is_some() && trade_was_profitable.is_none() {
            return Err(ValidationError::InconsistentOutcomeLabel);
        }
        Ok(Self {
            id,
            timestamp,
            agent_id: agent_id.into(),
            task_id: task_id.into(),
            asset: asset.into(),
            asset_class,
            timeframe,
            signal_type,
            signal_value,
            confidence,
            reasoning: reasoning.into(),
            data_sources,
            market_regime,
            outcome_pnl,
            outcome_latency_days,
            contributed_to_trade,
            trade_was_profitable,
        })
    }

    /// Records eligible to seed a training example: a realized, labeled
    /// outcome that actually contributed to a trade.
    pub fn is_outcome_ready(&self) -> bool {
        self.outcome_pnl.is_some() && self.trade_was_profitable.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPairMetadata {
    pub regime: MarketRegime,
    pub agent_id: String,
    pub outcome_pnl: f64,
    pub confidence: f64,
    #[serde(default)]
    pub is_replay: bool,
    pub dataset_version: String,
    #[serde(default)]
    pub unmatched_negative: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPair {
    pub prompt: String,
    pub completion: String,
    pub metadata: TrainingPairMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub signal_accuracy: f64,
    pub abstain_rate: f64,
    pub brier_score: f64,
    pub regime_accuracy: HashMap<MarketRegime, f64>,
    pub consistency_variance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionDecision {
    pub approved: bool,
    pub reasons: Vec<String>,
}

fn require_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if value < min {
        return Err(ValidationError::BelowMin { field, min, value });
    }
    if value > max {
        return Err(ValidationError::AboveMax { field, max, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candle_rejects_non_positive_prices() {
        let ts = Utc::now();
        assert!(OhlcvCandle::new(ts, 0.0, 1.0, 1.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn decision_log_requires_label_when_outcome_known() {
        let signal = Signal::Base(BaseSignal::new("BTC-USD", TradeDirection::Buy).unwrap());
        let err = DecisionLogRecord::new(
            Uuid::new_v4(),
            Utc::now(),
            "technical-agent",
            "task-1",
            "BTC-USD",
            AssetClass::Crypto,
            Timeframe::OneHour,
            "technical",
            signal,
            0.8,
            "rsi confirms",
            vec!["timescaledb:ohlcv".into()],
            MarketRegime::TrendingBull,
            Some(120.0),
            Some(2),
            true,
            None,
        );
        assert_eq!(err.unwrap_err(), ValidationError::InconsistentOutcomeLabel);
    }

    #[test]
    fn vote_order_is_declared_order() {
        assert_eq!(TradeDirection::VOTE_ORDER[0], TradeDirection::Buy);
        assert_eq!(TradeDirection::VOTE_ORDER[3], TradeDirection::Abstain);
    }
}
