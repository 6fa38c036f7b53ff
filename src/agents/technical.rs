use super::base::Agent;
use crate::domain::{AgentResponse, AgentStatus, MarketRegime, OhlcvCandle, Signal, TechnicalSignal, TradeDirection};
use crate::indicators::{atr, bollinger_bands, macd, rsi, vwap};
use async_trait::async_trait;
use chrono::Utc;

pub struct TechnicalAgent {
    agent_id: String,
    adapter_version: String,
    min_lookback_period: usize,
    candles: Vec<OhlcvCandle>,
    market_regime: MarketRegime,
}

impl TechnicalAgent {
    pub fn new(adapter_version: impl Into<String>, candles: Vec<OhlcvCandle>, market_regime: MarketRegime) -> Self {
        Self {
            agent_id: "technical-agent".to_string(),
            adapter_version: adapter_version.into(),
            min_lookback_period: 50,
            candles,
            market_regime,
        }
    }
}

#[async_trait]
impl Agent for TechnicalAgent {
    fn agent_id(&self) -> &str {
        &self.agent_id
    }

    fn adapter_version(&self) -> &str {
        &self.adapter_version
    }

    async fn run(&self, task_id: &str, asset: &str) -> AgentResponse {
        if self.candles.len() < self.min_lookback_period {
            let signal = TechnicalSignal::new(asset, TradeDirection::Abstain, 0.0, vec!["lookback_validation".to_string()])
                .expect("abstain signal always satisfies its own invariants");
            return AgentResponse::new(
                &self.agent_id,
                Utc::now(),
                task_id,
                AgentStatus::Abstain,
                Signal::Technical(signal),
                0.0,
                "Insufficient lookback history for indicators.",
                vec!["timescaledb:ohlcv".to_string()],
                0,
                &self.adapter_version,
                self.market_regime,
            )
            .expect("all fields satisfy their own invariants");
        }

        let close: Vec<f64> = self.candles.iter().map(|c| c.close).collect();
        let high: Vec<f64> = self.candles.iter().map(|c| c.high).collect();
        let low: Vec<f64> = self.candles.iter().map(|c| c.low).collect();
        let volume: Vec<f64> = self.candles.iter().map(|c| c.volume).collect();

        let rsi_series = rsi(&close, 14);
        let (macd_line, macd_signal) = macd(&close, 12, 26, 9);
        let (lower, _mean, upper) = bollinger_bands(&close, 20, 2.0);
        let vwap_series = vwap(&close, &volume);
        let atr_series = atr(&high, &low, &close, 14);

        let last = close.len() - 1;
        let current_rsi = rsi_series[last];
        let current_macd = macd_line[last];
        let current_macd_signal = macd_signal[last];
        let current_close = close[last];
        let current_lower = lower[last];
        let current_upper = upper[last];
        let current_vwap = vwap_series[last];
        let current_atr = atr_series[last];

        // High ATR relative to VWAP signals a choppier tape; demand a
        // stronger RSI/MACD/Bollinger confluence before trading into it.
        let volatility_adjusted = current_vwap != 0.0 && (current_atr / current_vwap) > 0.05;

        let (direction, strength) =
            if current_rsi <= 35.0 && current_macd > current_macd_signal && current_close <= current_lower {
                (TradeDirection::Buy, if volatility_adjusted { 0.6 } else { 0.8 })
            } else if current_rsi >= 65.0 && current_macd < current_macd_signal && current_close >= current_upper {
                (TradeDirection::Sell, if volatility_adjusted { 0.6 } else { 0.8 })
            } else {
                (TradeDirection::Hold, 0.5)
            };

        let indicators_used = vec!["rsi".to_string(), "macd".to_string(), "bollinger".to_string(), "vwap".to_string(), "atr".to_string()];
        let signal = TechnicalSignal::new(asset, direction, strength, indicators_used)
            .expect("strength is always in [0, 1]");

        AgentResponse::new(
            &self.agent_id,
            Utc::now(),
            task_id,
            AgentStatus::Success,
            Signal::Technical(signal),
            strength,
            format!(
                "rsi={current_rsi:.2} macd={current_macd:.4} signal={current_macd_signal:.4} vwap={current_vwap:.2} atr={current_atr:.4}"
            ),
            vec!["timescaledb:ohlcv".to_string()],
            0,
            &self.adapter_version,
            self.market_regime,
        )
        .expect("all fields satisfy their own invariants")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_candles(n: usize, close: f64) -> Vec<OhlcvCandle> {
        (0..n)
            .map(|i| OhlcvCandle::new(Utc::now() - chrono::Duration::hours((n - i) as i64), close, close, close, close, 100.0).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn abstains_below_min_lookback() {
        let agent = TechnicalAgent::new("v1", flat_candles(10, 100.0), MarketRegime::TrendingBull);
        let response = agent.run("task-1", "BTC-USD").await;
        assert_eq!(response.status, AgentStatus::Abstain);
        assert_eq!(response.reasoning, "Insufficient lookback history for indicators.");
    }

    #[tokio::test]
    async fn flat_series_holds() {
        let agent = TechnicalAgent::new("v1", flat_candles(60, 100.0), MarketRegime::TrendingBull);
        let response = agent.run("task-1", "BTC-USD").await;
        assert_eq!(response.status, AgentStatus::Success);
        assert_eq!(response.payload.direction(), TradeDirection::Hold);
    }
}
