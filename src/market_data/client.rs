//! Fan-out market data fetch across providers with per-provider circuit
//! breaking. The breaker state machine mirrors `EndpointRotator` in
//! `src/scrapers/binance_session.rs`: a consecutive-failure counter that
//! opens the circuit for a cooldown window and resets on success.

use super::{DataFreshnessPolicy, MarketDataProvider, MarketSnapshot, TradeInputBundle};
use crate::domain::{AssetClass, Timeframe};
use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

struct ProviderState {
    consecutive_failures: u32,
    circuit_open_until: Option<Instant>,
}

impl Default for ProviderState {
    fn default() -> Self {
        Self { consecutive_failures: 0, circuit_open_until: None }
    }
}

struct ProviderSlot {
    provider: Box<dyn MarketDataProvider>,
    state: Mutex<ProviderState>,
}

pub struct MarketDataClient {
    providers: Vec<ProviderSlot>,
    freshness: DataFreshnessPolicy,
    max_provider_failures: u32,
    circuit_cooldown: Duration,
    provider_timeout: Duration,
}

impl MarketDataClient {
    pub fn new(
        providers: Vec<Box<dyn MarketDataProvider>>,
        freshness: DataFreshnessPolicy,
        max_provider_failures: u32,
        circuit_cooldown: Duration,
        provider_timeout: Duration,
    ) -> Self {
        let providers =
            providers.into_iter().map(|provider| ProviderSlot { provider, state: Mutex::new(ProviderState::default()) }).collect();
        Self { providers, freshness, max_provider_failures, circuit_cooldown, provider_timeout }
    }

    fn circuit_open(&self, slot: &ProviderSlot, now: Instant) -> bool {
        slot.state.lock().circuit_open_until.map(|until| now < until).unwrap_or(false)
    }

    fn record_success(&self, slot: &ProviderSlot) {
        let mut state = slot.state.lock();
        state.consecutive_failures = 0;
        state.circuit_open_until = None;
    }

    fn record_failure(&self, slot: &ProviderSlot, now: Instant) {
        let mut state = slot.state.lock();
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.max_provider_failures {
            state.circuit_open_until = Some(now + self.circuit_cooldown);
            state.consecutive_failures = 0;
        }
    }

    pub async fn get_ohlcv(
        &self,
        asset: &str,
        asset_class: AssetClass,
        timeframe: Timeframe,
        limit: usize,
    ) -> anyhow::Result<MarketSnapshot> {
        Ok(self.get_trade_inputs(asset, asset_class, timeframe, limit, 1).await?.primary)
    }

    pub async fn get_trade_inputs(
        &self,
        asset: &str,
        asset_class: AssetClass,
        timeframe: Timeframe,
        limit: usize,
        min_sources: usize,
    ) -> anyhow::Result<TradeInputBundle> {
        assert!(min_sources >= 1, "min_sources must be at least 1");
        let eligible: Vec<&ProviderSlot> = self
            .providers
            .iter()
            .filter(|slot| slot.provider.supported_asset_classes().contains(&asset_class))
            .collect();
        if eligible.is_empty() {
            anyhow::bail!("no market data providers support asset class {:?}", asset_class);
        }

        let mut successful: Vec<MarketSnapshot> = Vec::new();
        let mut failures: Vec<String> = Vec::new();
        let now = Instant::now();

        for slot in &eligible {
            let name = slot.provider.source_name().to_string();
            if self.circuit_open(slot, now) {
                failures.push(format!("{name}: circuit_open"));
                continue;
            }
            let fetch = slot.provider.fetch_ohlcv(asset, timeframe, limit);
            let outcome = tokio::time::timeout(self.provider_timeout, fetch).await;
            match outcome {
                Ok(Ok(snapshot)) => {
                    if self.freshness.is_stale(&snapshot, timeframe, chrono::Utc::now()) {
                        failures.push(format!("{name}: stale"));
                        self.record_failure(slot, now);
                        continue;
                    }
                    self.record_success(slot);
                    successful.push(snapshot);
                }
                Ok(Err(e)) => {
                    warn!(provider = %name, error = %e.message, "market data fetch failed");
                    failures.push(format!("{name}: {}", e.message));
                    self.record_failure(slot, now);
                }
                Err(_) => {
                    failures.push(format!("{name}: timeout"));
                    self.record_failure(slot, now);
                }
            }
        }

        if successful.len() < min_sources {
            anyhow::bail!("insufficient market data sources: {}", failures.join(", "));
        }

        let closes: Vec<f64> = successful.iter().filter_map(|s| s.candles.last().map(|c| c.close)).collect();
        let consensus_close = closes.iter().sum::<f64>() / closes.len() as f64;
        let price_spread_bps = if closes.len() <= 1 || consensus_close == 0.0 {
            0.0
        } else {
            let max = closes.iter().cloned().fold(f64::MIN, f64::max);
            let min = closes.iter().cloned().fold(f64::MAX, f64::min);
            ((max - min) / consensus_close) * 10_000.0
        };

        let mut iter = successful.into_iter();
        let primary = iter.next().expect("min_sources >= 1 guarantees at least one snapshot");
        let secondary = iter.collect();

        Ok(TradeInputBundle { asset: asset.to_string(), timeframe, primary, secondary, consensus_close, price_spread_bps })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OhlcvCandle;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyProvider {
        name: &'static str,
        classes: Vec<AssetClass>,
        failures_before_success: AtomicU32,
    }

    #[async_trait]
    impl MarketDataProvider for FlakyProvider {
        fn source_name(&self) -> &str {
            self.name
        }
        fn supported_asset_classes(&self) -> &[AssetClass] {
            &self.classes
        }
        async fn fetch_ohlcv(
            &self,
            asset: &str,
            _timeframe: Timeframe,
            _limit: usize,
        ) -> Result<MarketSnapshot, crate::error::DataSourceError> {
            let remaining = self.failures_before_success.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures_before_success.fetch_sub(1, Ordering::SeqCst);
                return Err(crate::error::DataSourceError::retryable("boom"));
            }
            let candle = OhlcvCandle::new(chrono::Utc::now(), 1.0, 1.0, 1.0, 1.0, 1.0).unwrap();
            Ok(MarketSnapshot { asset: asset.to_string(), source: self.name.to_string(), fetched_at: chrono::Utc::now(), candles: vec![candle] })
        }
    }

    #[tokio::test]
    async fn fails_fast_when_no_provider_supports_asset_class() {
        let client = MarketDataClient::new(
            vec![],
            DataFreshnessPolicy { intraday_max_age_minutes: 15, swing_max_age_days: 1 },
            3,
            Duration::from_secs(60),
            Duration::from_secs(5),
        );
        let result = client.get_trade_inputs("BTC-USD", AssetClass::Crypto, Timeframe::OneHour, 10, 1).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn circuit_opens_after_threshold_failures() {
        let provider = FlakyProvider { name: "flaky", classes: vec![AssetClass::Crypto], failures_before_success: AtomicU32::new(100) };
        let client = MarketDataClient::new(
            vec![Box::new(provider)],
            DataFreshnessPolicy { intraday_max_age_minutes: 15, swing_max_age_days: 1 },
            2,
            Duration::from_secs(60),
            Duration::from_secs(5),
        );
        for _ in 0..2 {
            let _ = client.get_trade_inputs("BTC-USD", AssetClass::Crypto, Timeframe::OneHour, 10, 1).await;
        }
        assert!(client.circuit_open(&client.providers[0], Instant::now()));
    }
}
