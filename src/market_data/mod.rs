pub mod alpaca;
pub mod ccxt;
pub mod client;
pub mod yahoo;

pub use alpaca::AlpacaMarketDataProvider;
pub use ccxt::CcxtMarketDataProvider;
pub use client::MarketDataClient;
pub use yahoo::YahooFinanceMarketDataProvider;

use crate::domain::{AssetClass, OhlcvCandle, Timeframe};
use crate::error::DataSourceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub asset: String,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    pub candles: Vec<OhlcvCandle>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeInputBundle {
    pub asset: String,
    pub timeframe: Timeframe,
    pub primary: MarketSnapshot,
    pub secondary: Vec<MarketSnapshot>,
    pub consensus_close: f64,
    pub price_spread_bps: f64,
}

/// Freshness gate applied to every snapshot before it is trusted: intraday
/// timeframes tolerate a short staleness window, everything else tolerates
/// up to a full trading day.
#[derive(Debug, Clone, Copy)]
pub struct DataFreshnessPolicy {
    pub intraday_max_age_minutes: i64,
    pub swing_max_age_days: i64,
}

impl DataFreshnessPolicy {
    pub fn max_age_for_timeframe(&self, timeframe: Timeframe) -> chrono::Duration {
        if timeframe.is_intraday() {
            chrono::Duration::minutes(self.intraday_max_age_minutes)
        } else {
            chrono::Duration::days(self.swing_max_age_days)
        }
    }

    pub fn is_stale(&self, snapshot: &MarketSnapshot, timeframe: Timeframe, now: DateTime<Utc>) -> bool {
        let Some(latest) = snapshot.candles.iter().map(|c| c.timestamp).max() else {
            return true;
        };
        now - latest > self.max_age_for_timeframe(timeframe)
    }
}

#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn source_name(&self) -> &str;
    fn supported_asset_classes(&self) -> &[AssetClass];
    async fn fetch_ohlcv(
        &self,
        asset: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<MarketSnapshot, DataSourceError>;
}
