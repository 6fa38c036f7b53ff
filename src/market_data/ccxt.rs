//! A generic crypto-exchange provider standing in for an exchange-library
//! abstraction (e.g. ccxt) over venues such as Binance or Kraken. Network
//! wiring is intentionally injectable so tests never make live calls.

use super::{MarketDataProvider, MarketSnapshot};
use crate::domain::{AssetClass, OhlcvCandle, Timeframe};
use crate::error::DataSourceError;
use async_trait::async_trait;
use chrono::Utc;

#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn fetch_rows(
        &self,
        asset: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<(i64, f64, f64, f64, f64, f64)>, DataSourceError>;
}

pub struct CcxtMarketDataProvider {
    exchange_id: String,
    source_name: String,
    asset_classes: Vec<AssetClass>,
    source: Box<dyn CandleSource>,
}

impl CcxtMarketDataProvider {
    pub fn new(exchange_id: impl Into<String>, source: Box<dyn CandleSource>) -> Self {
        let exchange_id = exchange_id.into();
        let source_name = format!("ccxt_{exchange_id}");
        Self { exchange_id, source_name, asset_classes: vec![AssetClass::Crypto], source }
    }
}

#[async_trait]
impl MarketDataProvider for CcxtMarketDataProvider {
    fn source_name(&self) -> &str {
        &self.source_name
    }

    fn supported_asset_classes(&self) -> &[AssetClass] {
        &self.asset_classes
    }

    async fn fetch_ohlcv(
        &self,
        asset: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<MarketSnapshot, DataSourceError> {
        let rows = self.source.fetch_rows(asset, timeframe, limit).await?;
        if rows.is_empty() {
            return Err(DataSourceError::retryable(format!("{} returned no rows", self.exchange_id)));
        }
        let mut candles = Vec::with_capacity(rows.len());
        for (ts_millis, o, h, l, c, v) in rows {
            let Some(timestamp) = chrono::DateTime::from_timestamp_millis(ts_millis) else {
                return Err(DataSourceError::retryable("malformed exchange row timestamp"));
            };
            let candle = OhlcvCandle::new(timestamp, o, h, l, c, v)
                .map_err(|e| DataSourceError::retryable(format!("malformed exchange row: {e}")))?;
            candles.push(candle);
        }
        Ok(MarketSnapshot {
            asset: asset.to_string(),
            source: self.source_name().to_string(),
            fetched_at: Utc::now(),
            candles,
        })
    }
}
