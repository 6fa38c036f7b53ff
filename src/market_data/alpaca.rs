use super::{MarketDataProvider, MarketSnapshot};
use crate::domain::{AssetClass, OhlcvCandle, Timeframe};
use crate::error::DataSourceError;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

pub struct AlpacaMarketDataProvider {
    api_key: Option<String>,
    api_secret: Option<String>,
    http: reqwest::Client,
    asset_classes: Vec<AssetClass>,
}

impl AlpacaMarketDataProvider {
    pub fn new(api_key: Option<String>, api_secret: Option<String>) -> Self {
        Self { api_key, api_secret, http: reqwest::Client::new(), asset_classes: vec![AssetClass::Equity] }
    }

    fn timeframe_param(timeframe: Timeframe) -> Option<&'static str> {
        match timeframe {
            Timeframe::OneMinute => Some("1Min"),
            Timeframe::FiveMinutes => Some("5Min"),
            Timeframe::FifteenMinutes => Some("15Min"),
            Timeframe::OneHour => Some("1Hour"),
            Timeframe::FourHours => Some("4Hour"),
            Timeframe::OneDay => Some("1Day"),
        }
    }
}

#[derive(Deserialize)]
struct BarsResponse {
    bars: Option<Vec<AlpacaBar>>,
}

#[derive(Deserialize)]
struct AlpacaBar {
    t: String,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

#[async_trait]
impl MarketDataProvider for AlpacaMarketDataProvider {
    fn source_name(&self) -> &str {
        "alpaca"
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
        let (Some(key), Some(secret)) = (self.api_key.as_ref(), self.api_secret.as_ref()) else {
            return Err(DataSourceError::terminal("alpaca credentials are not configured"));
        };
        let Some(param) = Self::timeframe_param(timeframe) else {
            return Err(DataSourceError::terminal("unsupported timeframe for alpaca"));
        };

        let url = format!("https://data.alpaca.markets/v2/stocks/{asset}/bars");
        let limit = limit.to_string();
        let response = self
            .http
            .get(url)
            .query(&[("timeframe", param), ("limit", limit.as_str())])
            .header("APCA-API-KEY-ID", key)
            .header("APCA-API-SECRET-KEY", secret)
            .send()
            .await
            .map_err(|e| DataSourceError::retryable(format!("alpaca request failed: {e}")))?;

        let body: BarsResponse = response
            .json()
            .await
            .map_err(|e| DataSourceError::retryable(format!("alpaca response malformed: {e}")))?;

        let bars = body.bars.unwrap_or_default();
        if bars.is_empty() {
            return Err(DataSourceError::retryable("alpaca returned no bars"));
        }

        let mut candles = Vec::with_capacity(bars.len());
        for bar in bars {
            let timestamp = chrono::DateTime::parse_from_rfc3339(&bar.t)
                .map_err(|e| DataSourceError::retryable(format!("malformed alpaca bar timestamp: {e}")))?
                .with_timezone(&Utc);
            let candle = OhlcvCandle::new(timestamp, bar.o, bar.h, bar.l, bar.c, bar.v)
                .map_err(|e| DataSourceError::retryable(format!("malformed alpaca bar: {e}")))?;
            candles.push(candle);
        }

        Ok(MarketSnapshot { asset: asset.to_string(), source: self.source_name().to_string(), fetched_at: Utc::now(), candles })
    }
}
