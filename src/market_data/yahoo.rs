use super::{MarketDataProvider, MarketSnapshot};
use crate::domain::{AssetClass, OhlcvCandle, Timeframe};
use crate::error::DataSourceError;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;

pub struct YahooFinanceMarketDataProvider {
    http: reqwest::Client,
    asset_classes: Vec<AssetClass>,
}

impl Default for YahooFinanceMarketDataProvider {
    fn default() -> Self {
        Self { http: reqwest::Client::new(), asset_classes: vec![AssetClass::Equity, AssetClass::Fx] }
    }
}

impl YahooFinanceMarketDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Yahoo has no native 4-hour interval; fall back to 60-minute bars.
    fn interval_param(timeframe: Timeframe) -> &'static str {
        match timeframe {
            Timeframe::OneMinute => "1m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::OneHour => "60m",
            Timeframe::FourHours => "60m",
            Timeframe::OneDay => "1d",
        }
    }

    fn range_for_request(timeframe: Timeframe, limit: usize) -> &'static str {
        let total_minutes = match timeframe {
            Timeframe::OneMinute => limit,
            Timeframe::FiveMinutes => limit * 5,
            Timeframe::FifteenMinutes => limit * 15,
            Timeframe::OneHour | Timeframe::FourHours => limit * 60,
            Timeframe::OneDay => limit * 60 * 24,
        };
        if total_minutes <= 7 * 24 * 60 {
            "7d"
        } else if total_minutes <= 30 * 24 * 60 {
            "1mo"
        } else if total_minutes <= 90 * 24 * 60 {
            "3mo"
        } else if total_minutes <= 365 * 24 * 60 {
            "1y"
        } else {
            "5y"
        }
    }
}

#[derive(Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize)]
struct Quote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

#[async_trait]
impl MarketDataProvider for YahooFinanceMarketDataProvider {
    fn source_name(&self) -> &str {
        "yahoo_finance"
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
        let url = format!("https://query1.finance.yahoo.com/v8/finance/chart/{asset}");
        let response = self
            .http
            .get(url)
            .query(&[
                ("interval", Self::interval_param(timeframe)),
                ("range", Self::range_for_request(timeframe, limit)),
            ])
            .send()
            .await
            .map_err(|e| DataSourceError::retryable(format!("yahoo request failed: {e}")))?;

        let body: ChartResponse = response
            .json()
            .await
            .map_err(|e| DataSourceError::retryable(format!("yahoo response malformed: {e}")))?;

        let result = body
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or_else(|| DataSourceError::retryable("yahoo returned no chart result"))?;

        let timestamps = result.timestamp.unwrap_or_default();
        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataSourceError::retryable("yahoo returned no quote data"))?;

        let mut candles = Vec::with_capacity(timestamps.len());
        for i in 0..timestamps.len() {
            let (Some(o), Some(h), Some(l), Some(c), Some(v)) = (
                quote.open.get(i).copied().flatten(),
                quote.high.get(i).copied().flatten(),
                quote.low.get(i).copied().flatten(),
                quote.close.get(i).copied().flatten(),
                quote.volume.get(i).copied().flatten(),
            ) else {
                continue;
            };
            let Some(ts) = Utc.timestamp_opt(timestamps[i], 0).single() else { continue };
            if let Ok(candle) = OhlcvCandle::new(ts, o, h, l, c, v) {
                candles.push(candle);
            }
        }

        if candles.is_empty() {
            return Err(DataSourceError::retryable("yahoo returned no usable candles"));
        }

        Ok(MarketSnapshot { asset: asset.to_string(), source: self.source_name().to_string(), fetched_at: Utc::now(), candles })
    }
}
