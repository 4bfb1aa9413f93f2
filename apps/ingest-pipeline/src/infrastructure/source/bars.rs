//! Polling Bar Source
//!
//! Queries a chart-style HTTP endpoint for the most recent one-minute bar of
//! a symbol. One snapshot query per call, no internal retry - failures
//! propagate to the ingestion loop and from there to the supervisor.
//!
//! The endpoint may return the same latest bar on consecutive polls (thin
//! trading, weekends with the gate off). Those duplicates are appended as
//! normal records: the pipeline is at-least-once and performs no dedup.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;

use crate::application::ports::{RecordSource, SourceError};
use crate::domain::record::MarketSnapshotRecord;

/// Default chart API host.
pub const DEFAULT_CHART_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for the polling bar source.
#[derive(Debug, Clone)]
pub struct BarPollerConfig {
    /// Chart API host.
    pub base_url: String,
    /// Symbol to poll.
    pub symbol: String,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
}

impl BarPollerConfig {
    /// Settings for `symbol` against the default host.
    #[must_use]
    pub fn new(symbol: String) -> Self {
        Self {
            base_url: DEFAULT_CHART_BASE_URL.to_string(),
            symbol,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Polling implementation of the `RecordSource` port.
pub struct BarPoller {
    config: BarPollerConfig,
    client: reqwest::Client,
}

impl BarPoller {
    /// Build the poller and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Connect`] when the HTTP client cannot be
    /// constructed.
    pub fn new(config: BarPollerConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("inflow-ingest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::Connect(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn chart_url(&self) -> String {
        format!(
            "{}/v8/finance/chart/{}?range=1d&interval=1m&includeAdjustedClose=true",
            self.config.base_url, self.config.symbol
        )
    }

    /// One snapshot query for the most recent bar.
    async fn fetch_latest(&self) -> Result<MarketSnapshotRecord, SourceError> {
        let response = self
            .client
            .get(self.chart_url())
            .send()
            .await
            .map_err(|e| SourceError::Fetch(e.to_string()))?
            .error_for_status()
            .map_err(|e| SourceError::Fetch(e.to_string()))?;

        let payload: ChartResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Payload(e.to_string()))?;

        latest_bar(&payload, &self.config.symbol)
    }
}

#[async_trait]
impl RecordSource for BarPoller {
    type Record = MarketSnapshotRecord;

    async fn next_record(&mut self) -> Result<MarketSnapshotRecord, SourceError> {
        self.fetch_latest().await
    }
}

// =============================================================================
// Chart Payload
// =============================================================================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartData,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    #[serde(default)]
    result: Vec<ChartResult>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
    #[serde(default)]
    adjclose: Vec<ChartAdjClose>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<i64>>,
}

#[derive(Debug, Deserialize)]
struct ChartAdjClose {
    adjclose: Vec<Option<f64>>,
}

/// Extract the most recent complete bar. The trailing bar of an intraday
/// series can be partially null while it forms, so the scan walks backwards
/// to the newest index where all OHLC values are present.
fn latest_bar(payload: &ChartResponse, symbol: &str) -> Result<MarketSnapshotRecord, SourceError> {
    if let Some(error) = &payload.chart.error {
        if !error.is_null() {
            return Err(SourceError::Fetch(format!("chart API error: {error}")));
        }
    }

    let result = payload
        .chart
        .result
        .first()
        .ok_or_else(|| SourceError::Payload("chart response contained no result".to_string()))?;
    let timestamps = result
        .timestamp
        .as_ref()
        .ok_or_else(|| SourceError::Payload("chart response contained no timestamps".to_string()))?;
    let quote = result
        .indicators
        .quote
        .first()
        .ok_or_else(|| SourceError::Payload("chart response contained no quote series".to_string()))?;
    let adjclose = result.indicators.adjclose.first();

    for i in (0..timestamps.len()).rev() {
        let (Some(&Some(open)), Some(&Some(high)), Some(&Some(low)), Some(&Some(close))) = (
            quote.open.get(i),
            quote.high.get(i),
            quote.low.get(i),
            quote.close.get(i),
        ) else {
            continue;
        };

        let volume = quote.volume.get(i).copied().flatten().unwrap_or(0);
        let adjusted_close = adjclose
            .and_then(|series| series.adjclose.get(i))
            .copied()
            .flatten()
            .unwrap_or(close);

        let bar_time = Utc
            .timestamp_opt(timestamps[i], 0)
            .single()
            .ok_or_else(|| {
                SourceError::Payload(format!("bar timestamp {} out of range", timestamps[i]))
            })?;

        return Ok(MarketSnapshotRecord {
            symbol: symbol.to_string(),
            bar_time,
            open,
            high,
            low,
            close,
            adjusted_close,
            volume,
            // Placeholder; the ingestion loop stamps the real capture time.
            ingested_at: Utc::now(),
        });
    }

    Err(SourceError::Payload(
        "chart response contained no complete bar".to_string(),
    ))
}
