//! Yahoo Finance chart endpoint adapter.
//!
//! # Data Source
//! - Daily bars: `{base}/v8/finance/chart/{symbol}?interval=1d&range={n}d`
//!
//! One request per symbol. A symbol that is unknown (404) or returns an empty
//! result is left out of the batch; transport failures, HTTP 429 and 5xx fail
//! the batch so the engine can cool down.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use eod_common::FetchConfig;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::provider::{ProviderError, QuoteProvider};
use super::{DailyBar, SymbolHistory};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    /// Exchange offset from UTC in seconds
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteArrays>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteArrays {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// Session date in exchange-local time.
fn session_date(timestamp: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp + gmtoffset, 0).map(|dt| dt.date_naive())
}

fn value_at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

/// Map a chart result into bars, skipping timestamps that don't convert.
fn to_bars(result: ChartResult) -> Vec<DailyBar> {
    let offset = result.meta.gmtoffset;
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let date = session_date(*ts, offset)?;
            Some(DailyBar::new(
                date,
                value_at(&quote.open, i),
                value_at(&quote.close, i),
                value_at(&quote.volume, i),
            ))
        })
        .collect()
}

// ============================================================================
// Adapter
// ============================================================================

/// Daily history from the public Yahoo chart API.
pub struct YahooChartProvider {
    client: reqwest::Client,
    base_url: String,
}

impl YahooChartProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    /// Fetch one symbol; `Ok(None)` means the symbol has no usable data.
    async fn fetch_symbol(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<Option<SymbolHistory>, ProviderError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let range = format!("{}d", lookback_days.max(2));

        let response = self
            .client
            .get(&url)
            .query(&[("interval", "1d"), ("range", range.as_str())])
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        if status.is_server_error() {
            return Err(ProviderError::Unavailable(format!(
                "HTTP {} for {}",
                status, symbol
            )));
        }
        if !status.is_success() {
            debug!(symbol, status = %status, "No chart data");
            return Ok(None);
        }

        let envelope: ChartEnvelope = match response.json().await {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(symbol, error = %e, "Unparsable chart response");
                return Ok(None);
            }
        };

        let bars = envelope
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .map(to_bars)
            .unwrap_or_default();

        if bars.is_empty() {
            debug!(symbol, "Empty chart result");
            return Ok(None);
        }

        Ok(Some(SymbolHistory {
            symbol: symbol.to_string(),
            bars,
        }))
    }
}

#[async_trait]
impl QuoteProvider for YahooChartProvider {
    fn name(&self) -> &str {
        "yahoo-chart"
    }

    async fn fetch_daily(
        &self,
        symbols: &[String],
        lookback_days: u32,
    ) -> Result<Vec<SymbolHistory>, ProviderError> {
        let mut histories = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if let Some(history) = self.fetch_symbol(symbol, lookback_days).await? {
                histories.push(history);
            }
        }
        Ok(histories)
    }
}
