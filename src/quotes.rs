//! Quote source: intraday equity quotes and the NSE option chain.
//!
//! Raw feed payloads are parsed into typed records here, at the boundary;
//! nothing downstream ever sees the dynamic JSON shape. Transient fetch
//! failures are retried with bounded exponential backoff; validation
//! failures are not.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config;
use crate::error::{Result, TradeError};
use crate::types::{OptionChain, OptionChainRow, OptionQuote};

const CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";
const NSE_CHAIN_URL: &str = "https://www.nseindia.com/api/option-chain-indices";

/// Intraday chart API response (close series only).
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    close: Vec<Option<f64>>,
}

/// NSE option-chain response, as served by the option-chain-indices API.
#[derive(Debug, Deserialize)]
struct NseChainResponse {
    records: NseRecords,
}

#[derive(Debug, Deserialize)]
struct NseRecords {
    #[serde(rename = "expiryDates")]
    expiry_dates: Vec<String>,
    data: Vec<NseChainRow>,
}

#[derive(Debug, Deserialize)]
struct NseChainRow {
    #[serde(rename = "expiryDate")]
    expiry_date: String,
    #[serde(rename = "strikePrice")]
    strike_price: u32,
    #[serde(rename = "CE")]
    ce: Option<NseSideQuote>,
    #[serde(rename = "PE")]
    pe: Option<NseSideQuote>,
}

#[derive(Debug, Deserialize)]
struct NseSideQuote {
    #[serde(rename = "lastPrice")]
    last_price: f64,
}

pub struct QuoteClient {
    client: reqwest::Client,
}

impl QuoteClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| TradeError::Fetch(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Latest traded price for an equity: the close of the most recent
    /// 1-minute intraday bar. An empty series is `NoData`.
    pub async fn equity_quote(&self, ticker: &str) -> Result<f64> {
        let closes = self.intraday_closes(ticker).await?;
        closes
            .last()
            .copied()
            .ok_or_else(|| TradeError::NoData(ticker.to_string()))
    }

    /// Today's 1-minute close series, oldest bar first, null bars dropped.
    /// Feeds both the latest quote and the indicator overlay.
    pub async fn intraday_closes(&self, ticker: &str) -> Result<Vec<f64>> {
        self.with_retry(ticker, || async {
            let chart = self.fetch_chart(ticker).await?;
            close_series(ticker, chart)
        })
        .await
    }

    async fn fetch_chart(&self, ticker: &str) -> Result<ChartResponse> {
        let url = format!("{CHART_URL}/{ticker}?range=1d&interval=1m");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TradeError::Fetch(format!("{ticker}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TradeError::Fetch(format!("{ticker}: HTTP {status}")));
        }
        resp.json()
            .await
            .map_err(|e| TradeError::Fetch(format!("{ticker}: bad chart payload: {e}")))
    }

    /// Typed option chain for an index.
    pub async fn option_chain(&self, index: &str) -> Result<OptionChain> {
        self.with_retry(index, || self.option_chain_once(index)).await
    }

    async fn option_chain_once(&self, index: &str) -> Result<OptionChain> {
        let url = format!("{NSE_CHAIN_URL}?symbol={index}");
        let resp = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| TradeError::Fetch(format!("{index}: {e}")))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TradeError::Fetch(format!("{index}: HTTP {status}")));
        }
        let raw: NseChainResponse = resp
            .json()
            .await
            .map_err(|e| TradeError::Fetch(format!("{index}: bad chain payload: {e}")))?;
        Ok(chain_from_response(index, raw))
    }

    /// Bounded retry with exponential backoff. Only retryable errors
    /// (fetch failures, empty data) re-enter the loop.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;
        for attempt in 0..config::QUOTE_RETRY_ATTEMPTS {
            if attempt > 0 {
                let delay = Duration::from_secs(
                    config::QUOTE_RETRY_BASE_DELAY_SECS
                        * u64::from(config::QUOTE_RETRY_MULTIPLIER).pow(attempt - 1),
                );
                debug!("[QUOTES] retrying {} in {:?}", what, delay);
                tokio::time::sleep(delay).await;
            }
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    warn!("[QUOTES] attempt {} for {} failed: {}", attempt + 1, what, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.expect("at least one attempt ran"))
    }
}

/// Non-null closes of the intraday series, oldest first. A series with no
/// quoted bars is `NoData`.
fn close_series(ticker: &str, resp: ChartResponse) -> Result<Vec<f64>> {
    let closes = resp
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .and_then(|d| d.indicators.quote.into_iter().next())
        .map(|q| q.close)
        .ok_or_else(|| TradeError::NoData(ticker.to_string()))?;

    let series: Vec<f64> = closes.into_iter().flatten().collect();
    if series.is_empty() {
        return Err(TradeError::NoData(ticker.to_string()));
    }
    Ok(series)
}

/// Map the raw chain into the typed record the engine consumes.
fn chain_from_response(index: &str, resp: NseChainResponse) -> OptionChain {
    OptionChain {
        index: index.to_string(),
        expiry_dates: resp.records.expiry_dates,
        rows: resp
            .records
            .data
            .into_iter()
            .map(|row| OptionChainRow {
                expiry_date: row.expiry_date,
                strike_price: row.strike_price,
                ce: row.ce.map(|q| OptionQuote {
                    last_price: q.last_price,
                }),
                pe: row.pe.map(|q| OptionQuote {
                    last_price: q.last_price,
                }),
            })
            .collect(),
    }
}
