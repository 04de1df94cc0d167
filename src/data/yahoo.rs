//! Yahoo Finance REST adapter.
//!
//! Free-tier endpoints, so we stay polite: a simple request-window rate
//! limiter plus bounded retry with exponential backoff on transient errors.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::error::DataError;
use super::models::{
    Market, OptionChain, OptionContract, OptionType, PriceBar, PriceHistory, Quote,
};
use super::provider::{Capability, MarketDataProvider};

const CHART_API_BASE: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const OPTIONS_API_BASE: &str = "https://query1.finance.yahoo.com/v7/finance/options";

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 100;

const CAPABILITIES: &[Capability] = &[
    Capability::Quote,
    Capability::OptionChain,
    Capability::PriceHistory,
];

const MARKETS: &[Market] = &[Market::US, Market::JP, Market::HK];

/// Rate limiter to respect API limits.
struct RateLimiter {
    requests_per_minute: u32,
    current_requests: u32,
    window_start: std::time::Instant,
}

impl RateLimiter {
    fn new(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
            current_requests: 0,
            window_start: std::time::Instant::now(),
        }
    }

    async fn acquire(&mut self) {
        let elapsed = self.window_start.elapsed();

        if elapsed >= Duration::from_secs(60) {
            self.current_requests = 0;
            self.window_start = std::time::Instant::now();
        }

        if self.current_requests >= self.requests_per_minute {
            let wait_time = Duration::from_secs(60).saturating_sub(elapsed);
            if wait_time > Duration::ZERO {
                debug!("Rate limiting: waiting {}ms", wait_time.as_millis());
                sleep(wait_time).await;
            }
            self.current_requests = 0;
            self.window_start = std::time::Instant::now();
        }

        self.current_requests += 1;
    }
}

pub struct YahooProvider {
    client: Client,
    limiter: Mutex<RateLimiter>,
}

impl YahooProvider {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("OptDesk/1.0 (Decision Engine)")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            limiter: Mutex::new(RateLimiter::new(100)),
        }
    }

    async fn execute_with_retry(&self, url: &str) -> Result<reqwest::Response, DataError> {
        self.limiter.lock().await.acquire().await;

        let mut backoff = INITIAL_BACKOFF_MS;
        let mut last_err = None;

        for attempt in 0..MAX_RETRIES {
            match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!("Yahoo returned {status}, retry {}/{MAX_RETRIES}", attempt + 1);
                        last_err = Some(DataError::Transport(format!("HTTP {status} from {url}")));
                    } else {
                        return Err(DataError::Transport(format!("HTTP {status} from {url}")));
                    }
                }
                Err(e) => {
                    warn!("Yahoo request error: {e}, retry {}/{MAX_RETRIES}", attempt + 1);
                    last_err = Some(e.into());
                }
            }
            sleep(Duration::from_millis(backoff)).await;
            backoff *= 2;
        }

        Err(last_err.unwrap_or_else(|| DataError::Transport("retries exhausted".into())))
    }

    fn chart_url(symbol: &str, range: &str, interval: &str) -> String {
        format!("{CHART_API_BASE}/{symbol}?range={range}&interval={interval}")
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ── Yahoo response shapes (only the fields we read) ──────────────────────

#[derive(Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Deserialize)]
struct ChartMeta {
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    #[serde(rename = "chartPreviousClose")]
    chart_previous_close: Option<f64>,
    #[serde(rename = "regularMarketVolume")]
    regular_market_volume: Option<u64>,
}

#[derive(Deserialize)]
struct Indicators {
    quote: Vec<QuoteArrays>,
}

#[derive(Deserialize)]
struct QuoteArrays {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<u64>>>,
}

#[derive(Deserialize)]
struct OptionsEnvelope {
    #[serde(rename = "optionChain")]
    option_chain: OptionsBody,
}

#[derive(Deserialize)]
struct OptionsBody {
    result: Option<Vec<OptionsResult>>,
}

#[derive(Deserialize)]
struct OptionsResult {
    #[serde(rename = "expirationDates", default)]
    expiration_dates: Vec<i64>,
    #[serde(default)]
    options: Vec<OptionsSlice>,
}

#[derive(Deserialize)]
struct OptionsSlice {
    #[serde(default)]
    calls: Vec<YahooContract>,
    #[serde(default)]
    puts: Vec<YahooContract>,
}

#[derive(Deserialize)]
struct YahooContract {
    #[serde(rename = "contractSymbol")]
    contract_symbol: String,
    strike: f64,
    expiration: i64,
    bid: Option<f64>,
    ask: Option<f64>,
    #[serde(rename = "lastPrice")]
    last_price: Option<f64>,
    volume: Option<u64>,
    #[serde(rename = "openInterest")]
    open_interest: Option<u64>,
    #[serde(rename = "impliedVolatility")]
    implied_volatility: Option<f64>,
}

fn epoch_date(secs: i64) -> NaiveDate {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.date_naive())
        .unwrap_or_else(|| Utc::now().date_naive())
}

fn history_range(interval: &str, limit: usize) -> &'static str {
    match interval {
        "5m" => "5d",
        "1h" => "1mo",
        _ if limit > 250 => "2y",
        _ if limit > 120 => "1y",
        _ if limit > 20 => "6mo",
        _ => "1mo",
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    fn capabilities(&self) -> &[Capability] {
        CAPABILITIES
    }

    fn supported_markets(&self) -> &[Market] {
        MARKETS
    }

    async fn quote(&self, symbol: &str, market: Market) -> Result<Quote, DataError> {
        let url = Self::chart_url(symbol, "1d", "1d");
        let response = self.execute_with_retry(&url).await?;
        let envelope: ChartEnvelope = response.json().await.map_err(|e| DataError::Parse {
            what: "quote",
            detail: e.to_string(),
        })?;

        if let Some(err) = envelope.chart.error {
            return Err(DataError::Transport(format!("Yahoo chart error: {err}")));
        }

        let result = envelope
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or(DataError::Parse {
                what: "quote",
                detail: "empty chart result".into(),
            })?;

        let price = result.meta.regular_market_price.ok_or(DataError::Parse {
            what: "quote",
            detail: "missing regularMarketPrice".into(),
        })?;
        let prev = result.meta.chart_previous_close;

        Ok(Quote {
            symbol: symbol.to_string(),
            market,
            price,
            change: prev.map(|p| price - p),
            change_percent: prev.filter(|p| *p > 0.0).map(|p| (price / p - 1.0) * 100.0),
            bid: None,
            ask: None,
            volume: result.meta.regular_market_volume.unwrap_or(0),
            timestamp: Utc::now(),
        })
    }

    async fn option_chain(
        &self,
        symbol: &str,
        market: Market,
        expiration: Option<NaiveDate>,
    ) -> Result<OptionChain, DataError> {
        let url = match expiration {
            Some(date) => {
                let epoch = date
                    .and_hms_opt(0, 0, 0)
                    .map(|dt| dt.and_utc().timestamp())
                    .unwrap_or_default();
                format!("{OPTIONS_API_BASE}/{symbol}?date={epoch}")
            }
            None => format!("{OPTIONS_API_BASE}/{symbol}"),
        };

        let response = self.execute_with_retry(&url).await?;
        let envelope: OptionsEnvelope = response.json().await.map_err(|e| DataError::Parse {
            what: "option chain",
            detail: e.to_string(),
        })?;

        let result = envelope
            .option_chain
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or(DataError::Parse {
                what: "option chain",
                detail: "empty options result".into(),
            })?;

        let convert = |c: YahooContract, option_type: OptionType| OptionContract {
            symbol: c.contract_symbol,
            underlying: symbol.to_string(),
            strike: c.strike,
            expiration: epoch_date(c.expiration),
            option_type,
            bid: c.bid,
            ask: c.ask,
            last_price: c.last_price,
            volume: c.volume.unwrap_or(0),
            open_interest: c.open_interest.unwrap_or(0),
            implied_volatility: c.implied_volatility,
            greeks: None,
        };

        let mut calls = Vec::new();
        let mut puts = Vec::new();
        for slice in result.options {
            calls.extend(slice.calls.into_iter().map(|c| convert(c, OptionType::Call)));
            puts.extend(slice.puts.into_iter().map(|c| convert(c, OptionType::Put)));
        }

        Ok(OptionChain {
            underlying: symbol.to_string(),
            market,
            expirations: result.expiration_dates.into_iter().map(epoch_date).collect(),
            calls,
            puts,
            timestamp: Utc::now(),
        })
    }

    async fn price_history(
        &self,
        symbol: &str,
        market: Market,
        interval: &str,
        limit: usize,
    ) -> Result<PriceHistory, DataError> {
        let url = Self::chart_url(symbol, history_range(interval, limit), interval);
        let response = self.execute_with_retry(&url).await?;
        let envelope: ChartEnvelope = response.json().await.map_err(|e| DataError::Parse {
            what: "price history",
            detail: e.to_string(),
        })?;

        let result = envelope
            .chart
            .result
            .and_then(|mut r| if r.is_empty() { None } else { Some(r.remove(0)) })
            .ok_or(DataError::Parse {
                what: "price history",
                detail: "empty chart result".into(),
            })?;

        let timestamps = result.timestamp.unwrap_or_default();
        let arrays = result.indicators.quote.into_iter().next().ok_or(DataError::Parse {
            what: "price history",
            detail: "missing quote indicators".into(),
        })?;

        let opens = arrays.open.unwrap_or_default();
        let highs = arrays.high.unwrap_or_default();
        let lows = arrays.low.unwrap_or_default();
        let closes = arrays.close.unwrap_or_default();
        let volumes = arrays.volume.unwrap_or_default();

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, ts) in timestamps.iter().enumerate() {
            let close = match closes.get(i).copied().flatten() {
                Some(c) => c,
                None => continue, // Yahoo pads holidays with nulls
            };
            bars.push(PriceBar {
                timestamp: DateTime::<Utc>::from_timestamp(*ts, 0).unwrap_or_else(Utc::now),
                open: opens.get(i).copied().flatten().unwrap_or(close),
                high: highs.get(i).copied().flatten().unwrap_or(close),
                low: lows.get(i).copied().flatten().unwrap_or(close),
                close,
                volume: volumes.get(i).copied().flatten().unwrap_or(0),
            });
        }

        if bars.len() > limit {
            bars.drain(..bars.len() - limit);
        }

        Ok(PriceHistory {
            symbol: symbol.to_string(),
            market,
            interval: interval.to_string(),
            bars,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_range_scales_with_limit() {
        assert_eq!(history_range("1d", 30), "6mo");
        assert_eq!(history_range("1d", 200), "1y");
        assert_eq!(history_range("1d", 400), "2y");
        assert_eq!(history_range("5m", 100), "5d");
    }

    #[test]
    fn epoch_date_converts() {
        let date = epoch_date(1_700_000_000);
        assert_eq!(date.format("%Y").to_string(), "2023");
    }
}
