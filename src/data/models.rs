//! Market data model shared by providers, the cache, and the API surface.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported equity/option markets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    US,
    JP,
    HK,
}

impl Default for Market {
    fn default() -> Self {
        Market::US
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Market::US => write!(f, "US"),
            Market::JP => write!(f, "JP"),
            Market::HK => write!(f, "HK"),
        }
    }
}

/// Option Greeks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

/// Real-time price quote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub market: Market,
    pub price: f64,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub volume: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionType {
    Call,
    Put,
}

/// Single option contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionContract {
    pub symbol: String,
    pub underlying: String,
    pub strike: f64,
    pub expiration: NaiveDate,
    pub option_type: OptionType,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub last_price: Option<f64>,
    pub volume: u64,
    pub open_interest: u64,
    pub implied_volatility: Option<f64>,
    pub greeks: Option<Greeks>,
}

/// Option chain for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionChain {
    pub underlying: String,
    pub market: Market,
    pub expirations: Vec<NaiveDate>,
    pub calls: Vec<OptionContract>,
    pub puts: Vec<OptionContract>,
    pub timestamp: DateTime<Utc>,
}

/// OHLCV price bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Historical price data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub symbol: String,
    pub market: Market,
    pub interval: String,
    pub bars: Vec<PriceBar>,
}

/// IV rank and percentile analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IVAnalysis {
    pub symbol: String,
    pub market: Market,
    pub current_iv: f64,
    pub iv_rank: f64,
    pub iv_percentile: f64,
    pub iv_52w_high: f64,
    pub iv_52w_low: f64,
    pub iv_30d_avg: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Bearish,
    SlightlyBearish,
    Neutral,
    SlightlyBullish,
    Bullish,
}

/// Put/call ratio and sentiment indicators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSentiment {
    pub symbol: String,
    pub market: Market,
    pub put_call_ratio: f64,
    pub total_call_volume: u64,
    pub total_put_volume: u64,
    pub call_open_interest: u64,
    pub put_open_interest: u64,
    pub sentiment: Sentiment,
    pub timestamp: DateTime<Utc>,
}
