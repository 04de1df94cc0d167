//! Provider abstraction: capability set + per-capability async methods.
//!
//! Optional capabilities default to `NotSupported` instead of panicking, so
//! the API layer can answer 501 for anything the active provider does not
//! implement.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::DataError;
use super::models::{IVAnalysis, Market, MarketSentiment, OptionChain, PriceHistory, Quote};

/// The capabilities a market data source can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Quote,
    OptionChain,
    PriceHistory,
    IvAnalysis,
    MarketSentiment,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Quote => "quote",
            Capability::OptionChain => "option_chain",
            Capability::PriceHistory => "price_history",
            Capability::IvAnalysis => "iv_analysis",
            Capability::MarketSentiment => "market_sentiment",
        };
        write!(f, "{s}")
    }
}

/// Async interface every market data provider implements.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> &[Capability];

    fn supported_markets(&self) -> &[Market];

    fn supports_market(&self, market: Market) -> bool {
        self.supported_markets().contains(&market)
    }

    fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    async fn quote(&self, symbol: &str, market: Market) -> Result<Quote, DataError>;

    async fn option_chain(
        &self,
        symbol: &str,
        market: Market,
        expiration: Option<NaiveDate>,
    ) -> Result<OptionChain, DataError>;

    async fn price_history(
        &self,
        symbol: &str,
        market: Market,
        interval: &str,
        limit: usize,
    ) -> Result<PriceHistory, DataError>;

    async fn iv_analysis(&self, symbol: &str, _market: Market) -> Result<IVAnalysis, DataError> {
        let _ = symbol;
        Err(DataError::NotSupported {
            capability: Capability::IvAnalysis,
            provider: self.name(),
        })
    }

    async fn market_sentiment(
        &self,
        symbol: &str,
        _market: Market,
    ) -> Result<MarketSentiment, DataError> {
        let _ = symbol;
        Err(DataError::NotSupported {
            capability: Capability::MarketSentiment,
            provider: self.name(),
        })
    }
}
