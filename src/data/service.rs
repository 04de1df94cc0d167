//! Cache-fronted market data service.
//!
//! Every read goes through the TTL cache keyed `{category}:{symbol}:{market}`
//! so that concurrent requests for the same symbol coalesce into one upstream
//! call. Batch endpoints fan out concurrently and report per-symbol errors
//! instead of failing the whole batch.

use chrono::NaiveDate;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::cache::{
    CacheStats, TtlCache, TTL_HISTORY, TTL_IV_ANALYSIS, TTL_OPTIONS, TTL_QUOTES, TTL_SENTIMENT,
};
use super::error::DataError;
use super::models::{IVAnalysis, Market, MarketSentiment, OptionChain, PriceHistory, Quote};
use super::provider::MarketDataProvider;

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolRequest {
    pub symbol: String,
    #[serde(default)]
    pub market: Market,
}

/// One entry of a batch response: either the value or the error string.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BatchEntry<T> {
    Ok(T),
    Err { error: String },
}

pub struct MarketDataService {
    provider: Arc<dyn MarketDataProvider>,
    cache: Arc<TtlCache>,
}

impl MarketDataService {
    pub fn new(provider: Arc<dyn MarketDataProvider>, cache: Arc<TtlCache>) -> Self {
        Self { provider, cache }
    }

    pub fn provider(&self) -> &Arc<dyn MarketDataProvider> {
        &self.provider
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub async fn quote(&self, symbol: &str, market: Market) -> Result<Quote, DataError> {
        let key = format!("quote:{symbol}:{market}");
        self.cache
            .get_or_fetch(&key, TTL_QUOTES, || self.provider.quote(symbol, market))
            .await
    }

    pub async fn option_chain(
        &self,
        symbol: &str,
        market: Market,
        expiration: Option<NaiveDate>,
    ) -> Result<OptionChain, DataError> {
        let key = match expiration {
            Some(date) => format!("options:{symbol}:{market}:{date}"),
            None => format!("options:{symbol}:{market}"),
        };
        self.cache
            .get_or_fetch(&key, TTL_OPTIONS, || {
                self.provider.option_chain(symbol, market, expiration)
            })
            .await
    }

    pub async fn price_history(
        &self,
        symbol: &str,
        market: Market,
        interval: &str,
        limit: usize,
    ) -> Result<PriceHistory, DataError> {
        let key = format!("history:{symbol}:{market}:{interval}:{limit}");
        self.cache
            .get_or_fetch(&key, TTL_HISTORY, || {
                self.provider.price_history(symbol, market, interval, limit)
            })
            .await
    }

    pub async fn iv_analysis(&self, symbol: &str, market: Market) -> Result<IVAnalysis, DataError> {
        let key = format!("iv:{symbol}:{market}");
        self.cache
            .get_or_fetch(&key, TTL_IV_ANALYSIS, || {
                self.provider.iv_analysis(symbol, market)
            })
            .await
    }

    pub async fn market_sentiment(
        &self,
        symbol: &str,
        market: Market,
    ) -> Result<MarketSentiment, DataError> {
        let key = format!("sentiment:{symbol}:{market}");
        self.cache
            .get_or_fetch(&key, TTL_SENTIMENT, || {
                self.provider.market_sentiment(symbol, market)
            })
            .await
    }

    pub async fn batch_quotes(
        &self,
        symbols: &[SymbolRequest],
    ) -> HashMap<String, BatchEntry<Quote>> {
        let futures = symbols.iter().map(|req| async {
            let entry = match self.quote(&req.symbol, req.market).await {
                Ok(quote) => BatchEntry::Ok(quote),
                Err(e) => BatchEntry::Err {
                    error: e.to_string(),
                },
            };
            (req.symbol.clone(), entry)
        });
        join_all(futures).await.into_iter().collect()
    }

    pub async fn batch_iv_analysis(
        &self,
        symbols: &[SymbolRequest],
    ) -> HashMap<String, BatchEntry<IVAnalysis>> {
        let futures = symbols.iter().map(|req| async {
            let entry = match self.iv_analysis(&req.symbol, req.market).await {
                Ok(analysis) => BatchEntry::Ok(analysis),
                Err(e) => BatchEntry::Err {
                    error: e.to_string(),
                },
            };
            (req.symbol.clone(), entry)
        });
        join_all(futures).await.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::mock::MockProvider;

    fn service() -> MarketDataService {
        MarketDataService::new(Arc::new(MockProvider::new()), Arc::new(TtlCache::new()))
    }

    #[tokio::test]
    async fn quote_is_cached_by_symbol_and_market() {
        let service = service();
        let first = service.quote("SPY", Market::US).await.unwrap();
        let second = service.quote("SPY", Market::US).await.unwrap();
        assert_eq!(first.price, second.price);
        assert_eq!(first.timestamp, second.timestamp); // second hit came from cache
        assert_eq!(service.cache_stats().total_entries, 1);
    }

    #[tokio::test]
    async fn batch_reports_per_symbol_results() {
        let service = service();
        let symbols = vec![
            SymbolRequest {
                symbol: "SPY".into(),
                market: Market::US,
            },
            SymbolRequest {
                symbol: "QQQ".into(),
                market: Market::US,
            },
        ];
        let results = service.batch_quotes(&symbols).await;
        assert_eq!(results.len(), 2);
        assert!(matches!(results.get("SPY"), Some(BatchEntry::Ok(_))));
        assert!(matches!(results.get("QQQ"), Some(BatchEntry::Ok(_))));
    }
}
