//! Aggregated provider: primary source with tool-server fallbacks.
//!
//! Every capability first tries the primary provider. On any error the
//! fallback manager walks its priority list, the winning payload is mapped
//! into our data model, and the caller never learns a fallback happened.
//! When every fallback fails (or none is configured for the capability) the
//! primary error is what the caller sees: wrapped as `ProviderUnavailable`
//! with the original as cause when fallbacks were tried, re-raised untouched
//! when none exist.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use super::error::DataError;
use super::mapping::ToolMapper;
use super::models::{IVAnalysis, Market, MarketSentiment, OptionChain, PriceHistory, Quote};
use super::provider::{Capability, MarketDataProvider};
use super::tool_servers::ToolServerManager;

pub struct AggregatedProvider {
    primary: Arc<dyn MarketDataProvider>,
    tools: Arc<ToolServerManager>,
}

impl AggregatedProvider {
    pub fn new(primary: Arc<dyn MarketDataProvider>, tools: Arc<ToolServerManager>) -> Self {
        Self { primary, tools }
    }

    pub fn primary(&self) -> &Arc<dyn MarketDataProvider> {
        &self.primary
    }

    fn unavailable(capability: Capability, primary_err: DataError) -> DataError {
        DataError::ProviderUnavailable {
            capability,
            source: Box::new(primary_err),
        }
    }
}

const AGGREGATED_CAPABILITIES: &[Capability] = &[
    Capability::Quote,
    Capability::OptionChain,
    Capability::PriceHistory,
    Capability::IvAnalysis,
    Capability::MarketSentiment,
];

#[async_trait]
impl MarketDataProvider for AggregatedProvider {
    fn name(&self) -> &'static str {
        "aggregated"
    }

    fn capabilities(&self) -> &[Capability] {
        AGGREGATED_CAPABILITIES
    }

    fn supported_markets(&self) -> &[Market] {
        self.primary.supported_markets()
    }

    async fn quote(&self, symbol: &str, market: Market) -> Result<Quote, DataError> {
        let primary_err = match self.primary.quote(symbol, market).await {
            Ok(quote) => return Ok(quote),
            Err(e) => e,
        };
        debug!("Primary quote failed: {primary_err}, trying fallbacks");

        if !self.tools.has_fallback_for(Capability::Quote) {
            return Err(primary_err);
        }

        let args = json!({ "symbol": symbol, "market": market.to_string() });
        if let Some(result) = self
            .tools
            .call_with_fallback(Capability::Quote, "get_quote", &args)
            .await
        {
            if let Some(quote) = result
                .data
                .as_ref()
                .and_then(|data| ToolMapper::parse_quote(data, symbol, market))
            {
                return Ok(quote);
            }
        }

        Err(Self::unavailable(Capability::Quote, primary_err))
    }

    async fn option_chain(
        &self,
        symbol: &str,
        market: Market,
        expiration: Option<NaiveDate>,
    ) -> Result<OptionChain, DataError> {
        let primary_err = match self.primary.option_chain(symbol, market, expiration).await {
            Ok(chain) => return Ok(chain),
            Err(e) => e,
        };
        debug!("Primary option_chain failed: {primary_err}, trying fallbacks");

        if !self.tools.has_fallback_for(Capability::OptionChain) {
            return Err(primary_err);
        }

        let mut args = json!({ "symbol": symbol, "market": market.to_string() });
        if let Some(date) = expiration {
            args["expiration"] = json!(date.to_string());
        }
        if let Some(result) = self
            .tools
            .call_with_fallback(Capability::OptionChain, "get_option_chain", &args)
            .await
        {
            if let Some(chain) = result
                .data
                .as_ref()
                .and_then(|data| ToolMapper::parse_option_chain(data, symbol, market))
            {
                return Ok(chain);
            }
        }

        Err(Self::unavailable(Capability::OptionChain, primary_err))
    }

    async fn price_history(
        &self,
        symbol: &str,
        market: Market,
        interval: &str,
        limit: usize,
    ) -> Result<PriceHistory, DataError> {
        let primary_err = match self
            .primary
            .price_history(symbol, market, interval, limit)
            .await
        {
            Ok(history) => return Ok(history),
            Err(e) => e,
        };
        debug!("Primary price_history failed: {primary_err}, trying fallbacks");

        if !self.tools.has_fallback_for(Capability::PriceHistory) {
            return Err(primary_err);
        }

        let args = json!({
            "symbol": symbol,
            "market": market.to_string(),
            "interval": interval,
            "limit": limit,
        });
        if let Some(result) = self
            .tools
            .call_with_fallback(Capability::PriceHistory, "get_price_history", &args)
            .await
        {
            if let Some(history) = result
                .data
                .as_ref()
                .and_then(|data| ToolMapper::parse_price_history(data, symbol, market, interval))
            {
                return Ok(history);
            }
        }

        Err(Self::unavailable(Capability::PriceHistory, primary_err))
    }

    async fn iv_analysis(&self, symbol: &str, market: Market) -> Result<IVAnalysis, DataError> {
        let primary_err = match self.primary.iv_analysis(symbol, market).await {
            Ok(analysis) => return Ok(analysis),
            Err(e) => e,
        };
        debug!("Primary iv_analysis failed: {primary_err}, trying fallbacks");

        if !self.tools.has_fallback_for(Capability::IvAnalysis) {
            return Err(primary_err);
        }

        let args = json!({ "symbol": symbol, "market": market.to_string() });
        if let Some(result) = self
            .tools
            .call_with_fallback(Capability::IvAnalysis, "get_iv_analysis", &args)
            .await
        {
            if let Some(analysis) = result
                .data
                .as_ref()
                .and_then(|data| ToolMapper::build_iv_analysis(data, symbol, market))
            {
                return Ok(analysis);
            }
        }

        Err(Self::unavailable(Capability::IvAnalysis, primary_err))
    }

    async fn market_sentiment(
        &self,
        symbol: &str,
        market: Market,
    ) -> Result<MarketSentiment, DataError> {
        let primary_err = match self.primary.market_sentiment(symbol, market).await {
            Ok(sentiment) => return Ok(sentiment),
            Err(e) => e,
        };
        debug!("Primary market_sentiment failed: {primary_err}, trying fallbacks");

        if !self.tools.has_fallback_for(Capability::MarketSentiment) {
            return Err(primary_err);
        }

        let args = json!({ "symbol": symbol, "market": market.to_string() });
        if let Some(result) = self
            .tools
            .call_with_fallback(Capability::MarketSentiment, "get_sentiment", &args)
            .await
        {
            if let Some(sentiment) = result
                .data
                .as_ref()
                .and_then(|data| ToolMapper::parse_sentiment(data, symbol, market))
            {
                return Ok(sentiment);
            }
        }

        Err(Self::unavailable(Capability::MarketSentiment, primary_err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tool_servers::ToolServersConfig;

    /// Primary that fails every call, for fallback-path tests.
    struct DownProvider;

    #[async_trait]
    impl MarketDataProvider for DownProvider {
        fn name(&self) -> &'static str {
            "down"
        }
        fn capabilities(&self) -> &[Capability] {
            &[Capability::Quote]
        }
        fn supported_markets(&self) -> &[Market] {
            &[Market::US]
        }
        async fn quote(&self, _symbol: &str, _market: Market) -> Result<Quote, DataError> {
            Err(DataError::Transport("connection refused".into()))
        }
        async fn option_chain(
            &self,
            _symbol: &str,
            _market: Market,
            _expiration: Option<NaiveDate>,
        ) -> Result<OptionChain, DataError> {
            Err(DataError::Transport("connection refused".into()))
        }
        async fn price_history(
            &self,
            _symbol: &str,
            _market: Market,
            _interval: &str,
            _limit: usize,
        ) -> Result<PriceHistory, DataError> {
            Err(DataError::Transport("connection refused".into()))
        }
    }

    fn empty_tools() -> Arc<ToolServerManager> {
        Arc::new(ToolServerManager::new(ToolServersConfig::default()))
    }

    fn tools_with_dead_fallback() -> Arc<ToolServerManager> {
        let yaml = r#"
tool_servers:
  bridge:
    name: Bridge
    enabled: false
    command: cat
    capabilities: [quote]
    tool_mappings:
      get_quote: get_stock_info
fallback_priority:
  quote: [bridge]
"#;
        let config: ToolServersConfig = serde_yaml::from_str(yaml).unwrap();
        Arc::new(ToolServerManager::new(config))
    }

    #[tokio::test]
    async fn no_fallback_mapping_reraises_primary_error() {
        let provider = AggregatedProvider::new(Arc::new(DownProvider), empty_tools());
        let err = provider.quote("SPY", Market::US).await.unwrap_err();
        assert!(matches!(err, DataError::Transport(_)));
    }

    #[tokio::test]
    async fn exhausted_fallbacks_preserve_primary_cause() {
        let provider = AggregatedProvider::new(Arc::new(DownProvider), tools_with_dead_fallback());
        let err = provider.quote("SPY", Market::US).await.unwrap_err();
        match err {
            DataError::ProviderUnavailable { capability, source } => {
                assert_eq!(capability, Capability::Quote);
                assert!(matches!(*source, DataError::Transport(_)));
            }
            other => panic!("expected ProviderUnavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn healthy_primary_short_circuits() {
        let provider = AggregatedProvider::new(
            Arc::new(crate::data::mock::MockProvider::new()),
            empty_tools(),
        );
        let quote = provider.quote("SPY", Market::US).await.unwrap();
        assert_eq!(quote.price, 585.0);
    }

    #[tokio::test]
    async fn not_supported_primary_without_fallback_keeps_501_semantics() {
        let provider = AggregatedProvider::new(Arc::new(DownProvider), empty_tools());
        let err = provider.iv_analysis("SPY", Market::US).await.unwrap_err();
        assert!(matches!(err, DataError::NotSupported { .. }));
    }
}
