//! Deterministic mock provider.
//!
//! Fully synthetic but reproducible: the same symbol always yields the same
//! quote, chain, and history. No randomness anywhere: repeated calls inside
//! one test run and across runs return identical data (timestamps aside).

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};

use super::error::DataError;
use super::models::{
    Greeks, IVAnalysis, Market, MarketSentiment, OptionChain, OptionContract, OptionType,
    PriceBar, PriceHistory, Quote, Sentiment,
};
use super::provider::{Capability, MarketDataProvider};

const CAPABILITIES: &[Capability] = &[
    Capability::Quote,
    Capability::OptionChain,
    Capability::PriceHistory,
    Capability::IvAnalysis,
    Capability::MarketSentiment,
];

const MARKETS: &[Market] = &[Market::US, Market::JP, Market::HK];

/// Known symbols with stable base prices; anything else derives a price from
/// the symbol bytes so unknown tickers still behave deterministically.
const BASE_PRICES: &[(&str, f64)] = &[
    ("SPY", 585.0),
    ("SPX", 5850.0),
    ("^VIX", 17.5),
    ("QQQ", 500.0),
    ("IWM", 220.0),
    ("AAPL", 225.0),
    ("MSFT", 420.0),
    ("NVDA", 135.0),
    ("TSLA", 250.0),
    ("7203.T", 2800.0),
    ("0700.HK", 380.0),
];

fn base_price(symbol: &str) -> f64 {
    if let Some((_, price)) = BASE_PRICES.iter().find(|(s, _)| *s == symbol) {
        return *price;
    }
    // Stable hash of the symbol bytes into a plausible price band
    let sum: u32 = symbol.bytes().map(u32::from).sum();
    50.0 + f64::from(sum % 400)
}

fn base_iv(symbol: &str) -> f64 {
    match symbol {
        "SPY" | "SPX" => 0.155,
        "^VIX" => 0.90,
        _ => 0.25 + f64::from(symbol.len() as u32 % 5) * 0.02,
    }
}

pub struct MockProvider;

impl MockProvider {
    pub fn new() -> Self {
        Self
    }

    /// Deterministic close series: gentle uptrend with a fixed oscillation.
    fn synthetic_closes(symbol: &str, bars: usize) -> Vec<f64> {
        let last = base_price(symbol);
        let mut closes = Vec::with_capacity(bars);
        for i in 0..bars {
            // Index 0 is the oldest bar; drift up toward the current price.
            let age = (bars - 1 - i) as f64;
            let drift = last * (1.0 - 0.0004 * age);
            let wiggle = drift * 0.002 * (i as f64 * 0.7).sin();
            closes.push(drift + wiggle);
        }
        closes
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn capabilities(&self) -> &[Capability] {
        CAPABILITIES
    }

    fn supported_markets(&self) -> &[Market] {
        MARKETS
    }

    async fn quote(&self, symbol: &str, market: Market) -> Result<Quote, DataError> {
        let price = base_price(symbol);
        let change = price * 0.003;
        Ok(Quote {
            symbol: symbol.to_string(),
            market,
            price,
            change: Some(change),
            change_percent: Some(0.3),
            bid: Some(price - 0.02),
            ask: Some(price + 0.02),
            volume: 1_250_000,
            timestamp: Utc::now(),
        })
    }

    async fn option_chain(
        &self,
        symbol: &str,
        market: Market,
        expiration: Option<NaiveDate>,
    ) -> Result<OptionChain, DataError> {
        let spot = base_price(symbol);
        let iv = base_iv(symbol);
        let today = Utc::now().date_naive();
        let expirations: Vec<NaiveDate> = [30_i64, 60, 90]
            .iter()
            .map(|d| today + ChronoDuration::days(*d))
            .collect();
        let exp = expiration.unwrap_or(expirations[0]);

        let mut calls = Vec::new();
        let mut puts = Vec::new();
        for i in 0..11u32 {
            // 11 strikes centred on spot, 2.5% apart
            let strike = (spot * (0.875 + 0.025 * f64::from(i))).round();
            let moneyness = (strike - spot) / spot;
            let call_delta = (0.5 - moneyness * 4.0).clamp(0.02, 0.98);
            let intrinsic_call = (spot - strike).max(0.0);
            let intrinsic_put = (strike - spot).max(0.0);
            let time_value = spot * iv * 0.08;

            calls.push(OptionContract {
                symbol: format!("{symbol}{exp}C{strike:.0}"),
                underlying: symbol.to_string(),
                strike,
                expiration: exp,
                option_type: OptionType::Call,
                bid: Some(intrinsic_call + time_value - 0.05),
                ask: Some(intrinsic_call + time_value + 0.05),
                last_price: Some(intrinsic_call + time_value),
                volume: 500 + 100 * u64::from(i),
                open_interest: 2_000 + 400 * u64::from(i),
                implied_volatility: Some(iv + moneyness.abs() * 0.10),
                greeks: Some(Greeks {
                    delta: call_delta,
                    gamma: 0.015,
                    theta: -0.04,
                    vega: 0.11,
                    rho: 0.03,
                }),
            });
            puts.push(OptionContract {
                symbol: format!("{symbol}{exp}P{strike:.0}"),
                underlying: symbol.to_string(),
                strike,
                expiration: exp,
                option_type: OptionType::Put,
                bid: Some(intrinsic_put + time_value - 0.05),
                ask: Some(intrinsic_put + time_value + 0.05),
                last_price: Some(intrinsic_put + time_value),
                volume: 600 + 100 * u64::from(i),
                open_interest: 2_500 + 400 * u64::from(i),
                implied_volatility: Some(iv + moneyness.abs() * 0.14),
                greeks: Some(Greeks {
                    delta: call_delta - 1.0,
                    gamma: 0.015,
                    theta: -0.04,
                    vega: 0.11,
                    rho: -0.03,
                }),
            });
        }

        Ok(OptionChain {
            underlying: symbol.to_string(),
            market,
            expirations,
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
        let closes = Self::synthetic_closes(symbol, limit.max(2));
        let now = Utc::now();
        let step = match interval {
            "1h" => ChronoDuration::hours(1),
            "5m" => ChronoDuration::minutes(5),
            _ => ChronoDuration::days(1),
        };

        let bars = closes
            .iter()
            .enumerate()
            .map(|(i, close)| {
                let age = (closes.len() - 1 - i) as i32;
                PriceBar {
                    timestamp: now - step * age,
                    open: close * 0.999,
                    high: close * 1.004,
                    low: close * 0.996,
                    close: *close,
                    volume: 80_000_000,
                }
            })
            .collect();

        Ok(PriceHistory {
            symbol: symbol.to_string(),
            market,
            interval: interval.to_string(),
            bars,
        })
    }

    async fn iv_analysis(&self, symbol: &str, market: Market) -> Result<IVAnalysis, DataError> {
        let iv = base_iv(symbol);
        let low = iv * 0.6;
        let high = iv * 1.8;
        Ok(IVAnalysis {
            symbol: symbol.to_string(),
            market,
            current_iv: iv,
            iv_rank: ((iv - low) / (high - low) * 100.0).clamp(0.0, 100.0),
            iv_percentile: 42.0,
            iv_52w_high: high,
            iv_52w_low: low,
            iv_30d_avg: iv * 1.05,
            timestamp: Utc::now(),
        })
    }

    async fn market_sentiment(
        &self,
        symbol: &str,
        market: Market,
    ) -> Result<MarketSentiment, DataError> {
        Ok(MarketSentiment {
            symbol: symbol.to_string(),
            market,
            put_call_ratio: 0.92,
            total_call_volume: 410_000,
            total_put_volume: 377_000,
            call_open_interest: 4_100_000,
            put_open_interest: 3_770_000,
            sentiment: Sentiment::Neutral,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn quotes_are_deterministic() {
        let provider = MockProvider::new();
        let a = provider.quote("SPY", Market::US).await.unwrap();
        let b = provider.quote("SPY", Market::US).await.unwrap();
        assert_eq!(a.price, b.price);
        assert_eq!(a.price, 585.0);
    }

    #[tokio::test]
    async fn unknown_symbols_get_stable_prices() {
        let provider = MockProvider::new();
        let a = provider.quote("ZZTOP", Market::US).await.unwrap();
        let b = provider.quote("ZZTOP", Market::US).await.unwrap();
        assert_eq!(a.price, b.price);
        assert!(a.price > 0.0);
    }

    #[tokio::test]
    async fn history_trends_up_toward_spot() {
        let provider = MockProvider::new();
        let history = provider
            .price_history("SPY", Market::US, "1d", 200)
            .await
            .unwrap();
        assert_eq!(history.bars.len(), 200);
        let first = history.bars.first().unwrap().close;
        let last = history.bars.last().unwrap().close;
        assert!(last > first);
    }

    #[tokio::test]
    async fn chain_has_symmetric_strikes() {
        let provider = MockProvider::new();
        let chain = provider.option_chain("SPY", Market::US, None).await.unwrap();
        assert_eq!(chain.calls.len(), chain.puts.len());
        assert_eq!(chain.expirations.len(), 3);
    }
}
