//! Response mapping: tool-server JSON payloads -> internal data models.
//!
//! Tool servers return whatever their upstream gives them; these parsers
//! normalize the common shapes (Yahoo-style stock info, price lists, analyst
//! recommendations) into our typed structs. Every parser is total over its
//! input: bad payloads yield `None`, never a panic.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tracing::warn;

use super::models::{
    IVAnalysis, Market, MarketSentiment, OptionChain, OptionContract, OptionType, PriceBar,
    PriceHistory, Quote, Sentiment,
};

pub struct ToolMapper;

fn num(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

fn first_num(data: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| num(data.get(*k)))
}

fn parse_timestamp(value: Option<&Value>) -> DateTime<Utc> {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now),
        Some(Value::String(s)) => s
            .parse::<DateTime<Utc>>()
            .or_else(|_| format!("{s}T00:00:00Z").parse::<DateTime<Utc>>())
            .unwrap_or_else(|_| Utc::now()),
        _ => Utc::now(),
    }
}

impl ToolMapper {
    /// Yahoo-style stock info JSON -> Quote.
    pub fn parse_quote(data: &Value, symbol: &str, market: Market) -> Option<Quote> {
        if !data.is_object() {
            return None;
        }
        let price = first_num(data, &["currentPrice", "regularMarketPrice", "price"])?;
        Some(Quote {
            symbol: symbol.to_string(),
            market,
            price,
            change: first_num(data, &["regularMarketChange", "change"]),
            change_percent: first_num(data, &["regularMarketChangePercent", "changePercent"]),
            bid: num(data.get("bid")),
            ask: num(data.get("ask")),
            volume: first_num(data, &["volume", "regularMarketVolume"]).unwrap_or(0.0) as u64,
            timestamp: Utc::now(),
        })
    }

    /// List of OHLCV rows (or `{prices: [...]}`) -> PriceHistory.
    pub fn parse_price_history(
        data: &Value,
        symbol: &str,
        market: Market,
        interval: &str,
    ) -> Option<PriceHistory> {
        let rows = match data {
            Value::Array(rows) => rows.as_slice(),
            Value::Object(map) => map.get("prices")?.as_array()?.as_slice(),
            _ => return None,
        };

        let mut bars = Vec::with_capacity(rows.len());
        for row in rows {
            let Value::Object(_) = row else { continue };
            let Some(close) = num(row.get("close")) else {
                continue;
            };
            bars.push(PriceBar {
                timestamp: parse_timestamp(row.get("date").or_else(|| row.get("timestamp"))),
                open: num(row.get("open")).unwrap_or(close),
                high: num(row.get("high")).unwrap_or(close),
                low: num(row.get("low")).unwrap_or(close),
                close,
                volume: num(row.get("volume")).unwrap_or(0.0) as u64,
            });
        }

        if bars.is_empty() {
            warn!("No usable bars in price history payload for {symbol}");
            return None;
        }

        Some(PriceHistory {
            symbol: symbol.to_string(),
            market,
            interval: interval.to_string(),
            bars,
        })
    }

    /// Analyst recommendations -> MarketSentiment.
    ///
    /// Counts buy/hold/sell grades and synthesizes a put/call-like pressure
    /// ratio from them, matching the engine's sentiment model.
    pub fn parse_sentiment(data: &Value, symbol: &str, market: Market) -> Option<MarketSentiment> {
        let rows: Vec<&Value> = match data {
            Value::Array(rows) => rows.iter().collect(),
            Value::Object(map) => match map.get("recommendations") {
                Some(Value::Array(rows)) => rows.iter().collect(),
                _ => vec![data],
            },
            _ => return None,
        };

        let mut buys = 0u64;
        let mut sells = 0u64;
        let mut holds = 0u64;
        for row in rows {
            let grade = ["recommendationKey", "toGrade", "rating"]
                .iter()
                .find_map(|k| row.get(*k).and_then(Value::as_str))
                .unwrap_or("")
                .to_ascii_lowercase();
            if ["buy", "overweight", "outperform"].iter().any(|k| grade.contains(k)) {
                buys += 1;
            } else if ["sell", "underweight", "underperform"].iter().any(|k| grade.contains(k)) {
                sells += 1;
            } else {
                holds += 1;
            }
        }

        let total = (buys + sells + holds).max(1);
        let call_volume = buys * 10_000 + holds * 5_000;
        let put_volume = sells * 10_000 + holds * 5_000;
        let bullish_pct = buys as f64 / total as f64;

        let sentiment = if bullish_pct > 0.7 {
            Sentiment::Bullish
        } else if bullish_pct > 0.55 {
            Sentiment::SlightlyBullish
        } else if bullish_pct > 0.4 {
            Sentiment::Neutral
        } else if bullish_pct > 0.25 {
            Sentiment::SlightlyBearish
        } else {
            Sentiment::Bearish
        };

        Some(MarketSentiment {
            symbol: symbol.to_string(),
            market,
            put_call_ratio: put_volume as f64 / call_volume.max(1) as f64,
            total_call_volume: call_volume,
            total_put_volume: put_volume,
            call_open_interest: call_volume * 10,
            put_open_interest: put_volume * 10,
            sentiment,
            timestamp: Utc::now(),
        })
    }

    /// Yahoo-style stock info -> IVAnalysis.
    ///
    /// When the payload carries no explicit IV, derive a proxy from the
    /// 52-week range (log-range scaled to an annualized figure).
    pub fn build_iv_analysis(data: &Value, symbol: &str, market: Market) -> Option<IVAnalysis> {
        if !data.is_object() {
            return None;
        }

        let current_iv = first_num(data, &["impliedVolatility", "iv"]).or_else(|| {
            let price = first_num(data, &["currentPrice", "regularMarketPrice"])?;
            let high = num(data.get("fiftyTwoWeekHigh"))?;
            let low = num(data.get("fiftyTwoWeekLow"))?;
            if price <= 0.0 || high <= low {
                return None;
            }
            let proxy = (high / low).ln() / (252.0_f64 / 365.0).sqrt() * 0.6;
            Some(proxy.clamp(0.05, 2.0))
        })?;

        let low = num(data.get("fiftyTwoWeekLowIv")).unwrap_or(current_iv * 0.6);
        let high = num(data.get("fiftyTwoWeekHighIv")).unwrap_or(current_iv * 1.8);
        let rank = if high > low {
            ((current_iv - low) / (high - low) * 100.0).clamp(0.0, 100.0)
        } else {
            50.0
        };

        Some(IVAnalysis {
            symbol: symbol.to_string(),
            market,
            current_iv,
            iv_rank: rank,
            iv_percentile: rank,
            iv_52w_high: high,
            iv_52w_low: low,
            iv_30d_avg: current_iv,
            timestamp: Utc::now(),
        })
    }

    /// `{calls: [...], puts: [...]}` -> OptionChain.
    pub fn parse_option_chain(data: &Value, symbol: &str, market: Market) -> Option<OptionChain> {
        let parse_side = |key: &str, option_type: OptionType| -> Vec<OptionContract> {
            let Some(Value::Array(rows)) = data.get(key) else {
                return Vec::new();
            };
            rows.iter()
                .filter_map(|row| {
                    let strike = num(row.get("strike"))?;
                    let expiration = match row.get("expiration") {
                        Some(Value::String(s)) => s.parse::<NaiveDate>().ok()?,
                        Some(Value::Number(n)) => DateTime::<Utc>::from_timestamp(n.as_i64()?, 0)
                            .map(|dt| dt.date_naive())?,
                        _ => return None,
                    };
                    Some(OptionContract {
                        symbol: row
                            .get("contractSymbol")
                            .and_then(Value::as_str)
                            .unwrap_or(symbol)
                            .to_string(),
                        underlying: symbol.to_string(),
                        strike,
                        expiration,
                        option_type,
                        bid: num(row.get("bid")),
                        ask: num(row.get("ask")),
                        last_price: num(row.get("lastPrice")),
                        volume: num(row.get("volume")).unwrap_or(0.0) as u64,
                        open_interest: num(row.get("openInterest")).unwrap_or(0.0) as u64,
                        implied_volatility: num(row.get("impliedVolatility")),
                        greeks: None,
                    })
                })
                .collect()
        };

        let calls = parse_side("calls", OptionType::Call);
        let puts = parse_side("puts", OptionType::Put);
        if calls.is_empty() && puts.is_empty() {
            return None;
        }

        let mut expirations: Vec<NaiveDate> =
            calls.iter().chain(puts.iter()).map(|c| c.expiration).collect();
        expirations.sort_unstable();
        expirations.dedup();

        Some(OptionChain {
            underlying: symbol.to_string(),
            market,
            expirations,
            calls,
            puts,
            timestamp: Utc::now(),
        })
    }
}
