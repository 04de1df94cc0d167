//! Market inputs: the snapshot every engine stage reads.
//!
//! The collector assembles a snapshot from the data layer (spot and VIX
//! quotes plus price history for moving averages and realized vol); fields
//! no provider serves yet come from a calibrated baseline so the snapshot is
//! always complete and always deterministic for a given upstream state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::EngineError;
use crate::data::{Market, MarketDataService};

const INPUT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotData {
    pub spx_level: f64,
    pub spx_ret_1d: f64,
    pub spx_ret_5d: f64,
    pub spx_ret_20d: f64,
    pub spx_sma_50: f64,
    pub spx_sma_200: f64,
    /// Percent of index constituents above their 50-day moving average.
    pub breadth_pct_above_50dma: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolData {
    pub vix: f64,
    pub vix_1d_change: f64,
    pub vix_5d_change: f64,
    pub vix_percentile_1y: f64,
    pub vvix: f64,
    pub vix9d: f64,
    pub iv_atm_1m: f64,
    pub iv_atm_3m: f64,
    pub iv_atm_6m: f64,
    pub rv_10d: f64,
    pub rv_20d: f64,
    pub rv_30d: f64,
    /// iv_atm_1m - rv_20d
    pub iv_rv_spread: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkewData {
    pub put_skew_25d_1m: f64,
    pub put_skew_25d_3m: f64,
    pub risk_reversal_25d: f64,
    pub skew_pctile_1y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermStructureData {
    /// 3M IV - 1M IV (contango if positive)
    pub ts_1m_3m: f64,
    /// 6M IV - 3M IV
    pub ts_3m_6m: f64,
    pub ts_slope: f64,
    pub vix_futures_1m: f64,
    pub vix_futures_3m: f64,
    pub roll_yield: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCalendarData {
    pub days_to_fomc: i64,
    pub days_to_cpi: i64,
    pub days_to_nfp: i64,
    pub days_to_earnings: i64,
    pub events_next_5d: u32,
    pub events_next_20d: u32,
}

impl EventCalendarData {
    /// Trading days to the nearest of the four tracked events.
    pub fn nearest_event_days(&self) -> i64 {
        self.days_to_fomc
            .min(self.days_to_cpi)
            .min(self.days_to_nfp)
            .min(self.days_to_earnings)
    }

    pub fn nearest_macro_days(&self) -> i64 {
        self.days_to_fomc.min(self.days_to_cpi).min(self.days_to_nfp)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditMacroData {
    pub hy_oas: f64,
    pub hy_oas_20d_change: f64,
    pub ig_spread: f64,
    pub fed_funds_rate: f64,
    pub us_10y_yield: f64,
    pub us_2s10s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityData {
    /// SPX options bid-ask as a fraction of mid.
    pub spx_bid_ask: f64,
    pub spx_bid_ask_20d_ma: f64,
    /// Current bid-ask / its 20-day MA.
    pub bid_ask_widening: f64,
    pub emini_depth: f64,
    pub options_volume_oi: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationData {
    pub implied_corr: f64,
    pub realized_corr_20d: f64,
    pub corr_pctile_1y: f64,
    /// implied_corr - realized_corr_20d
    pub dispersion: f64,
}

/// Immutable snapshot of everything the engine reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketInputs {
    pub spot: SpotData,
    pub vol: VolData,
    pub skew: SkewData,
    pub term_structure: TermStructureData,
    pub events: EventCalendarData,
    pub credit: CreditMacroData,
    pub liquidity: LiquidityData,
    pub correlation: CorrelationData,
    pub timestamp: DateTime<Utc>,
}

impl MarketInputs {
    /// Enforce the structural invariants before any stage runs.
    pub fn validate(&self) -> Result<(), EngineError> {
        let fields: &[(&str, f64)] = &[
            ("spot.spx_level", self.spot.spx_level),
            ("spot.spx_ret_1d", self.spot.spx_ret_1d),
            ("spot.spx_ret_5d", self.spot.spx_ret_5d),
            ("spot.spx_ret_20d", self.spot.spx_ret_20d),
            ("spot.spx_sma_50", self.spot.spx_sma_50),
            ("spot.spx_sma_200", self.spot.spx_sma_200),
            ("spot.breadth_pct_above_50dma", self.spot.breadth_pct_above_50dma),
            ("vol.vix", self.vol.vix),
            ("vol.vix_1d_change", self.vol.vix_1d_change),
            ("vol.vix_5d_change", self.vol.vix_5d_change),
            ("vol.vix_percentile_1y", self.vol.vix_percentile_1y),
            ("vol.vvix", self.vol.vvix),
            ("vol.vix9d", self.vol.vix9d),
            ("vol.iv_atm_1m", self.vol.iv_atm_1m),
            ("vol.iv_atm_3m", self.vol.iv_atm_3m),
            ("vol.iv_atm_6m", self.vol.iv_atm_6m),
            ("vol.rv_10d", self.vol.rv_10d),
            ("vol.rv_20d", self.vol.rv_20d),
            ("vol.rv_30d", self.vol.rv_30d),
            ("vol.iv_rv_spread", self.vol.iv_rv_spread),
            ("skew.put_skew_25d_1m", self.skew.put_skew_25d_1m),
            ("skew.put_skew_25d_3m", self.skew.put_skew_25d_3m),
            ("skew.risk_reversal_25d", self.skew.risk_reversal_25d),
            ("skew.skew_pctile_1y", self.skew.skew_pctile_1y),
            ("term_structure.ts_1m_3m", self.term_structure.ts_1m_3m),
            ("term_structure.ts_3m_6m", self.term_structure.ts_3m_6m),
            ("term_structure.ts_slope", self.term_structure.ts_slope),
            ("term_structure.vix_futures_1m", self.term_structure.vix_futures_1m),
            ("term_structure.vix_futures_3m", self.term_structure.vix_futures_3m),
            ("term_structure.roll_yield", self.term_structure.roll_yield),
            ("credit.hy_oas", self.credit.hy_oas),
            ("credit.hy_oas_20d_change", self.credit.hy_oas_20d_change),
            ("credit.ig_spread", self.credit.ig_spread),
            ("credit.fed_funds_rate", self.credit.fed_funds_rate),
            ("credit.us_10y_yield", self.credit.us_10y_yield),
            ("credit.us_2s10s", self.credit.us_2s10s),
            ("liquidity.spx_bid_ask", self.liquidity.spx_bid_ask),
            ("liquidity.spx_bid_ask_20d_ma", self.liquidity.spx_bid_ask_20d_ma),
            ("liquidity.bid_ask_widening", self.liquidity.bid_ask_widening),
            ("liquidity.emini_depth", self.liquidity.emini_depth),
            ("liquidity.options_volume_oi", self.liquidity.options_volume_oi),
            ("correlation.implied_corr", self.correlation.implied_corr),
            ("correlation.realized_corr_20d", self.correlation.realized_corr_20d),
            ("correlation.corr_pctile_1y", self.correlation.corr_pctile_1y),
            ("correlation.dispersion", self.correlation.dispersion),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(EngineError::InvalidInputs(format!(
                    "{name} is not finite ({value})"
                )));
            }
        }

        for (name, value) in [
            ("vol.vix_percentile_1y", self.vol.vix_percentile_1y),
            ("skew.skew_pctile_1y", self.skew.skew_pctile_1y),
            ("correlation.corr_pctile_1y", self.correlation.corr_pctile_1y),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(EngineError::InvalidInputs(format!(
                    "{name} out of [0, 100]: {value}"
                )));
            }
        }

        if (self.vol.iv_rv_spread - (self.vol.iv_atm_1m - self.vol.rv_20d)).abs() > INPUT_TOLERANCE
        {
            return Err(EngineError::InvalidInputs(
                "iv_rv_spread != iv_atm_1m - rv_20d".to_string(),
            ));
        }
        if (self.term_structure.ts_1m_3m - (self.vol.iv_atm_3m - self.vol.iv_atm_1m)).abs()
            > INPUT_TOLERANCE
        {
            return Err(EngineError::InvalidInputs(
                "ts_1m_3m != iv_atm_3m - iv_atm_1m".to_string(),
            ));
        }
        if (self.term_structure.ts_3m_6m - (self.vol.iv_atm_6m - self.vol.iv_atm_3m)).abs()
            > INPUT_TOLERANCE
        {
            return Err(EngineError::InvalidInputs(
                "ts_3m_6m != iv_atm_6m - iv_atm_3m".to_string(),
            ));
        }
        if (self.correlation.dispersion
            - (self.correlation.implied_corr - self.correlation.realized_corr_20d))
            .abs()
            > INPUT_TOLERANCE
        {
            return Err(EngineError::InvalidInputs(
                "dispersion != implied_corr - realized_corr_20d".to_string(),
            ));
        }
        if self.liquidity.bid_ask_widening < 0.0 {
            return Err(EngineError::InvalidInputs(
                "bid_ask_widening must be >= 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Calibrated defaults for inputs no wired provider serves yet.
///
/// These stand in for the surface/credit/positioning feeds; once a real feed
/// exists its collector step replaces the matching baseline field.
#[derive(Debug, Clone)]
pub struct CollectorBaseline {
    pub vix_1d_change: f64,
    pub vix_5d_change: f64,
    pub vix_percentile_1y: f64,
    pub vvix: f64,
    pub vix9d: f64,
    pub ts_premium_3m: f64,
    pub ts_premium_6m: f64,
    pub skew: SkewData,
    pub events: EventCalendarData,
    pub credit: CreditMacroData,
    pub liquidity: LiquidityData,
    pub correlation: CorrelationData,
    pub breadth_pct_above_50dma: f64,
}

impl Default for CollectorBaseline {
    fn default() -> Self {
        Self {
            vix_1d_change: -0.3,
            vix_5d_change: -1.2,
            vix_percentile_1y: 42.0,
            vvix: 19.5,
            vix9d: 16.8,
            ts_premium_3m: 1.5,
            ts_premium_6m: 2.2,
            skew: SkewData {
                put_skew_25d_1m: 5.2,
                put_skew_25d_3m: 5.8,
                risk_reversal_25d: -4.5,
                skew_pctile_1y: 48.0,
            },
            events: EventCalendarData {
                days_to_fomc: 12,
                days_to_cpi: 8,
                days_to_nfp: 15,
                days_to_earnings: 22,
                events_next_5d: 0,
                events_next_20d: 2,
            },
            credit: CreditMacroData {
                hy_oas: 380.0,
                hy_oas_20d_change: 5.0,
                ig_spread: 95.0,
                fed_funds_rate: 4.50,
                us_10y_yield: 4.25,
                us_2s10s: 0.15,
            },
            liquidity: LiquidityData {
                spx_bid_ask: 0.04,
                spx_bid_ask_20d_ma: 0.04,
                bid_ask_widening: 1.0,
                emini_depth: 1800.0,
                options_volume_oi: 0.45,
            },
            correlation: CorrelationData {
                implied_corr: 45.0,
                realized_corr_20d: 40.0,
                corr_pctile_1y: 42.0,
                dispersion: 5.0,
            },
            breadth_pct_above_50dma: 62.0,
        }
    }
}

pub struct InputsCollector {
    data: Arc<MarketDataService>,
    baseline: CollectorBaseline,
    spot_symbol: String,
    vix_symbol: String,
}

impl InputsCollector {
    pub fn new(data: Arc<MarketDataService>) -> Self {
        Self {
            data,
            baseline: CollectorBaseline::default(),
            spot_symbol: "SPY".to_string(),
            vix_symbol: "^VIX".to_string(),
        }
    }

    pub fn with_baseline(mut self, baseline: CollectorBaseline) -> Self {
        self.baseline = baseline;
        self
    }

    /// Assemble and validate a full snapshot.
    pub async fn collect(&self) -> Result<MarketInputs, EngineError> {
        let spot_quote = self.data.quote(&self.spot_symbol, Market::US).await?;
        let vix = self.data.quote(&self.vix_symbol, Market::US).await?.price;
        let history = self
            .data
            .price_history(&self.spot_symbol, Market::US, "1d", 200)
            .await?;

        let closes: Vec<f64> = history.bars.iter().map(|b| b.close).collect();
        let spx = spot_quote.price;

        let sma = |window: usize| -> f64 {
            if closes.is_empty() {
                return spx;
            }
            let take = closes.len().min(window);
            closes[closes.len() - take..].iter().sum::<f64>() / take as f64
        };
        let ret = |days: usize| -> f64 {
            if closes.len() > days {
                closes[closes.len() - 1] / closes[closes.len() - 1 - days] - 1.0
            } else {
                0.0
            }
        };
        let realized_vol = |days: usize| -> f64 {
            if closes.len() <= days {
                return vix;
            }
            let window = &closes[closes.len() - days - 1..];
            let log_returns: Vec<f64> = window.windows(2).map(|w| (w[1] / w[0]).ln()).collect();
            let mean_sq =
                log_returns.iter().map(|r| r * r).sum::<f64>() / log_returns.len() as f64;
            mean_sq.sqrt() * 252.0_f64.sqrt() * 100.0
        };

        let rv_20d = realized_vol(20);
        let iv_atm_1m = vix;
        let iv_atm_3m = vix + self.baseline.ts_premium_3m;
        let iv_atm_6m = vix + self.baseline.ts_premium_6m;
        let b = &self.baseline;

        let inputs = MarketInputs {
            spot: SpotData {
                spx_level: spx,
                spx_ret_1d: ret(1),
                spx_ret_5d: ret(5),
                spx_ret_20d: ret(20),
                spx_sma_50: sma(50),
                spx_sma_200: sma(200),
                breadth_pct_above_50dma: b.breadth_pct_above_50dma,
            },
            vol: VolData {
                vix,
                vix_1d_change: b.vix_1d_change,
                vix_5d_change: b.vix_5d_change,
                vix_percentile_1y: b.vix_percentile_1y,
                vvix: b.vvix,
                vix9d: b.vix9d,
                iv_atm_1m,
                iv_atm_3m,
                iv_atm_6m,
                rv_10d: realized_vol(10),
                rv_20d,
                rv_30d: realized_vol(30),
                iv_rv_spread: iv_atm_1m - rv_20d,
            },
            skew: b.skew.clone(),
            term_structure: TermStructureData {
                ts_1m_3m: iv_atm_3m - iv_atm_1m,
                ts_3m_6m: iv_atm_6m - iv_atm_3m,
                ts_slope: (iv_atm_6m - iv_atm_1m) / 2.0,
                vix_futures_1m: vix + 0.7,
                vix_futures_3m: vix + 2.0,
                roll_yield: if vix > 0.0 { 0.7 / vix } else { 0.0 },
            },
            events: b.events.clone(),
            credit: b.credit.clone(),
            liquidity: b.liquidity.clone(),
            correlation: b.correlation.clone(),
            timestamp: Utc::now(),
        };

        inputs.validate()?;
        Ok(inputs)
    }
}

#[cfg(test)]
pub(crate) fn fixture_inputs() -> MarketInputs {
    // Calm NORMAL-regime tape used across engine tests.
    let iv_1m = 17.0;
    let iv_3m = 18.5;
    let iv_6m = 19.2;
    let rv_20d = 14.2;
    MarketInputs {
        spot: SpotData {
            spx_level: 5850.0,
            spx_ret_1d: 0.003,
            spx_ret_5d: 0.012,
            spx_ret_20d: 0.025,
            spx_sma_50: 5780.0,
            spx_sma_200: 5520.0,
            breadth_pct_above_50dma: 62.0,
        },
        vol: VolData {
            vix: 17.5,
            vix_1d_change: -0.3,
            vix_5d_change: -1.2,
            vix_percentile_1y: 42.0,
            vvix: 19.5,
            vix9d: 16.8,
            iv_atm_1m: iv_1m,
            iv_atm_3m: iv_3m,
            iv_atm_6m: iv_6m,
            rv_10d: 15.1,
            rv_20d,
            rv_30d: 14.8,
            iv_rv_spread: iv_1m - rv_20d,
        },
        skew: SkewData {
            put_skew_25d_1m: 5.2,
            put_skew_25d_3m: 5.8,
            risk_reversal_25d: -4.5,
            skew_pctile_1y: 48.0,
        },
        term_structure: TermStructureData {
            ts_1m_3m: iv_3m - iv_1m,
            ts_3m_6m: iv_6m - iv_3m,
            ts_slope: 0.8,
            vix_futures_1m: 18.2,
            vix_futures_3m: 19.5,
            roll_yield: (18.2 - 17.5) / 17.5,
        },
        events: EventCalendarData {
            days_to_fomc: 12,
            days_to_cpi: 8,
            days_to_nfp: 15,
            days_to_earnings: 22,
            events_next_5d: 0,
            events_next_20d: 2,
        },
        credit: CreditMacroData {
            hy_oas: 380.0,
            hy_oas_20d_change: 5.0,
            ig_spread: 95.0,
            fed_funds_rate: 4.50,
            us_10y_yield: 4.25,
            us_2s10s: 0.15,
        },
        liquidity: LiquidityData {
            spx_bid_ask: 0.04,
            spx_bid_ask_20d_ma: 0.04,
            bid_ask_widening: 1.0,
            emini_depth: 1800.0,
            options_volume_oi: 0.45,
        },
        correlation: CorrelationData {
            implied_corr: 45.0,
            realized_corr_20d: 40.0,
            corr_pctile_1y: 42.0,
            dispersion: 5.0,
        },
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MockProvider, TtlCache};

    #[test]
    fn fixture_passes_validation() {
        fixture_inputs().validate().unwrap();
    }

    #[test]
    fn nan_field_is_rejected() {
        let mut inputs = fixture_inputs();
        inputs.vol.vix = f64::NAN;
        let err = inputs.validate().unwrap_err();
        assert!(matches!(err, EngineError::InvalidInputs(_)));
    }

    #[test]
    fn percentile_out_of_range_is_rejected() {
        let mut inputs = fixture_inputs();
        inputs.vol.vix_percentile_1y = 120.0;
        assert!(inputs.validate().is_err());
    }

    #[test]
    fn derived_field_mismatch_is_rejected() {
        let mut inputs = fixture_inputs();
        inputs.vol.iv_rv_spread += 1.0;
        assert!(inputs.validate().is_err());

        let mut inputs = fixture_inputs();
        inputs.correlation.dispersion = 99.0;
        assert!(inputs.validate().is_err());
    }

    #[test]
    fn negative_widening_is_rejected() {
        let mut inputs = fixture_inputs();
        inputs.liquidity.bid_ask_widening = -0.1;
        assert!(inputs.validate().is_err());
    }

    #[tokio::test]
    async fn collector_builds_valid_snapshot_from_mock() {
        let service = Arc::new(MarketDataService::new(
            Arc::new(MockProvider::new()),
            Arc::new(TtlCache::new()),
        ));
        let collector = InputsCollector::new(service);
        let inputs = collector.collect().await.unwrap();

        assert_eq!(inputs.vol.vix, 17.5);
        assert!(inputs.spot.spx_level > inputs.spot.spx_sma_50);
        assert!(inputs.spot.spx_sma_50 > inputs.spot.spx_sma_200);
        inputs.validate().unwrap();
    }
}
