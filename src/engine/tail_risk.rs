//! Tail risk framework: standing hedge allocation, early warnings, crisis
//! protocol, and the 3-pillar term-structure signal.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::inputs::MarketInputs;

#[derive(Debug, Clone, Serialize)]
pub struct HedgeInstrument {
    pub name: &'static str,
    /// Fraction of the hedge budget.
    pub allocation: f64,
    pub structure: &'static str,
    pub tenor: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct HedgeAllocation {
    pub annual_budget_pct: f64,
    pub instruments: &'static [HedgeInstrument],
}

#[derive(Debug, Clone, Serialize)]
pub struct EarlyWarningSignal {
    pub signal: &'static str,
    pub action: &'static str,
    pub triggered: bool,
    pub current_value: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TailTradingStatus {
    /// True when the 3M-1M term structure is inverted.
    pub signal_active: bool,
    pub ts_value: f64,
    pub delta_pillar_active: bool,
    pub gamma_pillar_active: bool,
    pub vega_pillar_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TailRiskAssessment {
    pub hedge_allocation: HedgeAllocation,
    pub early_warnings: Vec<EarlyWarningSignal>,
    pub active_warnings_count: u32,
    pub crisis_protocol_active: bool,
    pub crisis_actions: Vec<&'static str>,
    pub tail_trading: TailTradingStatus,
    pub timestamp: DateTime<Utc>,
}

const HEDGE_INSTRUMENTS: &[HedgeInstrument] = &[
    HedgeInstrument {
        name: "VIX Call Spreads",
        allocation: 0.60,
        structure: "buy VIX call at spot+4, sell at spot+12",
        tenor: "30-60 DTE, roll monthly",
    },
    HedgeInstrument {
        name: "SPX Put Spreads",
        allocation: 0.25,
        structure: "buy 5% OTM put, sell 15% OTM put",
        tenor: "90 DTE, roll quarterly",
    },
    HedgeInstrument {
        name: "Scheduled OTM Puts",
        allocation: 0.15,
        structure: "buy 5-10 delta SPX puts monthly",
        tenor: "Monthly schedule",
    },
];

const CRISIS_ACTIONS: &[&str] = &[
    "Close ALL naked short vol immediately",
    "Reduce defined-risk short vol by 75%",
    "Deploy remaining hedge budget into convexity",
    "Cash position to minimum 40% of NAV",
    "Monitor for VIX peak (avg 2-4 weeks, avg peak ~45)",
    "Do NOT sell vol until VIX establishes downtrend from peak",
];

pub struct TailRiskManager;

impl TailRiskManager {
    pub fn new() -> Self {
        Self
    }

    pub fn hedge_allocation() -> HedgeAllocation {
        HedgeAllocation {
            annual_budget_pct: 0.02,
            instruments: HEDGE_INSTRUMENTS,
        }
    }

    /// Run the full tail risk assessment.
    pub fn assess(&self, inputs: &MarketInputs) -> TailRiskAssessment {
        let warnings = Self::check_early_warnings(inputs);
        let active_count = warnings.iter().filter(|w| w.triggered).count() as u32;
        let crisis = inputs.vol.vix > 35.0 || active_count >= 3;
        let tail_trading = Self::check_tail_signal(inputs);

        TailRiskAssessment {
            hedge_allocation: Self::hedge_allocation(),
            early_warnings: warnings,
            active_warnings_count: active_count,
            crisis_protocol_active: crisis,
            crisis_actions: if crisis { CRISIS_ACTIONS.to_vec() } else { Vec::new() },
            tail_trading,
            timestamp: Utc::now(),
        }
    }

    fn check_early_warnings(inputs: &MarketInputs) -> Vec<EarlyWarningSignal> {
        vec![
            EarlyWarningSignal {
                signal: "HY OAS widens > 50bps in 20 days",
                action: "Double hedge allocation",
                triggered: inputs.credit.hy_oas_20d_change > 50.0,
                current_value: inputs.credit.hy_oas_20d_change,
                threshold: 50.0,
            },
            EarlyWarningSignal {
                signal: "Bid-ask spreads widen > 50% above 20d MA",
                action: "Activate crisis protocol",
                triggered: inputs.liquidity.bid_ask_widening > 1.5,
                current_value: inputs.liquidity.bid_ask_widening,
                threshold: 1.5,
            },
            EarlyWarningSignal {
                signal: "Implied correlation above 80th pctile",
                action: "Close all dispersion; review all short vol",
                triggered: inputs.correlation.corr_pctile_1y > 80.0,
                current_value: inputs.correlation.corr_pctile_1y,
                threshold: 80.0,
            },
            EarlyWarningSignal {
                signal: "VVIX > 28 sustained",
                action: "Reduce all position sizes by 50%",
                triggered: inputs.vol.vvix > 28.0,
                current_value: inputs.vol.vvix,
                threshold: 28.0,
            },
        ]
    }

    /// 3-pillar tail trading signal: front-end term structure inversion.
    fn check_tail_signal(inputs: &MarketInputs) -> TailTradingStatus {
        let ts_value = inputs.term_structure.ts_1m_3m;
        let signal_active = ts_value < 0.0;
        TailTradingStatus {
            signal_active,
            ts_value,
            delta_pillar_active: signal_active,
            gamma_pillar_active: signal_active,
            vega_pillar_active: signal_active,
        }
    }
}

impl Default for TailRiskManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::inputs::fixture_inputs;

    #[test]
    fn calm_tape_has_no_warnings() {
        let assessment = TailRiskManager::new().assess(&fixture_inputs());
        assert_eq!(assessment.active_warnings_count, 0);
        assert!(!assessment.crisis_protocol_active);
        assert!(assessment.crisis_actions.is_empty());
        assert!(!assessment.tail_trading.signal_active);
        assert_eq!(assessment.early_warnings.len(), 4);
    }

    #[test]
    fn hedge_allocation_sums_to_one() {
        let allocation = TailRiskManager::hedge_allocation();
        let total: f64 = allocation.instruments.iter().map(|i| i.allocation).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn vix_above_35_activates_crisis_protocol() {
        let mut inputs = fixture_inputs();
        inputs.vol.vix = 36.0;
        let assessment = TailRiskManager::new().assess(&inputs);
        assert!(assessment.crisis_protocol_active);
        assert!(!assessment.crisis_actions.is_empty());
    }

    #[test]
    fn three_warnings_activate_crisis_protocol() {
        let mut inputs = fixture_inputs();
        inputs.credit.hy_oas_20d_change = 60.0;
        inputs.liquidity.bid_ask_widening = 1.8;
        inputs.correlation.corr_pctile_1y = 85.0;
        let assessment = TailRiskManager::new().assess(&inputs);
        assert_eq!(assessment.active_warnings_count, 3);
        assert!(assessment.crisis_protocol_active);
    }

    #[test]
    fn inverted_front_end_lights_all_three_pillars() {
        let mut inputs = fixture_inputs();
        inputs.vol.iv_atm_3m = inputs.vol.iv_atm_1m - 0.5;
        inputs.term_structure.ts_1m_3m = -0.5;
        inputs.vol.iv_atm_6m = inputs.vol.iv_atm_3m + 0.7;
        inputs.term_structure.ts_3m_6m = 0.7;
        inputs.validate().unwrap();

        let assessment = TailRiskManager::new().assess(&inputs);
        let tail = &assessment.tail_trading;
        assert!(tail.signal_active);
        assert!(tail.delta_pillar_active && tail.gamma_pillar_active && tail.vega_pillar_active);
    }

    #[test]
    fn warnings_report_current_vs_threshold() {
        let mut inputs = fixture_inputs();
        inputs.vol.vvix = 30.0;
        let assessment = TailRiskManager::new().assess(&inputs);
        let vvix = assessment
            .early_warnings
            .iter()
            .find(|w| w.signal.contains("VVIX"))
            .unwrap();
        assert!(vvix.triggered);
        assert_eq!(vvix.current_value, 30.0);
        assert_eq!(vvix.threshold, 28.0);
    }
}
