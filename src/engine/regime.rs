//! Regime classifier.
//!
//! Priority-ordered: crisis and liquidity stress short-circuit; the normal
//! path computes event window, vol level, trend, and VVIX instability
//! together, then scores confidence from four confirming signals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::inputs::{MarketInputs, SpotData};

/// Normal E-mini depth baseline (contracts) for liquidity comparison.
const NORMAL_EMINI_DEPTH: f64 = 1500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolRegime {
    VeryLow,
    Low,
    Normal,
    Elevated,
    High,
    Extreme,
    Crisis,
    LiquidityStress,
}

impl VolRegime {
    pub fn as_str(&self) -> &'static str {
        match self {
            VolRegime::VeryLow => "VERY_LOW",
            VolRegime::Low => "LOW",
            VolRegime::Normal => "NORMAL",
            VolRegime::Elevated => "ELEVATED",
            VolRegime::High => "HIGH",
            VolRegime::Extreme => "EXTREME",
            VolRegime::Crisis => "CRISIS",
            VolRegime::LiquidityStress => "LIQUIDITY_STRESS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    StrongUptrend,
    Uptrend,
    RangeBound,
    Downtrend,
    StrongDowntrend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Fomc,
    Cpi,
    Nfp,
    Earnings,
    None,
}

impl EventType {
    pub fn is_macro(&self) -> bool {
        matches!(self, EventType::Fomc | EventType::Cpi | EventType::Nfp)
    }
}

/// Classification result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Regime {
    pub regime: VolRegime,
    pub trend: Trend,
    pub event_active: bool,
    pub event_type: EventType,
    pub multi_event: bool,
    pub vol_unstable: bool,
    pub confidence: Confidence,
    pub confirming_signals: u32,
    pub actions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

pub struct RegimeClassifier;

impl RegimeClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Run the full priority-ordered classification. Pure; assumes inputs
    /// already validated.
    pub fn classify(&self, inputs: &MarketInputs) -> Regime {
        let v = &inputs.vol;
        let c = &inputs.credit;
        let lq = &inputs.liquidity;
        let ts = &inputs.term_structure;
        let ev = &inputs.events;

        // ── PRIORITY 1: CRISIS DETECTION ──
        let mut crisis_signals = 0u32;
        if v.vix > 30.0 {
            crisis_signals += 2;
        }
        if v.vix_1d_change > 5.0 {
            crisis_signals += 2;
        }
        if v.vix > 35.0 {
            crisis_signals += 1;
        }
        if c.hy_oas_20d_change > 50.0 {
            crisis_signals += 1;
        }
        if ts.ts_1m_3m < 0.0 {
            crisis_signals += 1;
        }
        if lq.bid_ask_widening > 2.0 {
            crisis_signals += 1;
        }

        if crisis_signals >= 3 {
            return Regime {
                regime: VolRegime::Crisis,
                trend: Self::classify_trend(&inputs.spot),
                event_active: false,
                event_type: EventType::None,
                multi_event: false,
                vol_unstable: false,
                confidence: if crisis_signals >= 5 {
                    Confidence::High
                } else {
                    Confidence::Medium
                },
                confirming_signals: crisis_signals,
                actions: vec![
                    "CLOSE all naked short vol positions immediately".to_string(),
                    "CLOSE all positions if VIX > 35".to_string(),
                    "ONLY defined-risk spreads allowed (5-10 delta, 14-21 DTE)".to_string(),
                    "Position size: 25% of baseline or FLAT".to_string(),
                    "Activate tail hedges if not already on".to_string(),
                    "Monitor for VIX peak (avg duration 2-4 weeks, avg peak ~45)".to_string(),
                ],
                timestamp: Utc::now(),
            };
        }

        // ── PRIORITY 2: LIQUIDITY STRESS ──
        let mut liquidity_stress = 0u32;
        if lq.bid_ask_widening > 1.5 {
            liquidity_stress += 1;
        }
        if lq.spx_bid_ask > lq.spx_bid_ask_20d_ma * 1.3 {
            liquidity_stress += 1;
        }
        if lq.emini_depth < 0.6 * NORMAL_EMINI_DEPTH {
            liquidity_stress += 1;
        }
        if c.hy_oas_20d_change > 30.0 {
            liquidity_stress += 1;
        }

        if liquidity_stress >= 2 {
            return Regime {
                regime: VolRegime::LiquidityStress,
                trend: Self::classify_trend(&inputs.spot),
                event_active: false,
                event_type: EventType::None,
                multi_event: false,
                vol_unstable: false,
                confidence: Confidence::Medium,
                confirming_signals: liquidity_stress,
                actions: vec![
                    "REDUCE all positions by 25-50%".to_string(),
                    "NO new naked short vol positions".to_string(),
                    "Tighten stops on existing positions".to_string(),
                    "Begin adding tail hedges (VIX call spreads)".to_string(),
                    "Monitor: if persists >10 days, move to crisis protocol".to_string(),
                ],
                timestamp: Utc::now(),
            };
        }

        // ── PRIORITY 3: EVENT WINDOW ──
        let (event_active, event_type) = if ev.days_to_fomc <= 5 {
            (true, EventType::Fomc)
        } else if ev.days_to_cpi <= 3 {
            (true, EventType::Cpi)
        } else if ev.days_to_nfp <= 3 {
            (true, EventType::Nfp)
        } else if ev.days_to_earnings <= 3 {
            (true, EventType::Earnings)
        } else {
            (false, EventType::None)
        };
        let multi_event = ev.events_next_5d >= 2;

        // ── PRIORITY 4: VOL LEVEL ──
        let vol_regime = if v.vix < 12.0 {
            VolRegime::VeryLow
        } else if v.vix < 15.0 {
            VolRegime::Low
        } else if v.vix < 20.0 {
            VolRegime::Normal
        } else if v.vix < 25.0 {
            VolRegime::Elevated
        } else if v.vix <= 30.0 {
            VolRegime::High
        } else {
            VolRegime::Extreme
        };

        // ── PRIORITY 5: TREND ──
        let trend = Self::classify_trend(&inputs.spot);

        // ── PRIORITY 6: VVIX INSTABILITY ──
        let vol_unstable = v.vvix > 22.0;

        // ── CONFIDENCE SCORING ──
        let confirming = Self::score_confidence(vol_regime, inputs);
        let confidence = if confirming >= 3 {
            Confidence::High
        } else if confirming >= 2 {
            Confidence::Medium
        } else {
            Confidence::Low
        };

        Regime {
            regime: vol_regime,
            trend,
            event_active,
            event_type,
            multi_event,
            vol_unstable,
            confidence,
            confirming_signals: confirming,
            actions: Self::build_actions(vol_regime, trend, event_active, vol_unstable),
            timestamp: Utc::now(),
        }
    }

    fn classify_trend(s: &SpotData) -> Trend {
        if s.spx_level > s.spx_sma_50 && s.spx_level > s.spx_sma_200 {
            if s.breadth_pct_above_50dma > 60.0 {
                return Trend::StrongUptrend;
            }
            return Trend::Uptrend;
        }
        if s.spx_level < s.spx_sma_50 && s.spx_level < s.spx_sma_200 {
            if s.breadth_pct_above_50dma < 40.0 {
                return Trend::StrongDowntrend;
            }
            return Trend::Downtrend;
        }
        Trend::RangeBound
    }

    fn score_confidence(vol_regime: VolRegime, inputs: &MarketInputs) -> u32 {
        use VolRegime::*;
        let v = &inputs.vol;
        let sk = &inputs.skew;
        let ts = &inputs.term_structure;
        let c = &inputs.credit;

        let mut confirming = 0;
        // IV-RV agreement
        if matches!(vol_regime, Low | VeryLow) && v.iv_rv_spread < 2.0 {
            confirming += 1;
        } else if matches!(vol_regime, Elevated | High) && v.iv_rv_spread > 3.0 {
            confirming += 1;
        }
        // Skew alignment (percentile basis)
        if matches!(vol_regime, Elevated | High) && sk.skew_pctile_1y > 50.0 {
            confirming += 1;
        } else if matches!(vol_regime, Low | VeryLow) && sk.skew_pctile_1y < 50.0 {
            confirming += 1;
        }
        // Term structure alignment
        if matches!(vol_regime, Low | Normal) && ts.ts_1m_3m > 0.0 {
            confirming += 1;
        } else if vol_regime == High && ts.ts_1m_3m < 1.0 {
            confirming += 1;
        }
        // Credit confirmation
        if matches!(vol_regime, Low | Normal) && c.hy_oas_20d_change < 20.0 {
            confirming += 1;
        } else if matches!(vol_regime, Elevated | High) && c.hy_oas_20d_change > 30.0 {
            confirming += 1;
        }
        confirming
    }

    fn build_actions(
        vol_regime: VolRegime,
        trend: Trend,
        event_active: bool,
        vol_unstable: bool,
    ) -> Vec<String> {
        let mut actions: Vec<String> = Vec::new();
        let mut push = |s: &str| actions.push(s.to_string());

        match vol_regime {
            VolRegime::VeryLow => {
                push("Maximize premium selling at full size");
                push("Cheap convexity available - consider tail hedges");
            }
            VolRegime::Low => {
                push("Full premium selling allowed");
                push("Begin building convexity positions");
            }
            VolRegime::Normal => push("Standard position sizes, balanced approach"),
            VolRegime::Elevated => {
                push("Reduce selling to 50% size; defined-risk only for new trades");
                push("Review all naked positions for rolling/closing");
            }
            VolRegime::High => {
                push("Only defined-risk spreads at 25% size");
                push("Consider long convexity positions");
            }
            VolRegime::Extreme => {
                push("No premium selling");
                push("Buy convexity only; activate crisis protocol");
            }
            VolRegime::Crisis | VolRegime::LiquidityStress => {}
        }

        if event_active {
            push("Event window active - use event playbook");
        }
        if vol_unstable {
            push("VVIX > 22: vol surface unstable, reduce sizes 25-50%");
        }

        match trend {
            Trend::Downtrend | Trend::StrongDowntrend => {
                push("Downtrend: favor bearish strategies, tighten upside");
            }
            Trend::Uptrend | Trend::StrongUptrend => {
                push("Uptrend: favor bullish strategies, maintain hedges");
            }
            Trend::RangeBound => {}
        }

        actions
    }
}

impl Default for RegimeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::inputs::fixture_inputs;

    #[test]
    fn crisis_tape_scores_all_signals() {
        let mut inputs = fixture_inputs();
        inputs.vol.vix = 38.0;
        inputs.vol.vix_1d_change = 6.0;
        inputs.credit.hy_oas_20d_change = 60.0;
        inputs.vol.iv_atm_3m = inputs.vol.iv_atm_1m - 0.5; // invert the front end
        inputs.term_structure.ts_1m_3m = -0.5;
        inputs.vol.iv_atm_6m = inputs.vol.iv_atm_3m + 0.7;
        inputs.term_structure.ts_3m_6m = 0.7;
        inputs.liquidity.bid_ask_widening = 2.3;
        inputs.validate().unwrap();

        let regime = RegimeClassifier::new().classify(&inputs);
        assert_eq!(regime.regime, VolRegime::Crisis);
        assert_eq!(regime.confidence, Confidence::High);
        assert_eq!(regime.confirming_signals, 8); // 2+2+1+1+1+1
        assert!(regime.actions.iter().any(|a| a.contains("naked short vol")));
        assert!(regime.actions.iter().any(|a| a.contains("VIX > 35")));
    }

    #[test]
    fn liquidity_stress_outranks_vol_level() {
        let mut inputs = fixture_inputs();
        inputs.liquidity.bid_ask_widening = 1.8;
        inputs.liquidity.spx_bid_ask = 0.08;
        inputs.liquidity.spx_bid_ask_20d_ma = 0.04;

        let regime = RegimeClassifier::new().classify(&inputs);
        assert_eq!(regime.regime, VolRegime::LiquidityStress);
        assert!(regime.actions.iter().any(|a| a.contains("REDUCE")));
    }

    #[test]
    fn elevated_uptrend_stable_tape() {
        let mut inputs = fixture_inputs();
        inputs.vol.vix = 22.0;
        inputs.vol.vvix = 20.0;
        inputs.spot.breadth_pct_above_50dma = 65.0;
        inputs.skew.skew_pctile_1y = 55.0;
        inputs.vol.rv_20d = inputs.vol.iv_atm_1m - 4.0; // iv_rv_spread = +4
        inputs.vol.iv_rv_spread = 4.0;
        inputs.credit.hy_oas_20d_change = 10.0;
        inputs.validate().unwrap();

        let regime = RegimeClassifier::new().classify(&inputs);
        assert_eq!(regime.regime, VolRegime::Elevated);
        assert_eq!(regime.trend, Trend::StrongUptrend);
        assert!(!regime.event_active);
        assert!(matches!(
            regime.confidence,
            Confidence::Medium | Confidence::High
        ));
        assert!(regime
            .actions
            .iter()
            .any(|a| a.contains("Reduce selling to 50% size")));
    }

    #[test]
    fn cpi_window_sets_event_fields() {
        let mut inputs = fixture_inputs();
        inputs.events.days_to_cpi = 2;
        inputs.events.days_to_fomc = 25;
        inputs.events.days_to_nfp = 25;
        inputs.events.days_to_earnings = 25;

        let regime = RegimeClassifier::new().classify(&inputs);
        assert!(regime.event_active);
        assert_eq!(regime.event_type, EventType::Cpi);
        assert!(!regime.multi_event);
        assert_eq!(regime.regime, VolRegime::Normal);
    }

    #[test]
    fn fomc_window_takes_priority_over_cpi() {
        let mut inputs = fixture_inputs();
        inputs.events.days_to_fomc = 4;
        inputs.events.days_to_cpi = 2;

        let regime = RegimeClassifier::new().classify(&inputs);
        assert_eq!(regime.event_type, EventType::Fomc);
    }

    #[test]
    fn vol_level_bands() {
        let classifier = RegimeClassifier::new();
        for (vix, expected) in [
            (11.0, VolRegime::VeryLow),
            (13.0, VolRegime::Low),
            (17.0, VolRegime::Normal),
            (22.0, VolRegime::Elevated),
            (28.0, VolRegime::High),
        ] {
            let mut inputs = fixture_inputs();
            inputs.vol.vix = vix;
            assert_eq!(classifier.classify(&inputs).regime, expected, "vix={vix}");
        }
    }

    #[test]
    fn vvix_above_22_flags_instability() {
        let mut inputs = fixture_inputs();
        inputs.vol.vvix = 24.0;
        let regime = RegimeClassifier::new().classify(&inputs);
        assert!(regime.vol_unstable);
        assert!(regime.actions.iter().any(|a| a.contains("VVIX > 22")));
    }

    #[test]
    fn range_bound_when_between_smas() {
        let mut inputs = fixture_inputs();
        inputs.spot.spx_level = 5600.0; // below SMA50, above SMA200
        let regime = RegimeClassifier::new().classify(&inputs);
        assert_eq!(regime.trend, Trend::RangeBound);
    }
}
