//! Conflict resolution matrix: eight paired-signal scenarios.

use serde::Serialize;

use super::inputs::MarketInputs;
use super::regime::{Confidence, Regime};

#[derive(Debug, Clone, Serialize)]
pub struct ConflictScenario {
    pub conflict_id: &'static str,
    pub description: &'static str,
    pub signal_a: &'static str,
    pub signal_b: &'static str,
    pub resolution: &'static str,
    pub detected: bool,
}

struct ConflictDefinition {
    conflict_id: &'static str,
    description: &'static str,
    signal_a: &'static str,
    signal_b: &'static str,
    resolution: &'static str,
}

const DEFINITIONS: &[ConflictDefinition] = &[
    ConflictDefinition {
        conflict_id: "C1",
        description: "IV says sell, Trend says caution",
        signal_a: "IV Rank > 75",
        signal_b: "SPX below 200 DMA",
        resolution: "Defined-risk spreads only. 50% size. No naked short.",
    },
    ConflictDefinition {
        conflict_id: "C2",
        description: "Event approaching, carry attractive",
        signal_a: "Theta > 0 carry setup",
        signal_b: "FOMC/CPI in 3 days",
        resolution: "WAIT. Enter T+1 post-event. IV crush creates better entry.",
    },
    ConflictDefinition {
        conflict_id: "C3",
        description: "Low vol + Steep skew",
        signal_a: "VIX < 15",
        signal_b: "25d skew > 80th pctile",
        resolution: "Risk reversals or put ladders to monetize skew. No naked short puts.",
    },
    ConflictDefinition {
        conflict_id: "C4",
        description: "Credit widening, VIX still low",
        signal_a: "HY OAS +50bps / 20d",
        signal_b: "VIX < 18",
        resolution: "Reduce short vol 25%. Add VIX call spread. Credit leads equity vol 2-4 weeks.",
    },
    ConflictDefinition {
        conflict_id: "C5",
        description: "Dispersion high, correlation low",
        signal_a: "Implied corr < 30th pctile",
        signal_b: "Sector dispersion elevated",
        resolution: "Enter dispersion trade at 50% standard size. Defined risk preferred.",
    },
    ConflictDefinition {
        conflict_id: "C6",
        description: "Regime confidence = LOW",
        signal_a: "Mixed signals",
        signal_b: "No clear regime",
        resolution: "Defined-risk only. 50% size. No new naked positions. WAIT for clarity.",
    },
    ConflictDefinition {
        conflict_id: "C7",
        description: "VVIX elevated, VIX normal",
        signal_a: "VVIX > 22",
        signal_b: "VIX 15-20",
        resolution: "Vol surface unstable. Reduce all sizes 25-50%. Avoid long-dated vega.",
    },
    ConflictDefinition {
        conflict_id: "C8",
        description: "Term structure inverted",
        signal_a: "1M IV > 3M IV",
        signal_b: "VIX < 25",
        resolution: "Activate tail trading framework (3-pillar). This is the signal.",
    },
];

pub struct ConflictResolver;

impl ConflictResolver {
    pub fn new() -> Self {
        Self
    }

    /// Only scenarios that currently fire.
    pub fn check_conflicts(&self, regime: &Regime, inputs: &MarketInputs) -> Vec<ConflictScenario> {
        self.check_all(regime, inputs)
            .into_iter()
            .filter(|c| c.detected)
            .collect()
    }

    /// All eight scenarios with detection status.
    pub fn check_all(&self, regime: &Regime, inputs: &MarketInputs) -> Vec<ConflictScenario> {
        let v = &inputs.vol;
        let detections = [
            // C1: IV says sell, trend says caution
            v.vix_percentile_1y > 75.0 && inputs.spot.spx_level < inputs.spot.spx_sma_200,
            // C2: macro event imminent while carry is rich
            inputs.events.nearest_macro_days() <= 3 && v.vix_percentile_1y > 40.0,
            // C3: low vol with steep skew
            v.vix < 15.0 && inputs.skew.skew_pctile_1y > 80.0,
            // C4: credit widening while VIX sleeps
            inputs.credit.hy_oas_20d_change > 50.0 && v.vix < 18.0,
            // C5: dispersion rich, correlation cheap
            inputs.correlation.corr_pctile_1y < 30.0 && inputs.correlation.dispersion > 10.0,
            // C6: regime confidence LOW
            regime.confidence == Confidence::Low,
            // C7: VVIX elevated with VIX in the normal band
            v.vvix > 22.0 && (15.0..=20.0).contains(&v.vix),
            // C8: front-end inversion below panic levels
            inputs.term_structure.ts_1m_3m < 0.0 && v.vix < 25.0,
        ];

        DEFINITIONS
            .iter()
            .zip(detections)
            .map(|(def, detected)| ConflictScenario {
                conflict_id: def.conflict_id,
                description: def.description,
                signal_a: def.signal_a,
                signal_b: def.signal_b,
                resolution: def.resolution,
                detected,
            })
            .collect()
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::inputs::fixture_inputs;
    use crate::engine::regime::RegimeClassifier;

    fn regime_for(inputs: &MarketInputs) -> Regime {
        RegimeClassifier::new().classify(inputs)
    }

    fn detected_ids(inputs: &MarketInputs) -> Vec<&'static str> {
        ConflictResolver::new()
            .check_conflicts(&regime_for(inputs), inputs)
            .iter()
            .map(|c| c.conflict_id)
            .collect()
    }

    #[test]
    fn calm_tape_detects_nothing() {
        assert!(detected_ids(&fixture_inputs()).is_empty());
    }

    #[test]
    fn check_all_always_returns_eight() {
        let inputs = fixture_inputs();
        let all = ConflictResolver::new().check_all(&regime_for(&inputs), &inputs);
        assert_eq!(all.len(), 8);
        assert!(all.iter().all(|c| !c.detected));
    }

    #[test]
    fn c1_high_rank_below_trend() {
        let mut inputs = fixture_inputs();
        inputs.vol.vix_percentile_1y = 80.0;
        inputs.spot.spx_level = 5400.0; // below SMA200 (5520) and SMA50
        assert!(detected_ids(&inputs).contains(&"C1"));
    }

    #[test]
    fn c2_macro_event_with_rich_premium() {
        let mut inputs = fixture_inputs();
        inputs.events.days_to_cpi = 2;
        inputs.vol.vix_percentile_1y = 45.0;
        assert!(detected_ids(&inputs).contains(&"C2"));
    }

    #[test]
    fn c3_low_vix_steep_skew() {
        let mut inputs = fixture_inputs();
        inputs.vol.vix = 13.5;
        inputs.skew.skew_pctile_1y = 85.0;
        assert!(detected_ids(&inputs).contains(&"C3"));
    }

    #[test]
    fn c4_credit_leads_vix() {
        let mut inputs = fixture_inputs();
        inputs.credit.hy_oas_20d_change = 55.0;
        inputs.vol.vix = 16.0;
        // hy change > 30 also scores one liquidity-stress point, not two, so
        // the normal path still runs
        assert!(detected_ids(&inputs).contains(&"C4"));
    }

    #[test]
    fn c5_dispersion_rich_correlation_cheap() {
        let mut inputs = fixture_inputs();
        inputs.correlation.corr_pctile_1y = 25.0;
        inputs.correlation.implied_corr = 52.0;
        inputs.correlation.realized_corr_20d = 40.0;
        inputs.correlation.dispersion = 12.0;
        inputs.validate().unwrap();
        assert!(detected_ids(&inputs).contains(&"C5"));
    }

    #[test]
    fn c7_vvix_elevated_vix_normal() {
        let mut inputs = fixture_inputs();
        inputs.vol.vvix = 24.0;
        inputs.vol.vix = 17.0;
        assert!(detected_ids(&inputs).contains(&"C7"));
    }

    #[test]
    fn c8_inversion_below_panic() {
        let mut inputs = fixture_inputs();
        inputs.vol.iv_atm_3m = inputs.vol.iv_atm_1m - 0.4;
        inputs.term_structure.ts_1m_3m = -0.4;
        inputs.vol.iv_atm_6m = inputs.vol.iv_atm_3m + 0.7;
        inputs.term_structure.ts_3m_6m = 0.7;
        inputs.validate().unwrap();
        assert!(detected_ids(&inputs).contains(&"C8"));
    }

    #[test]
    fn c6_follows_regime_confidence() {
        let mut inputs = fixture_inputs();
        // Strip the confirming signals for a LOW-confidence NORMAL read
        inputs.term_structure.ts_1m_3m = -0.1;
        inputs.vol.iv_atm_3m = inputs.vol.iv_atm_1m - 0.1;
        inputs.vol.iv_atm_6m = inputs.vol.iv_atm_3m + 0.7;
        inputs.term_structure.ts_3m_6m = 0.7;
        inputs.credit.hy_oas_20d_change = 25.0;
        inputs.validate().unwrap();

        let ids = detected_ids(&inputs);
        assert!(ids.contains(&"C6"));
        assert!(ids.contains(&"C8")); // same tape inverts the front end
    }
}
