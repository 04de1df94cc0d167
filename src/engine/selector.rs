//! Strategy selector: entry gates, six-dimension scoring, parameterization,
//! top-3 ranking with fallback recommendation types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::inputs::MarketInputs;
use super::regime::{Confidence, Regime, VolRegime};
use super::sizing::{confidence_adjustment, regime_size_multipliers, vvix_adjustment};
use super::strategies::{
    BaseDelta, BaseDte, StrategyFamily, StrategyObjective, StrategyTemplate, StrategyUniverse,
    TargetRule,
};

/// Requested selection objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    Income,
    Directional,
    Hedging,
    Event,
    RelativeValue,
    Tail,
    All,
}

impl Default for Objective {
    fn default() -> Self {
        Objective::Income
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationType {
    Trade,
    TradeCautious,
    LowConviction,
    NoTrade,
    RegimeUncertain,
}

#[derive(Debug, Clone, Serialize)]
pub struct GateCheck {
    pub gate_name: String,
    pub passed: bool,
    pub reason: String,
}

impl GateCheck {
    fn passed(name: &str) -> Self {
        Self {
            gate_name: name.to_string(),
            passed: true,
            reason: String::new(),
        }
    }

    fn check(name: &str, passed: bool, reason: String) -> Self {
        Self {
            gate_name: name.to_string(),
            passed,
            reason: if passed { String::new() } else { reason },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyScore {
    pub total: f64,
    pub edge: f64,
    pub carry_fit: f64,
    pub tail_risk: f64,
    pub robustness: f64,
    pub liquidity: f64,
    pub complexity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyParams {
    pub delta: Option<i32>,
    pub deltas: Option<BTreeMap<String, i32>>,
    pub dte: i64,
    pub size_multiplier: f64,
    pub profit_target: TargetRule,
    pub stop_loss: TargetRule,
    pub roll_dte: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyCandidate {
    pub name: String,
    pub template: StrategyTemplate,
    pub scores: StrategyScore,
    pub params: StrategyParams,
    pub gates: Vec<GateCheck>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyRecommendation {
    pub recommendation: RecommendationType,
    pub strategies: Vec<StrategyCandidate>,
    pub regime: Regime,
    pub note: String,
    pub timestamp: DateTime<Utc>,
}

fn delta_adjustment(regime: VolRegime) -> f64 {
    match regime {
        VolRegime::VeryLow => 1.2,
        VolRegime::Low => 1.1,
        VolRegime::Normal => 1.0,
        VolRegime::Elevated => 0.8,
        VolRegime::High => 0.6,
        VolRegime::Extreme | VolRegime::Crisis => 0.5,
        VolRegime::LiquidityStress => 0.7,
    }
}

fn adjust_delta(base_delta: i32, regime: VolRegime) -> i32 {
    ((f64::from(base_delta) * delta_adjustment(regime)).round() as i32).max(1)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

pub struct StrategySelector {
    universe: Arc<StrategyUniverse>,
}

impl StrategySelector {
    pub fn new(universe: Arc<StrategyUniverse>) -> Self {
        Self { universe }
    }

    /// Run the full pipeline: gates -> objective filter -> score ->
    /// parameterize -> rank.
    pub fn select(
        &self,
        regime: &Regime,
        inputs: &MarketInputs,
        objective: Objective,
        _nav: f64,
    ) -> StrategyRecommendation {
        let mut candidates: Vec<StrategyCandidate> = Vec::new();

        for template in self.universe.list_all() {
            let gates = Self::check_gates(template, regime, inputs);
            if !gates.iter().all(|g| g.passed) {
                continue;
            }
            if !Self::matches_objective(template, objective) {
                continue;
            }

            let scores = Self::score(template, regime, inputs);
            let params = Self::parameterize(template, regime, inputs);

            candidates.push(StrategyCandidate {
                name: template.name.clone(),
                template: template.clone(),
                scores,
                params,
                gates,
            });
        }

        // Stable sort: equal totals keep catalog insertion order
        candidates.sort_by(|a, b| {
            b.scores
                .total
                .partial_cmp(&a.scores.total)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(3);

        let recommendation = |rec, strategies, note: &str| StrategyRecommendation {
            recommendation: rec,
            strategies,
            regime: regime.clone(),
            note: note.to_string(),
            timestamp: Utc::now(),
        };

        if candidates.is_empty() {
            return recommendation(
                RecommendationType::NoTrade,
                Vec::new(),
                "No strategy passes all filters in current regime",
            );
        }

        if candidates[0].scores.total < 5.0 {
            return recommendation(
                RecommendationType::LowConviction,
                candidates,
                "Reduce size by 50% or wait for better setup",
            );
        }

        if regime.confidence == Confidence::Low {
            candidates.retain(|c| c.template.legs >= 2);
            if candidates.is_empty() {
                return recommendation(
                    RecommendationType::RegimeUncertain,
                    Vec::new(),
                    "Mixed signals; no defined-risk strategies available. WAIT.",
                );
            }
            return recommendation(
                RecommendationType::TradeCautious,
                candidates,
                "Low confidence regime - defined risk only, 50% size",
            );
        }

        recommendation(RecommendationType::Trade, candidates, "")
    }

    // ── Entry gates G1-G7 ────────────────────────────────────────────────

    fn check_gates(
        template: &StrategyTemplate,
        regime: &Regime,
        inputs: &MarketInputs,
    ) -> Vec<GateCheck> {
        let mut gates = Vec::new();

        // G1: IV rank floor for premium selling
        if template.family == StrategyFamily::ShortPremium {
            gates.push(GateCheck::check(
                "G1_iv_rank",
                inputs.vol.vix_percentile_1y >= 25.0,
                "IV rank below 25th pctile - insufficient premium".to_string(),
            ));
        }

        // G2: Event avoidance
        if template.event_block && regime.event_active {
            let ev = &inputs.events;
            let blocked = (regime.event_type.is_macro() && ev.nearest_macro_days() <= 10)
                || (regime.event_type == super::regime::EventType::Earnings
                    && ev.days_to_earnings <= 5);
            gates.push(GateCheck::check(
                "G2_event_avoidance",
                !blocked,
                format!("Event ({:?}) within blocking window", regime.event_type),
            ));
        }

        // G3: Liquidity
        gates.push(GateCheck::check(
            "G3_liquidity",
            inputs.liquidity.spx_bid_ask <= 0.30,
            "Bid-ask > 30% of mid - abort entry".to_string(),
        ));

        // G4: Theta/gamma ratio needs live Greeks; deferred to execution
        if template.family == StrategyFamily::ShortPremium {
            gates.push(GateCheck::passed("G4_theta_gamma"));
        }

        // G5: Regime compatibility
        let regime_name = regime.regime.as_str();
        let allowed = &template.regime_allowed;
        let excluded = &template.regime_excluded;
        let compatible = if allowed.iter().any(|r| r == "ALL") {
            !excluded.iter().any(|r| r == regime_name)
        } else {
            allowed.iter().any(|r| r == regime_name) && !excluded.iter().any(|r| r == regime_name)
        };
        gates.push(GateCheck::check(
            "G5_regime_compat",
            compatible,
            format!("Strategy not allowed in {regime_name} regime"),
        ));

        // G6: VVIX stability - no naked short vol on an unstable surface
        if regime.vol_unstable && template.family == StrategyFamily::ShortPremium {
            gates.push(GateCheck::check(
                "G6_vvix_stability",
                template.legs >= 2,
                "VVIX > 22 - no naked short vol".to_string(),
            ));
        }

        // G7: Strategy-specific constraints
        if let Some(min) = template.iv_rank_min {
            gates.push(GateCheck::check(
                "G7_iv_rank_min",
                inputs.vol.vix_percentile_1y >= min,
                format!(
                    "IV rank {:.0} below strategy min {min}",
                    inputs.vol.vix_percentile_1y
                ),
            ));
        }
        if let Some(max) = template.iv_rank_max {
            gates.push(GateCheck::check(
                "G7_iv_rank_max",
                inputs.vol.vix_percentile_1y <= max,
                format!(
                    "IV rank {:.0} above strategy max {max}",
                    inputs.vol.vix_percentile_1y
                ),
            ));
        }
        if let Some(max) = template.vix_max {
            gates.push(GateCheck::check(
                "G7_vix_max",
                inputs.vol.vix <= max,
                format!("VIX {:.1} above strategy max {max}", inputs.vol.vix),
            ));
        }

        gates
    }

    // ── Objective filter ─────────────────────────────────────────────────

    fn matches_objective(template: &StrategyTemplate, objective: Objective) -> bool {
        match objective {
            Objective::Income => template.family == StrategyFamily::ShortPremium,
            Objective::Directional => matches!(
                template.objective,
                StrategyObjective::DirectionalBullish
                    | StrategyObjective::DirectionalBearish
                    | StrategyObjective::SpotRecovery
            ),
            Objective::Hedging => template.family == StrategyFamily::Hedging,
            Objective::Event => template.event_required,
            Objective::RelativeValue => template.family == StrategyFamily::RelativeValue,
            Objective::Tail => template.family == StrategyFamily::TailTrading,
            Objective::All => true,
        }
    }

    // ── Six-dimension scoring ────────────────────────────────────────────

    fn score(template: &StrategyTemplate, regime: &Regime, inputs: &MarketInputs) -> StrategyScore {
        let iv_rank_score = inputs.vol.vix_percentile_1y / 10.0;

        // DIMENSION 1: EDGE (25%)
        let edge = if template.family == StrategyFamily::ShortPremium {
            let iv_rv_bonus = inputs.vol.iv_rv_spread.clamp(0.0, 3.0);
            (iv_rank_score + iv_rv_bonus).min(10.0)
        } else {
            (10.0 - iv_rank_score).max(0.0)
        };

        // DIMENSION 2: CARRY vs CONVEXITY FIT (20%)
        let carry_fit = match template.objective {
            StrategyObjective::Income | StrategyObjective::CarryWithProtection => {
                if matches!(regime.regime, VolRegime::Elevated | VolRegime::High) {
                    6.0
                } else {
                    8.0
                }
            }
            StrategyObjective::TailHedge
            | StrategyObjective::SystematicTail
            | StrategyObjective::EventVol => {
                if inputs.vol.vix_percentile_1y < 30.0 {
                    8.0
                } else {
                    5.0
                }
            }
            _ => 5.0,
        };

        // DIMENSION 3: TAIL RISK EXPOSURE (20%, 10 = least risk)
        let tail = match template.legs {
            legs if legs >= 4 => 9.0,
            legs if legs >= 2 => 7.0,
            1 => {
                if template.family == StrategyFamily::ShortPremium {
                    if regime.regime == VolRegime::Elevated {
                        2.0
                    } else {
                        3.0
                    }
                } else {
                    8.0
                }
            }
            _ => 5.0,
        };

        // DIMENSION 4: ROBUSTNESS / WIN RATE (15%)
        let win_rate = template.win_rate.unwrap_or(0.55);
        let sharpe = template.sharpe_hist.unwrap_or(0.50);
        let robust = ((win_rate * 10.0) * 0.6 + (sharpe * 5.0) * 0.4).min(10.0);

        // DIMENSION 5: LIQUIDITY (10%)
        let ba_pct = inputs.liquidity.spx_bid_ask * 100.0;
        let liquid = if ba_pct < 5.0 {
            10.0
        } else if ba_pct < 10.0 {
            8.0
        } else if ba_pct < 20.0 {
            5.0
        } else if ba_pct < 30.0 {
            3.0
        } else {
            0.0
        };

        // DIMENSION 6: COMPLEXITY PENALTY (10%, 10 = simplest)
        let complexity = match template.legs {
            1 => 10.0,
            2 => 8.0,
            3 => 5.0,
            _ => 3.0,
        };

        let total = 0.25 * edge
            + 0.20 * carry_fit
            + 0.20 * tail
            + 0.15 * robust
            + 0.10 * liquid
            + 0.10 * complexity;

        StrategyScore {
            total: round2(total),
            edge: round2(edge),
            carry_fit: round2(carry_fit),
            tail_risk: round2(tail),
            robustness: round2(robust),
            liquidity: round2(liquid),
            complexity: round2(complexity),
        }
    }

    // ── Parameterization ─────────────────────────────────────────────────

    fn parameterize(
        template: &StrategyTemplate,
        regime: &Regime,
        inputs: &MarketInputs,
    ) -> StrategyParams {
        let (delta, deltas) = match &template.base_delta {
            BaseDelta::Single(base) => (Some(adjust_delta(*base, regime.regime)), None),
            BaseDelta::PerLeg(legs) => (
                None,
                Some(
                    legs.iter()
                        .map(|(leg, base)| (leg.clone(), adjust_delta(*base, regime.regime)))
                        .collect(),
                ),
            ),
        };

        let dte = match &template.base_dte {
            // Symbolic DTEs are event-linked; fall back to the standard cycle
            BaseDte::Symbolic(_) => 37,
            BaseDte::Days(base) => {
                let mut dte = *base;
                if regime.event_active && !template.event_required {
                    dte = dte.max(inputs.events.nearest_event_days() + 10);
                }
                dte
            }
        };

        let (sell_mult, buy_mult) = regime_size_multipliers(regime.regime);
        let side_mult = if template.family == StrategyFamily::ShortPremium {
            sell_mult
        } else {
            buy_mult
        };
        let multiplier = side_mult
            * vvix_adjustment(inputs.vol.vvix)
            * confidence_adjustment(regime.confidence);

        StrategyParams {
            delta,
            deltas,
            dte,
            size_multiplier: round4(multiplier),
            profit_target: template.profit_target.clone(),
            stop_loss: template.stop_loss.clone(),
            roll_dte: template.roll_dte,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::inputs::fixture_inputs;
    use crate::engine::regime::RegimeClassifier;

    fn selector() -> StrategySelector {
        StrategySelector::new(Arc::new(StrategyUniverse::new()))
    }

    /// NORMAL-regime tape tuned for income selection: percentile 55,
    /// iv_rv_spread +2.5, tight markets, stable VVIX.
    fn income_inputs() -> MarketInputs {
        let mut inputs = fixture_inputs();
        inputs.vol.vix_percentile_1y = 55.0;
        inputs.vol.rv_20d = inputs.vol.iv_atm_1m - 2.5;
        inputs.vol.iv_rv_spread = 2.5;
        inputs.vol.vvix = 17.0;
        inputs.liquidity.spx_bid_ask = 0.04;
        inputs.validate().unwrap();
        inputs
    }

    #[test]
    fn income_objective_in_normal_regime_recommends_trading() {
        let inputs = income_inputs();
        let regime = RegimeClassifier::new().classify(&inputs);
        assert_eq!(regime.regime, VolRegime::Normal);

        let rec = selector().select(&regime, &inputs, Objective::Income, 100_000.0);
        assert_eq!(rec.recommendation, RecommendationType::Trade);
        assert!(!rec.strategies.is_empty() && rec.strategies.len() <= 3);

        let condor = rec
            .strategies
            .iter()
            .find(|c| c.name == "iron_condor")
            .expect("iron_condor should make the top 3");
        assert!(condor.gates.iter().all(|g| g.passed));
        assert!(condor.scores.total > 5.0);
        assert_eq!(condor.params.dte, 37);
        assert_eq!(condor.params.size_multiplier, 0.75); // 0.75 * 1.00 * 1.00
    }

    #[test]
    fn ranking_is_non_increasing_and_scores_bounded() {
        let inputs = income_inputs();
        let regime = RegimeClassifier::new().classify(&inputs);
        let rec = selector().select(&regime, &inputs, Objective::All, 100_000.0);

        for pair in rec.strategies.windows(2) {
            assert!(pair[0].scores.total >= pair[1].scores.total);
        }
        for c in &rec.strategies {
            for dim in [
                c.scores.edge,
                c.scores.carry_fit,
                c.scores.tail_risk,
                c.scores.robustness,
                c.scores.liquidity,
                c.scores.complexity,
                c.scores.total,
            ] {
                assert!((0.0..=10.0).contains(&dim));
            }
            let weighted = 0.25 * c.scores.edge
                + 0.20 * c.scores.carry_fit
                + 0.20 * c.scores.tail_risk
                + 0.15 * c.scores.robustness
                + 0.10 * c.scores.liquidity
                + 0.10 * c.scores.complexity;
            assert!((c.scores.total - weighted).abs() < 0.01);
        }
    }

    #[test]
    fn crisis_regime_yields_no_income_trade() {
        let mut inputs = fixture_inputs();
        inputs.vol.vix = 38.0;
        inputs.vol.vix_1d_change = 6.0;
        inputs.credit.hy_oas_20d_change = 60.0;
        let regime = RegimeClassifier::new().classify(&inputs);
        assert_eq!(regime.regime, VolRegime::Crisis);

        let rec = selector().select(&regime, &inputs, Objective::Income, 100_000.0);
        assert_eq!(rec.recommendation, RecommendationType::NoTrade);
        assert!(rec.strategies.is_empty());
    }

    #[test]
    fn low_iv_rank_blocks_short_premium_via_g1() {
        let mut inputs = income_inputs();
        inputs.vol.vix_percentile_1y = 10.0;
        let regime = RegimeClassifier::new().classify(&inputs);

        let rec = selector().select(&regime, &inputs, Objective::Income, 100_000.0);
        assert_eq!(rec.recommendation, RecommendationType::NoTrade);
    }

    #[test]
    fn wide_markets_block_everything_via_g3() {
        let mut inputs = income_inputs();
        inputs.liquidity.spx_bid_ask = 0.35;
        inputs.liquidity.spx_bid_ask_20d_ma = 0.35;
        let regime = RegimeClassifier::new().classify(&inputs);

        let rec = selector().select(&regime, &inputs, Objective::All, 100_000.0);
        assert_eq!(rec.recommendation, RecommendationType::NoTrade);
    }

    #[test]
    fn unstable_vvix_blocks_naked_short_vol_via_g6() {
        let mut inputs = income_inputs();
        inputs.vol.vvix = 24.0;
        let regime = RegimeClassifier::new().classify(&inputs);
        assert!(regime.vol_unstable);

        let rec = selector().select(&regime, &inputs, Objective::Income, 100_000.0);
        for candidate in &rec.strategies {
            assert!(candidate.template.legs >= 2, "{}", candidate.name);
        }
    }

    #[test]
    fn event_window_blocks_event_block_templates_and_pushes_dte() {
        let mut inputs = income_inputs();
        inputs.events.days_to_fomc = 4;
        inputs.events.events_next_5d = 1;
        let regime = RegimeClassifier::new().classify(&inputs);
        assert!(regime.event_active);

        let rec = selector().select(&regime, &inputs, Objective::Income, 100_000.0);
        // covered_call and variance_swap_ko have no event_block; anything
        // event-blocked must be absent within the 10-day macro window.
        for candidate in &rec.strategies {
            assert!(!candidate.template.event_block, "{}", candidate.name);
            // dte pushed past the event: nearest event 4 + 10 = 14 minimum
            assert!(candidate.params.dte >= 14);
        }
    }

    #[test]
    fn delta_scales_with_regime() {
        assert_eq!(adjust_delta(12, VolRegime::VeryLow), 14); // 12 * 1.2
        assert_eq!(adjust_delta(12, VolRegime::Normal), 12);
        assert_eq!(adjust_delta(12, VolRegime::High), 7); // 12 * 0.6
        assert_eq!(adjust_delta(1, VolRegime::Crisis), 1); // floor at 1
    }

    #[test]
    fn low_confidence_filters_to_defined_risk() {
        let mut inputs = income_inputs();
        // Kill the confirming signals: spread below band, skew above 50,
        // credit above 20.
        inputs.vol.rv_20d = inputs.vol.iv_atm_1m - 2.0;
        inputs.vol.iv_rv_spread = 2.0;
        inputs.term_structure.ts_1m_3m = -0.1;
        inputs.vol.iv_atm_3m = inputs.vol.iv_atm_1m - 0.1;
        inputs.vol.iv_atm_6m = inputs.vol.iv_atm_3m + 0.7;
        inputs.term_structure.ts_3m_6m = 0.7;
        inputs.credit.hy_oas_20d_change = 25.0;
        inputs.skew.skew_pctile_1y = 60.0;
        inputs.validate().unwrap();

        let regime = RegimeClassifier::new().classify(&inputs);
        assert_eq!(regime.confidence, Confidence::Low);

        let rec = selector().select(&regime, &inputs, Objective::Income, 100_000.0);
        assert_eq!(rec.recommendation, RecommendationType::TradeCautious);
        assert!(rec.note.contains("50% size"));
        for candidate in &rec.strategies {
            assert!(candidate.template.legs >= 2);
            // Confidence adjustment halves the multiplier
            assert!(candidate.params.size_multiplier <= 0.5);
        }
    }
}
