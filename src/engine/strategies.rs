//! Strategy universe: the immutable template catalog the selector iterates.
//!
//! Insertion order is meaningful: the selector's ranking is stable, so
//! equal-scoring templates keep catalog order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyFamily {
    ShortPremium,
    LongPremium,
    Hedging,
    TailTrading,
    RelativeValue,
}

impl StrategyFamily {
    pub const ALL: &'static [StrategyFamily] = &[
        StrategyFamily::ShortPremium,
        StrategyFamily::LongPremium,
        StrategyFamily::Hedging,
        StrategyFamily::TailTrading,
        StrategyFamily::RelativeValue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyFamily::ShortPremium => "short_premium",
            StrategyFamily::LongPremium => "long_premium",
            StrategyFamily::Hedging => "hedging",
            StrategyFamily::TailTrading => "tail_trading",
            StrategyFamily::RelativeValue => "relative_value",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyObjective {
    Income,
    EventHarvest,
    DirectionalBullish,
    DirectionalBearish,
    EventVol,
    PortfolioHedge,
    TailHedge,
    SystematicTail,
    SpotRecovery,
    RealizedVolCapture,
    VixNormalization,
    CorrelationRv,
    CarryWithProtection,
    SectorMeanReversion,
}

/// Base delta: single-leg value or per-leg mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BaseDelta {
    Single(i32),
    PerLeg(BTreeMap<String, i32>),
}

/// Base DTE: a day count or a symbolic token like "event_dte".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BaseDte {
    Days(i64),
    Symbolic(String),
}

/// Profit target / stop loss: a fraction or a textual rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetRule {
    Fraction(f64),
    Rule(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyTemplate {
    pub name: String,
    pub family: StrategyFamily,
    pub objective: StrategyObjective,
    pub legs: u32,
    pub base_delta: BaseDelta,
    pub base_dte: BaseDte,
    pub width_pct: Option<f64>,
    pub profit_target: TargetRule,
    pub stop_loss: TargetRule,
    pub roll_dte: Option<i64>,
    pub win_rate: Option<f64>,
    pub sharpe_hist: Option<f64>,
    pub regime_allowed: Vec<String>,
    pub regime_excluded: Vec<String>,
    pub event_block: bool,
    pub event_required: bool,
    pub iv_rank_min: Option<f64>,
    pub iv_rank_max: Option<f64>,
    pub vix_max: Option<f64>,
    pub structure: Option<String>,
    pub cost: Option<String>,
    pub cost_budget: Option<f64>,
    pub description: String,
}

impl Default for StrategyTemplate {
    fn default() -> Self {
        Self {
            name: String::new(),
            family: StrategyFamily::ShortPremium,
            objective: StrategyObjective::Income,
            legs: 1,
            base_delta: BaseDelta::Single(15),
            base_dte: BaseDte::Days(37),
            width_pct: None,
            profit_target: TargetRule::Fraction(0.50),
            stop_loss: TargetRule::Fraction(2.0),
            roll_dte: Some(21),
            win_rate: None,
            sharpe_hist: None,
            regime_allowed: vec!["ALL".to_string()],
            regime_excluded: Vec::new(),
            event_block: false,
            event_required: false,
            iv_rank_min: None,
            iv_rank_max: None,
            vix_max: None,
            structure: None,
            cost: None,
            cost_budget: None,
            description: String::new(),
        }
    }
}

fn regimes(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn per_leg(entries: &[(&str, i32)]) -> BaseDelta {
    BaseDelta::PerLeg(entries.iter().map(|(k, v)| (k.to_string(), *v)).collect())
}

/// Complete strategy template catalog.
pub struct StrategyUniverse {
    templates: Vec<StrategyTemplate>,
    index: HashMap<String, usize>,
}

impl StrategyUniverse {
    pub fn new() -> Self {
        let templates = build_templates();
        let index = templates
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();
        Self { templates, index }
    }

    pub fn get(&self, name: &str) -> Result<&StrategyTemplate, EngineError> {
        self.index
            .get(name)
            .map(|&i| &self.templates[i])
            .ok_or_else(|| EngineError::unknown_name("strategy", name, self.names()))
    }

    pub fn list_all(&self) -> &[StrategyTemplate] {
        &self.templates
    }

    pub fn by_family(&self, family: StrategyFamily) -> Vec<&StrategyTemplate> {
        self.templates.iter().filter(|t| t.family == family).collect()
    }

    pub fn by_objective(&self, objective: StrategyObjective) -> Vec<&StrategyTemplate> {
        self.templates
            .iter()
            .filter(|t| t.objective == objective)
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.templates.iter().map(|t| t.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Default for StrategyUniverse {
    fn default() -> Self {
        Self::new()
    }
}

fn build_templates() -> Vec<StrategyTemplate> {
    vec![
        // ═══ SHORT PREMIUM (INCOME / CARRY) ═══
        StrategyTemplate {
            name: "cash_secured_put".into(),
            family: StrategyFamily::ShortPremium,
            objective: StrategyObjective::Income,
            legs: 1,
            base_delta: BaseDelta::Single(12),
            base_dte: BaseDte::Days(37),
            profit_target: TargetRule::Fraction(0.50),
            stop_loss: TargetRule::Fraction(2.0),
            roll_dte: Some(21),
            win_rate: Some(0.74),
            sharpe_hist: Some(0.50),
            regime_allowed: regimes(&["VERY_LOW", "LOW", "NORMAL", "ELEVATED"]),
            regime_excluded: regimes(&["HIGH", "EXTREME", "CRISIS"]),
            event_block: true,
            description: "10-15 delta put selling, 74% win rate, 30-45 DTE".into(),
            ..Default::default()
        },
        StrategyTemplate {
            name: "put_credit_spread".into(),
            family: StrategyFamily::ShortPremium,
            objective: StrategyObjective::Income,
            legs: 2,
            base_delta: per_leg(&[("short", 17), ("long", 7)]),
            base_dte: BaseDte::Days(37),
            width_pct: Some(0.07),
            profit_target: TargetRule::Fraction(0.50),
            stop_loss: TargetRule::Fraction(1.0),
            roll_dte: Some(21),
            regime_allowed: regimes(&["VERY_LOW", "LOW", "NORMAL", "ELEVATED", "HIGH"]),
            regime_excluded: regimes(&["CRISIS"]),
            event_block: true,
            description: "Defined-risk put spread, 7% width between strikes".into(),
            ..Default::default()
        },
        StrategyTemplate {
            name: "short_strangle".into(),
            family: StrategyFamily::ShortPremium,
            objective: StrategyObjective::Income,
            legs: 2,
            base_delta: per_leg(&[("put", 17), ("call", 17)]),
            base_dte: BaseDte::Days(37),
            profit_target: TargetRule::Fraction(0.50),
            stop_loss: TargetRule::Fraction(2.0),
            roll_dte: Some(21),
            regime_allowed: regimes(&["LOW", "NORMAL"]),
            regime_excluded: regimes(&["ELEVATED", "HIGH", "EXTREME", "CRISIS"]),
            event_block: true,
            iv_rank_min: Some(50.0),
            description: "Naked strangle, only in low/normal vol with IV rank > 50th".into(),
            ..Default::default()
        },
        StrategyTemplate {
            name: "iron_condor".into(),
            family: StrategyFamily::ShortPremium,
            objective: StrategyObjective::Income,
            legs: 4,
            base_delta: per_leg(&[
                ("short_put", 17),
                ("long_put", 7),
                ("short_call", 17),
                ("long_call", 7),
            ]),
            base_dte: BaseDte::Days(37),
            profit_target: TargetRule::Fraction(0.50),
            stop_loss: TargetRule::Fraction(0.25),
            roll_dte: Some(21),
            regime_allowed: regimes(&["LOW", "NORMAL", "ELEVATED"]),
            regime_excluded: regimes(&["HIGH", "EXTREME", "CRISIS"]),
            event_block: true,
            description: "4-leg defined-risk; close at 50% profit or 25% of max loss early".into(),
            ..Default::default()
        },
        StrategyTemplate {
            name: "covered_call".into(),
            family: StrategyFamily::ShortPremium,
            objective: StrategyObjective::Income,
            legs: 1,
            base_delta: BaseDelta::Single(30),
            base_dte: BaseDte::Days(30),
            sharpe_hist: Some(0.76),
            regime_allowed: regimes(&["VERY_LOW", "LOW", "NORMAL", "ELEVATED"]),
            regime_excluded: regimes(&["CRISIS"]),
            description: "Large-cap overwriting, Sharpe 0.76, Q5 FCF yield 8.8%".into(),
            ..Default::default()
        },
        StrategyTemplate {
            name: "calendar_spread_short_front".into(),
            family: StrategyFamily::ShortPremium,
            objective: StrategyObjective::EventHarvest,
            legs: 2,
            base_delta: BaseDelta::Single(50),
            base_dte: BaseDte::Symbolic("event_dte".into()),
            profit_target: TargetRule::Rule("front_expires_worthless".into()),
            stop_loss: TargetRule::Rule("realized_move > 1.5x implied_move".into()),
            regime_allowed: regimes(&["ALL"]),
            regime_excluded: regimes(&["CRISIS"]),
            event_required: true,
            description: "ATM calendar selling front-end event IV, buying back-month".into(),
            ..Default::default()
        },
        // ═══ LONG PREMIUM (DIRECTIONAL / CONVEXITY) ═══
        StrategyTemplate {
            name: "put_debit_spread".into(),
            family: StrategyFamily::LongPremium,
            objective: StrategyObjective::DirectionalBearish,
            legs: 2,
            base_delta: per_leg(&[("long", 35), ("short", 17)]),
            base_dte: BaseDte::Days(52),
            width_pct: Some(0.12),
            profit_target: TargetRule::Fraction(1.00),
            stop_loss: TargetRule::Fraction(0.50),
            regime_allowed: regimes(&["ELEVATED", "HIGH", "NORMAL"]),
            description: "Bearish debit spread, 45-60 DTE, 2:1 R/R target".into(),
            ..Default::default()
        },
        StrategyTemplate {
            name: "call_debit_spread".into(),
            family: StrategyFamily::LongPremium,
            objective: StrategyObjective::DirectionalBullish,
            legs: 2,
            base_delta: per_leg(&[("long", 45), ("short", 27)]),
            base_dte: BaseDte::Days(52),
            profit_target: TargetRule::Fraction(1.00),
            stop_loss: TargetRule::Fraction(0.50),
            regime_allowed: regimes(&["VERY_LOW", "LOW", "NORMAL"]),
            description: "Bullish debit spread, 45-60 DTE, 2:1 R/R target".into(),
            ..Default::default()
        },
        StrategyTemplate {
            name: "long_straddle".into(),
            family: StrategyFamily::LongPremium,
            objective: StrategyObjective::EventVol,
            legs: 2,
            base_delta: BaseDelta::Single(50),
            base_dte: BaseDte::Symbolic("event_dte + 7".into()),
            profit_target: TargetRule::Rule("realized > 1.5x implied".into()),
            stop_loss: TargetRule::Rule("theta > 25% of premium with no move".into()),
            iv_rank_max: Some(30.0),
            regime_allowed: regimes(&["LOW", "NORMAL"]),
            event_required: true,
            description: "ATM straddle for event vol, only when IV rank < 30th".into(),
            ..Default::default()
        },
        // ═══ HEDGING / TAIL RISK ═══
        StrategyTemplate {
            name: "put_ladder_1x2".into(),
            family: StrategyFamily::Hedging,
            objective: StrategyObjective::PortfolioHedge,
            legs: 3,
            structure: Some("buy 1x ATM-5% put, sell 2x ATM-15% puts".into()),
            base_dte: BaseDte::Days(75),
            cost: Some("zero_or_credit".into()),
            regime_allowed: regimes(&["ELEVATED", "HIGH"]),
            description: "Put ladder monetizing rich skew, protection -5% to -15%".into(),
            ..Default::default()
        },
        StrategyTemplate {
            name: "vix_call_spread".into(),
            family: StrategyFamily::Hedging,
            objective: StrategyObjective::TailHedge,
            legs: 2,
            structure: Some("buy VIX call at current+4, sell at current+12".into()),
            base_dte: BaseDte::Days(45),
            cost_budget: Some(0.01),
            regime_allowed: regimes(&["LOW", "NORMAL"]),
            vix_max: Some(20.0),
            description: "3-5x convexity vs SPX puts in crises".into(),
            ..Default::default()
        },
        StrategyTemplate {
            name: "vix_collar_zero_cost".into(),
            family: StrategyFamily::Hedging,
            objective: StrategyObjective::PortfolioHedge,
            legs: 3,
            structure: Some("buy VIX call, sell higher VIX call, sell VIX put to fund".into()),
            cost: Some("zero".into()),
            regime_allowed: regimes(&["NORMAL"]),
            description: "Zero-cost VIX collar".into(),
            ..Default::default()
        },
        StrategyTemplate {
            name: "scheduled_convexity".into(),
            family: StrategyFamily::Hedging,
            objective: StrategyObjective::SystematicTail,
            legs: 1,
            structure: Some("buy 5-10 delta OTM puts monthly on schedule".into()),
            cost_budget: Some(0.01),
            regime_allowed: regimes(&["ALL"]),
            description: "Scheduled convexity buying beats discretionary over 27yr".into(),
            ..Default::default()
        },
        // ═══ THREE-PILLAR TAIL TRADING ═══
        StrategyTemplate {
            name: "tail_delta_pillar".into(),
            family: StrategyFamily::TailTrading,
            objective: StrategyObjective::SpotRecovery,
            legs: 2,
            structure: Some("Long SPX 1M ATM-25D call spread".into()),
            regime_allowed: regimes(&["ELEVATED", "HIGH", "CRISIS"]),
            description: "Pillar 1: captures spot recovery, 1/22 notional per signal".into(),
            ..Default::default()
        },
        StrategyTemplate {
            name: "tail_gamma_pillar".into(),
            family: StrategyFamily::TailTrading,
            objective: StrategyObjective::RealizedVolCapture,
            legs: 1,
            structure: Some("Long SPX 5D 25-delta calls, daily hedge at close".into()),
            win_rate: Some(0.622),
            regime_allowed: regimes(&["ELEVATED", "HIGH", "CRISIS"]),
            description: "Pillar 2: 62.2% hit rate capturing realized vol on recovery bounces"
                .into(),
            ..Default::default()
        },
        StrategyTemplate {
            name: "tail_vega_pillar".into(),
            family: StrategyFamily::TailTrading,
            objective: StrategyObjective::VixNormalization,
            legs: 3,
            structure: Some("Long VIX 1M ATM-25-10D put ladder".into()),
            regime_allowed: regimes(&["ELEVATED", "HIGH", "CRISIS"]),
            description: "Pillar 3: VIX mean reversion, 1/26 notional, match gamma vega".into(),
            ..Default::default()
        },
        // ═══ RELATIVE VALUE / DISPERSION ═══
        StrategyTemplate {
            name: "dispersion_long".into(),
            family: StrategyFamily::RelativeValue,
            objective: StrategyObjective::CorrelationRv,
            legs: 2,
            structure: Some("sell index vol, buy single-stock vol basket".into()),
            base_dte: BaseDte::Days(90),
            win_rate: Some(0.5529),
            regime_allowed: regimes(&["NORMAL", "LOW"]),
            description: "55.29% normal hit rate, enter when implied corr > 70th pctile".into(),
            ..Default::default()
        },
        StrategyTemplate {
            name: "variance_swap_ko".into(),
            family: StrategyFamily::ShortPremium,
            objective: StrategyObjective::CarryWithProtection,
            legs: 1,
            structure: Some("short KO variance swap (KO at 2.5x strike vol)".into()),
            base_dte: BaseDte::Days(60),
            regime_allowed: regimes(&["LOW", "NORMAL"]),
            description: "Caps left-tail at barrier, retains 85-90% of carry".into(),
            ..Default::default()
        },
        StrategyTemplate {
            name: "sector_iv_rv".into(),
            family: StrategyFamily::RelativeValue,
            objective: StrategyObjective::SectorMeanReversion,
            legs: 2,
            structure: Some("sell top-decile sector IV, buy bottom-decile".into()),
            base_dte: BaseDte::Days(60),
            regime_allowed: regimes(&["NORMAL", "LOW"]),
            description: "Sector IV divergence > 40pts (5Y lookback) mean reversion".into(),
            ..Default::default()
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_name_roundtrip() {
        let universe = StrategyUniverse::new();
        for template in universe.list_all() {
            let found = universe.get(&template.name).unwrap();
            assert_eq!(found.name, template.name);
        }
    }

    #[test]
    fn families_partition_the_catalog() {
        let universe = StrategyUniverse::new();
        let total: usize = StrategyFamily::ALL
            .iter()
            .map(|f| universe.by_family(*f).len())
            .sum();
        assert_eq!(total, universe.len());
    }

    #[test]
    fn unknown_name_lists_alternatives() {
        let universe = StrategyUniverse::new();
        let err = universe.get("iron_butterfly").unwrap_err();
        match err {
            EngineError::UnknownName { available, .. } => {
                assert_eq!(available.len(), universe.len());
                assert!(available.contains(&"iron_condor".to_string()));
            }
            other => panic!("expected UnknownName, got {other:?}"),
        }
    }

    #[test]
    fn catalog_holds_roughly_twenty_templates() {
        let universe = StrategyUniverse::new();
        assert!(universe.len() >= 18);
    }

    #[test]
    fn short_premium_income_templates_block_events() {
        let universe = StrategyUniverse::new();
        for name in ["cash_secured_put", "put_credit_spread", "iron_condor"] {
            assert!(universe.get(name).unwrap().event_block, "{name}");
        }
    }
}
