//! Exit rules X1-X7.

use super::inputs::MarketInputs;
use super::regime::Regime;
use super::rules::{PositionView, RuleDefinition, RuleEvaluation, RulePriority};
use super::strategies::StrategyFamily;

const RULES: &[RuleDefinition] = &[
    RuleDefinition {
        rule_id: "X1",
        name: "Credit Profit Target",
        trigger: "unrealized profit >= 50% of max profit",
        action: "Close. Set limit order at entry.",
        priority: RulePriority::High,
    },
    RuleDefinition {
        rule_id: "X2",
        name: "Debit Profit Target",
        trigger: "unrealized profit >= 100% of debit paid",
        action: "Close (2:1 R/R achieved). For event trades: close within 24hrs post-event.",
        priority: RulePriority::High,
    },
    RuleDefinition {
        rule_id: "X3",
        name: "Credit Stop Loss",
        trigger: "unrealized loss >= 2x premium received",
        action: "Close. Expected recovery is negative beyond this point.",
        priority: RulePriority::Critical,
    },
    RuleDefinition {
        rule_id: "X4",
        name: "Debit Stop Loss",
        trigger: "unrealized loss >= 50% of premium paid",
        action: "Close. Re-evaluate thesis before re-entering.",
        priority: RulePriority::High,
    },
    RuleDefinition {
        rule_id: "X5",
        name: "Time Stop",
        trigger: "dte <= 7 AND not 0DTE",
        action: "Close. Gamma acceleration makes position fundamentally different.",
        priority: RulePriority::Critical,
    },
    RuleDefinition {
        rule_id: "X6",
        name: "Regime Exit",
        trigger: "regime changed to one the position does not allow",
        action: "Close ALL positions not appropriate for new regime immediately.",
        priority: RulePriority::Critical,
    },
    RuleDefinition {
        rule_id: "X7",
        name: "Daily P&L Stop",
        trigger: "daily loss > 1.5% of NAV",
        action: "Reduce exposure by 50%. No new trades today.",
        priority: RulePriority::Critical,
    },
];

pub struct ExitEngine;

impl ExitEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn definitions(&self) -> &'static [RuleDefinition] {
        RULES
    }

    fn rule(&self, id: &str) -> &'static RuleDefinition {
        RULES.iter().find(|r| r.rule_id == id).expect("known rule id")
    }

    /// Evaluate X1-X7 for one position; only triggered rules are returned.
    pub fn evaluate(
        &self,
        position: &PositionView,
        regime: &Regime,
        _inputs: &MarketInputs,
        previous_regime: Option<&Regime>,
        nav: f64,
    ) -> Vec<RuleEvaluation> {
        let mut results = Vec::new();
        let mut fire = |id: &str, details: String| {
            let def = self.rule(id);
            results.push(RuleEvaluation::triggered(
                def.rule_id,
                def.name,
                def.priority,
                def.action,
                details,
            ));
        };

        let pnl = position.unrealized_pnl();

        // X1: Credit Profit Target
        if position.family == Some(StrategyFamily::ShortPremium) {
            let max_profit = position.max_profit();
            if max_profit > 0.0 && pnl >= max_profit * 0.50 {
                fire("X1", format!("Profit {pnl:.2} >= 50% of max {max_profit:.2}"));
            }
        }

        // X2: Debit Profit Target
        if position.family == Some(StrategyFamily::LongPremium) {
            let premium_paid = position.premium_paid();
            if premium_paid > 0.0 && pnl >= premium_paid {
                fire("X2", format!("Profit {pnl:.2} >= 100% of debit {premium_paid:.2}"));
            }
        }

        // X3: Credit Stop Loss
        if position.family == Some(StrategyFamily::ShortPremium) {
            let premium_received = position.premium_received();
            if premium_received > 0.0 && pnl < 0.0 && pnl.abs() >= premium_received * 2.0 {
                fire(
                    "X3",
                    format!("Loss {pnl:.2} >= 2x premium {premium_received:.2}"),
                );
            }
        }

        // X4: Debit Stop Loss
        if position.family == Some(StrategyFamily::LongPremium) {
            let premium_paid = position.premium_paid();
            if premium_paid > 0.0 && pnl < 0.0 && pnl.abs() >= premium_paid * 0.50 {
                fire("X4", format!("Loss {pnl:.2} >= 50% of debit {premium_paid:.2}"));
            }
        }

        // X5: Time Stop
        let dte = position.dte();
        if dte <= 7 && !position.is_zero_dte() {
            fire("X5", format!("DTE={dte}, gamma acceleration zone"));
        }

        // X6: Regime Exit
        if let Some(previous) = previous_regime {
            if previous.regime != regime.regime {
                if let Some(allowed) = &position.regime_allowed {
                    let regime_name = regime.regime.as_str();
                    if !allowed.is_empty()
                        && !allowed.iter().any(|r| r == regime_name)
                        && !allowed.iter().any(|r| r == "ALL")
                    {
                        fire(
                            "X6",
                            format!("New regime {regime_name} not in allowed {allowed:?}"),
                        );
                    }
                }
            }
        }

        // X7: Daily P&L Stop
        let daily_pnl = position.daily_pnl();
        if nav > 0.0 && daily_pnl < 0.0 && (daily_pnl / nav).abs() > 0.015 {
            fire(
                "X7",
                format!("Daily loss {:.2}% exceeds 1.5% limit", daily_pnl / nav * 100.0),
            );
        }

        results
    }
}

impl Default for ExitEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::inputs::fixture_inputs;
    use crate::engine::regime::RegimeClassifier;

    const NAV: f64 = 100_000.0;

    fn regime() -> Regime {
        RegimeClassifier::new().classify(&fixture_inputs())
    }

    fn ids(results: &[RuleEvaluation]) -> Vec<&'static str> {
        results.iter().map(|r| r.rule_id).collect()
    }

    fn evaluate(position: &PositionView, previous: Option<&Regime>) -> Vec<RuleEvaluation> {
        ExitEngine::new().evaluate(position, &regime(), &fixture_inputs(), previous, NAV)
    }

    #[test]
    fn x1_credit_profit_target() {
        let position = PositionView {
            family: Some(StrategyFamily::ShortPremium),
            unrealized_pnl: Some(260.0),
            max_profit: Some(500.0),
            ..Default::default()
        };
        assert_eq!(ids(&evaluate(&position, None)), ["X1"]);
    }

    #[test]
    fn x2_debit_profit_target() {
        let position = PositionView {
            family: Some(StrategyFamily::LongPremium),
            unrealized_pnl: Some(850.0),
            premium_paid: Some(800.0),
            ..Default::default()
        };
        assert_eq!(ids(&evaluate(&position, None)), ["X2"]);
    }

    #[test]
    fn x3_credit_stop_is_critical() {
        let position = PositionView {
            family: Some(StrategyFamily::ShortPremium),
            unrealized_pnl: Some(-900.0),
            premium_received: Some(400.0),
            ..Default::default()
        };
        let results = evaluate(&position, None);
        assert_eq!(ids(&results), ["X3"]);
        assert_eq!(results[0].priority, RulePriority::Critical);
    }

    #[test]
    fn x4_debit_stop() {
        let position = PositionView {
            family: Some(StrategyFamily::LongPremium),
            unrealized_pnl: Some(-450.0),
            premium_paid: Some(800.0),
            ..Default::default()
        };
        assert_eq!(ids(&evaluate(&position, None)), ["X4"]);
    }

    #[test]
    fn x5_time_stop_respects_zero_dte() {
        let position = PositionView {
            dte: Some(5),
            ..Default::default()
        };
        assert_eq!(ids(&evaluate(&position, None)), ["X5"]);

        let zero_dte = PositionView {
            dte: Some(0),
            is_zero_dte: Some(true),
            ..Default::default()
        };
        assert!(evaluate(&zero_dte, None).is_empty());
    }

    #[test]
    fn x6_fires_only_when_new_regime_disallowed() {
        let mut elevated_inputs = fixture_inputs();
        elevated_inputs.vol.vix = 23.0;
        let previous = RegimeClassifier::new().classify(&elevated_inputs);

        let incompatible = PositionView {
            regime_allowed: Some(vec!["ELEVATED".into(), "HIGH".into()]),
            ..Default::default()
        };
        let results = evaluate(&incompatible, Some(&previous));
        assert_eq!(ids(&results), ["X6"]);

        let wildcard = PositionView {
            regime_allowed: Some(vec!["ALL".into()]),
            ..Default::default()
        };
        assert!(evaluate(&wildcard, Some(&previous)).is_empty());

        let compatible = PositionView {
            regime_allowed: Some(vec!["NORMAL".into()]),
            ..Default::default()
        };
        assert!(evaluate(&compatible, Some(&previous)).is_empty());
    }

    #[test]
    fn x7_daily_stop_ignores_gains() {
        let losing = PositionView {
            daily_pnl: Some(-2_000.0),
            ..Default::default()
        };
        let results = evaluate(&losing, None);
        assert_eq!(ids(&results), ["X7"]);
        assert_eq!(results[0].priority, RulePriority::Critical);

        let winning = PositionView {
            daily_pnl: Some(2_000.0),
            ..Default::default()
        };
        assert!(evaluate(&winning, None).is_empty());
    }

    #[test]
    fn missing_family_skips_pnl_rules() {
        let position = PositionView {
            unrealized_pnl: Some(-10_000.0),
            premium_received: Some(100.0),
            premium_paid: Some(100.0),
            ..Default::default()
        };
        assert!(evaluate(&position, None).is_empty());
    }
}
