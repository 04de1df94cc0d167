//! Adjustment rules A1-A9.

use super::inputs::MarketInputs;
use super::regime::Regime;
use super::rules::{PositionView, RuleDefinition, RuleEvaluation, RulePriority};

const RULES: &[RuleDefinition] = &[
    RuleDefinition {
        rule_id: "A1",
        name: "Time Roll",
        trigger: "7 < dte <= 21",
        action: "Roll to next month (same delta) or close",
        priority: RulePriority::High,
    },
    RuleDefinition {
        rule_id: "A2",
        name: "Time Close",
        trigger: "dte <= 7 AND not 0DTE",
        action: "Close position regardless of P&L",
        priority: RulePriority::Critical,
    },
    RuleDefinition {
        rule_id: "A3",
        name: "Delta Breach",
        trigger: "short strike delta > 30 (from initial 10-20)",
        action: "Roll strike further OTM and out in time",
        priority: RulePriority::High,
    },
    RuleDefinition {
        rule_id: "A4",
        name: "Strangle Test",
        trigger: "tested side breached by > 1 standard deviation",
        action: "Close tested side; leave untested as standalone if profitable. Do NOT double down.",
        priority: RulePriority::High,
    },
    RuleDefinition {
        rule_id: "A5",
        name: "Delta Hedge",
        trigger: "portfolio delta > +/-15% NAV",
        action: "Add delta hedges via futures or ATM options",
        priority: RulePriority::High,
    },
    RuleDefinition {
        rule_id: "A6",
        name: "Vol Spike",
        trigger: "vix_1d_change > 5 OR vix_5d_change > 30%",
        action: "Reduce all short vega by 50%. If VIX > 35: close ALL naked short vol.",
        priority: RulePriority::Critical,
    },
    RuleDefinition {
        rule_id: "A7",
        name: "Earnings Dodge",
        trigger: "days_to_earnings <= 5 AND position is a covered call",
        action: "Roll or close calls before earnings",
        priority: RulePriority::High,
    },
    RuleDefinition {
        rule_id: "A8",
        name: "Regime Change",
        trigger: "regime classification changed since last run",
        action: "Review ALL positions. Close any not appropriate for new regime.",
        priority: RulePriority::Critical,
    },
    RuleDefinition {
        rule_id: "A9",
        name: "Correlation Spike",
        trigger: "implied correlation above 80th pctile",
        action: "Close all dispersion trades. Review short vol positions for systemic risk.",
        priority: RulePriority::High,
    },
];

pub struct AdjustmentEngine;

impl AdjustmentEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn definitions(&self) -> &'static [RuleDefinition] {
        RULES
    }

    fn rule(&self, id: &str) -> &'static RuleDefinition {
        RULES.iter().find(|r| r.rule_id == id).expect("known rule id")
    }

    /// Evaluate A1-A9 for one position; only triggered rules are returned.
    pub fn evaluate(
        &self,
        position: &PositionView,
        regime: &Regime,
        inputs: &MarketInputs,
        previous_regime: Option<&Regime>,
    ) -> Vec<RuleEvaluation> {
        let mut results = Vec::new();
        let mut fire = |id: &str, action: Option<String>, details: String| {
            let def = self.rule(id);
            results.push(RuleEvaluation::triggered(
                def.rule_id,
                def.name,
                def.priority,
                action.unwrap_or_else(|| def.action.to_string()),
                details,
            ));
        };

        // A1: Time Roll
        let dte = position.dte();
        if dte > 7 && dte <= 21 {
            fire(
                "A1",
                None,
                format!("Position DTE={dte}, below 21-day roll threshold"),
            );
        }

        // A2: Time Close
        if dte <= 7 && !position.is_zero_dte() {
            fire("A2", None, format!("Position DTE={dte}, gamma acceleration zone"));
        }

        // A3: Delta Breach
        let current = position.current_delta();
        let initial = position.initial_delta();
        if current.abs() > 30.0 && initial.abs() <= 20.0 {
            fire("A3", None, format!("Delta moved from {initial} to {current}"));
        }

        // A4: Strangle Test
        if matches!(position.strategy(), "short_strangle" | "iron_condor")
            && position.tested_breach_std() > 1.0
        {
            fire(
                "A4",
                None,
                format!(
                    "Tested side breached by {:.1} std deviations",
                    position.tested_breach_std()
                ),
            );
        }

        // A5: Delta Hedge
        if position.portfolio_delta_pct().abs() > 0.15 {
            fire(
                "A5",
                None,
                format!(
                    "Portfolio delta at {:.1}% of NAV",
                    position.portfolio_delta_pct() * 100.0
                ),
            );
        }

        // A6: Vol Spike
        let vix = inputs.vol.vix;
        let vix_1d = inputs.vol.vix_1d_change;
        let vix_5d_frac = if vix > 0.0 {
            inputs.vol.vix_5d_change / (vix - inputs.vol.vix_5d_change).max(1.0)
        } else {
            0.0
        };
        if vix_1d > 5.0 || vix_5d_frac > 0.30 {
            let action = if vix > 35.0 {
                Some("CRITICAL: VIX > 35 - close ALL naked short vol immediately".to_string())
            } else {
                None
            };
            fire(
                "A6",
                action,
                format!("VIX 1d change: {vix_1d:+.1}, 5d change: {:.1}%", vix_5d_frac * 100.0),
            );
        }

        // A7: Earnings Dodge
        if position.is_covered_call() && inputs.events.days_to_earnings <= 5 {
            fire(
                "A7",
                None,
                format!(
                    "Earnings in {} days for covered call",
                    inputs.events.days_to_earnings
                ),
            );
        }

        // A8: Regime Change
        if let Some(previous) = previous_regime {
            if previous.regime != regime.regime {
                fire(
                    "A8",
                    None,
                    format!(
                        "Regime changed: {} -> {}",
                        previous.regime.as_str(),
                        regime.regime.as_str()
                    ),
                );
            }
        }

        // A9: Correlation Spike
        if inputs.correlation.corr_pctile_1y > 80.0 && position.is_dispersion() {
            fire(
                "A9",
                None,
                format!(
                    "Implied correlation at {:.0}th percentile",
                    inputs.correlation.corr_pctile_1y
                ),
            );
        }

        results
    }
}

impl Default for AdjustmentEngine {
    fn default() -> Self {
        Self::new()
    }
}
