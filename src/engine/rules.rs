//! Shared types for the adjustment and exit rule engines.
//!
//! Positions arrive as partial data from callers; `PositionView` keeps every
//! field optional and exposes accessors with the documented defaults.
//! A missing field means the corresponding rule simply does not trigger;
//! partial position data degrades rule coverage, never the evaluation.

use serde::{Deserialize, Serialize};

use super::strategies::StrategyFamily;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RulePriority {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleEvaluation {
    pub rule_id: &'static str,
    pub rule_name: &'static str,
    pub triggered: bool,
    pub priority: RulePriority,
    pub action: String,
    pub details: String,
}

impl RuleEvaluation {
    pub fn triggered(
        rule_id: &'static str,
        rule_name: &'static str,
        priority: RulePriority,
        action: impl Into<String>,
        details: String,
    ) -> Self {
        Self {
            rule_id,
            rule_name,
            triggered: true,
            priority,
            action: action.into(),
            details,
        }
    }
}

/// Static rule catalog record (exposed over the API for reference).
#[derive(Debug, Clone, Serialize)]
pub struct RuleDefinition {
    pub rule_id: &'static str,
    pub name: &'static str,
    pub trigger: &'static str,
    pub action: &'static str,
    pub priority: RulePriority,
}

/// Caller-supplied position fields, all optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionView {
    pub id: Option<String>,
    pub dte: Option<i64>,
    pub strategy: Option<String>,
    pub family: Option<StrategyFamily>,
    pub current_delta: Option<f64>,
    pub initial_delta: Option<f64>,
    pub unrealized_pnl: Option<f64>,
    pub max_profit: Option<f64>,
    pub premium_received: Option<f64>,
    pub premium_paid: Option<f64>,
    pub portfolio_delta_pct: Option<f64>,
    #[serde(rename = "is_0dte")]
    pub is_zero_dte: Option<bool>,
    pub is_covered_call: Option<bool>,
    pub is_dispersion: Option<bool>,
    pub tested_breach_std: Option<f64>,
    pub daily_pnl: Option<f64>,
    pub regime_allowed: Option<Vec<String>>,
}

impl PositionView {
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or("unknown")
    }

    /// Far-dated sentinel keeps time rules quiet when DTE is unknown.
    pub fn dte(&self) -> i64 {
        self.dte.unwrap_or(999)
    }

    pub fn strategy(&self) -> &str {
        self.strategy.as_deref().unwrap_or("")
    }

    pub fn current_delta(&self) -> f64 {
        self.current_delta.unwrap_or(0.0)
    }

    /// Short-premium entries default to ~15 delta.
    pub fn initial_delta(&self) -> f64 {
        self.initial_delta.unwrap_or(15.0)
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.unrealized_pnl.unwrap_or(0.0)
    }

    pub fn max_profit(&self) -> f64 {
        self.max_profit.unwrap_or(0.0)
    }

    pub fn premium_received(&self) -> f64 {
        self.premium_received.unwrap_or(0.0)
    }

    pub fn premium_paid(&self) -> f64 {
        self.premium_paid.unwrap_or(0.0)
    }

    pub fn portfolio_delta_pct(&self) -> f64 {
        self.portfolio_delta_pct.unwrap_or(0.0)
    }

    pub fn is_zero_dte(&self) -> bool {
        self.is_zero_dte.unwrap_or(false)
    }

    pub fn is_covered_call(&self) -> bool {
        self.is_covered_call.unwrap_or(false)
    }

    pub fn is_dispersion(&self) -> bool {
        self.is_dispersion.unwrap_or(false)
    }

    pub fn tested_breach_std(&self) -> f64 {
        self.tested_breach_std.unwrap_or(0.0)
    }

    pub fn daily_pnl(&self) -> f64 {
        self.daily_pnl.unwrap_or(0.0)
    }
}
