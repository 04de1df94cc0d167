//! Position sizing: regime multipliers, VVIX adjustment, fixed-premium
//! budget, portfolio risk-limit checks.
//!
//! Fixed dollar premium per trade, not fixed notional, so sizing shrinks
//! automatically when vol is high.

use serde::{Deserialize, Serialize};

use super::inputs::MarketInputs;
use super::regime::{Confidence, Regime, VolRegime};

/// Regime -> (sell_premium_mult, buy_premium_mult)
pub fn regime_size_multipliers(regime: VolRegime) -> (f64, f64) {
    match regime {
        VolRegime::VeryLow => (1.00, 0.50),
        VolRegime::Low => (1.00, 0.75),
        VolRegime::Normal => (0.75, 1.00),
        VolRegime::Elevated => (0.50, 1.00),
        VolRegime::High => (0.25, 1.00),
        VolRegime::Extreme | VolRegime::Crisis => (0.00, 1.00),
        VolRegime::LiquidityStress => (0.25, 0.75),
    }
}

/// VVIX-based size adjustment (VVIX > 22 means the vol surface is unstable).
pub fn vvix_adjustment(vvix: f64) -> f64 {
    if vvix <= 18.0 {
        1.00
    } else if vvix <= 22.0 {
        0.85
    } else if vvix <= 28.0 {
        0.65
    } else {
        0.50
    }
}

pub fn confidence_adjustment(confidence: Confidence) -> f64 {
    if confidence == Confidence::Low {
        0.50
    } else {
        1.0
    }
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Fixed premium sizing: allocate `budget_pct` of NAV per trade in premium.
pub fn fixed_premium_size(nav: f64, budget_pct: f64) -> f64 {
    nav * budget_pct
}

pub const DEFAULT_PREMIUM_BUDGET_PCT: f64 = 0.005;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Max portfolio vega as a fraction of NAV.
    pub max_portfolio_vega: f64,
    /// Max absolute portfolio delta as a fraction of NAV.
    pub max_portfolio_delta: f64,
    pub daily_pnl_stop: f64,
    pub weekly_pnl_stop: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_portfolio_vega: 0.005,
            max_portfolio_delta: 0.20,
            daily_pnl_stop: 0.015,
            weekly_pnl_stop: 0.030,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SizeMultipliers {
    pub sell_premium: f64,
    pub buy_premium: f64,
    pub vvix_adjustment: f64,
    pub confidence_adjustment: f64,
    pub final_sell: f64,
    pub final_buy: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionSizeResult {
    /// Dollar premium budget for this trade.
    pub premium_budget: f64,
    pub size_multiplier: f64,
    pub multiplier_breakdown: SizeMultipliers,
    pub risk_limit_breaches: Vec<String>,
    pub within_limits: bool,
}

/// Current portfolio snapshot for limit checks.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct PortfolioSnapshot {
    pub portfolio_vega: f64,
    pub portfolio_delta: f64,
    pub daily_pnl: f64,
    pub weekly_pnl: f64,
}

pub struct PositionSizer {
    limits: RiskLimits,
}

impl PositionSizer {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    pub fn calculate(
        &self,
        nav: f64,
        regime: &Regime,
        inputs: &MarketInputs,
        is_sell_premium: bool,
        budget_pct: f64,
        portfolio: PortfolioSnapshot,
    ) -> PositionSizeResult {
        let (sell_mult, buy_mult) = regime_size_multipliers(regime.regime);
        let vvix_adj = vvix_adjustment(inputs.vol.vvix);
        let conf_adj = confidence_adjustment(regime.confidence);

        let final_sell = round4(sell_mult * vvix_adj * conf_adj);
        let final_buy = round4(buy_mult * vvix_adj * conf_adj);

        let multiplier = if is_sell_premium { final_sell } else { final_buy };
        let premium_budget = fixed_premium_size(nav, budget_pct) * multiplier;

        let breaches = self.check_limits(nav, portfolio);

        PositionSizeResult {
            premium_budget: (premium_budget * 100.0).round() / 100.0,
            size_multiplier: multiplier,
            multiplier_breakdown: SizeMultipliers {
                sell_premium: sell_mult,
                buy_premium: buy_mult,
                vvix_adjustment: vvix_adj,
                confidence_adjustment: conf_adj,
                final_sell,
                final_buy,
            },
            within_limits: breaches.is_empty(),
            risk_limit_breaches: breaches,
        }
    }

    fn check_limits(&self, nav: f64, p: PortfolioSnapshot) -> Vec<String> {
        let mut breaches = Vec::new();
        if nav <= 0.0 {
            return breaches;
        }
        if (p.portfolio_vega / nav).abs() > self.limits.max_portfolio_vega {
            breaches.push(format!(
                "Portfolio vega {:.4} exceeds limit {}",
                p.portfolio_vega / nav,
                self.limits.max_portfolio_vega
            ));
        }
        if (p.portfolio_delta / nav).abs() > self.limits.max_portfolio_delta {
            breaches.push(format!(
                "Portfolio delta {:.2}% exceeds limit {:.0}%",
                p.portfolio_delta / nav * 100.0,
                self.limits.max_portfolio_delta * 100.0
            ));
        }
        if p.daily_pnl < 0.0 && (p.daily_pnl / nav).abs() > self.limits.daily_pnl_stop {
            breaches.push(format!(
                "Daily P&L loss {:.2}% exceeds limit {:.1}%",
                p.daily_pnl / nav * 100.0,
                self.limits.daily_pnl_stop * 100.0
            ));
        }
        if p.weekly_pnl < 0.0 && (p.weekly_pnl / nav).abs() > self.limits.weekly_pnl_stop {
            breaches.push(format!(
                "Weekly P&L loss {:.2}% exceeds limit {:.1}%",
                p.weekly_pnl / nav * 100.0,
                self.limits.weekly_pnl_stop * 100.0
            ));
        }
        breaches
    }
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self::new(RiskLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::inputs::fixture_inputs;
    use crate::engine::regime::RegimeClassifier;

    fn normal_regime() -> Regime {
        RegimeClassifier::new().classify(&fixture_inputs())
    }

    #[test]
    fn multiplier_product_identity_holds() {
        let sizer = PositionSizer::default();
        let inputs = fixture_inputs();
        let regime = normal_regime();

        let result = sizer.calculate(
            100_000.0,
            &regime,
            &inputs,
            true,
            DEFAULT_PREMIUM_BUDGET_PCT,
            PortfolioSnapshot::default(),
        );

        let b = &result.multiplier_breakdown;
        let expected =
            (b.sell_premium * b.vvix_adjustment * b.confidence_adjustment * 10_000.0).round()
                / 10_000.0;
        assert_eq!(b.final_sell, expected);
        let expected_buy =
            (b.buy_premium * b.vvix_adjustment * b.confidence_adjustment * 10_000.0).round()
                / 10_000.0;
        assert_eq!(b.final_buy, expected_buy);
    }

    #[test]
    fn normal_regime_sell_budget_is_half_percent_scaled() {
        let sizer = PositionSizer::default();
        let inputs = fixture_inputs(); // vvix 19.5 -> 0.85
        let regime = normal_regime();

        let result = sizer.calculate(
            100_000.0,
            &regime,
            &inputs,
            true,
            DEFAULT_PREMIUM_BUDGET_PCT,
            PortfolioSnapshot::default(),
        );
        // 0.75 * 0.85 * 1.0 = 0.6375; budget = 500 * 0.6375
        assert_eq!(result.size_multiplier, 0.6375);
        assert_eq!(result.premium_budget, 318.75);
        assert!(result.within_limits);
    }

    #[test]
    fn vvix_bands() {
        assert_eq!(vvix_adjustment(17.0), 1.00);
        assert_eq!(vvix_adjustment(20.0), 0.85);
        assert_eq!(vvix_adjustment(25.0), 0.65);
        assert_eq!(vvix_adjustment(30.0), 0.50);
    }

    #[test]
    fn crisis_zeroes_sell_side() {
        assert_eq!(regime_size_multipliers(VolRegime::Crisis).0, 0.0);
        assert_eq!(regime_size_multipliers(VolRegime::Extreme).0, 0.0);
    }

    #[test]
    fn limit_breaches_are_reported() {
        let sizer = PositionSizer::default();
        let inputs = fixture_inputs();
        let regime = normal_regime();

        let result = sizer.calculate(
            100_000.0,
            &regime,
            &inputs,
            true,
            DEFAULT_PREMIUM_BUDGET_PCT,
            PortfolioSnapshot {
                portfolio_vega: 600.0,  // 0.6% of NAV > 0.5% limit
                portfolio_delta: 25_000.0, // 25% > 20% limit
                daily_pnl: -2_000.0,    // -2% > 1.5% stop
                weekly_pnl: 1_000.0,    // profit never breaches
            },
        );

        assert!(!result.within_limits);
        assert_eq!(result.risk_limit_breaches.len(), 3);
        assert!(result.risk_limit_breaches[0].contains("vega"));
    }
}
