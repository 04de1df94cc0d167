//! The decision engine: a staged pipeline over a `MarketInputs` snapshot.
//!
//! One facade owns every stage plus the single piece of engine state, the
//! previous regime slot used by the regime-change rules (A8/X6). The slot is
//! written by full analysis, regime, and recommendation runs;
//! last-writer-wins under concurrency (advisory state only). Note this means
//! interleaving regime queries with analysis calls from different callers can
//! mask a transition for one of them.

pub mod adjustments;
pub mod conflicts;
pub mod error;
pub mod exits;
pub mod inputs;
pub mod playbooks;
pub mod reference;
pub mod regime;
pub mod rules;
pub mod selector;
pub mod sizing;
pub mod strategies;
pub mod tail_risk;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

use crate::data::MarketDataService;
pub use adjustments::AdjustmentEngine;
pub use conflicts::{ConflictResolver, ConflictScenario};
pub use error::EngineError;
pub use exits::ExitEngine;
pub use inputs::{InputsCollector, MarketInputs};
pub use playbooks::{EventPlaybook, EventPlaybooks, ZeroDteDayInfo, ZeroDtePlaybook};
pub use reference::{ReferenceTable, ReferenceTables};
pub use regime::{Confidence, EventType, Regime, RegimeClassifier, Trend, VolRegime};
pub use rules::{PositionView, RuleEvaluation, RulePriority};
pub use selector::{Objective, RecommendationType, StrategyRecommendation, StrategySelector};
pub use sizing::{PortfolioSnapshot, PositionSizeResult, PositionSizer, RiskLimits};
pub use strategies::{StrategyFamily, StrategyTemplate, StrategyUniverse};
pub use tail_risk::{TailRiskAssessment, TailRiskManager};

pub const DEFAULT_NAV: f64 = 100_000.0;

#[derive(Debug, Clone, Serialize)]
pub struct PositionHealthCheck {
    pub position_id: String,
    pub adjustment_rules: Vec<RuleEvaluation>,
    pub exit_rules: Vec<RuleEvaluation>,
    pub triggered_count: usize,
    pub critical_count: usize,
    pub recommended_action: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FullAnalysisResult {
    pub regime: Regime,
    pub recommendation: StrategyRecommendation,
    pub tail_risk: TailRiskAssessment,
    pub conflicts: Vec<ConflictScenario>,
    pub active_playbook: Option<EventPlaybook>,
    pub position_health: Vec<PositionHealthCheck>,
    pub market_inputs: MarketInputs,
    pub timestamp: DateTime<Utc>,
}

/// Unified facade over the engine stages.
pub struct DecisionEngine {
    collector: InputsCollector,
    classifier: RegimeClassifier,
    selector: StrategySelector,
    sizer: PositionSizer,
    adjustments: AdjustmentEngine,
    exits: ExitEngine,
    tail_risk: TailRiskManager,
    conflicts: ConflictResolver,
    universe: Arc<StrategyUniverse>,
    previous_regime: RwLock<Option<Regime>>,
}

impl DecisionEngine {
    pub fn new(data: Arc<MarketDataService>) -> Self {
        let universe = Arc::new(StrategyUniverse::new());
        Self {
            collector: InputsCollector::new(data),
            classifier: RegimeClassifier::new(),
            selector: StrategySelector::new(universe.clone()),
            sizer: PositionSizer::default(),
            adjustments: AdjustmentEngine::new(),
            exits: ExitEngine::new(),
            tail_risk: TailRiskManager::new(),
            conflicts: ConflictResolver::new(),
            universe,
            previous_regime: RwLock::new(None),
        }
    }

    fn remember_regime(&self, regime: &Regime) -> Option<Regime> {
        self.previous_regime.write().replace(regime.clone())
    }

    /// Run the complete pipeline: inputs -> regime -> selection -> tail risk
    /// -> conflicts -> playbook -> per-position health.
    pub async fn full_analysis(
        &self,
        nav: f64,
        objective: Objective,
        positions: &[PositionView],
    ) -> Result<FullAnalysisResult, EngineError> {
        let inputs = self.collector.collect().await?;
        let regime = self.classifier.classify(&inputs);
        let previous = self.remember_regime(&regime);

        let recommendation = self.selector.select(&regime, &inputs, objective, nav);
        let tail_risk = self.tail_risk.assess(&inputs);
        let conflicts = self.conflicts.check_conflicts(&regime, &inputs);

        let active_playbook = if regime.event_active {
            EventPlaybooks::get(regime.event_type).ok()
        } else {
            None
        };

        let position_health = positions
            .iter()
            .map(|p| self.evaluate_against(p, &regime, &inputs, previous.as_ref(), nav))
            .collect();

        Ok(FullAnalysisResult {
            regime,
            recommendation,
            tail_risk,
            conflicts,
            active_playbook,
            position_health,
            market_inputs: inputs,
            timestamp: Utc::now(),
        })
    }

    pub async fn get_regime(&self) -> Result<Regime, EngineError> {
        let inputs = self.collector.collect().await?;
        let regime = self.classifier.classify(&inputs);
        self.remember_regime(&regime);
        Ok(regime)
    }

    pub async fn get_recommendations(
        &self,
        nav: f64,
        objective: Objective,
    ) -> Result<StrategyRecommendation, EngineError> {
        let inputs = self.collector.collect().await?;
        let regime = self.classifier.classify(&inputs);
        self.remember_regime(&regime);
        Ok(self.selector.select(&regime, &inputs, objective, nav))
    }

    pub async fn evaluate_position(
        &self,
        position: &PositionView,
    ) -> Result<PositionHealthCheck, EngineError> {
        let inputs = self.collector.collect().await?;
        let regime = self.classifier.classify(&inputs);
        let previous = self.previous_regime.read().clone();
        Ok(self.evaluate_against(position, &regime, &inputs, previous.as_ref(), DEFAULT_NAV))
    }

    pub async fn get_tail_risk(&self) -> Result<TailRiskAssessment, EngineError> {
        let inputs = self.collector.collect().await?;
        Ok(self.tail_risk.assess(&inputs))
    }

    pub async fn get_conflicts(&self) -> Result<Vec<ConflictScenario>, EngineError> {
        let inputs = self.collector.collect().await?;
        let regime = self.classifier.classify(&inputs);
        Ok(self.conflicts.check_conflicts(&regime, &inputs))
    }

    pub async fn get_all_conflicts(&self) -> Result<Vec<ConflictScenario>, EngineError> {
        let inputs = self.collector.collect().await?;
        let regime = self.classifier.classify(&inputs);
        Ok(self.conflicts.check_all(&regime, &inputs))
    }

    pub async fn position_size(
        &self,
        nav: f64,
        is_sell_premium: bool,
        portfolio: PortfolioSnapshot,
    ) -> Result<PositionSizeResult, EngineError> {
        let inputs = self.collector.collect().await?;
        let regime = self.classifier.classify(&inputs);
        Ok(self.sizer.calculate(
            nav,
            &regime,
            &inputs,
            is_sell_premium,
            sizing::DEFAULT_PREMIUM_BUDGET_PCT,
            portfolio,
        ))
    }

    pub fn universe(&self) -> &StrategyUniverse {
        &self.universe
    }

    pub fn adjustment_rule_definitions(&self) -> &'static [rules::RuleDefinition] {
        self.adjustments.definitions()
    }

    pub fn exit_rule_definitions(&self) -> &'static [rules::RuleDefinition] {
        self.exits.definitions()
    }

    fn evaluate_against(
        &self,
        position: &PositionView,
        regime: &Regime,
        inputs: &MarketInputs,
        previous_regime: Option<&Regime>,
        nav: f64,
    ) -> PositionHealthCheck {
        let adjustment_rules = self
            .adjustments
            .evaluate(position, regime, inputs, previous_regime);
        let exit_rules = self
            .exits
            .evaluate(position, regime, inputs, previous_regime, nav);

        let mut triggered: Vec<&RuleEvaluation> =
            adjustment_rules.iter().chain(exit_rules.iter()).collect();
        triggered.sort_by_key(|r| r.priority);

        let triggered_count = triggered.len();
        let critical_count = triggered
            .iter()
            .filter(|r| r.priority == RulePriority::Critical)
            .count();

        let recommended_action = if critical_count > 0 {
            let actions: Vec<&str> = triggered
                .iter()
                .filter(|r| r.priority == RulePriority::Critical)
                .map(|r| r.action.as_str())
                .collect();
            format!("IMMEDIATE ACTION REQUIRED: {}", actions.join("; "))
        } else if !triggered.is_empty() {
            let actions: Vec<&str> = triggered.iter().take(3).map(|r| r.action.as_str()).collect();
            format!("Review: {}", actions.join("; "))
        } else {
            "No action needed - position healthy".to_string()
        };
        drop(triggered);

        PositionHealthCheck {
            position_id: position.id().to_string(),
            triggered_count,
            critical_count,
            recommended_action,
            adjustment_rules,
            exit_rules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MockProvider, TtlCache};

    fn engine() -> DecisionEngine {
        let data = Arc::new(MarketDataService::new(
            Arc::new(MockProvider::new()),
            Arc::new(TtlCache::new()),
        ));
        DecisionEngine::new(data)
    }

    #[tokio::test]
    async fn full_analysis_runs_every_stage() {
        let engine = engine();
        let positions = vec![PositionView {
            id: Some("p1".into()),
            dte: Some(14),
            ..Default::default()
        }];

        let result = engine
            .full_analysis(DEFAULT_NAV, Objective::Income, &positions)
            .await
            .unwrap();

        assert_eq!(result.regime.regime, VolRegime::Normal);
        assert!(result.recommendation.strategies.len() <= 3);
        assert_eq!(result.tail_risk.early_warnings.len(), 4);
        assert!(result.active_playbook.is_none());
        assert_eq!(result.position_health.len(), 1);
        assert_eq!(result.position_health[0].position_id, "p1");
        assert!(result.position_health[0].triggered_count >= 1); // A1 at 14 DTE
    }

    #[tokio::test]
    async fn repeated_analysis_is_idempotent_except_timestamps() {
        let engine = engine();
        let first = engine
            .full_analysis(DEFAULT_NAV, Objective::Income, &[])
            .await
            .unwrap();
        let second = engine
            .full_analysis(DEFAULT_NAV, Objective::Income, &[])
            .await
            .unwrap();

        assert_eq!(first.regime.regime, second.regime.regime);
        assert_eq!(first.regime.confidence, second.regime.confidence);
        assert_eq!(
            first.recommendation.recommendation,
            second.recommendation.recommendation
        );
        let names =
            |r: &StrategyRecommendation| r.strategies.iter().map(|c| c.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&first.recommendation), names(&second.recommendation));
    }

    #[tokio::test]
    async fn regime_slot_updates_on_each_run() {
        let engine = engine();
        assert!(engine.previous_regime.read().is_none());

        engine.get_regime().await.unwrap();
        assert!(engine.previous_regime.read().is_some());
    }

    #[tokio::test]
    async fn critical_rules_lead_the_recommended_action() {
        let engine = engine();
        let position = PositionView {
            id: Some("p2".into()),
            dte: Some(5), // A2 + X5, both CRITICAL
            ..Default::default()
        };

        let health = engine.evaluate_position(&position).await.unwrap();
        assert!(health.critical_count >= 2);
        assert!(health.recommended_action.starts_with("IMMEDIATE ACTION REQUIRED"));
    }

    #[tokio::test]
    async fn healthy_position_reports_no_action() {
        let engine = engine();
        let health = engine
            .evaluate_position(&PositionView::default())
            .await
            .unwrap();
        assert_eq!(health.triggered_count, 0);
        assert_eq!(health.recommended_action, "No action needed - position healthy");
    }

    #[tokio::test]
    async fn sizing_endpoint_reports_multiplier_chain() {
        let engine = engine();
        let result = engine
            .position_size(DEFAULT_NAV, true, PortfolioSnapshot::default())
            .await
            .unwrap();
        let b = &result.multiplier_breakdown;
        let product = b.sell_premium * b.vvix_adjustment * b.confidence_adjustment;
        assert!((b.final_sell - (product * 10_000.0).round() / 10_000.0).abs() < 1e-12);
    }
}
