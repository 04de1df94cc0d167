//! Engine API: regime, recommendations, full analysis, rules, playbooks,
//! catalogs.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use super::error::ApiError;
use super::AppState;
use crate::engine::{
    rules::RuleDefinition, ConflictScenario, EventPlaybooks, FullAnalysisResult, Objective,
    PortfolioSnapshot, PositionHealthCheck, PositionSizeResult, PositionView, ReferenceTable,
    ReferenceTables, Regime, StrategyFamily, StrategyRecommendation, StrategyTemplate,
    TailRiskAssessment, ZeroDteDayInfo, ZeroDtePlaybook, DEFAULT_NAV,
};

fn default_nav() -> f64 {
    DEFAULT_NAV
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    #[serde(default = "default_nav")]
    pub nav: f64,
    #[serde(default)]
    pub objective: Objective,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default = "default_nav")]
    pub nav: f64,
    #[serde(default)]
    pub objective: Objective,
    #[serde(default)]
    pub positions: Vec<PositionView>,
}

#[derive(Debug, Deserialize)]
pub struct EvaluatePositionRequest {
    pub position: PositionView,
}

#[derive(Debug, Deserialize)]
pub struct SizeRequest {
    #[serde(default = "default_nav")]
    pub nav: f64,
    #[serde(default = "default_true")]
    pub is_sell_premium: bool,
    #[serde(flatten)]
    pub portfolio: PortfolioSnapshot,
}

fn default_true() -> bool {
    true
}

pub async fn get_regime(State(state): State<AppState>) -> Result<Json<Regime>, ApiError> {
    Ok(Json(state.engine.get_regime().await?))
}

pub async fn recommend(
    State(state): State<AppState>,
    Json(request): Json<RecommendRequest>,
) -> Result<Json<StrategyRecommendation>, ApiError> {
    let recommendation = state
        .engine
        .get_recommendations(request.nav, request.objective)
        .await?;
    Ok(Json(recommendation))
}

pub async fn full_analysis(
    State(state): State<AppState>,
    Json(request): Json<AnalysisRequest>,
) -> Result<Json<FullAnalysisResult>, ApiError> {
    let result = state
        .engine
        .full_analysis(request.nav, request.objective, &request.positions)
        .await?;
    Ok(Json(result))
}

pub async fn list_strategies(State(state): State<AppState>) -> Json<Vec<StrategyTemplate>> {
    Json(state.engine.universe().list_all().to_vec())
}

pub async fn strategies_by_family(
    State(state): State<AppState>,
    Path(family): Path<String>,
) -> Result<Json<Vec<StrategyTemplate>>, ApiError> {
    let parsed = StrategyFamily::ALL
        .iter()
        .find(|f| f.as_str() == family)
        .copied()
        .ok_or_else(|| {
            ApiError::bad_request(
                "unknown_name",
                format!(
                    "unknown strategy family '{family}'. Available: {:?}",
                    StrategyFamily::ALL
                        .iter()
                        .map(|f| f.as_str())
                        .collect::<Vec<_>>()
                ),
            )
        })?;
    Ok(Json(
        state
            .engine
            .universe()
            .by_family(parsed)
            .into_iter()
            .cloned()
            .collect(),
    ))
}

pub async fn tail_risk(
    State(state): State<AppState>,
) -> Result<Json<TailRiskAssessment>, ApiError> {
    Ok(Json(state.engine.get_tail_risk().await?))
}

pub async fn all_conflicts(
    State(state): State<AppState>,
) -> Result<Json<Vec<ConflictScenario>>, ApiError> {
    Ok(Json(state.engine.get_all_conflicts().await?))
}

pub async fn active_conflicts(
    State(state): State<AppState>,
) -> Result<Json<Vec<ConflictScenario>>, ApiError> {
    Ok(Json(state.engine.get_conflicts().await?))
}

pub async fn evaluate_position(
    State(state): State<AppState>,
    Json(request): Json<EvaluatePositionRequest>,
) -> Result<Json<PositionHealthCheck>, ApiError> {
    Ok(Json(state.engine.evaluate_position(&request.position).await?))
}

pub async fn position_size(
    State(state): State<AppState>,
    Json(request): Json<SizeRequest>,
) -> Result<Json<PositionSizeResult>, ApiError> {
    let result = state
        .engine
        .position_size(request.nav, request.is_sell_premium, request.portfolio)
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
pub struct RulesResponse {
    pub adjustments: &'static [RuleDefinition],
    pub exits: &'static [RuleDefinition],
}

pub async fn list_rules(State(state): State<AppState>) -> Json<RulesResponse> {
    Json(RulesResponse {
        adjustments: state.engine.adjustment_rule_definitions(),
        exits: state.engine.exit_rule_definitions(),
    })
}

pub async fn playbook(
    Path(event_type): Path<String>,
) -> Result<Json<crate::engine::EventPlaybook>, ApiError> {
    let parsed = EventPlaybooks::parse_event_type(&event_type)?;
    Ok(Json(EventPlaybooks::get(parsed)?))
}

pub async fn zero_dte_playbook() -> Json<ZeroDtePlaybook> {
    Json(EventPlaybooks::zero_dte())
}

pub async fn zero_dte_day(Path(day): Path<String>) -> Result<Json<ZeroDteDayInfo>, ApiError> {
    Ok(Json(EventPlaybooks::zero_dte_day(&day)?))
}

#[derive(Debug, Serialize)]
pub struct ReferenceListResponse {
    pub tables: Vec<String>,
}

pub async fn list_reference_tables() -> Json<ReferenceListResponse> {
    Json(ReferenceListResponse {
        tables: ReferenceTables::list_tables(),
    })
}

pub async fn reference_table(Path(name): Path<String>) -> Result<Json<ReferenceTable>, ApiError> {
    Ok(Json(ReferenceTables::get_table(&name)?))
}
