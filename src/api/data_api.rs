//! Data API: quotes, option chains, volatility, history, batch endpoints,
//! health and provider status.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::ApiError;
use super::AppState;
use crate::data::{
    BatchEntry, CacheStats, Capability, IVAnalysis, Market, OptionChain, PriceHistory, Quote,
    SymbolRequest,
};
use crate::data::tool_servers::ToolServerStatus;

#[derive(Debug, Deserialize)]
pub struct MarketQuery {
    #[serde(default)]
    pub market: Market,
}

#[derive(Debug, Deserialize)]
pub struct OptionsQuery {
    #[serde(default)]
    pub market: Market,
    pub expiration: Option<NaiveDate>,
}

fn default_interval() -> String {
    "1d".to_string()
}

fn default_limit() -> usize {
    30
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub market: Market,
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub symbols: Vec<SymbolRequest>,
}

pub async fn get_quote(
    Path(symbol): Path<String>,
    Query(params): Query<MarketQuery>,
    State(state): State<AppState>,
) -> Result<Json<Quote>, ApiError> {
    Ok(Json(state.data.quote(&symbol, params.market).await?))
}

pub async fn get_options(
    Path(symbol): Path<String>,
    Query(params): Query<OptionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<OptionChain>, ApiError> {
    let chain = state
        .data
        .option_chain(&symbol, params.market, params.expiration)
        .await?;
    Ok(Json(chain))
}

pub async fn get_volatility(
    Path(symbol): Path<String>,
    Query(params): Query<MarketQuery>,
    State(state): State<AppState>,
) -> Result<Json<IVAnalysis>, ApiError> {
    Ok(Json(state.data.iv_analysis(&symbol, params.market).await?))
}

pub async fn get_history(
    Path(symbol): Path<String>,
    Query(params): Query<HistoryQuery>,
    State(state): State<AppState>,
) -> Result<Json<PriceHistory>, ApiError> {
    let history = state
        .data
        .price_history(&symbol, params.market, &params.interval, params.limit)
        .await?;
    Ok(Json(history))
}

pub async fn batch_quotes(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Json<HashMap<String, BatchEntry<Quote>>> {
    Json(state.data.batch_quotes(&request.symbols).await)
}

pub async fn batch_iv_analysis(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> Json<HashMap<String, BatchEntry<IVAnalysis>>> {
    Json(state.data.batch_iv_analysis(&request.symbols).await)
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ProviderStatusResponse {
    pub provider: &'static str,
    pub capabilities: Vec<Capability>,
    pub markets: Vec<Market>,
    pub tool_servers: Vec<ToolServerStatus>,
    pub cache: CacheStats,
}

pub async fn provider_status(State(state): State<AppState>) -> Json<ProviderStatusResponse> {
    let provider = state.data.provider();
    Json(ProviderStatusResponse {
        provider: provider.name(),
        capabilities: provider.capabilities().to_vec(),
        markets: provider.supported_markets().to_vec(),
        tool_servers: state.tools.statuses(),
        cache: state.data.cache_stats(),
    })
}
