//! HTTP surface: router assembly and shared application state.

pub mod data_api;
pub mod engine_api;
pub mod error;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use crate::data::{MarketDataService, ToolServerManager};
use crate::engine::DecisionEngine;

pub use error::ApiError;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DecisionEngine>,
    pub data: Arc<MarketDataService>,
    pub tools: Arc<ToolServerManager>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // Engine surface
        .route("/engine/regime", get(engine_api::get_regime))
        .route("/engine/recommend", post(engine_api::recommend))
        .route("/engine/analysis", post(engine_api::full_analysis))
        .route("/engine/strategies", get(engine_api::list_strategies))
        .route(
            "/engine/strategies/:family",
            get(engine_api::strategies_by_family),
        )
        .route("/engine/tail-risk", get(engine_api::tail_risk))
        .route("/engine/conflicts", get(engine_api::all_conflicts))
        .route("/engine/conflicts/active", get(engine_api::active_conflicts))
        .route(
            "/engine/positions/evaluate",
            post(engine_api::evaluate_position),
        )
        .route("/engine/size", post(engine_api::position_size))
        .route("/engine/rules", get(engine_api::list_rules))
        .route("/engine/playbook/0dte/info", get(engine_api::zero_dte_playbook))
        .route("/engine/playbook/0dte/:day", get(engine_api::zero_dte_day))
        .route("/engine/playbook/:event_type", get(engine_api::playbook))
        .route("/engine/reference", get(engine_api::list_reference_tables))
        .route("/engine/reference/:name", get(engine_api::reference_table))
        // Data surface
        .route("/quote/:symbol", get(data_api::get_quote))
        .route("/options/:symbol", get(data_api::get_options))
        .route("/volatility/:symbol", get(data_api::get_volatility))
        .route("/history/:symbol", get(data_api::get_history))
        .route("/quotes/batch", post(data_api::batch_quotes))
        .route("/iv-analysis/batch", post(data_api::batch_iv_analysis))
        .route("/health", get(data_api::health))
        .route("/provider", get(data_api::provider_status))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MockProvider, ToolServersConfig, TtlCache};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_router() -> Router {
        let data = Arc::new(MarketDataService::new(
            Arc::new(MockProvider::new()),
            Arc::new(TtlCache::new()),
        ));
        let state = AppState {
            engine: Arc::new(DecisionEngine::new(data.clone())),
            data,
            tools: Arc::new(ToolServerManager::new(ToolServersConfig::default())),
        };
        router(state)
    }

    async fn get_status(path: &str) -> StatusCode {
        let response = test_router()
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.status()
    }

    async fn body_json(path: &str) -> serde_json::Value {
        let response = test_router()
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_and_core_gets_respond_200() {
        for path in [
            "/health",
            "/provider",
            "/engine/regime",
            "/engine/strategies",
            "/engine/strategies/short_premium",
            "/engine/tail-risk",
            "/engine/conflicts",
            "/engine/conflicts/active",
            "/engine/rules",
            "/engine/reference",
            "/engine/reference/put_selling",
            "/engine/playbook/0dte/info",
            "/engine/playbook/0dte/monday",
            "/engine/playbook/FOMC",
            "/quote/SPY",
            "/history/SPY?limit=10",
            "/volatility/SPY",
            "/options/SPY",
        ] {
            assert_eq!(get_status(path).await, StatusCode::OK, "{path}");
        }
    }

    #[tokio::test]
    async fn unknown_names_are_400_with_alternatives() {
        assert_eq!(
            get_status("/engine/reference/momentum").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status("/engine/playbook/opex").await, StatusCode::BAD_REQUEST);
        assert_eq!(
            get_status("/engine/strategies/exotic").await,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status("/engine/playbook/0dte/saturday").await,
            StatusCode::BAD_REQUEST
        );

        let body = body_json("/engine/reference/momentum").await;
        assert_eq!(body["error"], "unknown_name");
        assert!(body["message"].as_str().unwrap().contains("put_selling"));
    }

    #[tokio::test]
    async fn regime_payload_has_wire_enum_values() {
        let regime = body_json("/engine/regime").await;
        assert_eq!(regime["regime"], "NORMAL");
        assert!(regime["actions"].is_array());
    }

    #[tokio::test]
    async fn recommend_round_trips_json() {
        let request = Request::post("/engine/recommend")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"nav": 250000, "objective": "income"}"#))
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["strategies"].as_array().unwrap().len() <= 3);
        assert_eq!(body["regime"]["regime"], "NORMAL");
    }

    #[tokio::test]
    async fn evaluate_position_reports_health() {
        let request = Request::post("/engine/positions/evaluate")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"position": {"id": "p1", "dte": 5, "family": "short_premium"}}"#,
            ))
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["position_id"], "p1");
        assert!(body["critical_count"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn batch_quotes_return_per_symbol_map() {
        let request = Request::post("/quotes/batch")
            .header("content-type", "application/json")
            .body(Body::from(
                r#"{"symbols": [{"symbol": "SPY", "market": "US"}, {"symbol": "QQQ"}]}"#,
            ))
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["SPY"]["price"], 585.0);
        assert!(body["QQQ"]["price"].is_number());
    }
}
