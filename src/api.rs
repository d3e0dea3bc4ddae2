// src/api.rs
//! HTTP surface: public health probe plus the key-guarded recommend and
//! refresh routes.

use axum::{
    extract::State,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::config::AppConfig;
use crate::engine::EngineHandle;
use crate::error::EngineError;
use crate::observations::SkillId;
use crate::ranking::Recommendation;
use crate::security::{require_api_key, ApiKey};

#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub api_key: ApiKey,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl AppState {
    pub fn new(engine: EngineHandle, cfg: &AppConfig) -> Self {
        Self {
            engine,
            api_key: ApiKey::new(cfg.api_key.as_deref()),
            default_limit: cfg.ranking.default_limit,
            max_limit: cfg.ranking.max_limit,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/recommend", post(recommend))
        .route("/refresh-model", post(refresh_model))
        .route_layer(middleware::from_fn_with_state(
            state.api_key.clone(),
            require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    pub skill_ids: Vec<SkillId>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<Recommendation>,
}

#[derive(Serialize)]
struct HealthOut {
    status: &'static str,
    model_ready: bool,
    generation: Option<u64>,
    ratings: usize,
    model: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
}

async fn health(State(state): State<AppState>) -> Json<HealthOut> {
    let st = state.engine.status();
    Json(HealthOut {
        status: if st.ready { "ok" } else { "degraded" },
        model_ready: st.ready,
        generation: st.generation,
        ratings: st.ratings,
        model: st.model,
        last_error: st.last_error,
    })
}

fn detail(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": msg.into() }))).into_response()
}

async fn recommend(
    State(state): State<AppState>,
    Json(body): Json<RecommendationRequest>,
) -> Response {
    let limit = body.limit.unwrap_or(state.default_limit);
    if limit == 0 || limit > state.max_limit {
        return detail(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("limit must be between 1 and {}", state.max_limit),
        );
    }

    match state.engine.recommend(&body.skill_ids, limit) {
        Ok(recommendations) => Json(RecommendationResponse { recommendations }).into_response(),
        Err(e @ EngineError::NotReady) => {
            tracing::warn!(error = %e, "recommend rejected");
            detail(
                StatusCode::SERVICE_UNAVAILABLE,
                "Recommendation engine is not available or failed to initialize.",
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "recommend failed");
            detail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn refresh_model(State(state): State<AppState>) -> Response {
    match state.engine.refresh().await {
        Ok(report) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "accepted",
                "message": "Model refresh completed.",
                "generation": report.generation,
                "ratings": report.ratings,
                "elapsed_ms": report.elapsed_ms,
            })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "status": "failed",
                "detail": e.to_string(),
                "model_ready": state.engine.is_ready(),
            })),
        )
            .into_response(),
    }
}
