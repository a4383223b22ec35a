use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    middleware::{
        auth::{auth_middleware, TokenVerifier},
        request_id::{make_span_with_request_id, request_id_middleware},
    },
    services::{IngredientRegistry, RecommendationPipeline},
};

pub mod auth;
pub mod ingredients;
pub mod recommendations;

/// Shared application state
pub struct AppState {
    pub registry: Arc<IngredientRegistry>,
    pub pipeline: Arc<RecommendationPipeline>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub max_upload_bytes: usize,
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let layers = ServiceBuilder::new()
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/health", get(health_check))
        .route("/verify-login", post(auth::verify_login))
        .nest("/api/v1", api_routes(&state))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(layers)
        .with_state(state)
}

/// API routes under /api/v1, all behind bearer-token auth
fn api_routes(state: &Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/ingredients", get(ingredients::list))
        .route("/ingredients/detect", post(ingredients::detect))
        .route("/recommendations", post(recommendations::recommend))
        .route_layer(middleware::from_fn_with_state(
            state.verifier.clone(),
            auth_middleware,
        ))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
