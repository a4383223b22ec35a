use axum::{extract::State, Extension, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::request_id::RequestId,
    models::{AuthUser, RecommendationSource, RecommendedRecipe, UserIngredients},
    routes::AppState,
};

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub success: bool,
    pub user_ingredients: UserIngredients,
    pub recommended_recipes: Vec<RecommendedRecipe>,
}

/// Handler for recommendations endpoint
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<RecommendationResponse>> {
    tracing::info!(
        request_id = %request_id,
        user_id = %user.uid,
        "Processing recommendation request"
    );

    let outcome = state.pipeline.recommend_for_user(&user.uid).await?;

    let fallback = outcome
        .recommendations
        .iter()
        .any(|r| r.source == RecommendationSource::Fallback);
    tracing::info!(
        request_id = %request_id,
        user_id = %user.uid,
        recommended = outcome.recommendations.len(),
        fallback,
        "Recommendations completed"
    );

    Ok(Json(RecommendationResponse {
        success: true,
        user_ingredients: outcome.user_ingredients,
        recommended_recipes: outcome.recommendations,
    }))
}
