use axum::{
    extract::{Multipart, State},
    Extension, Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{AuthUser, UserIngredients},
    routes::AppState,
};

/// Multipart field carrying the photo
const IMAGE_FIELD: &str = "image";

#[derive(Debug, Serialize)]
pub struct DetectResponse {
    pub success: bool,
    pub detected_ingredient: String,
}

/// Handler for ingredient photo uploads
pub async fn detect(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> AppResult<Json<DetectResponse>> {
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() == Some(IMAGE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::InvalidInput(format!("Failed to read image: {}", e)))?;
            image = Some(bytes);
            break;
        }
    }

    let image = image
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| AppError::InvalidInput("No image uploaded".to_string()))?;

    tracing::info!(
        request_id = %request_id,
        user_id = %user.uid,
        image_bytes = image.len(),
        "Processing ingredient detection"
    );

    let detected_ingredient = state.registry.detect_and_save(&user.uid, &image).await?;

    Ok(Json(DetectResponse {
        success: true,
        detected_ingredient,
    }))
}

/// Handler returning the caller's ingredient context
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<UserIngredients>> {
    let ingredients = state.registry.get_user_ingredients(&user.uid).await?;
    Ok(Json(ingredients))
}
