use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct VerifyLoginRequest {
    pub id_token: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyLoginResponse {
    pub success: bool,
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Handler for login verification; the client signs in with the identity provider and sends
/// the resulting ID token here
pub async fn verify_login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyLoginRequest>,
) -> AppResult<Json<VerifyLoginResponse>> {
    let token = request.id_token.trim();
    if token.is_empty() {
        return Err(AppError::Unauthorized("ID token is required".to_string()));
    }

    let user = state.verifier.verify(token).await?;
    tracing::info!(user_id = %user.uid, "Login verified");

    Ok(Json(VerifyLoginResponse {
        success: true,
        uid: user.uid,
        email: user.email,
    }))
}
