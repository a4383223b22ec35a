use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{AppError, AppResult},
    models::AuthUser,
};

/// Verifies client ID tokens against the identity provider
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> AppResult<AuthUser>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Firebase ID token verification through the Identity Toolkit `accounts:lookup` endpoint
#[derive(Clone)]
pub struct FirebaseTokenVerifier {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl FirebaseTokenVerifier {
    pub fn new(api_key: String, api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    fn parse_lookup(body: &str) -> AppResult<AuthUser> {
        let lookup: LookupResponse = serde_json::from_str(body).map_err(|e| {
            AppError::ServiceUnavailable(format!("Failed to parse token lookup response: {}", e))
        })?;

        lookup
            .users
            .into_iter()
            .next()
            .map(|user| AuthUser {
                uid: user.local_id,
                email: user.email,
            })
            .ok_or_else(|| AppError::Unauthorized("Token does not belong to any user".to_string()))
    }
}

#[async_trait::async_trait]
impl TokenVerifier for FirebaseTokenVerifier {
    async fn verify(&self, id_token: &str) -> AppResult<AuthUser> {
        let url = format!("{}/v1/accounts:lookup", self.api_url);

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({ "idToken": id_token }))
            .send()
            .await
            .map_err(|e| {
                AppError::ServiceUnavailable(format!("Failed to reach identity service: {}", e))
            })?;

        let status = response.status();
        let body = response.text().await?;

        // The lookup endpoint answers 400 INVALID_ID_TOKEN for bad or expired tokens
        if status.is_client_error() {
            return Err(AppError::Unauthorized(format!(
                "Identity service rejected token with status {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(AppError::ServiceUnavailable(format!(
                "Identity service returned status {}",
                status
            )));
        }

        Self::parse_lookup(&body)
    }
}

/// Extracts the bearer token from an `Authorization` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Rejects requests without a valid bearer token and stores the caller as an [`AuthUser`]
/// extension
pub async fn auth_middleware(
    State(verifier): State<Arc<dyn TokenVerifier>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?
        .to_string();

    let user = verifier.verify(&token).await?;
    tracing::debug!(user_id = %user.uid, "Caller authenticated");

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use tokio_test::{assert_err, assert_ok};
    use tower::ServiceExt;

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[test]
    fn test_parse_lookup() {
        let body = r#"{
            "kind": "identitytoolkit#GetAccountInfoResponse",
            "users": [{"localId": "uid-123", "email": "cook@example.com", "emailVerified": true}]
        }"#;
        let user = assert_ok!(FirebaseTokenVerifier::parse_lookup(body));
        assert_eq!(user.uid, "uid-123");
        assert_eq!(user.email.as_deref(), Some("cook@example.com"));
    }

    #[test]
    fn test_parse_lookup_no_users() {
        let error = assert_err!(FirebaseTokenVerifier::parse_lookup(r#"{"kind":"x"}"#));
        assert!(matches!(error, AppError::Unauthorized(_)));
    }

    fn guarded_router() -> Router {
        let mut verifier = MockTokenVerifier::new();
        verifier
            .expect_verify()
            .withf(|token| token == "good")
            .returning(|_| {
                Ok(AuthUser {
                    uid: "uid-1".to_string(),
                    email: None,
                })
            });
        verifier
            .expect_verify()
            .returning(|_| Err(AppError::Unauthorized("bad token".to_string())));
        let verifier: Arc<dyn TokenVerifier> = Arc::new(verifier);

        Router::new()
            .route(
                "/me",
                get(|Extension(user): Extension<AuthUser>| async move { user.uid }),
            )
            .layer(middleware::from_fn_with_state(verifier, auth_middleware))
    }

    fn request(authorization: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/me");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_middleware_inserts_verified_user() {
        let response = guarded_router()
            .oneshot(request(Some("Bearer good")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"uid-1");
    }

    #[tokio::test]
    async fn test_middleware_rejects_missing_or_bad_token() {
        for authorization in [None, Some("Basic good"), Some("Bearer forged")] {
            let response = guarded_router()
                .oneshot(request(authorization))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }
}
