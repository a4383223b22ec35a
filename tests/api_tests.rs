use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum_test::{
    multipart::{MultipartForm, Part},
    TestServer,
};
use serde_json::{json, Value};

use cookit_api::{
    db::{IngredientStore, RecipeStore},
    error::{AppError, AppResult},
    middleware::auth::TokenVerifier,
    models::{AuthUser, LabelAnnotation, Recipe, UserIngredients},
    routes::{create_router, AppState},
    services::{
        providers::{CompletionProvider, CompletionRequest, LabelDetector},
        IngredientMap, IngredientRegistry, RecommendationPipeline, RecommendationSelector,
    },
};

const TOKEN: &str = "valid-token";
const USER_ID: &str = "user-1";

// ============================================================================
// Fakes
// ============================================================================

struct FakeStore {
    recipes: Vec<Recipe>,
    users: Mutex<HashMap<String, UserIngredients>>,
}

#[async_trait::async_trait]
impl RecipeStore for FakeStore {
    async fn get_all_recipes(&self) -> AppResult<Vec<Recipe>> {
        Ok(self.recipes.clone())
    }

    async fn get_recipe(&self, id: &str) -> AppResult<Option<Recipe>> {
        Ok(self.recipes.iter().find(|r| r.id == id).cloned())
    }
}

#[async_trait::async_trait]
impl IngredientStore for FakeStore {
    async fn load_ingredient_map(&self) -> AppResult<HashMap<String, String>> {
        Ok(HashMap::new())
    }

    async fn get_user_ingredients(&self, user_id: &str) -> AppResult<Option<UserIngredients>> {
        Ok(self.users.lock().unwrap().get(user_id).cloned())
    }

    async fn add_owned_ingredients(
        &self,
        user_id: &str,
        names: &[String],
    ) -> AppResult<UserIngredients> {
        let mut users = self.users.lock().unwrap();
        let user = users.entry(user_id.to_string()).or_default();
        user.add_owned(names.iter().cloned());
        Ok(user.clone())
    }
}

struct FakeDetector {
    labels: Vec<LabelAnnotation>,
}

#[async_trait::async_trait]
impl LabelDetector for FakeDetector {
    async fn detect_labels(&self, _image: &[u8]) -> AppResult<Vec<LabelAnnotation>> {
        Ok(self.labels.clone())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

enum CompletionBehavior {
    Reply(String),
    RateLimited,
}

struct FakeCompletion {
    behavior: CompletionBehavior,
}

#[async_trait::async_trait]
impl CompletionProvider for FakeCompletion {
    async fn complete(&self, _request: &CompletionRequest) -> AppResult<String> {
        match &self.behavior {
            CompletionBehavior::Reply(reply) => Ok(reply.clone()),
            CompletionBehavior::RateLimited => Err(AppError::RateLimited(
                "rate_limit_exceeded".to_string(),
            )),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct FakeVerifier;

#[async_trait::async_trait]
impl TokenVerifier for FakeVerifier {
    async fn verify(&self, id_token: &str) -> AppResult<AuthUser> {
        if id_token == TOKEN {
            Ok(AuthUser {
                uid: USER_ID.to_string(),
                email: Some("cook@example.com".to_string()),
            })
        } else {
            Err(AppError::Unauthorized("invalid token".to_string()))
        }
    }
}

// ============================================================================
// Server setup
// ============================================================================

fn recipe(id: &str, ingredients: &str) -> Recipe {
    Recipe {
        id: id.to_string(),
        name: format!("Recipe {}", id),
        ingredients: ingredients.to_string(),
        category: Some("main".to_string()),
        details: json!({}),
    }
}

/// Ranks as B (1.0), A (0.67), D (0.5), C (0), E (0) for a pantry of egg, rice and onion
fn corpus() -> Vec<Recipe> {
    vec![
        recipe("A", "egg, rice, soy sauce"),
        recipe("B", "Egg, Rice"),
        recipe("C", "beef"),
        recipe("D", "onion, garlic"),
        recipe("E", ""),
    ]
}

fn pantry() -> UserIngredients {
    UserIngredients::with_owned(vec![
        "egg".to_string(),
        "rice".to_string(),
        "onion".to_string(),
    ])
}

struct TestSetup {
    recipes: Vec<Recipe>,
    user: Option<UserIngredients>,
    labels: Vec<LabelAnnotation>,
    completion: CompletionBehavior,
}

impl Default for TestSetup {
    fn default() -> Self {
        Self {
            recipes: corpus(),
            user: Some(pantry()),
            labels: vec![LabelAnnotation {
                description: "Onion".to_string(),
                score: 0.93,
            }],
            completion: CompletionBehavior::Reply("not json at all".to_string()),
        }
    }
}

impl TestSetup {
    fn server(self) -> TestServer {
        let users = self
            .user
            .map(|user| HashMap::from([(USER_ID.to_string(), user)]))
            .unwrap_or_default();

        let store = Arc::new(FakeStore {
            recipes: self.recipes,
            users: Mutex::new(users),
        });

        let map = IngredientMap::new(HashMap::from([
            ("onion".to_string(), "양파".to_string()),
            ("egg".to_string(), "달걀".to_string()),
        ]));

        let registry = Arc::new(IngredientRegistry::new(
            map,
            store.clone(),
            Arc::new(FakeDetector {
                labels: self.labels,
            }),
            Duration::from_secs(5),
        ));

        let selector = RecommendationSelector::new(
            Arc::new(FakeCompletion {
                behavior: self.completion,
            }),
            store.clone(),
        );
        let pipeline = Arc::new(RecommendationPipeline::new(
            registry.clone(),
            store,
            selector,
        ));

        let state = Arc::new(AppState {
            registry,
            pipeline,
            verifier: Arc::new(FakeVerifier),
            max_upload_bytes: 1024 * 1024,
        });

        TestServer::new(create_router(state)).unwrap()
    }
}

fn bearer() -> HeaderValue {
    HeaderValue::from_str(&format!("Bearer {}", TOKEN)).unwrap()
}

fn recipe_ids(body: &Value) -> Vec<String> {
    body["recommended_recipes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect()
}

fn image_form() -> MultipartForm {
    MultipartForm::new().add_part(
        "image",
        Part::bytes(b"\xFF\xD8\xFF\xE0fake-jpeg".to_vec())
            .file_name("onion.jpg")
            .mime_type("image/jpeg"),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestSetup::default().server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "status": "healthy" }));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = TestSetup::default().server();
    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("ios-req-42"),
        )
        .await;
    assert_eq!(response.header("x-request-id"), "ios-req-42");

    let response = server.get("/health").await;
    let generated = response.header("x-request-id");
    assert!(!generated.is_empty());
}

#[tokio::test]
async fn test_verify_login() {
    let server = TestSetup::default().server();

    let response = server
        .post("/verify-login")
        .json(&json!({ "id_token": TOKEN }))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["uid"], USER_ID);
    assert_eq!(body["email"], "cook@example.com");

    let response = server
        .post("/verify-login")
        .json(&json!({ "id_token": "forged" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_api_requires_bearer_token() {
    let server = TestSetup::default().server();

    let response = server.post("/api/v1/recommendations").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .get("/api/v1/ingredients")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer forged"),
        )
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_get_ingredients_for_new_user() {
    let server = TestSetup {
        user: None,
        ..TestSetup::default()
    }
    .server();

    let response = server
        .get("/api/v1/ingredients")
        .add_header(header::AUTHORIZATION, bearer())
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["owned"], json!([]));
}

#[tokio::test]
async fn test_detect_saves_canonical_ingredient() {
    let server = TestSetup {
        user: None,
        ..TestSetup::default()
    }
    .server();

    let response = server
        .post("/api/v1/ingredients/detect")
        .add_header(header::AUTHORIZATION, bearer())
        .multipart(image_form())
        .await;
    response.assert_status_ok();
    response.assert_json(&json!({ "success": true, "detected_ingredient": "양파" }));

    let response = server
        .get("/api/v1/ingredients")
        .add_header(header::AUTHORIZATION, bearer())
        .await;
    let body: Value = response.json();
    assert_eq!(body["owned"], json!(["양파"]));
}

#[tokio::test]
async fn test_detect_unmapped_label() {
    let server = TestSetup {
        labels: vec![LabelAnnotation {
            description: "Tableware".to_string(),
            score: 0.99,
        }],
        ..TestSetup::default()
    }
    .server();

    let response = server
        .post("/api/v1/ingredients/detect")
        .add_header(header::AUTHORIZATION, bearer())
        .multipart(image_form())
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_detect_without_image() {
    let server = TestSetup::default().server();

    let response = server
        .post("/api/v1/ingredients/detect")
        .add_header(header::AUTHORIZATION, bearer())
        .multipart(MultipartForm::new().add_text("note", "forgot the photo"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommendations_from_model_reply() {
    let reply = json!({
        "recommendedRecipes": [
            { "id": "D", "reason": "Uses your onion" },
            { "id": "B", "reason": "Egg and rice, nothing else" },
            { "id": "A", "reason": "Quick fried rice" }
        ]
    });
    let server = TestSetup {
        completion: CompletionBehavior::Reply(reply.to_string()),
        ..TestSetup::default()
    }
    .server();

    let response = server
        .post("/api/v1/recommendations")
        .add_header(header::AUTHORIZATION, bearer())
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(recipe_ids(&body), vec!["D", "B", "A"]);
    assert_eq!(body["recommended_recipes"][0]["reason"], "Uses your onion");
    assert_eq!(body["recommended_recipes"][0]["source"], "model");
    assert_eq!(body["user_ingredients"]["owned"], json!(["egg", "rice", "onion"]));
}

#[tokio::test]
async fn test_recommendations_fall_back_on_malformed_reply() {
    let server = TestSetup::default().server();

    let response = server
        .post("/api/v1/recommendations")
        .add_header(header::AUTHORIZATION, bearer())
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(recipe_ids(&body), vec!["B", "A", "D"]);
    for recommended in body["recommended_recipes"].as_array().unwrap() {
        assert_eq!(recommended["source"], "fallback");
        assert_eq!(recommended["reason"], "Top ingredient match");
    }
}

#[tokio::test]
async fn test_recommendations_fall_back_on_rate_limit() {
    let server = TestSetup {
        completion: CompletionBehavior::RateLimited,
        ..TestSetup::default()
    }
    .server();

    let response = server
        .post("/api/v1/recommendations")
        .add_header(header::AUTHORIZATION, bearer())
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(recipe_ids(&body), vec!["B", "A", "D"]);
    assert!(body["recommended_recipes"][0].get("reason").is_none());
}

#[tokio::test]
async fn test_recommendations_without_ingredients() {
    let server = TestSetup {
        user: None,
        ..TestSetup::default()
    }
    .server();

    let response = server
        .post("/api/v1/recommendations")
        .add_header(header::AUTHORIZATION, bearer())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recommendations_with_empty_corpus() {
    let server = TestSetup {
        recipes: vec![],
        ..TestSetup::default()
    }
    .server();

    let response = server
        .post("/api/v1/recommendations")
        .add_header(header::AUTHORIZATION, bearer())
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}
