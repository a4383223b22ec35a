use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cookit_api::{
    config::Config,
    db::{create_pool, create_redis_client, Cache, PgStore},
    middleware::auth::FirebaseTokenVerifier,
    routes::{create_router, AppState},
    services::{
        providers::{OpenAiProvider, VisionLabelDetector},
        IngredientRegistry, RecommendationPipeline, RecommendationSelector,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cookit_api=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    let redis_client = create_redis_client(&config.redis_url)?;
    // The writer stops as soon as its handle is dropped, so keep it until shutdown
    let (cache, cache_writer) = Cache::new(redis_client).await;
    let store = Arc::new(PgStore::new(pool, cache));

    let detector = Arc::new(VisionLabelDetector::new(
        config.vision_api_key.clone(),
        config.vision_api_url.clone(),
    ));
    let completion = Arc::new(OpenAiProvider::new(
        config.openai_api_key.clone(),
        config.openai_api_url.clone(),
        config.openai_model.clone(),
    ));
    let verifier = Arc::new(FirebaseTokenVerifier::new(
        config.auth_api_key.clone(),
        config.auth_api_url.clone(),
    ));

    let registry = Arc::new(
        IngredientRegistry::load(store.clone(), detector, config.detection_timeout()).await?,
    );
    let selector = RecommendationSelector::new(completion, store.clone());
    let pipeline = Arc::new(RecommendationPipeline::new(
        registry.clone(),
        store,
        selector,
    ));

    let state = Arc::new(AppState {
        registry,
        pipeline,
        verifier,
        max_upload_bytes: config.max_upload_bytes,
    });
    let app = create_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cache_writer.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
