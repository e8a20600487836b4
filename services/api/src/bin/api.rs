//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{HttpOrchestrator, MemoryDocumentStore, MemoryStore, PgDocumentStore, PgStore},
    config::{Config, ConfigError, StorageBackend},
    error::ApiError,
    realtime::RealtimeGateway,
    web::{build_router, rest::ApiDoc, session::SessionCookies, state::AppState},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use companion_core::calendar::{Clock, SystemClock};
use companion_core::ports::{DocumentStore, RelationalStore};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect the Stores ---
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (db, docs): (Arc<dyn RelationalStore>, Arc<dyn DocumentStore>) =
        match config.storage_backend {
            StorageBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;
                info!("Connecting to database...");
                let db_pool = PgPoolOptions::new()
                    .max_connections(config.database_max_connections)
                    .connect(url)
                    .await?;
                let store = PgStore::new(db_pool.clone(), clock.clone(), config.home_offset);
                info!("Running database migrations...");
                store.run_migrations().await?;
                info!("Database migrations complete.");
                let db: Arc<dyn RelationalStore> = Arc::new(store);
                let docs: Arc<dyn DocumentStore> = Arc::new(PgDocumentStore::new(db_pool));
                (db, docs)
            }
            StorageBackend::Memory => {
                warn!("Using in-memory stores; all data is lost on shutdown.");
                let db: Arc<dyn RelationalStore> =
                    Arc::new(MemoryStore::new(clock.clone(), config.home_offset));
                let docs: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new(clock.clone()));
                (db, docs)
            }
        };

    // --- 3. Initialize Service Adapters ---
    let orchestrator = Arc::new(HttpOrchestrator::new(
        config.orchestrator_base_url.clone(),
        config.orchestrator_timeout,
    )?);
    let cookies = SessionCookies::new(config.session_secret.as_bytes(), config.production)?;

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db,
        realtime: RealtimeGateway::new(docs, config.home_offset),
        orchestrator,
        cookies,
    });

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string())
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let app = build_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
