// app.rs - Router assembly, shared application state, server startup
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::get;
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use tower_http::services::ServeDir;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config;
use crate::handlers;
use crate::media::MediaStore;
use crate::middleware::require_auth;
use crate::store::{CatalogStore, MemoryStore, PgStore};

/// Shared state handed to every handler. The store is a trait object so
/// tests can swap Postgres for the in-memory backend.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CatalogStore>,
    pub media: Arc<MediaStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn CatalogStore>, media: Arc<MediaStore>) -> Self {
        Self { store, media }
    }
}

pub fn router(state: AppState) -> Router {
    let config = config::config();

    // Everything behind JWT auth: catalog resources plus whoami
    let protected = Router::new()
        .merge(handlers::tags::routes())
        .merge(handlers::ingredients::routes())
        .merge(handlers::recipes::routes())
        .merge(handlers::auth::protected_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let media_dir = ServeDir::new(state.media.root());

    let mut app = Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(handlers::auth::public_routes())
        .merge(protected)
        // Uploaded images served as static files
        .nest_service("/media", media_dir)
        .layer(DefaultBodyLimit::max(config.media.max_upload_bytes))
        .with_state(state);

    if config.security.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }
    app.layer(TraceLayer::new_for_http())
}

/// Connect the store, apply the schema, and serve until shutdown. Used by
/// both the server binary and `pantry serve`. `STORE=memory` skips Postgres
/// and keeps all data in process memory.
pub async fn serve() -> anyhow::Result<()> {
    let config = config::config();
    tracing::info!("Starting Pantry API in {:?} mode", config.environment);

    if crate::is_production!() && config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set in production");
    }

    let use_memory = std::env::var("STORE").map(|v| v == "memory").unwrap_or(false);
    let store: Arc<dyn CatalogStore> = if use_memory {
        tracing::warn!("STORE=memory: data will not survive a restart");
        Arc::new(MemoryStore::new())
    } else {
        let store = PgStore::connect_from_env().await?;
        store.migrate().await?;
        Arc::new(store)
    };

    let media = Arc::new(MediaStore::new(&config.media.root)?);
    let state = AppState::new(store, media);
    let app = router(state);

    // Allow tests or deployments to override port via env
    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    println!("🚀 Pantry API server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Pantry API",
            "version": version,
            "description": "Recipe catalog API built with Rust (Axum)",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "auth": "/auth/register, /auth/token (public), /auth/whoami (protected)",
                "tags": "/tags[/:id] (protected)",
                "ingredients": "/ingredients[/:id] (protected)",
                "recipes": "/recipes[/:id] (protected)",
                "upload": "/recipes/:id/upload-image (protected)",
                "media": "/media/* (public)",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();

    match state.store.health_check().await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
