// Server module - router assembly, background sweep and the listener
// Used by the `serve` command and by the HTTP tests

use axum::Router;
use axum::http::HeaderValue;
use chrono::Utc;
use sea_orm::DatabaseConnection;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api;
use crate::api_docs::ApiDoc;
use crate::infrastructure::AppState;
use crate::infrastructure::config::Config;
use crate::services::loan_service;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let mut allowed = Vec::new();
        for origin in origins {
            match origin.parse::<HeaderValue>() {
                Ok(v) => allowed.push(v),
                Err(e) => tracing::error!("Failed to parse CORS origin '{}': {}", origin, e),
            }
        }
        AllowOrigin::list(allowed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Full application: `/api`, Swagger UI, stored covers under `/storage`.
pub fn build_router(state: AppState, config: &Config) -> Router {
    let api_router = api::api_router_with_state(state);

    Router::new()
        .merge(SwaggerUi::new("/api/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_router)
        .nest_service("/storage", ServeDir::new(&config.cover_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_allowed_origins))
}

/// Periodic overdue sweep. Returns `None` when the interval is 0.
pub fn spawn_overdue_sweep(db: DatabaseConnection, interval_secs: u64) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        tracing::info!("periodic overdue sweep disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            match loan_service::sweep_overdue(&db, Utc::now()).await {
                Ok(0) => tracing::debug!("overdue sweep: nothing to flip"),
                Ok(n) => tracing::info!(count = n, "overdue sweep flipped loans"),
                Err(e) => tracing::error!(error = %e, "overdue sweep failed"),
            }
        }
    }))
}

/// Runs the HTTP server until the process is stopped.
pub async fn serve(db: DatabaseConnection, config: &Config) -> std::io::Result<()> {
    let state = AppState::from_config(db.clone(), config);
    let app = build_router(state, config);
    let sweep = spawn_overdue_sweep(db, config.overdue_sweep_interval_secs);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Pustaka server listening on {}", addr);

    let result = axum::serve(listener, app).await;
    if let Some(handle) = sweep {
        handle.abort();
    }
    result
}
