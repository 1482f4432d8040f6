//! HTTP Server implementation
//!
//! This module provides the HTTP server using Axum framework with:
//! - Configurable host/port binding
//! - Graceful shutdown handling
//! - Health check endpoint
//! - CORS support
//! - Static serving of uploaded cover images

use crate::api::handlers::AppState;
use crate::api::middleware::trace_id_middleware;
use crate::api::routes::build_api_routes;
use crate::core::config::ServerConfig;
use crate::core::images::ImageStore;
use crate::core::services::BookService;
use crate::core::Config;
use crate::db::manager::DatabaseManager;
use crate::db::repository::{BookRepository, UserRepository};
use axum::{middleware, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;

/// HTTP API Server
pub struct ApiServer {
    router: Router,
    config: ServerConfig,
}

impl ApiServer {
    /// Create a new API server with the given configuration and database manager
    pub fn new(config: Config, db: Arc<DatabaseManager>) -> anyhow::Result<Self> {
        let server_config = config.server.clone();

        let router = Self::build_router(config, db);

        Ok(Self {
            router,
            config: server_config,
        })
    }

    /// Build the Axum router with all routes and middleware
    fn build_router(config: Config, db: Arc<DatabaseManager>) -> Router {
        // Create repositories
        let book_repo = Arc::new(BookRepository::new(db.clone()));
        let user_repo = Arc::new(UserRepository::new(db));

        // Create services
        let images = Arc::new(ImageStore::new(
            config.storage.image_dir.clone(),
            config.storage.temp_dir.clone(),
        ));
        let book_service = Arc::new(BookService::new(book_repo, images));

        // Create application state
        let app_state = AppState {
            user_repo,
            book_service,
            jwt_secret: Arc::new(config.security.jwt_secret.clone()),
            token_ttl_hours: config.security.token_ttl_hours,
        };

        let api_router = build_api_routes(app_state);

        // Uploaded cover images are served publicly under /images
        let serve_images = ServeDir::new(&config.storage.image_dir);

        api_router
            .route("/health", get(health_check))
            .nest_service("/images", serve_images)
            .layer(
                ServiceBuilder::new()
                    // Add trace ID middleware for request tracking
                    .layer(middleware::from_fn(trace_id_middleware))
                    // Add tracing for all requests
                    .layer(TraceLayer::new_for_http())
                    // Add CORS support
                    .layer(Self::build_cors_layer(&config.security.allowed_origins)),
            )
    }

    /// Build CORS layer from allowed origins configuration
    fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
        use tower_http::cors::Any;

        let cors = CorsLayer::new();

        // If allowed_origins contains "*", allow any origin
        if allowed_origins.contains(&"*".to_string()) {
            cors.allow_origin(Any).allow_methods(Any).allow_headers(Any)
        } else {
            let origins: Vec<_> = allowed_origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();

            cors.allow_origin(origins).allow_methods(Any).allow_headers(Any)
        }
    }

    /// Start the HTTP server and listen for requests
    ///
    /// This method will block until the server is shut down gracefully.
    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let socket_addr: SocketAddr = addr.parse()?;

        info!(
            host = %self.config.host,
            port = self.config.port,
            "Starting HTTP server"
        );

        let listener = tokio::net::TcpListener::bind(socket_addr).await?;

        info!(addr = %socket_addr, "HTTP server listening");

        // Serve with graceful shutdown
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("HTTP server shut down gracefully");

        Ok(())
    }

    /// Get a reference to the router
    pub fn router(&self) -> &Router {
        &self.router
    }
}

/// Health check endpoint handler
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().timestamp(),
    }))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Initiating graceful shutdown...");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let response = health_check().await;
        let value = response.0;

        assert_eq!(value["status"], "ok");
        assert!(value["version"].is_string());
        assert!(value["timestamp"].is_number());
    }
}
