//! HTTP API module for Treasure
//!
//! Provides the login, admin update and status endpoints for the session.

pub mod routes;

use crate::config::GameConfig;
use crate::db::{Connector, Database};
use crate::error::{CoreError, Result};

use axum::{
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Lazily opened database
    pub connector: Arc<Connector>,
    /// Session name, bypass code and seed values
    pub game: Arc<GameConfig>,
}

impl AppState {
    pub fn new(connector: Arc<Connector>, game: GameConfig) -> Self {
        AppState {
            connector,
            game: Arc::new(game),
        }
    }
}

/// Start the HTTP API server
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    // Check if port is already in use (another instance running)
    if tokio::net::TcpStream::connect(addr).await.is_ok() {
        tracing::error!(
            "Port {} is already in use. Use `curl http://{}/health` to check.",
            addr.port(),
            addr
        );
        return Err(CoreError::Api(format!("Port {} already in use", addr.port())));
    }

    let connector = Arc::clone(&state.connector);
    let app = create_router(state);

    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CoreError::Api(e.to_string()))?;

    connector.close().await;

    Ok(())
}

/// Middleware that makes sure the database is open before the handler runs.
/// The handle is passed on as an `Extension<Arc<Database>>`.
async fn require_database(
    State(state): State<AppState>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    match state.connector.get().await {
        Ok(db) => {
            request.extensions_mut().insert::<Arc<Database>>(db);
            next.run(request).await
        }
        Err(e) => routes::ApiError::Unavailable(e).into_response(),
    }
}

/// Create the API router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration - the front-end may be served from anywhere
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/login", post(routes::login))
        .route("/update-loc", post(routes::update_location))
        .route("/update-time", post(routes::update_time))
        .route("/status", get(routes::status));

    let db_routes = Router::new()
        .route("/init", get(routes::init_session))
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_database,
        ));

    Router::new()
        // Health check (no database access)
        .route("/health", get(routes::health))
        .merge(db_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
