use std::sync::Arc;

use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use taskd_store::{Database, TaskRepo};

use crate::auth::{self, Credentials};
use crate::handlers;

/// Server configuration. Credentials are required — there is no
/// unauthenticated mode for the /tasks routes.
pub struct ServerConfig {
    pub port: u16,
    pub credentials: Credentials,
}

impl ServerConfig {
    pub fn new(port: u16, credentials: Credentials) -> Self {
        Self { port, credentials }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<TaskRepo>,
}

/// Build the Axum router with all routes.
/// Everything under /tasks sits behind basic auth; /health stays public.
pub fn build_router(state: AppState, credentials: Arc<Credentials>) -> Router {
    let tasks = Router::new()
        .route("/tasks", get(handlers::index).post(handlers::create))
        .route("/tasks/new", get(handlers::new_form))
        .route("/tasks/{id}/edit", get(handlers::edit_form))
        .route(
            "/tasks/{id}",
            axum::routing::put(handlers::update).delete(handlers::destroy),
        )
        .layer(middleware::from_fn_with_state(
            credentials,
            auth::require_basic_auth,
        ))
        .with_state(state);

    Router::new()
        .route("/health", get(health_handler))
        .merge(tasks)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle that keeps it alive.
pub async fn start(config: ServerConfig, db: Database) -> Result<ServerHandle, std::io::Error> {
    let state = AppState {
        repo: Arc::new(TaskRepo::new(db)),
    };
    let router = build_router(state, Arc::new(config.credentials));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "taskd server started");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server_handle,
    })
}

/// Handle returned by `start()` — dropping it does not stop the server,
/// but tests use the bound port.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}

async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({ "status": "healthy" }))
}
