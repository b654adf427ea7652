//! AppForge HTTP edge.
//!
//! Exposes the generation operations and the app network proxy over `axum`.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Routing, JSON extraction and status mapping live here.
//! Generation goes through [`orchestration::Orchestrator`]; proxied requests
//! through [`gateway::Gateway`]. Handlers hold no state of their own.
//!
//! ## Routes
//!
//! | Method & path | Handler |
//! |---------------|---------|
//! | `POST /api/operations` | kind taken from the body |
//! | `POST /api/generate-app` | create |
//! | `POST /api/enhance-app` | enhance |
//! | `POST /api/fix-app` | fix |
//! | `POST /api/custom-command` | customize |
//! | `POST /api/app-proxy` | outbound gateway |
//! | `GET /healthz` | liveness |

use std::future::Future;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use gateway::Gateway;
use orchestration::Orchestrator;
use tokio::net::TcpListener;

mod error;
pub mod routes;

pub use error::ApiError;

/// Largest accepted request body. Rewrites carry the whole current artifact.
pub const MAX_REQUEST_BYTES: usize = 8 * 1024 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub gateway: Arc<Gateway>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, gateway: Arc<Gateway>) -> Self {
        Self {
            orchestrator,
            gateway,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/api/operations", post(routes::operation))
        .route("/api/generate-app", post(routes::generate_app))
        .route("/api/enhance-app", post(routes::enhance_app))
        .route("/api/fix-app", post(routes::fix_app))
        .route("/api/custom-command", post(routes::custom_command))
        .route("/api/app-proxy", post(routes::app_proxy))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .with_state(state)
}

/// Serves until `shutdown` resolves.
///
/// # Errors
///
/// Any I/O error from the listener.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "HTTP edge listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
