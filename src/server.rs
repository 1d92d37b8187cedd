//! HTTP surface: Clubhouse posts each webhook delivery to `/webhook`.

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::clubhouse::{Event, ResourceClient};
use crate::config::ServerConfig;
use crate::handler::{handle_event, HandlerError};
use crate::shutdown::shutdown_signal;

#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn ResourceClient>,
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = match &self {
            HandlerError::MalformedEvent(_) => StatusCode::BAD_REQUEST,
            HandlerError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            HandlerError::Transport(_) | HandlerError::Parse(_) => StatusCode::BAD_GATEWAY,
        };
        // full cause chain, e.g. "transport failure: request for 'epics' failed: ..."
        let message = format!("{:#}", anyhow::Error::new(self));
        warn!("Webhook invocation failed: {}", message);
        (status, Json(json!({ "error": message }))).into_response()
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "epic-sync"
    }))
}

async fn webhook_handler(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<Event>, HandlerError> {
    handle_event(state.client.as_ref(), &body).await.map(Json)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/webhook", post(webhook_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve webhooks until SIGINT/SIGTERM.
pub async fn serve(settings: &ServerConfig, client: Arc<dyn ResourceClient>) -> Result<()> {
    let app = router(AppState { client });

    let listener = TcpListener::bind((settings.bind_address.as_str(), settings.port)).await?;
    info!("Webhook server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Webhook server stopped");
    Ok(())
}
