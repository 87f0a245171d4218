use std::error::Error as _;
use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::agent::llm::proxy::REQUEST_PATH;
use crate::agent::types::{ChatRequest, ChatResponse};
use crate::error::Error;
use crate::router::ProviderRouter;

/// Failure of a proxied request, rendered as `{"detail": ...}`
pub enum ApiError {
    /// Body is not a valid chat request
    Body(JsonRejection),
    Routed(Error),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self::Routed(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::Body(rejection) => {
                warn!("Rejected request body: {}", rejection.body_text());
                (rejection.status(), rejection.body_text())
            }
            ApiError::Routed(e @ Error::Config(_)) => {
                error!("{}", e);
                (StatusCode::BAD_REQUEST, describe_chain(&e))
            }
            ApiError::Routed(e) => {
                error!("Request failed: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, describe_chain(&e))
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Error message followed by every underlying cause
fn describe_chain(e: &Error) -> String {
    let mut detail = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        detail.push_str(&format!("\ncaused by: {}", cause));
        source = cause.source();
    }
    detail
}

async fn request_handler(
    State(router): State<Arc<ProviderRouter>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;
    debug!(
        "Proxy request: model={}, {} messages, {} tools",
        request.model,
        request.messages.len(),
        request.tools.len()
    );
    Ok(Json(router.route(&request).await?))
}

/// HTTP app exposing the router to remote conversations
pub fn app(router: Arc<ProviderRouter>) -> Router {
    Router::new()
        .route(REQUEST_PATH, post(request_handler))
        .with_state(router)
}

pub async fn serve(bind: &str, router: Arc<ProviderRouter>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Serving {} on http://{}", REQUEST_PATH, listener.local_addr()?);
    axum::serve(listener, app(router)).await?;
    Ok(())
}
