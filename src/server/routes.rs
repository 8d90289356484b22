//! Request handlers for the web gateway.
//!
//! Every session endpoint resolves the shared session through the readiness
//! state first; errors leave as an `{error}` body with a matching status.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::Error;
use crate::observability::{WEB_BAD_REQUESTS, WEB_CHAT_REQUESTS, WEB_NOT_READY};
use crate::server::state::{Readiness, SessionState, SharedSession};
use crate::types::ConversationTurn;

const INDEX_HTML: &str = include_str!("page.html");

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    readiness: Readiness,
}

impl AppState {
    /// Wraps the readiness cell the handlers consult.
    pub fn new(readiness: Readiness) -> Self {
        Self { readiness }
    }
}

/// Body of `POST /api/chat`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

/// Successful reply to `POST /api/chat`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Reply to `GET /api/status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub ready: bool,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reply to `POST /api/clear`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ClearResponse {
    pub success: bool,
}

/// Reply to `GET /api/history`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<ConversationTurn>,
}

/// Body of every error reply.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error reply: a status code plus an `{error}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        WEB_BAD_REQUESTS.click();
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotReady { message } => Self::new(StatusCode::SERVICE_UNAVAILABLE, message),
            Error::BadRequest { message, .. } | Error::Validation { message, .. } => {
                Self::bad_request(message)
            }
            err => Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Builds the gateway's router.
pub fn router(readiness: Readiness) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", get(status))
        .route("/api/chat", post(chat))
        .route("/api/clear", post(clear))
        .route("/api/history", get(history))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState::new(readiness))
}

fn ready_session(state: &AppState) -> Result<SharedSession, ApiError> {
    state.readiness.state().session().map_err(|err| {
        if err.is_not_ready() {
            WEB_NOT_READY.click();
            ApiError::from(err)
        } else {
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Chatbot failed to initialize: {err}"),
            )
        }
    })
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let current = state.readiness.state();
    let (model, error) = match &current {
        SessionState::Ready { model, .. } => (Some(model.clone()), None),
        SessionState::Failed(err) => (None, Some(err.to_string())),
        SessionState::Initializing => (None, None),
    };
    Json(StatusResponse {
        ready: current.is_ready(),
        state: current.name().to_string(),
        model,
        error,
    })
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    WEB_CHAT_REQUESTS.click();
    let session = ready_session(&state)?;
    let Json(request) = payload.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

    let message = request.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }

    // The turn runs to completion even if the client goes away.
    let turn = tokio::spawn(async move {
        let mut session = session.lock().await;
        session.send_message(&message).await
    });
    let reply = turn
        .await
        .map_err(|err| {
            ApiError::from(Error::internal_server(500, format!("chat task failed: {err}")))
        })?;
    if let Some(err) = reply.error() {
        tracing::warn!(error = %err, "chat request answered with a generation failure");
    }
    Ok(Json(ChatResponse {
        response: reply.into_text(),
    }))
}

async fn clear(State(state): State<AppState>) -> Result<Json<ClearResponse>, ApiError> {
    let session = ready_session(&state)?;
    session.lock().await.clear_history();
    Ok(Json(ClearResponse { success: true }))
}

async fn history(State(state): State<AppState>) -> Result<Json<HistoryResponse>, ApiError> {
    let session = ready_session(&state)?;
    let history = session.lock().await.history();
    Ok(Json(HistoryResponse { history }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_status_codes() {
        let err = ApiError::from(Error::not_ready("still loading"));
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.message, "still loading");

        let err = ApiError::from(Error::bad_request("Message is required", None));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let err = ApiError::from(Error::generation("CUDA out of memory"));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.message.contains("CUDA out of memory"));
    }
}
