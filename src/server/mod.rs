//! HTTP gateway around one process-wide chat session.
//!
//! Endpoints:
//!
//! - `GET /`: a single-page chat UI
//! - `GET /api/status`: `{ready, state, model?, error?}`
//! - `POST /api/chat`: `{message}` to `{response}`
//! - `POST /api/clear`: `{success: true}`
//! - `GET /api/history`: `{history: [{role, content}]}`
//!
//! Failures are `{error}` bodies with 400 (bad input), 503 (still loading) or
//! 500 (loading failed).

mod routes;
mod state;

use std::future::Future;
use std::io;

use tokio::net::TcpListener;

pub use routes::{
    ApiError, AppState, ChatRequest, ChatResponse, ClearResponse, ErrorResponse, HistoryResponse,
    StatusResponse, router,
};
pub use state::{Readiness, SessionState, SharedSession};

/// Serves the gateway on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, readiness: Readiness, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "web gateway listening");
    }
    axum::serve(listener, router(readiness))
        .with_graceful_shutdown(shutdown)
        .await
}
