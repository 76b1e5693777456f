//! HTTP API in front of the chat service.
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | GET  | `/` | liveness text |
//! | GET  | `/api/tools` | registered tool schemas |
//! | POST | `/api/tool` | invoke one tool directly |
//! | POST | `/api/thread` | create a conversation thread |
//! | POST | `/api/chat` | send a message and wait for the reply |
//! | GET  | `/api/status/{run_id}` | narration recorded for a run |
//! | GET  | `/api/status/events` | live narration (SSE), `?runId=` filters |

mod handlers;
mod types;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    http::Request,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::agent::ChatService;
use crate::config::HttpConfig;
use crate::error::ServerError;

pub use types::{ChatRequest, ErrorResponse, StatusResponse, ThreadResponse, ToolRequest};

/// Build the API router.
pub fn router(chat: Arc<ChatService>) -> Router {
    Router::new()
        .route("/", get(handlers::index_handler))
        .route("/api/tools", get(handlers::tools_list_handler))
        .route("/api/tool", post(handlers::tool_invoke_handler))
        .route("/api/thread", post(handlers::thread_create_handler))
        .route("/api/chat", post(handlers::chat_handler))
        .route("/api/status/events", get(handlers::status_events_handler))
        .route("/api/status/{run_id}", get(handlers::status_handler))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
                tracing::info_span!(
                    "http",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %Uuid::new_v4(),
                )
            }),
        )
        .with_state(chat)
}

/// Bind the listener and serve until `shutdown` resolves.
pub async fn serve(
    chat: Arc<ChatService>,
    config: &HttpConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ServerError> {
    let raw = format!("{}:{}", config.host, config.port);
    let addr: SocketAddr = raw.parse().map_err(|e| ServerError::InvalidAddress {
        addr: raw.clone(),
        reason: format!("{e}"),
    })?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

    tracing::info!("Onchain Agent API listening on http://{}", addr);

    axum::serve(listener, router(chat))
        .with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("HTTP API shutting down");
        })
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))
}
