//! HTTP API handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use tokio_stream::StreamExt;

use crate::agent::{ChatReply, ChatService};
use crate::error::InvokeError;
use crate::server::types::*;

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub async fn index_handler() -> &'static str {
    "Onchain Agent API is running."
}

pub async fn tools_list_handler(State(chat): State<Arc<ChatService>>) -> Json<ToolListResponse> {
    let tools = chat
        .orchestrator()
        .registry()
        .schemas()
        .into_iter()
        .map(|s| ToolInfo {
            name: s.name,
            description: s.description,
            parameters: s.parameters,
        })
        .collect();
    Json(ToolListResponse { tools })
}

/// Turn an unreadable JSON body into the endpoint's usual 400 reply.
fn bad_body(rejection: JsonRejection, message: &str) -> ApiError {
    tracing::debug!(status = %rejection.status(), error = %rejection, "Rejected request body");
    api_error(StatusCode::BAD_REQUEST, message)
}

pub async fn tool_invoke_handler(
    State(chat): State<Arc<ChatService>>,
    payload: Result<Json<ToolRequest>, JsonRejection>,
) -> Result<Json<ToolResponse>, ApiError> {
    let Json(req) = payload.map_err(|r| bad_body(r, "Unknown or missing tool."))?;
    let name = req
        .tool
        .filter(|t| !t.is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Unknown or missing tool."))?;

    match chat.invoke_tool(&name, req.params).await {
        Ok(result) => Ok(Json(ToolResponse { result })),
        Err(InvokeError::UnknownTool(_)) => Err(api_error(
            StatusCode::BAD_REQUEST,
            "Unknown or missing tool.",
        )),
        Err(InvokeError::Tool(e)) => {
            tracing::warn!(
                tool = %name,
                kind = e.kind(),
                error = %e,
                "Direct tool invocation failed"
            );
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

pub async fn thread_create_handler(
    State(chat): State<Arc<ChatService>>,
) -> Result<Json<ThreadResponse>, ApiError> {
    let thread = chat.create_thread().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to create thread");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(ThreadResponse {
        thread_id: thread.id,
    }))
}

pub async fn chat_handler(
    State(chat): State<Arc<ChatService>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, ApiError> {
    let Json(req) = payload.map_err(|r| bad_body(r, "Missing message"))?;
    let message = req
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Missing message"))?;

    let reply = chat
        .chat(&message, req.thread_id.as_deref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Chat turn failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;
    Ok(Json(reply))
}

pub async fn status_handler(
    State(chat): State<Arc<ChatService>>,
    Path(run_id): Path<String>,
) -> Json<StatusResponse> {
    let messages = chat.orchestrator().reporter().snapshot(&run_id);
    Json(StatusResponse { run_id, messages })
}

pub async fn status_events_handler(
    State(chat): State<Arc<ChatService>>,
    Query(query): Query<StatusEventsQuery>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>> + Send + 'static> {
    let reporter = chat.orchestrator().reporter();

    // Subscribe before snapshotting so nothing falls between history and
    // live events. Entries seen in both are dropped from the live side.
    let subscription = reporter.subscribe(query.run_id.as_deref());
    tracing::debug!(
        run_id = query.run_id.as_deref().unwrap_or("*"),
        subscribers = reporter.subscriber_count(),
        "Status stream opened"
    );
    let history = match query.run_id.as_deref() {
        Some(run_id) => reporter.entries(run_id),
        None => Vec::new(),
    };
    let replayed = history.len();

    let history_stream = futures::stream::iter(history)
        .map(|entry| Ok(Event::default().event("status").data(status_event_data(&entry))));

    let live_stream = subscription
        .into_stream()
        .filter(move |entry| entry.seq >= replayed)
        .map(|entry| Ok(Event::default().event("status").data(status_event_data(&entry))));

    Sse::new(history_stream.chain(live_stream)).keep_alive(
        KeepAlive::new()
            .interval(std::time::Duration::from_secs(30))
            .text(""),
    )
}
