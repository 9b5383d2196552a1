//! Chat and tool endpoints.
//!
//! | route                     | purpose                          |
//! |---------------------------|----------------------------------|
//! | `POST /api/chat/stream`     | run one turn, stream events as SSE |
//! | `GET  /api/chats`           | list the caller's chats          |
//! | `POST /api/chats`           | create a chat                    |
//! | `GET  /api/chats/{id}/last` | last stored message of a chat    |
//! | `GET  /api/tools`           | registered tools                 |

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use agentwire_agent::TurnRequest;
use agentwire_core::context::RequestContext;
use agentwire_core::error::StoreError;
use agentwire_core::message::{Message, Role};
use agentwire_core::store::{Chat, StoredMessage};

use crate::{OAUTH_TOKEN_HEADER, SharedState, USER_ID_HEADER};

// ── Request / Response types ──────────────────────────────────────────────

/// Body of `POST /api/chat/stream`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStreamRequest {
    #[serde(default)]
    pub messages: Vec<Message>,
    pub new_message: String,
    /// Missing or null means an ephemeral session.
    #[serde(default)]
    pub chat_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateChatRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatListResponse {
    pub chats: Vec<Chat>,
}

#[derive(Debug, Serialize)]
pub struct LastMessageResponse {
    pub message: Option<StoredMessage>,
}

#[derive(Debug, Serialize)]
pub struct ToolDto {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolDto>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (status, Json(ErrorResponse { error: error.into() }))
}

fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::ChatNotFound(_) => api_error(StatusCode::NOT_FOUND, e.to_string()),
        StoreError::Storage(_) => {
            warn!(error = %e, "Store request failed");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Caller identity for one request, from the identity headers.
fn request_context(headers: &HeaderMap, chat_id: Option<String>) -> RequestContext {
    RequestContext {
        user_id: header_value(headers, USER_ID_HEADER),
        oauth_token: header_value(headers, OAUTH_TOKEN_HEADER),
        chat_id: chat_id.filter(|id| !id.is_empty()),
    }
}

fn require_user(headers: &HeaderMap) -> Result<String, ApiError> {
    header_value(headers, USER_ID_HEADER).ok_or_else(|| {
        api_error(
            StatusCode::UNAUTHORIZED,
            format!("Missing {USER_ID_HEADER} header"),
        )
    })
}

/// Keep only the conversational part of client-supplied history.
///
/// Tool plumbing from a previous turn is not replayed; the model only sees
/// what was said.
fn sanitize_history(messages: Vec<Message>) -> Vec<Message> {
    messages
        .into_iter()
        .filter_map(|m| match m.role {
            Role::Human => Some(Message::human(m.content)),
            Role::Assistant if !m.content.is_empty() => Some(Message::assistant(m.content)),
            _ => None,
        })
        .collect()
}

// ── SSE Streaming ─────────────────────────────────────────────────────────

/// Run one turn and stream its events.
///
/// Dropping the response body (client disconnect) drops the guard held by
/// the stream, which cancels the turn.
pub async fn chat_stream_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<ChatStreamRequest>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    if payload.new_message.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "newMessage must not be empty"));
    }

    let ctx = request_context(&headers, payload.chat_id);
    info!(
        chat_id = ctx.chat_id.as_deref().unwrap_or("-"),
        user = ctx.user_id.is_some(),
        history = payload.messages.len(),
        "Chat stream request"
    );

    let request = TurnRequest::new(sanitize_history(payload.messages), payload.new_message);
    let cancel = CancellationToken::new();
    let rx = state.runner.spawn(request, Arc::new(ctx), cancel.clone());

    let guard = cancel.drop_guard();
    let stream = ReceiverStream::new(rx).map(move |event| {
        let _guard = &guard;
        let data = serde_json::to_string(&event).unwrap_or_default();
        debug!(event = event.event_type(), "Streaming event");
        Ok(SseEvent::default().data(data))
    });

    Ok(Sse::new(stream))
}

// ── Chats ─────────────────────────────────────────────────────────────────

pub async fn list_chats_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<ChatListResponse>, ApiError> {
    let user_id = require_user(&headers)?;
    let chats = state.store.list_chats(&user_id).await.map_err(store_error)?;
    Ok(Json(ChatListResponse { chats }))
}

pub async fn create_chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Option<Json<CreateChatRequest>>,
) -> Result<(StatusCode, Json<Chat>), ApiError> {
    let user_id = require_user(&headers)?;
    let title = body
        .and_then(|Json(b)| b.title)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "New chat".to_string());

    let chat = state
        .store
        .create_chat(&user_id, &title)
        .await
        .map_err(store_error)?;
    info!(chat_id = %chat.id, "Chat created");
    Ok((StatusCode::CREATED, Json(chat)))
}

pub async fn last_message_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<LastMessageResponse>, ApiError> {
    let message = state.store.get_last_message(&id).await.map_err(store_error)?;
    Ok(Json(LastMessageResponse { message }))
}

// ── Tools ─────────────────────────────────────────────────────────────────

pub async fn list_tools_handler(State(state): State<SharedState>) -> Json<ToolListResponse> {
    let tools: Vec<ToolDto> = state
        .tools
        .definitions()
        .into_iter()
        .map(|d| ToolDto {
            name: d.name,
            description: d.description,
        })
        .collect();
    let count = tools.len();
    Json(ToolListResponse { tools, count })
}
