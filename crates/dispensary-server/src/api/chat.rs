//! Live chat handlers.
//!
//! Every conversation-scoped route re-reads the conversation and checks that
//! the caller owns it or is an admin before doing anything else. Clients poll
//! `GET …/messages?after_id=` for new messages.

use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use dispensary_core::{wants_recommendation, AgentStatus, SenderType, SYSTEM_SENDER_ID};
use dispensary_db::{ChatMessageRow, ConversationRow, DbError};
use serde::{Deserialize, Serialize};

use crate::middleware::{AdminUser, AuthUser, CurrentUser, RequestId};

use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::{map_db_error, ApiError, ApiResponse, AppState};

// ---------------------------------------------------------------------------
// Request and response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct StartConversationRequest {
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SendMessageRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct MessagesQuery {
    pub after_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct AssignRequest {
    pub agent_id: i64,
}

#[derive(Debug, Deserialize)]
pub(super) struct AgentStatusRequest {
    pub status: AgentStatus,
}

#[derive(Debug, Serialize)]
pub(super) struct ConversationItem {
    id: i64,
    user_id: i64,
    agent_id: Option<i64>,
    status: String,
    subject: Option<String>,
    started_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl From<ConversationRow> for ConversationItem {
    fn from(row: ConversationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            agent_id: row.agent_id,
            status: row.status,
            subject: row.subject,
            started_at: row.started_at,
            closed_at: row.closed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct MessageItem {
    id: i64,
    conversation_id: i64,
    sender_id: i64,
    sender_type: String,
    message: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl From<ChatMessageRow> for MessageItem {
    fn from(row: ChatMessageRow) -> Self {
        Self {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            sender_type: row.sender_type,
            message: row.message,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct SentMessageItem {
    message_id: i64,
    message: MessageItem,
    auto_reply: Option<MessageItem>,
}

#[derive(Debug, Serialize)]
pub(super) struct AgentItem {
    id: i64,
    user_id: i64,
    display_name: String,
    status: String,
}

impl From<dispensary_db::ChatAgentRow> for AgentItem {
    fn from(row: dispensary_db::ChatAgentRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            display_name: row.display_name,
            status: row.status,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct MarkedReadItem {
    updated: u64,
}

#[derive(Debug, Serialize)]
pub(super) struct SuccessItem {
    success: bool,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Loads a conversation and enforces owner-or-admin access.
async fn authorize_conversation(
    state: &AppState,
    request_id: &str,
    conversation_id: i64,
    user: &CurrentUser,
) -> Result<ConversationRow, ApiError> {
    let conversation = dispensary_db::get_conversation(&state.pool, conversation_id)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))?
        .ok_or_else(|| ApiError::new(request_id, "not_found", "Conversation not found"))?;

    if conversation.user_id != user.id && !user.is_admin() {
        return Err(ApiError::new(request_id, "forbidden", "Access denied"));
    }

    Ok(conversation)
}

fn map_transition_error(request_id: &str, error: &DbError) -> ApiError {
    match error {
        DbError::InvalidConversationTransition { .. } => {
            ApiError::new(request_id, "bad_request", "Conversation is closed")
        }
        other => map_db_error(request_id.to_owned(), other),
    }
}

/// Asks the assistant for a reply and stores it as a system message.
///
/// Failures are logged and swallowed: the customer's message is already
/// committed and the send must still succeed.
async fn generate_auto_reply(
    state: &AppState,
    conversation_id: i64,
    text: &str,
) -> Option<MessageItem> {
    let assistant = state.assistant.as_ref()?;

    let reply = match tokio::time::timeout(assistant.timeout(), assistant.recommend(text)).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(e)) => {
            tracing::warn!(conversation_id, error = %e, "assistant reply failed");
            return None;
        }
        Err(_) => {
            tracing::warn!(conversation_id, "assistant reply timed out");
            return None;
        }
    };

    match dispensary_db::insert_chat_message(
        &state.pool,
        conversation_id,
        SYSTEM_SENDER_ID,
        SenderType::Agent,
        &reply,
    )
    .await
    {
        Ok(row) => Some(MessageItem::from(row)),
        Err(e) => {
            tracing::warn!(conversation_id, error = %e, "failed to store assistant reply");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Customer handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/chat/conversations — the caller's open conversation, created
/// on first use.
pub(super) async fn start_conversation(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<StartConversationRequest>,
) -> Result<Json<ApiResponse<ConversationItem>>, ApiError> {
    let subject = body
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let row = dispensary_db::get_or_create_conversation(&state.pool, user.id, subject)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(ConversationItem::from(row), req_id)))
}

/// GET /api/v1/chat/conversations — all of the caller's conversations.
pub(super) async fn list_conversations(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    AuthUser(user): AuthUser,
) -> Result<Json<ApiResponse<Vec<ConversationItem>>>, ApiError> {
    let rows = dispensary_db::list_user_conversations(&state.pool, user.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        rows.into_iter().map(ConversationItem::from).collect(),
        req_id,
    )))
}

/// GET /api/v1/chat/conversations/{id}/messages?after_id=
pub(super) async fn list_messages(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    AuthUser(user): AuthUser,
    ApiPath(conversation_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<MessagesQuery>,
) -> Result<Json<ApiResponse<Vec<MessageItem>>>, ApiError> {
    authorize_conversation(&state, &req_id.0, conversation_id, &user).await?;

    let rows =
        dispensary_db::list_conversation_messages(&state.pool, conversation_id, query.after_id)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        rows.into_iter().map(MessageItem::from).collect(),
        req_id,
    )))
}

/// POST /api/v1/chat/conversations/{id}/messages
///
/// The message is stored as sent, before any assistant call. Customer messages that
/// ask for recommendations may get a second, automated message.
pub(super) async fn send_message(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    AuthUser(user): AuthUser,
    ApiPath(conversation_id): ApiPath<i64>,
    ApiJson(body): ApiJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SentMessageItem>>), ApiError> {
    let text = body.message.as_str();
    if text.trim().is_empty() {
        return Err(ApiError::new(
            &req_id.0,
            "validation_error",
            "message must not be empty",
        ));
    }

    let conversation = authorize_conversation(&state, &req_id.0, conversation_id, &user).await?;
    if conversation.status == dispensary_core::ConversationStatus::Closed.as_str() {
        return Err(ApiError::new(
            &req_id.0,
            "bad_request",
            "Conversation is closed",
        ));
    }

    let sender_type = if conversation.user_id == user.id {
        SenderType::Customer
    } else {
        SenderType::Agent
    };

    let row =
        dispensary_db::insert_chat_message(&state.pool, conversation.id, user.id, sender_type, text)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let auto_reply = if sender_type == SenderType::Customer && wants_recommendation(text) {
        generate_auto_reply(&state, conversation.id, text).await
    } else {
        None
    };

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(
            SentMessageItem {
                message_id: row.id,
                message: MessageItem::from(row),
                auto_reply,
            },
            req_id,
        )),
    ))
}

/// POST /api/v1/chat/conversations/{id}/close
pub(super) async fn close_conversation(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    AuthUser(user): AuthUser,
    ApiPath(conversation_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<SuccessItem>>, ApiError> {
    authorize_conversation(&state, &req_id.0, conversation_id, &user).await?;

    dispensary_db::close_conversation(&state.pool, conversation_id)
        .await
        .map_err(|e| map_transition_error(&req_id.0, &e))?;

    Ok(Json(ApiResponse::new(SuccessItem { success: true }, req_id)))
}

/// POST /api/v1/chat/conversations/{id}/read — marks the other party's
/// messages as read.
pub(super) async fn mark_as_read(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    AuthUser(user): AuthUser,
    ApiPath(conversation_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<MarkedReadItem>>, ApiError> {
    authorize_conversation(&state, &req_id.0, conversation_id, &user).await?;

    let updated = dispensary_db::mark_messages_read(&state.pool, conversation_id, user.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(MarkedReadItem { updated }, req_id)))
}

// ---------------------------------------------------------------------------
// Agent and admin handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/chat/conversations/active — admin console queue.
pub(super) async fn list_active_conversations(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<ApiResponse<Vec<ConversationItem>>>, ApiError> {
    let rows = dispensary_db::list_open_conversations(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        rows.into_iter().map(ConversationItem::from).collect(),
        req_id,
    )))
}

/// POST /api/v1/chat/conversations/{id}/assign
pub(super) async fn assign_conversation(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    AdminUser(admin): AdminUser,
    ApiPath(conversation_id): ApiPath<i64>,
    ApiJson(body): ApiJson<AssignRequest>,
) -> Result<Json<ApiResponse<ConversationItem>>, ApiError> {
    authorize_conversation(&state, &req_id.0, conversation_id, &admin).await?;

    let row = dispensary_db::assign_conversation(&state.pool, conversation_id, body.agent_id)
        .await
        .map_err(|e| map_transition_error(&req_id.0, &e))?;

    tracing::info!(conversation_id, agent_id = body.agent_id, "conversation assigned");
    Ok(Json(ApiResponse::new(ConversationItem::from(row), req_id)))
}

/// PUT /api/v1/chat/agents/status — presence for the caller's agent record.
pub(super) async fn update_agent_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<AgentStatusRequest>,
) -> Result<Json<ApiResponse<AgentItem>>, ApiError> {
    let row = dispensary_db::update_agent_status(&state.pool, user.id, body.status)
        .await
        .map_err(|e| match e {
            DbError::NotFound => ApiError::new(&req_id.0, "not_found", "Agent not found"),
            other => map_db_error(req_id.0.clone(), &other),
        })?;

    Ok(Json(ApiResponse::new(AgentItem::from(row), req_id)))
}

/// GET /api/v1/chat/agents/online — public.
pub(super) async fn list_online_agents(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<AgentItem>>>, ApiError> {
    let rows = dispensary_db::list_online_agents(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        rows.into_iter().map(AgentItem::from).collect(),
        req_id,
    )))
}
