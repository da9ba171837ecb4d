use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::messaging::{MarkReadResponse, SendMessageRequest};
use crate::error::Result;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

/// Persists a message to a recipient. This is the durable half of the dual
/// delivery path; the realtime push goes over the relay socket separately and
/// the two are not atomic.
///
/// # Errors
/// Returns `AppError::BadRequest` if the recipient equals the sender or the
/// content is empty.
pub async fn send_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(recipient_id): Path<i64>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    let message = state.message_service.send(auth_user.user_id, recipient_id, req.content).await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Marks every unread message from `peerId` to the caller as read. Idempotent;
/// read receipts never reverse.
///
/// # Errors
/// Returns `AppError::Database` on storage failure.
pub async fn mark_read(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(peer_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let updated = state.message_service.mark_read(auth_user.user_id, peer_id).await?;

    Ok(Json(MarkReadResponse { updated }))
}

/// Lists the caller's conversation with `peerId`, oldest first.
///
/// # Errors
/// Returns `AppError::Database` on storage failure.
pub async fn list_messages(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(peer_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let messages = state.message_service.conversation(auth_user.user_id, peer_id).await?;

    Ok(Json(messages))
}

/// Lists the caller's conversations, most recent first.
///
/// # Errors
/// Returns `AppError::Database` on storage failure.
pub async fn list_conversations(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse> {
    let conversations = state.message_service.conversations(auth_user.user_id).await?;

    Ok(Json(conversations))
}
