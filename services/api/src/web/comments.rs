//! services/api/src/web/comments.rs
//!
//! The comment-board endpoints: reading a book's thread, publishing, the
//! edit/save/cancel flow, and moderation deletes. Permission predicates are
//! enforced here (via the core workflow) on every mutation, never just at
//! render time.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::AuthedSession;
use crate::web::state::AppState;
use bookcorner_core::domain::Comment;
use bookcorner_core::ports::PortError;
use bookcorner_core::workflow;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// One comment as served to clients.
#[derive(Serialize, ToSchema)]
pub struct CommentDto {
    pub id: Uuid,
    pub book_title: String,
    pub author_nickname: String,
    pub text: String,
    pub edited: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    /// Whether the requesting viewer may edit/delete this comment. Purely a
    /// rendering hint; the server re-checks on every mutation.
    pub can_modify: bool,
}

impl CommentDto {
    fn new(comment: Comment, can_modify: bool) -> Self {
        CommentDto {
            id: comment.id,
            book_title: comment.book_title,
            author_nickname: comment.author_nickname,
            text: comment.text,
            edited: comment.edited,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            can_modify,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct PostCommentRequest {
    pub text: String,
}

#[derive(Deserialize, ToSchema)]
pub struct SaveCommentRequest {
    pub text: String,
}

/// Returned when entering the edit flow: the buffer to pre-fill.
#[derive(Serialize, ToSchema)]
pub struct EditBufferResponse {
    pub comment_id: Uuid,
    pub text: String,
}

/// Maps a workflow error onto the HTTP surface.
fn port_error_response(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(what) => (StatusCode::NOT_FOUND, what),
        PortError::Unauthorized => (
            StatusCode::FORBIDDEN,
            "You are not allowed to do that".to_string(),
        ),
        PortError::Invalid(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
        PortError::Conflict(what) => (StatusCode::CONFLICT, what),
        PortError::Unavailable(msg) => {
            error!("Comment store unavailable: {msg}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "The comment board is temporarily unavailable".to_string(),
            )
        }
        PortError::Unexpected(msg) => {
            error!("Unexpected comment store error: {msg}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong".to_string(),
            )
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// The thread for one book, oldest first. Public: guests read too. An
/// unreachable store degrades to an empty thread rather than an error.
#[utoipa::path(
    get,
    path = "/books/{title}/comments",
    params(("title" = String, Path, description = "Exact book title")),
    responses((status = 200, description = "The thread, oldest first", body = [CommentDto]))
)]
pub async fn list_comments_handler(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedSession>,
    Path(title): Path<String>,
) -> Json<Vec<CommentDto>> {
    let thread = match state.comments.list_for_book(&title).await {
        Ok(thread) => thread,
        Err(e) => {
            warn!("Comment thread for '{title}' unavailable, serving empty: {e}");
            Vec::new()
        }
    };
    let viewer = &authed.viewer;
    Json(
        thread
            .into_iter()
            .map(|c| {
                let can_modify = bookcorner_core::permissions::can_edit(viewer, &c);
                CommentDto::new(c, can_modify)
            })
            .collect(),
    )
}

/// Publish a new comment under the session's identity.
#[utoipa::path(
    post,
    path = "/books/{title}/comments",
    params(("title" = String, Path, description = "Exact book title")),
    request_body = PostCommentRequest,
    responses(
        (status = 201, description = "Comment published", body = CommentDto),
        (status = 403, description = "Guests may not post"),
        (status = 422, description = "Empty comment")
    )
)]
pub async fn post_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedSession>,
    Path(title): Path<String>,
    Json(req): Json<PostCommentRequest>,
) -> Result<(StatusCode, Json<CommentDto>), (StatusCode, String)> {
    let comment =
        workflow::post_comment(state.comments.as_ref(), &authed.viewer, &title, &req.text)
            .await
            .map_err(port_error_response)?;
    Ok((StatusCode::CREATED, Json(CommentDto::new(comment, true))))
}

/// Enter the edit flow on a comment. Any edit the session already had
/// pending is discarded; the response carries the buffer to pre-fill.
#[utoipa::path(
    post,
    path = "/comments/{id}/edit",
    params(("id" = Uuid, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Editing; buffer pre-filled", body = EditBufferResponse),
        (status = 403, description = "Not the author and not staff"),
        (status = 404, description = "No such comment")
    )
)]
pub async fn begin_edit_handler(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedSession>,
    Path(id): Path<Uuid>,
) -> Result<Json<EditBufferResponse>, (StatusCode, String)> {
    let comment = workflow::begin_edit(state.comments.as_ref(), &authed.viewer, id)
        .await
        .map_err(port_error_response)?;
    state
        .sessions
        .with(&authed.session_id, |s| {
            s.compose.begin_edit(comment.id, &comment.text);
        })
        .await;
    Ok(Json(EditBufferResponse {
        comment_id: comment.id,
        text: comment.text,
    }))
}

/// Save the pending edit: in-place overwrite, refreshed timestamp, edited
/// flag. The session must actually hold an edit on this comment.
#[utoipa::path(
    put,
    path = "/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment id")),
    request_body = SaveCommentRequest,
    responses(
        (status = 200, description = "Saved", body = CommentDto),
        (status = 403, description = "Not the author and not staff"),
        (status = 404, description = "No such comment"),
        (status = 409, description = "No pending edit on this comment"),
        (status = 422, description = "Empty text")
    )
)]
pub async fn save_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedSession>,
    Path(id): Path<Uuid>,
    Json(req): Json<SaveCommentRequest>,
) -> Result<Json<CommentDto>, (StatusCode, String)> {
    let pending = state
        .sessions
        .with(&authed.session_id, |s| s.compose.editing_target())
        .await;
    if pending != Some(id) {
        return Err((
            StatusCode::CONFLICT,
            "No pending edit on this comment".to_string(),
        ));
    }

    let comment = workflow::save_edit(state.comments.as_ref(), &authed.viewer, id, &req.text)
        .await
        .map_err(port_error_response)?;

    // Only leave the editing state once the write actually happened.
    state
        .sessions
        .with(&authed.session_id, |s| s.compose.finish_edit(id))
        .await;
    Ok(Json(CommentDto::new(comment, true)))
}

/// Cancel the pending edit. Discards the buffer, persists nothing, and is
/// harmless when no edit is pending.
#[utoipa::path(
    post,
    path = "/comments/{id}/cancel",
    params(("id" = Uuid, Path, description = "Comment id")),
    responses((status = 204, description = "Back to idle, nothing persisted"))
)]
pub async fn cancel_edit_handler(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedSession>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    state
        .sessions
        .with(&authed.session_id, |s| {
            if s.compose.editing_target() == Some(id) {
                s.compose.cancel();
            }
        })
        .await;
    StatusCode::NO_CONTENT
}

/// Delete a comment. No confirmation, no undo, no soft-delete; deleting a
/// comment that is already gone succeeds.
#[utoipa::path(
    delete,
    path = "/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment id")),
    responses(
        (status = 204, description = "Deleted (or already gone)"),
        (status = 403, description = "Not the author and not staff")
    )
)]
pub async fn delete_comment_handler(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedSession>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    workflow::delete_comment(state.comments.as_ref(), &authed.viewer, id)
        .await
        .map_err(port_error_response)?;
    // A pending edit on the deleted comment has nothing left to save.
    state
        .sessions
        .with(&authed.session_id, |s| {
            if s.compose.editing_target() == Some(id) {
                s.compose.cancel();
            }
        })
        .await;
    Ok(StatusCode::NO_CONTENT)
}
