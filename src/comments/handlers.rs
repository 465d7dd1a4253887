use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{CreateCommentRequest, UpdateCommentRequest};
use crate::{
    auth::extractors::AuthUser,
    db::{Comment, CommentChanges, CommentWithPost, NewComment},
    error::AppError,
    state::AppState,
};

pub fn comment_routes() -> Router<AppState> {
    Router::new()
        .route("/comments", get(list_comments).post(create_comment))
        .route(
            "/comments/:id",
            get(get_comment).patch(update_comment).delete(delete_comment),
        )
}

fn required_text(text: &str) -> Result<String, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("Text is required".into()));
    }
    Ok(text.to_string())
}

#[instrument(skip(state))]
pub async fn list_comments(State(state): State<AppState>) -> Result<Json<Vec<Comment>>, AppError> {
    Ok(Json(state.store.list_comments().await?))
}

#[instrument(skip(state))]
pub async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CommentWithPost>, AppError> {
    state
        .store
        .find_comment(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Comment not found"))
}

#[instrument(skip(state, auth, payload))]
pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let text = required_text(&payload.text)?;

    if state.store.find_post(payload.post_id).await?.is_none() {
        warn!(post_id = %payload.post_id, "comment on unknown post");
        return Err(AppError::NotFound("Post not found"));
    }

    let comment = state
        .store
        .create_comment(NewComment {
            user_id: Some(auth.claims.user.id),
            post_id: payload.post_id,
            text,
        })
        .await?;

    info!(comment_id = %comment.id, post_id = %comment.post_id, "comment created");
    Ok((StatusCode::CREATED, Json(comment)))
}

#[instrument(skip(state, auth, payload))]
pub async fn update_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<Json<Comment>, AppError> {
    let text = payload.text.as_deref().map(required_text).transpose()?;

    let comment = state
        .store
        .update_comment(id, CommentChanges { text })
        .await?
        .ok_or(AppError::NotFound("Comment not found"))?;

    info!(comment_id = %comment.id, requested_by = %auth.claims.user.id, "comment updated");
    Ok(Json(comment))
}

#[instrument(skip(state, auth))]
pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Comment>, AppError> {
    let comment = state
        .store
        .delete_comment(id)
        .await?
        .ok_or(AppError::NotFound("Comment not found"))?;

    info!(comment_id = %comment.id, requested_by = %auth.claims.user.id, "comment deleted");
    Ok(Json(comment))
}
