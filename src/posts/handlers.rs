use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{CreatePostRequest, UpdatePostRequest},
    slug::create_slug,
};
use crate::{
    auth::extractors::AuthUser,
    db::{NewPost, Post, PostChanges, PostWithComments},
    error::AppError,
    state::AppState,
};

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/:id",
            get(get_post).patch(update_post).delete(delete_post),
        )
}

fn required_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".into()));
    }
    Ok(title.to_string())
}

#[instrument(skip(state))]
pub async fn list_posts(
    State(state): State<AppState>,
) -> Result<Json<Vec<PostWithComments>>, AppError> {
    Ok(Json(state.store.list_posts().await?))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PostWithComments>, AppError> {
    state
        .store
        .find_post(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Post not found"))
}

#[instrument(skip(state, auth, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    let title = required_title(&payload.title)?;
    let post = state
        .store
        .create_post(NewPost {
            user_id: auth.claims.user.id,
            slug: create_slug(&title),
            title,
        })
        .await?;

    info!(post_id = %post.id, user_id = %post.user_id, slug = %post.slug, "post created");
    Ok((StatusCode::CREATED, Json(post)))
}

#[instrument(skip(state, auth, payload))]
pub async fn update_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let changes = match payload.title {
        Some(title) => {
            let title = required_title(&title)?;
            PostChanges {
                slug: Some(create_slug(&title)),
                title: Some(title),
            }
        }
        None => PostChanges::default(),
    };

    let post = state
        .store
        .update_post(id, changes)
        .await?
        .ok_or(AppError::NotFound("Post not found"))?;

    info!(post_id = %post.id, requested_by = %auth.claims.user.id, "post updated");
    Ok(Json(post))
}

#[instrument(skip(state, auth))]
pub async fn delete_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Post>, AppError> {
    let post = state
        .store
        .delete_post(id)
        .await?
        .ok_or(AppError::NotFound("Post not found"))?;

    info!(post_id = %post.id, requested_by = %auth.claims.user.id, "post deleted");
    Ok(Json(post))
}
