use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::UpdateUserRequest;
use crate::{
    auth::{extractors::AuthUser, password::hash_password_blocking, policy::validate_password},
    db::{Post, User, UserChanges},
    error::AppError,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/posts", get(list_own_posts))
        .route("/users/:id", patch(update_user).delete(delete_user))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.store.list_users().await?))
}

#[instrument(skip(state, auth))]
pub async fn list_own_posts(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Post>>, AppError> {
    let posts = state.store.list_posts_by_user(auth.claims.user.id).await?;
    Ok(Json(posts))
}

#[instrument(skip(state, auth, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    let username = match payload.username.map(|u| u.trim().to_string()) {
        Some(u) if u.is_empty() => {
            return Err(AppError::Validation("Username is required".into()))
        }
        Some(u) => {
            if let Some(existing) = state.store.find_user_by_username(&u).await? {
                if existing.id != id {
                    return Err(AppError::Conflict("Username already registered".into()));
                }
            }
            Some(u)
        }
        None => None,
    };

    // the stored field only ever holds a hash
    let password_hash = match payload.password {
        Some(password) => {
            validate_password(&password)?;
            Some(hash_password_blocking(password).await?)
        }
        None => None,
    };

    let user = state
        .store
        .update_user(
            id,
            UserChanges {
                username,
                password_hash,
            },
        )
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    info!(user_id = %user.id, requested_by = %auth.claims.user.id, "user updated");
    Ok(Json(user))
}

#[instrument(skip(state, auth))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    let user = state
        .store
        .delete_user(id)
        .await?
        .ok_or(AppError::NotFound("User not found"))?;

    info!(user_id = %user.id, requested_by = %auth.claims.user.id, "user deleted");
    Ok(Json(user))
}
