use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        claims::TokenUser,
        dto::{LoginRequest, RegisterRequest, TokenResponse},
        jwt::JwtKeys,
        password::{hash_password_blocking, verify_password_blocking},
        policy::{is_valid_email, validate_password},
    },
    db::{NewUser, User},
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    payload.username = payload.username.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    if payload.username.is_empty() {
        return Err(AppError::Validation("Username is required".into()));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    validate_password(&payload.password)?;
    if payload.password != payload.confirm_password {
        return Err(AppError::PasswordMismatch);
    }

    if state
        .store
        .find_user_by_username(&payload.username)
        .await?
        .is_some()
    {
        warn!(username = %payload.username, "username already registered");
        return Err(AppError::Conflict("Username already registered".into()));
    }
    if state.store.find_user_by_email(&payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password_blocking(payload.password).await?;

    let user = state
        .store
        .create_user(NewUser {
            username: payload.username,
            email: payload.email,
            password_hash,
        })
        .await
        .map_err(|e| {
            let err = AppError::from(e);
            match &err {
                AppError::Conflict(reason) => warn!(%reason, "concurrent registration lost"),
                _ => error!(error = %err, "create user failed"),
            }
            err
        })?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), AppError> {
    let username = payload.username.trim();

    let user = match state.store.find_user_by_username(username).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(username = %username, "login unknown username");
            return Err(AppError::UserNotRegistered);
        }
        Err(e) => {
            error!(error = %e, "find_user_by_username failed");
            return Err(e.into());
        }
    };

    let ok = verify_password_blocking(payload.password, user.password_hash.clone()).await?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::VerifyMismatch);
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(&TokenUser::from(&user))?;

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}
