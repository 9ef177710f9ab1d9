use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::debug;

use quizbank_db::Database;
use quizbank_types::api::{
    ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest, UserResponse,
};
use quizbank_types::auth::Principal;

use crate::error::ApiError;
use crate::password;
use crate::storage::AudioStore;
use crate::token::TokenService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
    pub audio: AudioStore,
}

// -- Core operations --

pub fn register_user(
    state: &AppStateInner,
    username: &str,
    plaintext: &str,
) -> Result<UserResponse, ApiError> {
    if username.is_empty() || plaintext.is_empty() {
        return Err(ApiError::Validation(
            "Username and password are required".to_string(),
        ));
    }

    let digest = password::hash(plaintext)?;

    // The UNIQUE constraint in the store is the real duplicate guard, so
    // two concurrent registrations cannot both win; DbError::Duplicate
    // maps straight to DuplicateUsername.
    let user = state.db.create_user(username, &digest)?;

    Ok(UserResponse {
        id: user.id,
        username: user.username,
    })
}

pub fn login_user(
    state: &AppStateInner,
    username: &str,
    plaintext: &str,
) -> Result<LoginResponse, ApiError> {
    // Unknown username and wrong password produce the same error — no
    // signal about which half failed.
    let user = state
        .db
        .get_user_by_username(username)?
        .ok_or(ApiError::InvalidCredentials)?;

    if !password::verify(plaintext, &user.password) {
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.tokens.issue(user.id, &user.username)?;

    Ok(LoginResponse {
        user: UserResponse {
            id: user.id,
            username: user.username,
        },
        token,
    })
}

pub fn change_password(
    state: &AppStateInner,
    user_id: i64,
    current: &str,
    new: &str,
) -> Result<UserResponse, ApiError> {
    if new.is_empty() {
        return Err(ApiError::Validation("New password is required".to_string()));
    }

    let user = state
        .db
        .get_user_by_id(user_id)?
        .ok_or(ApiError::NotFound)?;

    if !password::verify(current, &user.password) {
        return Err(ApiError::WrongCurrentPassword);
    }

    let digest = password::hash(new)?;
    state.db.update_password_hash(user.id, &digest)?;

    Ok(UserResponse {
        id: user.id,
        username: user.username,
    })
}

/// Resolve a bearer credential to its principal.
///
/// The credential is accepted from the Authorization header value only —
/// never from a query string or request body. Any failure (missing
/// header, bad token, user deleted since issuance) collapses to one
/// `Unauthenticated`; the reason is logged at debug level.
pub fn authenticate(
    state: &AppStateInner,
    authorization: Option<&str>,
) -> Result<Principal, ApiError> {
    let header = authorization.ok_or(ApiError::Unauthenticated)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthenticated)?;

    let claims = state.tokens.verify(token).map_err(|e| {
        debug!("Token rejected: {e}");
        ApiError::Unauthenticated
    })?;

    let user = state
        .db
        .get_user_by_id(claims.sub)?
        .ok_or_else(|| {
            debug!("Principal {} gone after token issuance", claims.sub);
            ApiError::Unauthenticated
        })?;

    Ok(Principal {
        id: user.id,
        username: user.username,
    })
}

// -- Handlers --

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = register_user(&state, &req.username, &req.password)?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = login_user(&state, &req.username, &req.password)?;
    Ok(Json(resp))
}

pub async fn change_password_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = change_password(
        &state,
        principal.id,
        &req.current_password,
        &req.new_password,
    )?;
    Ok(Json(user))
}

pub async fn me(Extension(principal): Extension<Principal>) -> Json<UserResponse> {
    Json(UserResponse {
        id: principal.id,
        username: principal.username,
    })
}
