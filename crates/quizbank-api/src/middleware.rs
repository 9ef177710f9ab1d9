use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::auth::{self, AppState};
use crate::error::ApiError;

/// Auth gate for mutating routes.
///
/// Extracts the bearer credential from the Authorization header only,
/// verifies it, resolves the principal, and short-circuits with a uniform
/// 401 on any failure — downstream handlers never run unauthenticated.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let principal = auth::authenticate(&state, authorization)?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
