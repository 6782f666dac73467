//! Bearer-token authentication middleware.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AppError;
use crate::state::AppState;

/// Resolve `Authorization: Bearer <token>` to the calling account.
///
/// Injects the [`Caller`](keyhold_core::guard::Caller) and the current
/// [`User`](keyhold_core::models::User) into request extensions.
///
/// # Errors
///
/// Returns 401 if the header is missing or malformed, the token is invalid
/// or expired, or the account is gone or not active.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing Authorization header".to_owned()))?;

    let token = header.strip_prefix("Bearer ").ok_or_else(|| {
        AppError::Unauthorized("Authorization header must use Bearer scheme".to_owned())
    })?;

    let (caller, user) = state.auth.authenticate(token.trim()).await?;
    req.extensions_mut().insert(caller);
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
