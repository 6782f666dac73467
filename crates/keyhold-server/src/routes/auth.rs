//! Authentication routes: `/api/auth/*`
//!
//! Registration and login are public; `me` and `salt` need a bearer token.
//! OAuth sign-in is called by the service that completed the provider
//! handshake and must present the shared bridge secret.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use keyhold_core::auth::{OAuthProfile, Registration, Session};
use keyhold_core::guard::Caller;
use keyhold_core::models::User;

use crate::error::AppError;
use crate::state::AppState;

/// Unauthenticated routes.
pub fn login_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/oauth", post(oauth_login))
}

/// Header carrying the OAuth bridge secret.
pub const OAUTH_BRIDGE_HEADER: &str = "x-keyhold-bridge-secret";

/// Routes behind the auth middleware.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(me))
        .route("/salt", get(salt))
}

// ── Request / Response types ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SaltResponse {
    pub salt: String,
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Registration>,
) -> Result<(StatusCode, Json<Session>), AppError> {
    let session = state.auth.register(body).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Session>, AppError> {
    Ok(Json(state.auth.login(&body.email, &body.password).await?))
}

/// Sign in with an identity the provider has already verified.
async fn oauth_login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<OAuthProfile>,
) -> Result<Json<Session>, AppError> {
    let Some(expected) = state.oauth_bridge_secret.as_deref() else {
        return Err(AppError::Unauthorized("OAuth sign-in is not enabled".to_owned()));
    };
    let presented = headers
        .get(OAUTH_BRIDGE_HEADER)
        .map(axum::http::HeaderValue::as_bytes)
        .unwrap_or_default();
    if !bool::from(presented.ct_eq(expected.as_bytes())) {
        tracing::warn!(provider = %body.provider, "oauth sign-in with bad bridge secret");
        return Err(AppError::Unauthorized("invalid bridge secret".to_owned()));
    }
    Ok(Json(state.auth.oauth_login(body).await?))
}

/// The account behind the bearer token, as loaded by the middleware.
async fn me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

/// Master-key salt for client-side key derivation.
async fn salt(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<SaltResponse>, AppError> {
    let salt = state.auth.salt(&caller).await?;
    Ok(Json(SaltResponse { salt }))
}
