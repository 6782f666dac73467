//! User administration routes: `/api/admin/users/*`
//!
//! Admins manage accounts in their own tenant; super admins manage all.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keyhold_core::guard::Caller;
use keyhold_core::models::User;
use keyhold_core::user::{NewUser, UserPatch};

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", get(get_user).put(update_user))
        .route("/{id}/disable", post(disable_user))
        .route("/{id}/enable", post(enable_user))
        .route("/{id}/reset-password", post(reset_password))
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub tenant_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<User>,
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = state.users.create_user(&caller, body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<UserListResponse>, AppError> {
    let users = state.users.list_users(&caller, query.tenant_id).await?;
    Ok(Json(UserListResponse { users }))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.users.get_user(&caller, id).await?))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(body): Json<UserPatch>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.users.update_user(&caller, id, body).await?))
}

async fn disable_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.users.disable_user(&caller, id).await?))
}

async fn enable_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    Ok(Json(state.users.enable_user(&caller, id).await?))
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<User>, AppError> {
    Ok(Json(
        state
            .users
            .reset_password(&caller, id, &body.password)
            .await?,
    ))
}
