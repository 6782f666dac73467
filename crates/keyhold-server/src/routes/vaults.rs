//! Vault and membership routes: `/api/vaults/*`

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keyhold_core::guard::Caller;
use keyhold_core::models::{Membership, NewVault, Vault, VaultDetails, VaultPatch};

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_vaults).post(create_vault))
        .route(
            "/{id}",
            get(get_vault).put(update_vault).delete(delete_vault),
        )
        .route("/{id}/members", post(add_member))
        .route("/{id}/members/{user_id}", delete(remove_member))
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct VaultListResponse {
    pub vaults: Vec<Vault>,
}

async fn create_vault(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<NewVault>,
) -> Result<(StatusCode, Json<Vault>), AppError> {
    let vault = state.vaults.create(&caller, body).await?;
    Ok((StatusCode::CREATED, Json(vault)))
}

async fn list_vaults(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<VaultListResponse>, AppError> {
    let vaults = state.vaults.list(&caller).await?;
    Ok(Json(VaultListResponse { vaults }))
}

async fn get_vault(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<VaultDetails>, AppError> {
    Ok(Json(state.vaults.get(&caller, id).await?))
}

async fn update_vault(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(body): Json<VaultPatch>,
) -> Result<Json<Vault>, AppError> {
    Ok(Json(state.vaults.update(&caller, id, body).await?))
}

async fn delete_vault(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.vaults.delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Grant or change a member's role. Idempotent.
async fn add_member(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(body): Json<AddMemberRequest>,
) -> Result<Json<Membership>, AppError> {
    let membership = state
        .vaults
        .add_member(&caller, id, body.user_id, &body.role)
        .await?;
    Ok(Json(membership))
}

async fn remove_member(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state.vaults.remove_member(&caller, id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
