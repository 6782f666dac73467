//! Credential routes: `/api/vaults/{id}/credentials/*` and
//! `/api/credentials/search`.
//!
//! Credential payloads are ciphertext produced by the client and pass
//! through untouched.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keyhold_core::guard::Caller;
use keyhold_core::models::{Credential, CredentialPatch, NewCredential};

use crate::error::AppError;
use crate::state::AppState;

/// Routes nested under `/api/vaults`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/{id}/credentials",
            get(list_credentials).post(create_credential),
        )
        .route(
            "/{id}/credentials/{credential_id}",
            get(get_credential)
                .put(update_credential)
                .delete(delete_credential),
        )
}

/// Routes nested under `/api/credentials`.
pub fn search_router() -> Router<Arc<AppState>> {
    Router::new().route("/search", get(search))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct CredentialListResponse {
    pub credentials: Vec<Credential>,
}

async fn create_credential(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(vault_id): Path<Uuid>,
    Json(body): Json<NewCredential>,
) -> Result<(StatusCode, Json<Credential>), AppError> {
    let credential = state.credentials.create(&caller, vault_id, body).await?;
    Ok((StatusCode::CREATED, Json(credential)))
}

async fn list_credentials(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(vault_id): Path<Uuid>,
) -> Result<Json<CredentialListResponse>, AppError> {
    let credentials = state.credentials.list(&caller, vault_id).await?;
    Ok(Json(CredentialListResponse { credentials }))
}

async fn get_credential(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path((vault_id, credential_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Credential>, AppError> {
    Ok(Json(
        state
            .credentials
            .get(&caller, vault_id, credential_id)
            .await?,
    ))
}

async fn update_credential(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path((vault_id, credential_id)): Path<(Uuid, Uuid)>,
    Json(body): Json<CredentialPatch>,
) -> Result<Json<Credential>, AppError> {
    Ok(Json(
        state
            .credentials
            .update(&caller, vault_id, credential_id, body)
            .await?,
    ))
}

async fn delete_credential(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path((vault_id, credential_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .credentials
        .delete(&caller, vault_id, credential_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Match `q` against category and favicon across the caller's vaults.
async fn search(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<CredentialListResponse>, AppError> {
    let credentials = state.credentials.search(&caller, &query.q).await?;
    Ok(Json(CredentialListResponse { credentials }))
}
