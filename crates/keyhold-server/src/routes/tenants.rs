//! Tenant routes: `/api/tenants/*`

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keyhold_core::error::ServiceError;
use keyhold_core::guard::Caller;
use keyhold_core::models::Tenant;
use keyhold_core::tenant::TenantPatch;

use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tenants).post(create_tenant))
        .route(
            "/{id}",
            get(get_tenant).put(update_tenant).delete(delete_tenant),
        )
}

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub name: String,
    pub slug: String,
}

/// Creating a tenant moves the caller into it, so a fresh token comes back
/// alongside the tenant.
#[derive(Debug, Serialize)]
pub struct CreateTenantResponse {
    pub tenant: Tenant,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct TenantListResponse {
    pub tenants: Vec<Tenant>,
}

async fn create_tenant(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<CreateTenantRequest>,
) -> Result<(StatusCode, Json<CreateTenantResponse>), AppError> {
    let tenant = state.tenants.create(&caller, &body.name, &body.slug).await?;

    let user = state
        .store
        .get_user(caller.user_id)
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| ServiceError::Unauthenticated {
            reason: "account no longer exists".to_owned(),
        })?;
    let token = state.auth.issue_token(&user)?;

    Ok((StatusCode::CREATED, Json(CreateTenantResponse { tenant, token })))
}

async fn list_tenants(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<TenantListResponse>, AppError> {
    let tenants = state.tenants.list(&caller).await?;
    Ok(Json(TenantListResponse { tenants }))
}

async fn get_tenant(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<Json<Tenant>, AppError> {
    Ok(Json(state.tenants.get(&caller, id).await?))
}

async fn update_tenant(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    Json(body): Json<TenantPatch>,
) -> Result<Json<Tenant>, AppError> {
    Ok(Json(state.tenants.update(&caller, id, body).await?))
}

async fn delete_tenant(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.tenants.delete(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
