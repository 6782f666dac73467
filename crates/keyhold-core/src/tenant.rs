//! Tenant service.
//!
//! Any active user may open a new tenant, which moves them into it. Reading
//! a tenant requires belonging to it; renaming or deleting it requires being
//! its admin. Super admins see and manage every tenant.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{Resource, ServiceError};
use crate::guard::{Caller, DenyReason, Guard};
use crate::models::Tenant;
use crate::store::Store;

/// Longest accepted tenant slug.
pub const MAX_SLUG_LEN: usize = 64;

/// Partial tenant update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenantPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
}

/// Lowercase and validate a caller-supplied slug.
///
/// # Errors
///
/// [`ServiceError::InvalidInput`] unless the result is 1-64 characters of
/// `a-z`, `0-9`, and `-`.
pub fn normalize_slug(raw: &str) -> Result<String, ServiceError> {
    let slug = raw.trim().to_lowercase();
    if slug.is_empty() || slug.len() > MAX_SLUG_LEN {
        return Err(ServiceError::invalid_input(format!(
            "slug must be 1-{MAX_SLUG_LEN} characters"
        )));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ServiceError::invalid_input(
            "slug may only contain a-z, 0-9, and '-'",
        ));
    }
    Ok(slug)
}

/// Derive a valid slug from free text: lowercase, runs of anything that is
/// not `a-z0-9` collapse to one `-`, truncated to the maximum length.
pub(crate) fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    let mut slug: String = slug.chars().take(MAX_SLUG_LEN).collect();
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("tenant");
    }
    slug
}

fn require_name(name: &str) -> Result<String, ServiceError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::invalid_input("name is required"));
    }
    Ok(name.to_owned())
}

/// Tenant management.
#[derive(Clone)]
pub struct TenantService {
    store: Arc<dyn Store>,
    guard: Guard,
}

impl std::fmt::Debug for TenantService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantService").finish_non_exhaustive()
    }
}

impl TenantService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        let guard = Guard::new(Arc::clone(&store));
        Self { store, guard }
    }

    /// Create a tenant and move the caller into it.
    ///
    /// The slug is checked for uniqueness right before the write, and the
    /// write itself is one atomic store operation, so a concurrent create
    /// with the same slug surfaces as [`ServiceError::Conflict`].
    ///
    /// # Errors
    ///
    /// [`ServiceError::InvalidInput`] for a blank name or malformed slug,
    /// [`ServiceError::Conflict`] when the slug is taken.
    pub async fn create(&self, caller: &Caller, name: &str, slug: &str) -> Result<Tenant, ServiceError> {
        let actor = self.guard.actor(caller).await?;
        let name = require_name(name)?;
        let slug = normalize_slug(slug)?;

        if self.store.get_tenant_by_slug(&slug).await?.is_some() {
            return Err(ServiceError::conflict(format!("slug '{slug}' is already taken")));
        }

        let tenant = Tenant::new(&name, &slug);
        self.store.create_tenant_for_user(&tenant, actor.id).await?;

        info!(tenant_id = %tenant.id, slug = %tenant.slug, user_id = %actor.id, "tenant created");
        Ok(tenant)
    }

    /// # Errors
    ///
    /// [`ServiceError::NotFound`] if missing, [`ServiceError::AccessDenied`]
    /// if the caller belongs to another tenant and is not a super admin.
    pub async fn get(&self, caller: &Caller, id: Uuid) -> Result<Tenant, ServiceError> {
        let actor = self.guard.actor(caller).await?;
        let tenant = self.load(id).await?;
        if actor.tenant_id != tenant.id && !actor.role.is_super_admin() {
            return Err(ServiceError::AccessDenied {
                reason: DenyReason::OutsideTenant,
            });
        }
        Ok(tenant)
    }

    /// Every tenant for a super admin, otherwise just the caller's own.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn list(&self, caller: &Caller) -> Result<Vec<Tenant>, ServiceError> {
        let actor = self.guard.actor(caller).await?;
        if actor.role.is_super_admin() {
            return Ok(self.store.list_tenants().await?);
        }
        Ok(self.store.get_tenant(actor.tenant_id).await?.into_iter().collect())
    }

    /// # Errors
    ///
    /// [`ServiceError::NotFound`], [`ServiceError::AccessDenied`] for
    /// non-admins or other tenants, [`ServiceError::Conflict`] when the new
    /// slug belongs to another tenant.
    pub async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        patch: TenantPatch,
    ) -> Result<Tenant, ServiceError> {
        let actor = self.guard.actor(caller).await?;
        let mut tenant = self.load(id).await?;
        Guard::tenant_admin(&actor, tenant.id).require()?;

        if let Some(name) = patch.name {
            tenant.name = require_name(&name)?;
        }
        if let Some(slug) = patch.slug {
            let slug = normalize_slug(&slug)?;
            let taken = self
                .store
                .get_tenant_by_slug(&slug)
                .await?
                .is_some_and(|existing| existing.id != tenant.id);
            if taken {
                return Err(ServiceError::conflict(format!("slug '{slug}' is already taken")));
            }
            tenant.slug = slug;
        }
        tenant.updated_at = Utc::now();
        self.store.update_tenant(&tenant).await?;

        info!(tenant_id = %tenant.id, actor_id = %actor.id, "tenant updated");
        Ok(tenant)
    }

    /// Delete an empty tenant and everything in it.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`], [`ServiceError::AccessDenied`], or
    /// [`ServiceError::Conflict`] while users still belong to the tenant.
    pub async fn delete(&self, caller: &Caller, id: Uuid) -> Result<(), ServiceError> {
        let actor = self.guard.actor(caller).await?;
        let tenant = self.load(id).await?;
        Guard::tenant_admin(&actor, tenant.id).require()?;

        let users = self.store.count_tenant_users(tenant.id).await?;
        if users > 0 {
            return Err(ServiceError::conflict(format!(
                "tenant still has {users} user(s)"
            )));
        }
        self.store.delete_tenant(tenant.id).await?;

        info!(tenant_id = %tenant.id, actor_id = %actor.id, "tenant deleted");
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Tenant, ServiceError> {
        self.store
            .get_tenant(id)
            .await?
            .ok_or(ServiceError::NotFound {
                resource: Resource::Tenant,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_lowercased_and_validated() {
        assert!(matches!(normalize_slug("  Acme-Co "), Ok(s) if s == "acme-co"));
        assert!(normalize_slug("").is_err());
        assert!(normalize_slug("acme co").is_err());
        assert!(normalize_slug(&"a".repeat(65)).is_err());
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Ana's Workspace"), "ana-s-workspace");
        assert_eq!(slugify("ana.b-at-example.com"), "ana-b-at-example-com");
        assert_eq!(slugify("!!!"), "tenant");
        assert!(slugify(&"x".repeat(200)).len() <= MAX_SLUG_LEN);
    }
}
