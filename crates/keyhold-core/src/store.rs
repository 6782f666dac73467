//! Persistence contract.
//!
//! The [`Store`] trait is the only way services touch persisted state. It is
//! object-safe and injected as `Arc<dyn Store>`, so the same service code runs
//! over [`MemoryStore`](crate::memory::MemoryStore) in tests and
//! `PostgresStore` in production.
//!
//! Operations that must happen together (a vault and its owner membership, a
//! tenant and the user moving into it) are single trait methods so the
//! backend can make them atomic.

use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Credential, Membership, Tenant, User, Vault};
use crate::role::VaultRole;

/// A relational store for tenants, users, vaults, memberships, and
/// credentials.
///
/// Lookups return `Ok(None)` for a missing row. Updates and deletes of a
/// missing row return [`StoreError::NotFound`]. Uniqueness violations (tenant
/// slug, user email, membership pair) return [`StoreError::Conflict`].
#[async_trait::async_trait]
pub trait Store: Send + Sync + 'static {
    // ── Tenants ──────────────────────────────────────────────────────

    async fn get_tenant(&self, id: Uuid) -> Result<Option<Tenant>, StoreError>;

    async fn get_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>, StoreError>;

    async fn list_tenants(&self) -> Result<Vec<Tenant>, StoreError>;

    /// Insert `tenant` and move `user_id` into it, atomically.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] if the slug is taken, [`StoreError::NotFound`]
    /// if the user does not exist. Nothing is written on error.
    async fn create_tenant_for_user(&self, tenant: &Tenant, user_id: Uuid)
    -> Result<(), StoreError>;

    async fn update_tenant(&self, tenant: &Tenant) -> Result<(), StoreError>;

    /// Delete a tenant together with its vaults, their memberships, and
    /// their credentials.
    async fn delete_tenant(&self, id: Uuid) -> Result<(), StoreError>;

    async fn count_tenant_users(&self, tenant_id: Uuid) -> Result<u64, StoreError>;

    // ── Users ────────────────────────────────────────────────────────

    /// Insert a user into an existing tenant.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] if the email is taken, [`StoreError::NotFound`]
    /// if the tenant does not exist.
    async fn create_user(&self, user: &User) -> Result<(), StoreError>;

    /// Insert a new tenant and a user belonging to it, atomically.
    async fn create_user_with_tenant(&self, tenant: &Tenant, user: &User)
    -> Result<(), StoreError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Look up by email. `email` must already be lowercased.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn get_user_by_oauth(
        &self,
        provider: &str,
        oauth_id: &str,
    ) -> Result<Option<User>, StoreError>;

    /// All users, or only those in `tenant_id`, oldest first.
    async fn list_users(&self, tenant_id: Option<Uuid>) -> Result<Vec<User>, StoreError>;

    async fn update_user(&self, user: &User) -> Result<(), StoreError>;

    async fn has_super_admin(&self) -> Result<bool, StoreError>;

    // ── Vaults ───────────────────────────────────────────────────────

    /// Insert `vault` and an `owner` membership for `owner_id`, atomically.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the owner or tenant does not exist.
    /// Nothing is written on error.
    async fn create_vault_with_owner(
        &self,
        vault: &Vault,
        owner_id: Uuid,
    ) -> Result<Membership, StoreError>;

    async fn get_vault(&self, id: Uuid) -> Result<Option<Vault>, StoreError>;

    /// Vaults in `tenant_id` where `user_id` holds any membership.
    async fn list_vaults_for_member(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Vault>, StoreError>;

    async fn update_vault(&self, vault: &Vault) -> Result<(), StoreError>;

    /// Delete a vault together with its memberships and credentials.
    async fn delete_vault(&self, id: Uuid) -> Result<(), StoreError>;

    // ── Memberships ──────────────────────────────────────────────────

    /// The membership row for `(vault_id, user_id)`.
    ///
    /// A row whose stored role is not recognised is reported as absent.
    async fn get_membership(
        &self,
        vault_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError>;

    /// Members of a vault in insertion order.
    async fn list_members(&self, vault_id: Uuid) -> Result<Vec<Membership>, StoreError>;

    /// Insert a membership or change the role of an existing one.
    ///
    /// # Errors
    ///
    /// [`StoreError::OwnerImmutable`] when `role` is `owner` or the existing
    /// row is an owner row.
    async fn upsert_membership(
        &self,
        vault_id: Uuid,
        user_id: Uuid,
        role: VaultRole,
    ) -> Result<Membership, StoreError>;

    /// # Errors
    ///
    /// [`StoreError::OwnerImmutable`] for an owner row,
    /// [`StoreError::NotFound`] when no row exists.
    async fn remove_membership(&self, vault_id: Uuid, user_id: Uuid) -> Result<(), StoreError>;

    /// Whether any membership row exists for the pair.
    ///
    /// Convenience for callers that only need a yes/no answer; the guard
    /// reads the full row through [`Store::get_membership`] because it also
    /// reports the granting role.
    async fn has_access(&self, vault_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.get_membership(vault_id, user_id).await?.is_some())
    }

    /// Whether the pair's membership role is one of `allowed`.
    async fn has_role(
        &self,
        vault_id: Uuid,
        user_id: Uuid,
        allowed: &[VaultRole],
    ) -> Result<bool, StoreError> {
        Ok(self
            .get_membership(vault_id, user_id)
            .await?
            .is_some_and(|m| allowed.contains(&m.role)))
    }

    // ── Credentials ──────────────────────────────────────────────────

    async fn create_credential(&self, credential: &Credential) -> Result<(), StoreError>;

    async fn get_credential(&self, id: Uuid) -> Result<Option<Credential>, StoreError>;

    /// Credentials of a vault, newest first.
    async fn list_credentials(&self, vault_id: Uuid) -> Result<Vec<Credential>, StoreError>;

    async fn update_credential(&self, credential: &Credential) -> Result<(), StoreError>;

    async fn delete_credential(&self, id: Uuid) -> Result<(), StoreError>;

    /// Credentials in every vault of `tenant_id` where `user_id` is a
    /// member, newest first.
    async fn list_member_credentials(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Credential>, StoreError>;
}
