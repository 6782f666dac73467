//! Vault service.
//!
//! Vault lifecycle and membership management. A vault is created together
//! with its owner membership in one store operation; the owner row can never
//! be re-roled or removed afterwards. Personal vaults have no members besides
//! their owner.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{Resource, ServiceError};
use crate::guard::{Caller, Guard};
use crate::models::{Membership, NewVault, Vault, VaultDetails, VaultPatch};
use crate::role::{ASSIGNABLE_VAULT_ROLES, Capability, VaultRole};
use crate::store::Store;

/// Vault and membership management.
#[derive(Clone)]
pub struct VaultService {
    store: Arc<dyn Store>,
    guard: Guard,
}

impl std::fmt::Debug for VaultService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultService").finish_non_exhaustive()
    }
}

impl VaultService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        let guard = Guard::new(Arc::clone(&store));
        Self { store, guard }
    }

    /// Create a vault in the caller's tenant with the caller as owner.
    ///
    /// # Errors
    ///
    /// [`ServiceError::InvalidInput`] for a blank name. Nothing is written if
    /// the owner membership cannot be.
    pub async fn create(&self, caller: &Caller, input: NewVault) -> Result<Vault, ServiceError> {
        let actor = self.guard.actor(caller).await?;
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ServiceError::invalid_input("vault name is required"));
        }

        let now = Utc::now();
        let vault = Vault {
            id: Uuid::new_v4(),
            tenant_id: actor.tenant_id,
            name: name.to_owned(),
            description: input.description,
            icon: input.icon,
            is_personal: input.is_personal,
            owner_id: input.is_personal.then_some(actor.id),
            created_at: now,
            updated_at: now,
        };
        self.store.create_vault_with_owner(&vault, actor.id).await?;

        info!(
            vault_id = %vault.id,
            tenant_id = %vault.tenant_id,
            owner_id = %actor.id,
            personal = vault.is_personal,
            "vault created"
        );
        Ok(vault)
    }

    /// Fetch a vault with its members.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`], then [`ServiceError::AccessDenied`].
    pub async fn get(&self, caller: &Caller, id: Uuid) -> Result<VaultDetails, ServiceError> {
        let vault = self.load(id).await?;
        self.guard.require_vault(caller, &vault, Capability::ViewCredentials).await?;
        let members = self.store.list_members(vault.id).await?;
        Ok(VaultDetails { vault, members })
    }

    /// Vaults in the caller's tenant that the caller belongs to.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn list(&self, caller: &Caller) -> Result<Vec<Vault>, ServiceError> {
        Ok(self
            .store
            .list_vaults_for_member(caller.tenant_id, caller.user_id)
            .await?)
    }

    /// # Errors
    ///
    /// [`ServiceError::NotFound`], [`ServiceError::AccessDenied`] unless the
    /// caller is the vault's owner or admin, [`ServiceError::InvalidInput`]
    /// for a blank name.
    pub async fn update(
        &self,
        caller: &Caller,
        id: Uuid,
        patch: VaultPatch,
    ) -> Result<Vault, ServiceError> {
        let mut vault = self.load(id).await?;
        self.guard.require_vault(caller, &vault, Capability::ManageVault).await?;

        if let Some(name) = patch.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ServiceError::invalid_input("vault name is required"));
            }
            name.clone_into(&mut vault.name);
        }
        if let Some(description) = patch.description {
            vault.description = description;
        }
        if let Some(icon) = patch.icon {
            vault.icon = icon;
        }
        vault.updated_at = Utc::now();
        self.store.update_vault(&vault).await?;

        info!(vault_id = %vault.id, user_id = %caller.user_id, "vault updated");
        Ok(vault)
    }

    /// Delete a vault with its memberships and credentials. Owner only.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`], then [`ServiceError::AccessDenied`].
    pub async fn delete(&self, caller: &Caller, id: Uuid) -> Result<(), ServiceError> {
        let vault = self.load(id).await?;
        self.guard.require_vault(caller, &vault, Capability::DeleteVault).await?;
        self.store.delete_vault(vault.id).await?;

        info!(vault_id = %vault.id, user_id = %caller.user_id, "vault deleted");
        Ok(())
    }

    /// Grant `role` to `user_id`, or change the role they already hold.
    ///
    /// Repeating the same call leaves one membership with that role.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] if the vault is missing, or the target
    ///   user is missing or belongs to another tenant
    /// - [`ServiceError::PersonalVaultNoMembers`] for personal vaults
    /// - [`ServiceError::AccessDenied`] unless the caller is owner or admin
    /// - [`ServiceError::InvalidRole`] for anything but admin, editor, viewer
    /// - [`ServiceError::OwnerImmutable`] if the target is the owner
    pub async fn add_member(
        &self,
        caller: &Caller,
        vault_id: Uuid,
        user_id: Uuid,
        role: &str,
    ) -> Result<Membership, ServiceError> {
        let vault = self.load(vault_id).await?;
        self.guard.require_vault(caller, &vault, Capability::ManageMembers).await?;

        let role: VaultRole = role.parse()?;
        if !role.is_assignable() {
            let allowed: Vec<&str> = ASSIGNABLE_VAULT_ROLES.iter().map(|r| r.as_str()).collect();
            return Err(ServiceError::InvalidRole {
                value: format!("{role} (assignable: {})", allowed.join(", ")),
            });
        }

        let in_tenant = self
            .store
            .get_user(user_id)
            .await?
            .is_some_and(|u| u.tenant_id == vault.tenant_id);
        if !in_tenant {
            return Err(ServiceError::NotFound {
                resource: Resource::User,
            });
        }

        let membership = self.store.upsert_membership(vault.id, user_id, role).await?;

        info!(
            vault_id = %vault.id,
            user_id = %user_id,
            role = %role,
            granted_by = %caller.user_id,
            "vault member set"
        );
        Ok(membership)
    }

    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for a missing vault or membership,
    /// [`ServiceError::PersonalVaultNoMembers`], [`ServiceError::AccessDenied`],
    /// or [`ServiceError::OwnerImmutable`] when targeting the owner.
    pub async fn remove_member(
        &self,
        caller: &Caller,
        vault_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), ServiceError> {
        let vault = self.load(vault_id).await?;
        self.guard.require_vault(caller, &vault, Capability::ManageMembers).await?;

        let membership = self
            .store
            .get_membership(vault.id, user_id)
            .await?
            .ok_or(ServiceError::NotFound {
                resource: Resource::Membership,
            })?;
        if membership.role == VaultRole::Owner {
            return Err(ServiceError::OwnerImmutable);
        }
        self.store.remove_membership(vault.id, user_id).await?;

        info!(vault_id = %vault.id, user_id = %user_id, removed_by = %caller.user_id, "vault member removed");
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<Vault, ServiceError> {
        self.store
            .get_vault(id)
            .await?
            .ok_or(ServiceError::NotFound {
                resource: Resource::Vault,
            })
    }
}
