//! Authorization guard.
//!
//! Every service asks the guard before it reads or writes. The guard reads
//! the caller's effective role from the store on every call and fails
//! closed: a missing membership is a denial, an unreadable one is an error,
//! and nothing is ever allowed by default.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ServiceError, StoreError};
use crate::models::{User, Vault};
use crate::role::{Capability, VaultRole};
use crate::store::Store;

/// The verified identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
}

/// Why the guard said no.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// Personal vault and the caller is not its owner.
    NotOwner,
    /// Team vault and the caller has no membership.
    NoMembership,
    /// The caller's vault role lacks the capability.
    InsufficientRole,
    /// Member management was requested on a personal vault.
    PersonalVault,
    /// Tenant or user administration by a non-admin.
    NotAdmin,
    /// A plain admin reaching outside their own tenant.
    OutsideTenant,
    /// Only a super admin may touch super-admin accounts or grant the role.
    SuperAdminOnly,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotOwner => write!(f, "not the vault owner"),
            Self::NoMembership => write!(f, "no access to this vault"),
            Self::InsufficientRole => write!(f, "insufficient vault role"),
            Self::PersonalVault => write!(f, "personal vault"),
            Self::NotAdmin => write!(f, "administrator role required"),
            Self::OutsideTenant => write!(f, "resource belongs to another tenant"),
            Self::SuperAdminOnly => write!(f, "super admin role required"),
        }
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Allowed. `role` is the vault role that granted it, if any.
    Allow { role: Option<VaultRole> },
    Deny(DenyReason),
}

impl Decision {
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow { .. })
    }

    /// Turn a denial into the matching [`ServiceError`].
    ///
    /// # Errors
    ///
    /// [`ServiceError::PersonalVaultNoMembers`] for [`DenyReason::PersonalVault`],
    /// [`ServiceError::AccessDenied`] for every other reason.
    pub fn require(self) -> Result<Option<VaultRole>, ServiceError> {
        match self {
            Self::Allow { role } => Ok(role),
            Self::Deny(DenyReason::PersonalVault) => Err(ServiceError::PersonalVaultNoMembers),
            Self::Deny(reason) => Err(ServiceError::AccessDenied { reason }),
        }
    }
}

/// Vault-level and tenant-level authorization.
#[derive(Clone)]
pub struct Guard {
    store: Arc<dyn Store>,
}

impl std::fmt::Debug for Guard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard").finish_non_exhaustive()
    }
}

impl Guard {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Decide whether `caller_id` may exercise `capability` on `vault`.
    ///
    /// Personal vaults never have members beyond their owner, so member
    /// management on them is denied for everyone; any other capability is
    /// granted to the owner alone without consulting memberships. Team vaults
    /// require a membership whose role allows the capability.
    ///
    /// Team-vault access is decided by membership alone, not by the caller's
    /// current tenant: a member who moves to another tenant keeps access
    /// until the membership is removed.
    ///
    /// # Errors
    ///
    /// Propagates store failures. A missing membership is a denial, not an
    /// error.
    pub async fn vault(
        &self,
        caller_id: Uuid,
        vault: &Vault,
        capability: Capability,
    ) -> Result<Decision, StoreError> {
        let decision = if vault.is_personal {
            if capability == Capability::ManageMembers {
                Decision::Deny(DenyReason::PersonalVault)
            } else if vault.owner_id == Some(caller_id) {
                Decision::Allow {
                    role: Some(VaultRole::Owner),
                }
            } else {
                Decision::Deny(DenyReason::NotOwner)
            }
        } else {
            match self.store.get_membership(vault.id, caller_id).await? {
                None => Decision::Deny(DenyReason::NoMembership),
                Some(m) if m.role.allows(capability) => Decision::Allow {
                    role: Some(m.role),
                },
                Some(_) => Decision::Deny(DenyReason::InsufficientRole),
            }
        };

        debug!(
            vault_id = %vault.id,
            user_id = %caller_id,
            capability = %capability,
            allowed = decision.is_allowed(),
            "vault authorization"
        );
        Ok(decision)
    }

    /// [`Guard::vault`], with denials logged and turned into errors.
    ///
    /// # Errors
    ///
    /// Whatever [`Decision::require`] returns for a denial, or a system
    /// error if the membership could not be read.
    pub async fn require_vault(
        &self,
        caller: &Caller,
        vault: &Vault,
        capability: Capability,
    ) -> Result<Option<VaultRole>, ServiceError> {
        let decision = self.vault(caller.user_id, vault, capability).await?;
        if let Decision::Deny(reason) = decision {
            warn!(
                vault_id = %vault.id,
                user_id = %caller.user_id,
                capability = %capability,
                reason = %reason,
                "vault access denied"
            );
        }
        decision.require()
    }

    /// Decide whether `actor` may administer something in `target_tenant`.
    ///
    /// Super admins act on every tenant, plain admins on their own only.
    #[must_use]
    pub fn tenant_admin(actor: &User, target_tenant: Uuid) -> Decision {
        if !actor.role.is_admin() || !actor.is_active() {
            Decision::Deny(DenyReason::NotAdmin)
        } else if actor.role.is_super_admin() || actor.tenant_id == target_tenant {
            Decision::Allow { role: None }
        } else {
            Decision::Deny(DenyReason::OutsideTenant)
        }
    }

    /// Load the caller's current account. Roles are never taken from the
    /// token; they are read fresh here.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Unauthenticated`] if the account no longer exists or
    /// is not active.
    pub async fn actor(&self, caller: &Caller) -> Result<User, ServiceError> {
        let user = self
            .store
            .get_user(caller.user_id)
            .await?
            .ok_or_else(|| ServiceError::Unauthenticated {
                reason: "account no longer exists".to_owned(),
            })?;
        if !user.is_active() {
            return Err(ServiceError::Unauthenticated {
                reason: "account is not active".to_owned(),
            });
        }
        Ok(user)
    }

    /// Load the caller and require a tenant-admin role.
    ///
    /// # Errors
    ///
    /// [`ServiceError::AccessDenied`] for non-admins, plus anything
    /// [`Guard::actor`] returns.
    pub async fn admin(&self, caller: &Caller) -> Result<User, ServiceError> {
        let actor = self.actor(caller).await?;
        if !actor.role.is_admin() {
            return Err(ServiceError::AccessDenied {
                reason: DenyReason::NotAdmin,
            });
        }
        Ok(actor)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::Utc;

    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::Tenant;
    use crate::role::{AccountType, UserRole, UserStatus};

    fn user(tenant_id: Uuid, email: &str, role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            tenant_id,
            email: email.to_owned(),
            name: email.to_owned(),
            avatar: String::new(),
            password_hash: None,
            master_key_salt: String::new(),
            oauth_provider: None,
            oauth_id: None,
            role,
            account_type: AccountType::Team,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn vault(tenant_id: Uuid, owner: Option<Uuid>) -> Vault {
        let now = Utc::now();
        Vault {
            id: Uuid::new_v4(),
            tenant_id,
            name: "v".to_owned(),
            description: String::new(),
            icon: String::new(),
            is_personal: owner.is_some(),
            owner_id: owner,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn personal_vault_allows_only_owner() {
        let store = Arc::new(MemoryStore::new());
        let guard = Guard::new(store);
        let owner = Uuid::new_v4();
        let v = vault(Uuid::new_v4(), Some(owner));

        let d = guard.vault(owner, &v, Capability::DeleteCredentials).await.unwrap();
        assert!(d.is_allowed());

        let d = guard
            .vault(Uuid::new_v4(), &v, Capability::ViewCredentials)
            .await
            .unwrap();
        assert_eq!(d, Decision::Deny(DenyReason::NotOwner));
    }

    #[tokio::test]
    async fn personal_vault_member_management_denied_even_for_owner() {
        let guard = Guard::new(Arc::new(MemoryStore::new()));
        let owner = Uuid::new_v4();
        let v = vault(Uuid::new_v4(), Some(owner));

        let d = guard.vault(owner, &v, Capability::ManageMembers).await.unwrap();
        assert!(matches!(
            d.require(),
            Err(ServiceError::PersonalVaultNoMembers)
        ));
    }

    #[tokio::test]
    async fn team_vault_needs_membership_with_capability() {
        let store = Arc::new(MemoryStore::new());
        let tenant = Tenant::new("Acme", "acme");
        let owner = user(tenant.id, "o@acme.test", UserRole::User);
        let viewer = user(tenant.id, "v@acme.test", UserRole::User);
        store.create_user_with_tenant(&tenant, &owner).await.unwrap();
        store.create_user(&viewer).await.unwrap();
        let v = vault(tenant.id, None);
        store.create_vault_with_owner(&v, owner.id).await.unwrap();
        store
            .upsert_membership(v.id, viewer.id, VaultRole::Viewer)
            .await
            .unwrap();

        let guard = Guard::new(store);
        assert!(
            guard
                .vault(viewer.id, &v, Capability::ViewCredentials)
                .await
                .unwrap()
                .is_allowed()
        );
        assert_eq!(
            guard
                .vault(viewer.id, &v, Capability::EditCredentials)
                .await
                .unwrap(),
            Decision::Deny(DenyReason::InsufficientRole)
        );
        assert_eq!(
            guard
                .vault(Uuid::new_v4(), &v, Capability::ViewCredentials)
                .await
                .unwrap(),
            Decision::Deny(DenyReason::NoMembership)
        );
    }

    #[test]
    fn tenant_admin_scoping() {
        let home = Uuid::new_v4();
        let elsewhere = Uuid::new_v4();
        let admin = user(home, "a@x.test", UserRole::Admin);
        let root = user(home, "r@x.test", UserRole::SuperAdmin);
        let plain = user(home, "u@x.test", UserRole::User);

        assert!(Guard::tenant_admin(&admin, home).is_allowed());
        assert_eq!(
            Guard::tenant_admin(&admin, elsewhere),
            Decision::Deny(DenyReason::OutsideTenant)
        );
        assert!(Guard::tenant_admin(&root, elsewhere).is_allowed());
        assert_eq!(
            Guard::tenant_admin(&plain, home),
            Decision::Deny(DenyReason::NotAdmin)
        );
    }

    #[test]
    fn inactive_admin_is_not_an_admin() {
        let home = Uuid::new_v4();
        let mut admin = user(home, "a@x.test", UserRole::Admin);
        admin.status = UserStatus::Inactive;
        assert_eq!(
            Guard::tenant_admin(&admin, home),
            Decision::Deny(DenyReason::NotAdmin)
        );
    }
}
