//! In-memory store for tests and local development.
//!
//! All tables live behind one `tokio::sync::RwLock`. Multi-row operations
//! validate everything first and only then mutate, all under the same write
//! guard, so a failed operation leaves no partial state and concurrent
//! readers never observe half of a write. Data is lost when the process
//! exits.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Resource, StoreError};
use crate::models::{Credential, Membership, Tenant, User, Vault};
use crate::role::{UserRole, VaultRole};
use crate::store::Store;

#[derive(Debug, Default)]
struct Tables {
    tenants: BTreeMap<Uuid, Tenant>,
    users: BTreeMap<Uuid, User>,
    vaults: BTreeMap<Uuid, Vault>,
    /// Kept in insertion order.
    memberships: Vec<Membership>,
    credentials: BTreeMap<Uuid, Credential>,
}

impl Tables {
    fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> bool {
        self.tenants
            .values()
            .any(|t| t.slug == slug && Some(t.id) != except)
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(email) && Some(u.id) != except)
    }

    fn membership_index(&self, vault_id: Uuid, user_id: Uuid) -> Option<usize> {
        self.memberships
            .iter()
            .position(|m| m.vault_id == vault_id && m.user_id == user_id)
    }

    fn purge_vault(&mut self, vault_id: Uuid) {
        self.vaults.remove(&vault_id);
        self.memberships.retain(|m| m.vault_id != vault_id);
        self.credentials.retain(|_, c| c.vault_id != vault_id);
    }
}

fn slug_conflict(slug: &str) -> StoreError {
    StoreError::Conflict {
        reason: format!("tenant slug '{slug}' is already taken"),
    }
}

fn email_conflict(email: &str) -> StoreError {
    StoreError::Conflict {
        reason: format!("email '{email}' is already registered"),
    }
}

fn newest_first(mut creds: Vec<Credential>) -> Vec<Credential> {
    creds.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    creds
}

/// A [`Store`] backed by in-process maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    // ── Tenants ──────────────────────────────────────────────────────

    async fn get_tenant(&self, id: Uuid) -> Result<Option<Tenant>, StoreError> {
        Ok(self.tables.read().await.tenants.get(&id).cloned())
    }

    async fn get_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.tenants.values().find(|t| t.slug == slug).cloned())
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>, StoreError> {
        let tables = self.tables.read().await;
        let mut tenants: Vec<Tenant> = tables.tenants.values().cloned().collect();
        tenants.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tenants)
    }

    async fn create_tenant_for_user(
        &self,
        tenant: &Tenant,
        user_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.slug_taken(&tenant.slug, None) {
            return Err(slug_conflict(&tenant.slug));
        }
        let Some(user) = tables.users.get_mut(&user_id) else {
            return Err(StoreError::NotFound {
                resource: Resource::User,
            });
        };
        user.tenant_id = tenant.id;
        user.updated_at = Utc::now();
        tables.tenants.insert(tenant.id, tenant.clone());
        Ok(())
    }

    async fn update_tenant(&self, tenant: &Tenant) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.tenants.contains_key(&tenant.id) {
            return Err(StoreError::NotFound {
                resource: Resource::Tenant,
            });
        }
        if tables.slug_taken(&tenant.slug, Some(tenant.id)) {
            return Err(slug_conflict(&tenant.slug));
        }
        tables.tenants.insert(tenant.id, tenant.clone());
        Ok(())
    }

    async fn delete_tenant(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.tenants.contains_key(&id) {
            return Err(StoreError::NotFound {
                resource: Resource::Tenant,
            });
        }
        if tables.users.values().any(|u| u.tenant_id == id) {
            return Err(StoreError::Conflict {
                reason: "tenant still has users".to_owned(),
            });
        }
        let vault_ids: Vec<Uuid> = tables
            .vaults
            .values()
            .filter(|v| v.tenant_id == id)
            .map(|v| v.id)
            .collect();
        for vault_id in vault_ids {
            tables.purge_vault(vault_id);
        }
        tables.tenants.remove(&id);
        Ok(())
    }

    async fn count_tenant_users(&self, tenant_id: Uuid) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        let count = tables
            .users
            .values()
            .filter(|u| u.tenant_id == tenant_id)
            .count();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    // ── Users ────────────────────────────────────────────────────────

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.tenants.contains_key(&user.tenant_id) {
            return Err(StoreError::NotFound {
                resource: Resource::Tenant,
            });
        }
        if tables.email_taken(&user.email, None) {
            return Err(email_conflict(&user.email));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn create_user_with_tenant(&self, tenant: &Tenant, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.slug_taken(&tenant.slug, None) {
            return Err(slug_conflict(&tenant.slug));
        }
        if tables.email_taken(&user.email, None) {
            return Err(email_conflict(&user.email));
        }
        let mut user = user.clone();
        user.tenant_id = tenant.id;
        tables.tenants.insert(tenant.id, tenant.clone());
        tables.users.insert(user.id, user);
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_user_by_oauth(
        &self,
        provider: &str,
        oauth_id: &str,
    ) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| {
                u.oauth_provider.as_deref() == Some(provider) && u.oauth_id.as_deref() == Some(oauth_id)
            })
            .cloned())
    }

    async fn list_users(&self, tenant_id: Option<Uuid>) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|u| tenant_id.is_none_or(|t| u.tenant_id == t))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(users)
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user.id) {
            return Err(StoreError::NotFound {
                resource: Resource::User,
            });
        }
        if tables.email_taken(&user.email, Some(user.id)) {
            return Err(email_conflict(&user.email));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn has_super_admin(&self) -> Result<bool, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().any(|u| u.role == UserRole::SuperAdmin))
    }

    // ── Vaults ───────────────────────────────────────────────────────

    async fn create_vault_with_owner(
        &self,
        vault: &Vault,
        owner_id: Uuid,
    ) -> Result<Membership, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.tenants.contains_key(&vault.tenant_id) {
            return Err(StoreError::NotFound {
                resource: Resource::Tenant,
            });
        }
        if !tables.users.contains_key(&owner_id) {
            return Err(StoreError::NotFound {
                resource: Resource::User,
            });
        }
        if tables.vaults.contains_key(&vault.id) {
            return Err(StoreError::Conflict {
                reason: format!("vault {} already exists", vault.id),
            });
        }
        let owner = Membership {
            vault_id: vault.id,
            user_id: owner_id,
            role: VaultRole::Owner,
            created_at: vault.created_at,
        };
        tables.vaults.insert(vault.id, vault.clone());
        tables.memberships.push(owner.clone());
        Ok(owner)
    }

    async fn get_vault(&self, id: Uuid) -> Result<Option<Vault>, StoreError> {
        Ok(self.tables.read().await.vaults.get(&id).cloned())
    }

    async fn list_vaults_for_member(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Vault>, StoreError> {
        let tables = self.tables.read().await;
        let mut vaults: Vec<Vault> = tables
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| tables.vaults.get(&m.vault_id))
            .filter(|v| v.tenant_id == tenant_id)
            .cloned()
            .collect();
        vaults.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(vaults)
    }

    async fn update_vault(&self, vault: &Vault) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let Some(slot) = tables.vaults.get_mut(&vault.id) else {
            return Err(StoreError::NotFound {
                resource: Resource::Vault,
            });
        };
        *slot = vault.clone();
        Ok(())
    }

    async fn delete_vault(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.vaults.contains_key(&id) {
            return Err(StoreError::NotFound {
                resource: Resource::Vault,
            });
        }
        tables.purge_vault(id);
        Ok(())
    }

    // ── Memberships ──────────────────────────────────────────────────

    async fn get_membership(
        &self,
        vault_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .membership_index(vault_id, user_id)
            .map(|i| tables.memberships[i].clone()))
    }

    async fn list_members(&self, vault_id: Uuid) -> Result<Vec<Membership>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .memberships
            .iter()
            .filter(|m| m.vault_id == vault_id)
            .cloned()
            .collect())
    }

    async fn upsert_membership(
        &self,
        vault_id: Uuid,
        user_id: Uuid,
        role: VaultRole,
    ) -> Result<Membership, StoreError> {
        if role == VaultRole::Owner {
            return Err(StoreError::OwnerImmutable);
        }
        let mut tables = self.tables.write().await;
        if !tables.vaults.contains_key(&vault_id) {
            return Err(StoreError::NotFound {
                resource: Resource::Vault,
            });
        }
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::NotFound {
                resource: Resource::User,
            });
        }
        if let Some(i) = tables.membership_index(vault_id, user_id) {
            let existing = &mut tables.memberships[i];
            if existing.role == VaultRole::Owner {
                return Err(StoreError::OwnerImmutable);
            }
            existing.role = role;
            return Ok(existing.clone());
        }
        let membership = Membership {
            vault_id,
            user_id,
            role,
            created_at: Utc::now(),
        };
        tables.memberships.push(membership.clone());
        Ok(membership)
    }

    async fn remove_membership(&self, vault_id: Uuid, user_id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let Some(i) = tables.membership_index(vault_id, user_id) else {
            return Err(StoreError::NotFound {
                resource: Resource::Membership,
            });
        };
        if tables.memberships[i].role == VaultRole::Owner {
            return Err(StoreError::OwnerImmutable);
        }
        tables.memberships.remove(i);
        Ok(())
    }

    // ── Credentials ──────────────────────────────────────────────────

    async fn create_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.vaults.contains_key(&credential.vault_id) {
            return Err(StoreError::NotFound {
                resource: Resource::Vault,
            });
        }
        tables.credentials.insert(credential.id, credential.clone());
        Ok(())
    }

    async fn get_credential(&self, id: Uuid) -> Result<Option<Credential>, StoreError> {
        Ok(self.tables.read().await.credentials.get(&id).cloned())
    }

    async fn list_credentials(&self, vault_id: Uuid) -> Result<Vec<Credential>, StoreError> {
        let tables = self.tables.read().await;
        let creds = tables
            .credentials
            .values()
            .filter(|c| c.vault_id == vault_id)
            .cloned()
            .collect();
        Ok(newest_first(creds))
    }

    async fn update_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let Some(slot) = tables.credentials.get_mut(&credential.id) else {
            return Err(StoreError::NotFound {
                resource: Resource::Credential,
            });
        };
        *slot = credential.clone();
        Ok(())
    }

    async fn delete_credential(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .credentials
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound {
                resource: Resource::Credential,
            })
    }

    async fn list_member_credentials(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<Credential>, StoreError> {
        let tables = self.tables.read().await;
        let creds = tables
            .credentials
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .filter(|c| tables.membership_index(c.vault_id, user_id).is_some())
            .cloned()
            .collect();
        Ok(newest_first(creds))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::role::{AccountType, UserStatus};

    fn user_in(tenant_id: Uuid, email: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            tenant_id,
            email: email.to_owned(),
            name: "Test".to_owned(),
            avatar: String::new(),
            password_hash: None,
            master_key_salt: String::new(),
            oauth_provider: None,
            oauth_id: None,
            role: UserRole::User,
            account_type: AccountType::Team,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    fn vault_in(tenant_id: Uuid) -> Vault {
        let now = Utc::now();
        Vault {
            id: Uuid::new_v4(),
            tenant_id,
            name: "Shared".to_owned(),
            description: String::new(),
            icon: String::new(),
            is_personal: false,
            owner_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn seeded() -> (MemoryStore, Tenant, User) {
        let store = MemoryStore::new();
        let tenant = Tenant::new("Acme", "acme");
        let user = user_in(tenant.id, "owner@acme.test");
        store.create_user_with_tenant(&tenant, &user).await.unwrap();
        (store, tenant, user)
    }

    #[tokio::test]
    async fn vault_creation_fails_whole_when_owner_missing() {
        let (store, tenant, _) = seeded().await;
        let vault = vault_in(tenant.id);

        let err = store
            .create_vault_with_owner(&vault, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotFound {
                resource: Resource::User
            }
        ));
        assert!(store.get_vault(vault.id).await.unwrap().is_none());
        assert!(store.list_members(vault.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn owner_row_is_immutable() {
        let (store, tenant, owner) = seeded().await;
        let vault = vault_in(tenant.id);
        store.create_vault_with_owner(&vault, owner.id).await.unwrap();

        let err = store
            .upsert_membership(vault.id, owner.id, VaultRole::Viewer)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::OwnerImmutable));

        let err = store.remove_membership(vault.id, owner.id).await.unwrap_err();
        assert!(matches!(err, StoreError::OwnerImmutable));

        let m = store.get_membership(vault.id, owner.id).await.unwrap().unwrap();
        assert_eq!(m.role, VaultRole::Owner);
    }

    #[tokio::test]
    async fn owner_role_cannot_be_granted() {
        let (store, tenant, owner) = seeded().await;
        let other = user_in(tenant.id, "other@acme.test");
        store.create_user(&other).await.unwrap();
        let vault = vault_in(tenant.id);
        store.create_vault_with_owner(&vault, owner.id).await.unwrap();

        let err = store
            .upsert_membership(vault.id, other.id, VaultRole::Owner)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::OwnerImmutable));
    }

    #[tokio::test]
    async fn members_keep_insertion_order_across_rerole() {
        let (store, tenant, owner) = seeded().await;
        let a = user_in(tenant.id, "a@acme.test");
        let b = user_in(tenant.id, "b@acme.test");
        store.create_user(&a).await.unwrap();
        store.create_user(&b).await.unwrap();
        let vault = vault_in(tenant.id);
        store.create_vault_with_owner(&vault, owner.id).await.unwrap();

        store.upsert_membership(vault.id, a.id, VaultRole::Viewer).await.unwrap();
        store.upsert_membership(vault.id, b.id, VaultRole::Editor).await.unwrap();
        store.upsert_membership(vault.id, a.id, VaultRole::Admin).await.unwrap();

        let members = store.list_members(vault.id).await.unwrap();
        let order: Vec<Uuid> = members.iter().map(|m| m.user_id).collect();
        assert_eq!(order, vec![owner.id, a.id, b.id]);
        assert_eq!(members[1].role, VaultRole::Admin);
        assert!(store.has_role(vault.id, a.id, &[VaultRole::Admin]).await.unwrap());
        assert!(!store.has_role(vault.id, b.id, &[VaultRole::Admin]).await.unwrap());
    }

    #[tokio::test]
    async fn email_uniqueness_ignores_case() {
        let (store, tenant, _) = seeded().await;
        let dup = user_in(tenant.id, "OWNER@acme.test");
        let err = store.create_user(&dup).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn deleting_vault_cascades() {
        let (store, tenant, owner) = seeded().await;
        let vault = vault_in(tenant.id);
        store.create_vault_with_owner(&vault, owner.id).await.unwrap();
        let now = Utc::now();
        let cred = Credential {
            id: Uuid::new_v4(),
            vault_id: vault.id,
            tenant_id: tenant.id,
            title: "t".to_owned(),
            url: String::new(),
            username: String::new(),
            password: "p".to_owned(),
            notes: String::new(),
            category: String::new(),
            favicon: String::new(),
            created_at: now,
            updated_at: now,
        };
        store.create_credential(&cred).await.unwrap();

        store.delete_vault(vault.id).await.unwrap();
        assert!(store.get_credential(cred.id).await.unwrap().is_none());
        assert!(!store.has_access(vault.id, owner.id).await.unwrap());
    }

    #[tokio::test]
    async fn tenant_with_users_cannot_be_deleted() {
        let (store, tenant, _) = seeded().await;
        let err = store.delete_tenant(tenant.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }
}
