//! Credential service.
//!
//! CRUD over encrypted credential records. Each call looks the caller's
//! vault role up again; nothing about a previous call is remembered. Reads
//! need view, create and update need edit, delete needs delete.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{Resource, ServiceError};
use crate::guard::{Caller, Guard};
use crate::models::{Credential, CredentialPatch, NewCredential, Vault};
use crate::role::Capability;
use crate::store::Store;

/// Credential management inside vaults.
#[derive(Clone)]
pub struct CredentialService {
    store: Arc<dyn Store>,
    guard: Guard,
}

impl std::fmt::Debug for CredentialService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialService").finish_non_exhaustive()
    }
}

impl CredentialService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        let guard = Guard::new(Arc::clone(&store));
        Self { store, guard }
    }

    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for a missing vault,
    /// [`ServiceError::AccessDenied`] without edit rights,
    /// [`ServiceError::InvalidInput`] when title or password is empty.
    pub async fn create(
        &self,
        caller: &Caller,
        vault_id: Uuid,
        input: NewCredential,
    ) -> Result<Credential, ServiceError> {
        let vault = self.load_vault(vault_id).await?;
        self.guard
            .require_vault(caller, &vault, Capability::EditCredentials)
            .await?;

        if input.title.is_empty() {
            return Err(ServiceError::invalid_input("title is required"));
        }
        if input.password.is_empty() {
            return Err(ServiceError::invalid_input("password is required"));
        }

        let now = Utc::now();
        let credential = Credential {
            id: Uuid::new_v4(),
            vault_id: vault.id,
            tenant_id: vault.tenant_id,
            title: input.title,
            url: input.url,
            username: input.username,
            password: input.password,
            notes: input.notes,
            category: input.category,
            favicon: input.favicon,
            created_at: now,
            updated_at: now,
        };
        self.store.create_credential(&credential).await?;

        info!(credential_id = %credential.id, vault_id = %vault.id, user_id = %caller.user_id, "credential created");
        Ok(credential)
    }

    /// # Errors
    ///
    /// [`ServiceError::NotFound`] for a missing vault or credential, then
    /// [`ServiceError::AccessDenied`].
    pub async fn get(
        &self,
        caller: &Caller,
        vault_id: Uuid,
        credential_id: Uuid,
    ) -> Result<Credential, ServiceError> {
        let (vault, credential) = self.load(vault_id, credential_id).await?;
        self.guard
            .require_vault(caller, &vault, Capability::ViewCredentials)
            .await?;
        Ok(credential)
    }

    /// Credentials of one vault, newest first.
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`], then [`ServiceError::AccessDenied`].
    pub async fn list(&self, caller: &Caller, vault_id: Uuid) -> Result<Vec<Credential>, ServiceError> {
        let vault = self.load_vault(vault_id).await?;
        self.guard
            .require_vault(caller, &vault, Capability::ViewCredentials)
            .await?;
        Ok(self.store.list_credentials(vault.id).await?)
    }

    /// Field-level partial update; see [`CredentialPatch`].
    ///
    /// # Errors
    ///
    /// [`ServiceError::NotFound`], then [`ServiceError::AccessDenied`]
    /// without edit rights.
    pub async fn update(
        &self,
        caller: &Caller,
        vault_id: Uuid,
        credential_id: Uuid,
        patch: CredentialPatch,
    ) -> Result<Credential, ServiceError> {
        let (vault, mut credential) = self.load(vault_id, credential_id).await?;
        self.guard
            .require_vault(caller, &vault, Capability::EditCredentials)
            .await?;

        if patch.apply_to(&mut credential) {
            credential.updated_at = Utc::now();
            self.store.update_credential(&credential).await?;
            info!(credential_id = %credential.id, vault_id = %vault.id, user_id = %caller.user_id, "credential updated");
        }
        Ok(credential)
    }

    /// # Errors
    ///
    /// [`ServiceError::NotFound`], then [`ServiceError::AccessDenied`]
    /// without delete rights.
    pub async fn delete(
        &self,
        caller: &Caller,
        vault_id: Uuid,
        credential_id: Uuid,
    ) -> Result<(), ServiceError> {
        let (vault, credential) = self.load(vault_id, credential_id).await?;
        self.guard
            .require_vault(caller, &vault, Capability::DeleteCredentials)
            .await?;
        self.store.delete_credential(credential.id).await?;

        info!(credential_id = %credential.id, vault_id = %vault.id, user_id = %caller.user_id, "credential deleted");
        Ok(())
    }

    /// Credentials across every vault the caller can view in their tenant.
    ///
    /// Only the plaintext `category` and `favicon` fields can be matched;
    /// everything else is ciphertext. An empty query returns everything.
    ///
    /// # Errors
    ///
    /// Store failures only.
    pub async fn search(&self, caller: &Caller, query: &str) -> Result<Vec<Credential>, ServiceError> {
        let creds = self
            .store
            .list_member_credentials(caller.tenant_id, caller.user_id)
            .await?;
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(creds);
        }
        Ok(creds
            .into_iter()
            .filter(|c| {
                c.category.to_lowercase().contains(&needle)
                    || c.favicon.to_lowercase().contains(&needle)
            })
            .collect())
    }

    async fn load_vault(&self, id: Uuid) -> Result<Vault, ServiceError> {
        self.store
            .get_vault(id)
            .await?
            .ok_or(ServiceError::NotFound {
                resource: Resource::Vault,
            })
    }

    /// A credential only counts as found through the vault it lives in.
    async fn load(
        &self,
        vault_id: Uuid,
        credential_id: Uuid,
    ) -> Result<(Vault, Credential), ServiceError> {
        let vault = self.load_vault(vault_id).await?;
        let credential = self
            .store
            .get_credential(credential_id)
            .await?
            .filter(|c| c.vault_id == vault.id)
            .ok_or(ServiceError::NotFound {
                resource: Resource::Credential,
            })?;
        Ok((vault, credential))
    }
}
