//! Domain models.
//!
//! Tenants, users, vaults, memberships, and credentials. All IDs are UUIDs
//! and all timestamps are UTC. Credential payload fields are opaque
//! ciphertext produced by the client; the server never sees plaintext
//! secrets. Password hashes and master-key salts never serialize.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::role::{AccountType, UserRole, UserStatus, VaultRole};

// ── Tenants ──────────────────────────────────────────────────────────

/// Top-level isolation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres-backend", derive(sqlx::FromRow))]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    #[must_use]
    pub fn new(name: &str, slug: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            slug: slug.to_owned(),
            created_at: now,
            updated_at: now,
        }
    }
}

// ── Users ────────────────────────────────────────────────────────────

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres-backend", derive(sqlx::FromRow))]
pub struct User {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    #[serde(skip)]
    pub master_key_salt: String,
    pub oauth_provider: Option<String>,
    #[serde(skip)]
    pub oauth_id: Option<String>,
    pub role: UserRole,
    pub account_type: AccountType,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

// ── Vaults ───────────────────────────────────────────────────────────

/// A named collection of credentials inside a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres-backend", derive(sqlx::FromRow))]
pub struct Vault {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub is_personal: bool,
    /// Set iff the vault is personal.
    pub owner_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Binding of a user to a vault with a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Membership {
    pub vault_id: Uuid,
    pub user_id: Uuid,
    pub role: VaultRole,
    pub created_at: DateTime<Utc>,
}

/// A vault together with its members, in the order they were added.
#[derive(Debug, Clone, Serialize)]
pub struct VaultDetails {
    #[serde(flatten)]
    pub vault: Vault,
    pub members: Vec<Membership>,
}

/// Fields accepted when creating a vault.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewVault {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub is_personal: bool,
}

/// Partial vault update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VaultPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

// ── Credentials ──────────────────────────────────────────────────────

/// An encrypted credential record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres-backend", derive(sqlx::FromRow))]
pub struct Credential {
    pub id: Uuid,
    pub vault_id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub url: String,
    pub username: String,
    pub password: String,
    pub notes: String,
    /// Plaintext; searchable.
    pub category: String,
    /// Plaintext; searchable.
    pub favicon: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating a credential.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCredential {
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub favicon: String,
}

/// Partial credential update.
///
/// A field that is absent or empty leaves the stored value untouched, so a
/// field cannot be cleared through an update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub favicon: Option<String>,
}

impl CredentialPatch {
    /// Apply the patch, returning whether anything changed.
    pub fn apply_to(self, credential: &mut Credential) -> bool {
        fn set(slot: &mut String, value: Option<String>) -> bool {
            match value {
                Some(v) if !v.is_empty() && *slot != v => {
                    *slot = v;
                    true
                }
                _ => false,
            }
        }

        let mut changed = false;
        changed |= set(&mut credential.title, self.title);
        changed |= set(&mut credential.url, self.url);
        changed |= set(&mut credential.username, self.username);
        changed |= set(&mut credential.password, self.password);
        changed |= set(&mut credential.notes, self.notes);
        changed |= set(&mut credential.category, self.category);
        changed |= set(&mut credential.favicon, self.favicon);
        changed
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn credential() -> Credential {
        let now = Utc::now();
        Credential {
            id: Uuid::new_v4(),
            vault_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            title: "enc:title".to_owned(),
            url: "enc:url".to_owned(),
            username: "enc:user".to_owned(),
            password: "enc:pw".to_owned(),
            notes: "enc:notes".to_owned(),
            category: "login".to_owned(),
            favicon: "github.com".to_owned(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_patch_fields_mean_no_change() {
        let mut cred = credential();
        let before = cred.clone();
        let patch = CredentialPatch {
            title: Some(String::new()),
            notes: None,
            ..CredentialPatch::default()
        };
        assert!(!patch.apply_to(&mut cred));
        assert_eq!(cred, before);
    }

    #[test]
    fn patch_overwrites_only_given_fields() {
        let mut cred = credential();
        let patch = CredentialPatch {
            password: Some("enc:pw2".to_owned()),
            category: Some("finance".to_owned()),
            ..CredentialPatch::default()
        };
        assert!(patch.apply_to(&mut cred));
        assert_eq!(cred.password, "enc:pw2");
        assert_eq!(cred.category, "finance");
        assert_eq!(cred.username, "enc:user");
    }

    #[test]
    fn user_secrets_never_serialize() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "ana@example.com".to_owned(),
            name: "Ana".to_owned(),
            avatar: String::new(),
            password_hash: Some("$argon2id$v=19$...".to_owned()),
            master_key_salt: "c2FsdA==".to_owned(),
            oauth_provider: None,
            oauth_id: None,
            role: UserRole::User,
            account_type: AccountType::Team,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("c2FsdA"));
        assert!(json.contains("\"role\":\"user\""));
    }
}
