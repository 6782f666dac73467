//! Role model.
//!
//! Tenant roles, vault roles, user status, and account type as closed enums.
//! Every permission question the rest of the crate asks is answered here by
//! a pure predicate over one of these enums, with an exhaustive `match` so a
//! new role cannot silently inherit a capability.

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

// ── Tenant roles ─────────────────────────────────────────────────────

/// A user's role within their tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "postgres-backend",
    derive(sqlx::Type),
    sqlx(type_name = "text", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SuperAdmin,
    Admin,
    User,
}

impl UserRole {
    /// Whether this role may administer tenants and users.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        match self {
            Self::SuperAdmin | Self::Admin => true,
            Self::User => false,
        }
    }

    /// Whether this role bypasses tenant scoping.
    #[must_use]
    pub const fn is_super_admin(self) -> bool {
        match self {
            Self::SuperAdmin => true,
            Self::Admin | Self::User => false,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "super_admin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(ServiceError::InvalidRole {
                value: other.to_owned(),
            }),
        }
    }
}

// ── Vault roles ──────────────────────────────────────────────────────

/// A user's role within a single vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultRole {
    Owner,
    Admin,
    Editor,
    Viewer,
}

/// Roles that may be granted through the member-management path.
pub const ASSIGNABLE_VAULT_ROLES: [VaultRole; 3] =
    [VaultRole::Admin, VaultRole::Editor, VaultRole::Viewer];

/// Something a caller may want to do to a vault or its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ViewCredentials,
    EditCredentials,
    DeleteCredentials,
    ManageMembers,
    ManageVault,
    DeleteVault,
}

impl Capability {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ViewCredentials => "view_credentials",
            Self::EditCredentials => "edit_credentials",
            Self::DeleteCredentials => "delete_credentials",
            Self::ManageMembers => "manage_members",
            Self::ManageVault => "manage_vault",
            Self::DeleteVault => "delete_vault",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl VaultRole {
    #[must_use]
    pub const fn can_view_credentials(self) -> bool {
        match self {
            Self::Owner | Self::Admin | Self::Editor | Self::Viewer => true,
        }
    }

    #[must_use]
    pub const fn can_edit_credentials(self) -> bool {
        match self {
            Self::Owner | Self::Admin | Self::Editor => true,
            Self::Viewer => false,
        }
    }

    #[must_use]
    pub const fn can_delete_credentials(self) -> bool {
        match self {
            Self::Owner | Self::Admin => true,
            Self::Editor | Self::Viewer => false,
        }
    }

    #[must_use]
    pub const fn can_manage_members(self) -> bool {
        match self {
            Self::Owner | Self::Admin => true,
            Self::Editor | Self::Viewer => false,
        }
    }

    /// Rename the vault or change its description and icon.
    #[must_use]
    pub const fn can_manage_vault(self) -> bool {
        match self {
            Self::Owner | Self::Admin => true,
            Self::Editor | Self::Viewer => false,
        }
    }

    #[must_use]
    pub const fn can_delete_vault(self) -> bool {
        match self {
            Self::Owner => true,
            Self::Admin | Self::Editor | Self::Viewer => false,
        }
    }

    /// Dispatch a [`Capability`] to the matching predicate.
    #[must_use]
    pub const fn allows(self, capability: Capability) -> bool {
        match capability {
            Capability::ViewCredentials => self.can_view_credentials(),
            Capability::EditCredentials => self.can_edit_credentials(),
            Capability::DeleteCredentials => self.can_delete_credentials(),
            Capability::ManageMembers => self.can_manage_members(),
            Capability::ManageVault => self.can_manage_vault(),
            Capability::DeleteVault => self.can_delete_vault(),
        }
    }

    /// Whether the member-management path may grant this role.
    #[must_use]
    pub fn is_assignable(self) -> bool {
        ASSIGNABLE_VAULT_ROLES.contains(&self)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
        }
    }

    /// Lenient reader for persisted role values.
    ///
    /// Anything unrecognised yields `None`, which callers treat as "no
    /// capabilities at all".
    #[must_use]
    pub fn from_stored(value: &str) -> Option<Self> {
        match value {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "editor" => Some(Self::Editor),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }
}

impl std::fmt::Display for VaultRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VaultRole {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_stored(s.trim().to_lowercase().as_str()).ok_or_else(|| {
            ServiceError::InvalidRole {
                value: s.to_owned(),
            }
        })
    }
}

// ── User status ──────────────────────────────────────────────────────

/// Account lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "postgres-backend",
    derive(sqlx::Type),
    sqlx(type_name = "text", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Invited,
}

/// What is driving a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTrigger {
    /// The user's password was set or reset.
    PasswordSet,
    /// An administrator enabled or disabled the account.
    Admin,
}

impl UserStatus {
    /// Whether `self → next` is a legal transition for the given trigger.
    ///
    /// Staying in the same state is always legal. `invited` is never a
    /// destination.
    #[must_use]
    pub const fn can_transition_to(self, next: Self, trigger: StatusTrigger) -> bool {
        match (self, next, trigger) {
            (Self::Active, Self::Active, _)
            | (Self::Inactive, Self::Inactive, _)
            | (Self::Invited, Self::Invited, _)
            | (Self::Invited, Self::Active, StatusTrigger::PasswordSet)
            | (Self::Active, Self::Inactive, StatusTrigger::Admin)
            | (Self::Inactive, Self::Active, StatusTrigger::Admin) => true,
            (_, Self::Invited, _)
            | (Self::Invited, Self::Active | Self::Inactive, _)
            | (Self::Active | Self::Inactive, _, _) => false,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Invited => "invited",
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "invited" => Ok(Self::Invited),
            other => Err(ServiceError::InvalidStatus {
                reason: format!("unknown status: {other}"),
            }),
        }
    }
}

// ── Account type ─────────────────────────────────────────────────────

/// Whether an account lives in its own personal tenant or a shared one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "postgres-backend",
    derive(sqlx::Type),
    sqlx(type_name = "text", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Personal,
    Team,
}

impl AccountType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Personal => "personal",
            Self::Team => "team",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountType {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "personal" => Ok(Self::Personal),
            "team" => Ok(Self::Team),
            other => Err(ServiceError::InvalidAccountType {
                value: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const ALL_VAULT_ROLES: [VaultRole; 4] = [
        VaultRole::Owner,
        VaultRole::Admin,
        VaultRole::Editor,
        VaultRole::Viewer,
    ];

    #[test]
    fn capability_table_matches_roles() {
        assert!(VaultRole::Viewer.can_view_credentials());
        assert!(!VaultRole::Viewer.can_edit_credentials());
        assert!(VaultRole::Editor.can_edit_credentials());
        assert!(!VaultRole::Editor.can_delete_credentials());
        assert!(!VaultRole::Editor.can_manage_members());
        assert!(VaultRole::Admin.can_delete_credentials());
        assert!(VaultRole::Admin.can_manage_members());
        assert!(!VaultRole::Admin.can_delete_vault());
        assert!(VaultRole::Owner.can_delete_vault());
    }

    #[test]
    fn capabilities_are_monotone() {
        for role in ALL_VAULT_ROLES {
            if role.can_delete_credentials() {
                assert!(role.can_edit_credentials(), "{role} deletes but cannot edit");
            }
            if role.can_edit_credentials() {
                assert!(role.can_view_credentials(), "{role} edits but cannot view");
            }
            if role.can_manage_members() {
                assert!(role.can_view_credentials());
            }
        }
    }

    #[test]
    fn allows_dispatches_to_predicates() {
        assert!(VaultRole::Editor.allows(Capability::EditCredentials));
        assert!(!VaultRole::Editor.allows(Capability::DeleteCredentials));
        assert!(!VaultRole::Viewer.allows(Capability::ManageMembers));
        assert!(!VaultRole::Admin.allows(Capability::DeleteVault));
    }

    #[test]
    fn unknown_stored_role_has_no_role() {
        assert_eq!(VaultRole::from_stored("superuser"), None);
        assert_eq!(VaultRole::from_stored("Owner"), None);
        assert_eq!(VaultRole::from_stored("viewer"), Some(VaultRole::Viewer));
    }

    #[test]
    fn parsing_rejects_unknown_values() {
        assert!("editor".parse::<VaultRole>().is_ok());
        assert!(" Viewer ".parse::<VaultRole>().is_ok());
        assert!(matches!(
            "root".parse::<VaultRole>(),
            Err(ServiceError::InvalidRole { .. })
        ));
        assert!(matches!(
            "god".parse::<UserRole>(),
            Err(ServiceError::InvalidRole { .. })
        ));
        assert!(matches!(
            "banned".parse::<UserStatus>(),
            Err(ServiceError::InvalidStatus { .. })
        ));
        assert!(matches!(
            "family".parse::<AccountType>(),
            Err(ServiceError::InvalidAccountType { .. })
        ));
    }

    #[test]
    fn owner_is_not_assignable() {
        assert!(!VaultRole::Owner.is_assignable());
        assert!(ASSIGNABLE_VAULT_ROLES.iter().all(|r| r.is_assignable()));
    }

    #[test]
    fn admin_predicates() {
        assert!(UserRole::SuperAdmin.is_admin());
        assert!(UserRole::SuperAdmin.is_super_admin());
        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::Admin.is_super_admin());
        assert!(!UserRole::User.is_admin());
    }

    #[test]
    fn status_machine() {
        use StatusTrigger::{Admin, PasswordSet};
        use UserStatus::{Active, Inactive, Invited};

        assert!(Invited.can_transition_to(Active, PasswordSet));
        assert!(!Invited.can_transition_to(Active, Admin));
        assert!(!Invited.can_transition_to(Inactive, Admin));
        assert!(Active.can_transition_to(Inactive, Admin));
        assert!(Inactive.can_transition_to(Active, Admin));
        assert!(!Active.can_transition_to(Invited, Admin));
        assert!(!Inactive.can_transition_to(Invited, PasswordSet));
        assert!(Active.can_transition_to(Active, PasswordSet));
    }

    #[test]
    fn serde_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&UserRole::SuperAdmin).unwrap(),
            "\"super_admin\""
        );
        assert_eq!(serde_json::to_string(&VaultRole::Editor).unwrap(), "\"editor\"");
    }
}
