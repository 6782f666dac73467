//! User administration.
//!
//! Admin-only management of accounts. Plain admins act inside their own
//! tenant; super admins act everywhere. The `super_admin` role can only be
//! granted, revoked, or touched by another super admin, and nobody can use
//! this path on their own account.
//!
//! Status follows a fixed machine: `invited → active` only by setting a
//! password, `active ⇄ inactive` only by an admin, and nothing ever goes
//! back to `invited`.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::crypto::{PasswordHasher, check_password_strength, generate_master_key_salt};
use crate::error::{Resource, ServiceError};
use crate::guard::{Caller, DenyReason, Guard};
use crate::models::{Tenant, User};
use crate::role::{AccountType, StatusTrigger, UserRole, UserStatus};
use crate::store::Store;
use crate::tenant::slugify;

/// Slug of the tenant that holds bootstrap super admins.
pub const SYSTEM_TENANT_SLUG: &str = "system";

/// Fields accepted when an admin creates an account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    /// Without a password the account starts `invited`.
    #[serde(default)]
    pub password: Option<String>,
    /// Defaults to `user`.
    #[serde(default)]
    pub role: Option<String>,
    /// `personal` or `team`. Defaults to `team`.
    #[serde(default)]
    pub account_type: Option<String>,
    /// Required for team accounts.
    #[serde(default)]
    pub tenant_id: Option<Uuid>,
}

/// Partial user update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// `personal` or `team`. Only super admins may switch to `personal`.
    #[serde(default)]
    pub account_type: Option<String>,
}

/// Lowercase and sanity-check an email address.
pub(crate) fn normalize_email(raw: &str) -> Result<String, ServiceError> {
    let email = raw.trim().to_lowercase();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid {
        return Err(ServiceError::invalid_input("a valid email is required"));
    }
    Ok(email)
}

/// Slug of the personal tenant created for `email`.
pub(crate) fn personal_slug(email: &str) -> String {
    let base = slugify(&email.replace('@', "-at-"));
    let mut slug: String = base.chars().take(55).collect();
    while slug.ends_with('-') {
        slug.pop();
    }
    format!("{slug}-personal")
}

/// Build a user record with fresh id, timestamps, and master-key salt.
pub(crate) fn new_user_record(
    tenant_id: Uuid,
    email: String,
    name: String,
    role: UserRole,
    account_type: AccountType,
    password_hash: Option<String>,
) -> User {
    let now = Utc::now();
    let status = if password_hash.is_some() {
        UserStatus::Active
    } else {
        UserStatus::Invited
    };
    User {
        id: Uuid::new_v4(),
        tenant_id,
        email,
        name,
        avatar: String::new(),
        password_hash,
        master_key_salt: generate_master_key_salt(),
        oauth_provider: None,
        oauth_id: None,
        role,
        account_type,
        status,
        created_at: now,
        updated_at: now,
    }
}

fn transition(user: &mut User, next: UserStatus, trigger: StatusTrigger) -> Result<(), ServiceError> {
    if !user.status.can_transition_to(next, trigger) {
        return Err(ServiceError::InvalidStatus {
            reason: format!("cannot move from {} to {}", user.status, next),
        });
    }
    user.status = next;
    Ok(())
}

/// Admin user management.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    guard: Guard,
    hasher: Arc<dyn PasswordHasher>,
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService").finish_non_exhaustive()
    }
}

impl UserService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, hasher: Arc<dyn PasswordHasher>) -> Self {
        let guard = Guard::new(Arc::clone(&store));
        Self {
            store,
            guard,
            hasher,
        }
    }

    /// Create an account.
    ///
    /// Team accounts join an existing tenant the caller administers.
    /// Personal accounts get a fresh tenant of their own, created atomically
    /// with the user; since that tenant is outside every plain admin's
    /// scope, only super admins may create them.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::AccessDenied`] for non-admins, out-of-tenant
    ///   targets, or granting `super_admin` without being one
    /// - [`ServiceError::InvalidRole`] / [`ServiceError::InvalidAccountType`]
    /// - [`ServiceError::InvalidInput`] for a bad email, blank name, short
    ///   password, or a team account without a tenant
    /// - [`ServiceError::Conflict`] when the email is already registered
    pub async fn create_user(&self, caller: &Caller, input: NewUser) -> Result<User, ServiceError> {
        let actor = self.guard.admin(caller).await?;

        let role: UserRole = match input.role.as_deref() {
            Some(r) => r.parse()?,
            None => UserRole::User,
        };
        let account_type: AccountType = match input.account_type.as_deref() {
            Some(t) => t.parse()?,
            None => AccountType::Team,
        };
        if role.is_super_admin() && !actor.role.is_super_admin() {
            return Err(ServiceError::AccessDenied {
                reason: DenyReason::SuperAdminOnly,
            });
        }

        let email = normalize_email(&input.email)?;
        let name = input.name.trim().to_owned();
        if name.is_empty() {
            return Err(ServiceError::invalid_input("name is required"));
        }
        if let Some(password) = input.password.as_deref() {
            check_password_strength(password)?;
        }

        if self.store.get_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::conflict("email is already registered"));
        }

        let user = match account_type {
            AccountType::Team => {
                let tenant_id = input
                    .tenant_id
                    .ok_or_else(|| ServiceError::invalid_input("tenant_id is required for team accounts"))?;
                if self.store.get_tenant(tenant_id).await?.is_none() {
                    return Err(ServiceError::NotFound {
                        resource: Resource::Tenant,
                    });
                }
                Guard::tenant_admin(&actor, tenant_id).require()?;

                let hash = self.hash_optional(input.password.as_deref())?;
                let user = new_user_record(tenant_id, email, name, role, account_type, hash);
                self.store.create_user(&user).await?;
                user
            }
            AccountType::Personal => {
                if !actor.role.is_super_admin() {
                    return Err(ServiceError::AccessDenied {
                        reason: DenyReason::OutsideTenant,
                    });
                }
                let slug = personal_slug(&email);
                if self.store.get_tenant_by_slug(&slug).await?.is_some() {
                    return Err(ServiceError::conflict(format!("slug '{slug}' is already taken")));
                }
                let tenant = Tenant::new(&format!("{name}'s Personal Space"), &slug);
                let hash = self.hash_optional(input.password.as_deref())?;
                let user = new_user_record(tenant.id, email, name, role, account_type, hash);
                self.store.create_user_with_tenant(&tenant, &user).await?;
                user
            }
        };

        info!(
            user_id = %user.id,
            tenant_id = %user.tenant_id,
            role = %user.role,
            status = %user.status,
            created_by = %actor.id,
            "user created"
        );
        Ok(user)
    }

    /// List users. Super admins may pass any tenant or none (all users);
    /// plain admins only see their own tenant.
    ///
    /// # Errors
    ///
    /// [`ServiceError::AccessDenied`] for non-admins or another tenant.
    pub async fn list_users(
        &self,
        caller: &Caller,
        tenant_id: Option<Uuid>,
    ) -> Result<Vec<User>, ServiceError> {
        let actor = self.guard.admin(caller).await?;
        let scope = if actor.role.is_super_admin() {
            tenant_id
        } else {
            let target = tenant_id.unwrap_or(actor.tenant_id);
            Guard::tenant_admin(&actor, target).require()?;
            Some(target)
        };
        Ok(self.store.list_users(scope).await?)
    }

    /// # Errors
    ///
    /// [`ServiceError::AccessDenied`] for non-admins, then
    /// [`ServiceError::NotFound`], then [`ServiceError::AccessDenied`] for
    /// another tenant.
    pub async fn get_user(&self, caller: &Caller, id: Uuid) -> Result<User, ServiceError> {
        let actor = self.guard.admin(caller).await?;
        let target = self.load(id).await?;
        Guard::tenant_admin(&actor, target.tenant_id).require()?;
        Ok(target)
    }

    /// Change name, avatar, role, status, or account type of another account.
    ///
    /// # Errors
    ///
    /// [`ServiceError::SelfModificationDenied`] on the caller's own account,
    /// [`ServiceError::InvalidRole`] / [`ServiceError::InvalidStatus`] /
    /// [`ServiceError::InvalidAccountType`] for bad values or illegal
    /// transitions, plus the scoping errors of
    /// [`UserService::get_user`].
    pub async fn update_user(
        &self,
        caller: &Caller,
        id: Uuid,
        patch: UserPatch,
    ) -> Result<User, ServiceError> {
        let (actor, mut target) = self.load_target(caller, id).await?;

        if let Some(name) = patch.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ServiceError::invalid_input("name is required"));
            }
            name.clone_into(&mut target.name);
        }
        if let Some(avatar) = patch.avatar {
            target.avatar = avatar;
        }
        if let Some(role) = patch.role.as_deref() {
            let role: UserRole = role.parse()?;
            if role.is_super_admin() && !actor.role.is_super_admin() {
                return Err(ServiceError::AccessDenied {
                    reason: DenyReason::SuperAdminOnly,
                });
            }
            target.role = role;
        }
        if let Some(account_type) = patch.account_type.as_deref() {
            let account_type: AccountType = account_type.parse()?;
            if account_type == AccountType::Personal
                && target.account_type != AccountType::Personal
                && !actor.role.is_super_admin()
            {
                return Err(ServiceError::AccessDenied {
                    reason: DenyReason::SuperAdminOnly,
                });
            }
            target.account_type = account_type;
        }
        if let Some(status) = patch.status.as_deref() {
            let status: UserStatus = status.parse()?;
            transition(&mut target, status, StatusTrigger::Admin)?;
        }
        target.updated_at = Utc::now();
        self.store.update_user(&target).await?;

        info!(user_id = %target.id, role = %target.role, status = %target.status, updated_by = %actor.id, "user updated");
        Ok(target)
    }

    /// Deactivate an active account. Idempotent on inactive accounts.
    ///
    /// # Errors
    ///
    /// [`ServiceError::InvalidStatus`] for invited accounts, plus the errors
    /// of [`UserService::update_user`].
    pub async fn disable_user(&self, caller: &Caller, id: Uuid) -> Result<User, ServiceError> {
        self.set_status(caller, id, UserStatus::Inactive).await
    }

    /// Reactivate an inactive account. Idempotent on active accounts.
    ///
    /// # Errors
    ///
    /// [`ServiceError::InvalidStatus`] for invited accounts, plus the errors
    /// of [`UserService::update_user`].
    pub async fn enable_user(&self, caller: &Caller, id: Uuid) -> Result<User, ServiceError> {
        self.set_status(caller, id, UserStatus::Active).await
    }

    /// Set a new login password. Activates an invited account; an inactive
    /// account stays inactive.
    ///
    /// # Errors
    ///
    /// [`ServiceError::InvalidInput`] for a short password, plus the errors
    /// of [`UserService::update_user`].
    pub async fn reset_password(
        &self,
        caller: &Caller,
        id: Uuid,
        new_password: &str,
    ) -> Result<User, ServiceError> {
        let (actor, mut target) = self.load_target(caller, id).await?;
        check_password_strength(new_password)?;

        target.password_hash = Some(self.hasher.hash(new_password)?);
        if target.status == UserStatus::Invited {
            transition(&mut target, UserStatus::Active, StatusTrigger::PasswordSet)?;
        }
        target.updated_at = Utc::now();
        self.store.update_user(&target).await?;

        info!(user_id = %target.id, status = %target.status, reset_by = %actor.id, "password reset");
        Ok(target)
    }

    /// Create the first super admin in the `system` tenant.
    ///
    /// Does nothing and returns `None` when a super admin already exists.
    ///
    /// # Errors
    ///
    /// [`ServiceError::InvalidInput`] for a bad email or short password,
    /// [`ServiceError::Conflict`] if the email belongs to another account.
    pub async fn bootstrap_super_admin(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<Option<User>, ServiceError> {
        if self.store.has_super_admin().await? {
            return Ok(None);
        }
        let email = normalize_email(email)?;
        check_password_strength(password)?;
        if self.store.get_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::conflict("email is already registered"));
        }

        let hash = Some(self.hasher.hash(password)?);
        let name = if name.trim().is_empty() {
            "Super Admin".to_owned()
        } else {
            name.trim().to_owned()
        };

        let user = match self.store.get_tenant_by_slug(SYSTEM_TENANT_SLUG).await? {
            Some(system) => {
                let user = new_user_record(system.id, email, name, UserRole::SuperAdmin, AccountType::Team, hash);
                self.store.create_user(&user).await?;
                user
            }
            None => {
                let system = Tenant::new("System", SYSTEM_TENANT_SLUG);
                let user = new_user_record(system.id, email, name, UserRole::SuperAdmin, AccountType::Team, hash);
                self.store.create_user_with_tenant(&system, &user).await?;
                user
            }
        };

        warn!(user_id = %user.id, email = %user.email, "bootstrap super admin created");
        Ok(Some(user))
    }

    async fn set_status(
        &self,
        caller: &Caller,
        id: Uuid,
        next: UserStatus,
    ) -> Result<User, ServiceError> {
        let (actor, mut target) = self.load_target(caller, id).await?;
        transition(&mut target, next, StatusTrigger::Admin)?;
        target.updated_at = Utc::now();
        self.store.update_user(&target).await?;

        info!(user_id = %target.id, status = %target.status, changed_by = %actor.id, "user status changed");
        Ok(target)
    }

    /// Everything a write to another account must pass: caller is an admin,
    /// target exists, target is not the caller, target is in scope, and a
    /// super-admin target is only touched by a super admin.
    async fn load_target(&self, caller: &Caller, id: Uuid) -> Result<(User, User), ServiceError> {
        let actor = self.guard.admin(caller).await?;
        let target = self.load(id).await?;
        if target.id == actor.id {
            return Err(ServiceError::SelfModificationDenied);
        }
        Guard::tenant_admin(&actor, target.tenant_id).require()?;
        if target.role.is_super_admin() && !actor.role.is_super_admin() {
            return Err(ServiceError::AccessDenied {
                reason: DenyReason::SuperAdminOnly,
            });
        }
        Ok((actor, target))
    }

    async fn load(&self, id: Uuid) -> Result<User, ServiceError> {
        self.store
            .get_user(id)
            .await?
            .ok_or(ServiceError::NotFound {
                resource: Resource::User,
            })
    }

    fn hash_optional(&self, password: Option<&str>) -> Result<Option<String>, ServiceError> {
        password.map(|p| self.hasher.hash(p)).transpose()
    }
}
