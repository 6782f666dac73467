//! Authentication.
//!
//! Self-service registration, password login, OAuth login, and turning a
//! bearer token back into a [`Caller`]. The OAuth handshake itself happens
//! elsewhere; this module only receives the provider's verified profile.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::crypto::{PasswordHasher, check_password_strength};
use crate::error::ServiceError;
use crate::guard::Caller;
use crate::models::{Tenant, User};
use crate::role::{AccountType, UserRole, UserStatus};
use crate::store::Store;
use crate::tenant::{normalize_slug, slugify};
use crate::token::TokenVerifier;
use crate::user::{new_user_record, normalize_email};

/// Self-service signup: a new tenant with its first admin.
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub tenant_name: String,
    pub tenant_slug: String,
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Identity asserted by an external OAuth provider.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthProfile {
    pub provider: String,
    pub external_id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub avatar: String,
}

/// A signed-in user and their bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

const BAD_CREDENTIALS: &str = "invalid email or password";

fn unauthenticated(reason: &str) -> ServiceError {
    ServiceError::Unauthenticated {
        reason: reason.to_owned(),
    }
}

/// Registration, login, and token handling.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenVerifier>,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService").finish_non_exhaustive()
    }
}

impl AuthService {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
        }
    }

    /// Create a tenant and its first admin, then sign them in.
    ///
    /// # Errors
    ///
    /// [`ServiceError::InvalidInput`] for blank names, a malformed slug or
    /// email, or a short password; [`ServiceError::Conflict`] when the slug
    /// or email is taken.
    pub async fn register(&self, input: Registration) -> Result<Session, ServiceError> {
        let tenant_name = input.tenant_name.trim();
        let name = input.name.trim();
        if tenant_name.is_empty() || name.is_empty() {
            return Err(ServiceError::invalid_input("tenant name and user name are required"));
        }
        let slug = normalize_slug(&input.tenant_slug)?;
        let email = normalize_email(&input.email)?;
        check_password_strength(&input.password)?;

        if self.store.get_tenant_by_slug(&slug).await?.is_some() {
            return Err(ServiceError::conflict(format!("slug '{slug}' is already taken")));
        }
        if self.store.get_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::conflict("email is already registered"));
        }

        let tenant = Tenant::new(tenant_name, &slug);
        let hash = self.hasher.hash(&input.password)?;
        let user = new_user_record(
            tenant.id,
            email,
            name.to_owned(),
            UserRole::Admin,
            AccountType::Team,
            Some(hash),
        );
        self.store.create_user_with_tenant(&tenant, &user).await?;

        info!(user_id = %user.id, tenant_id = %tenant.id, slug = %tenant.slug, "account registered");
        self.session(user)
    }

    /// Password login. Only active accounts may sign in.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Unauthenticated`] for an unknown email, a wrong
    /// password, an account without a password, or a non-active account.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ServiceError> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.store.get_user_by_email(&email).await? else {
            return Err(unauthenticated(BAD_CREDENTIALS));
        };
        let Some(hash) = user.password_hash.as_deref() else {
            return Err(unauthenticated(BAD_CREDENTIALS));
        };
        if !self.hasher.verify(password, hash)? {
            warn!(user_id = %user.id, "failed login");
            return Err(unauthenticated(BAD_CREDENTIALS));
        }
        if !user.is_active() {
            return Err(unauthenticated("account is not active"));
        }

        info!(user_id = %user.id, "user logged in");
        self.session(user)
    }

    /// Sign in with an external identity.
    ///
    /// Finds the account linked to the provider id, else links the account
    /// with the same email, else creates a new workspace tenant with the
    /// user as its admin.
    ///
    /// # Errors
    ///
    /// [`ServiceError::InvalidInput`] for a bad email,
    /// [`ServiceError::Unauthenticated`] for a non-active account.
    pub async fn oauth_login(&self, profile: OAuthProfile) -> Result<Session, ServiceError> {
        if let Some(user) = self
            .store
            .get_user_by_oauth(&profile.provider, &profile.external_id)
            .await?
        {
            return self.active_session(user);
        }

        let email = normalize_email(&profile.email)?;
        if let Some(mut user) = self.store.get_user_by_email(&email).await? {
            user.oauth_provider = Some(profile.provider.clone());
            user.oauth_id = Some(profile.external_id.clone());
            if user.avatar.is_empty() {
                user.avatar = profile.avatar;
            }
            user.updated_at = chrono::Utc::now();
            self.store.update_user(&user).await?;
            info!(user_id = %user.id, provider = %profile.provider, "oauth identity linked");
            return self.active_session(user);
        }

        let name = if profile.name.trim().is_empty() {
            email.split('@').next().unwrap_or_default().to_owned()
        } else {
            profile.name.trim().to_owned()
        };
        let id_prefix: String = profile.external_id.chars().take(8).collect();
        let slug = slugify(&format!("{}-{id_prefix}", slugify(&name)));
        let tenant = Tenant::new(&format!("{name}'s Workspace"), &slug);

        let mut user = new_user_record(tenant.id, email, name, UserRole::Admin, AccountType::Team, None);
        user.oauth_provider = Some(profile.provider.clone());
        user.oauth_id = Some(profile.external_id);
        user.avatar = profile.avatar;
        user.status = UserStatus::Active;
        self.store.create_user_with_tenant(&tenant, &user).await?;

        info!(user_id = %user.id, tenant_id = %tenant.id, provider = %profile.provider, "oauth account created");
        self.session(user)
    }

    /// The caller's master-key salt.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Unauthenticated`] if the account is gone.
    pub async fn salt(&self, caller: &Caller) -> Result<String, ServiceError> {
        self.store
            .get_user(caller.user_id)
            .await?
            .map(|u| u.master_key_salt)
            .ok_or_else(|| unauthenticated("account no longer exists"))
    }

    /// Resolve a bearer token to the caller it was issued for.
    ///
    /// The account must still exist and be active. The tenant is taken from
    /// the account, not the token, so a user who moved tenants is scoped to
    /// where they are now.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Unauthenticated`] for a bad or expired token or a
    /// missing or non-active account.
    pub async fn authenticate(&self, token: &str) -> Result<(Caller, User), ServiceError> {
        let claims = self.tokens.verify(token)?;
        let Some(user) = self.store.get_user(claims.sub).await? else {
            return Err(unauthenticated("account no longer exists"));
        };
        if !user.is_active() {
            return Err(unauthenticated("account is not active"));
        }
        let caller = Caller {
            user_id: user.id,
            tenant_id: user.tenant_id,
            email: user.email.clone(),
        };
        Ok((caller, user))
    }

    /// Issue a token for the user's current identity.
    ///
    /// # Errors
    ///
    /// [`ServiceError::Internal`] if signing fails.
    pub fn issue_token(&self, user: &User) -> Result<String, ServiceError> {
        let caller = Caller {
            user_id: user.id,
            tenant_id: user.tenant_id,
            email: user.email.clone(),
        };
        Ok(self.tokens.issue(&caller)?)
    }

    fn session(&self, user: User) -> Result<Session, ServiceError> {
        let token = self.issue_token(&user)?;
        Ok(Session { token, user })
    }

    fn active_session(&self, user: User) -> Result<Session, ServiceError> {
        if !user.is_active() {
            return Err(unauthenticated("account is not active"));
        }
        info!(user_id = %user.id, "user logged in via oauth");
        self.session(user)
    }
}
