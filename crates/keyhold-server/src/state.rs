//! Shared application state for Keyhold server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`. Every service holds the same injected store.

use std::sync::Arc;

use keyhold_core::auth::AuthService;
use keyhold_core::credential::CredentialService;
use keyhold_core::crypto::PasswordHasher;
use keyhold_core::store::Store;
use keyhold_core::tenant::TenantService;
use keyhold_core::token::TokenVerifier;
use keyhold_core::user::UserService;
use keyhold_core::vault::VaultService;

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// The backing store, shared by every service.
    pub store: Arc<dyn Store>,
    pub auth: AuthService,
    pub tenants: TenantService,
    pub vaults: VaultService,
    pub credentials: CredentialService,
    pub users: UserService,
    /// Secret the OAuth callback service must present; `None` disables
    /// OAuth sign-in.
    pub oauth_bridge_secret: Option<String>,
}

impl AppState {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenVerifier>,
    ) -> Self {
        Self {
            auth: AuthService::new(Arc::clone(&store), Arc::clone(&hasher), tokens),
            tenants: TenantService::new(Arc::clone(&store)),
            vaults: VaultService::new(Arc::clone(&store)),
            credentials: CredentialService::new(Arc::clone(&store)),
            users: UserService::new(Arc::clone(&store), hasher),
            store,
            oauth_bridge_secret: None,
        }
    }

    /// Enable `POST /api/auth/oauth` for callers presenting `secret`.
    #[must_use]
    pub fn with_oauth_bridge_secret(mut self, secret: Option<String>) -> Self {
        self.oauth_bridge_secret = secret;
        self
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
