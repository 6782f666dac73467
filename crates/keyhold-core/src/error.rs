//! Error types for `keyhold-core`.
//!
//! Two layers: [`StoreError`] is what a persistence backend reports, and
//! [`ServiceError`] is what a service operation reports to its caller. Every
//! `ServiceError` collapses to one [`ErrorKind`] so the transport layer can
//! pick a status without matching on individual variants.

use crate::guard::DenyReason;
use crate::token::TokenError;

/// The kind of record an operation was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Tenant,
    User,
    Vault,
    Credential,
    Membership,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tenant => write!(f, "tenant"),
            Self::User => write!(f, "user"),
            Self::Vault => write!(f, "vault"),
            Self::Credential => write!(f, "credential"),
            Self::Membership => write!(f, "membership"),
        }
    }
}

/// Errors reported by a [`Store`](crate::store::Store) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The row being updated or deleted does not exist.
    #[error("{resource} not found")]
    NotFound { resource: Resource },

    /// A uniqueness constraint was violated.
    #[error("conflict: {reason}")]
    Conflict { reason: String },

    /// An owner membership row was the target of a write.
    #[error("owner membership is immutable")]
    OwnerImmutable,

    /// The backend could not be reached in time (pool exhausted, timeout,
    /// connection dropped).
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },

    /// Any other backend failure.
    #[error("store error: {reason}")]
    Backend { reason: String },
}

/// Coarse classification of a [`ServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    AccessDenied,
    PersonalVaultNoMembers,
    InvalidRole,
    InvalidStatus,
    InvalidAccountType,
    InvalidInput,
    Conflict,
    SelfModificationDenied,
    Unauthenticated,
    SystemError,
}

/// Errors reported by service operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{resource} not found")]
    NotFound { resource: Resource },

    #[error("access denied: {reason}")]
    AccessDenied { reason: DenyReason },

    #[error("personal vaults cannot have members")]
    PersonalVaultNoMembers,

    #[error("invalid role: {value}")]
    InvalidRole { value: String },

    #[error("invalid status: {reason}")]
    InvalidStatus { reason: String },

    #[error("invalid account type: {value}")]
    InvalidAccountType { value: String },

    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("conflict: {reason}")]
    Conflict { reason: String },

    /// The vault owner's membership cannot be changed or removed.
    #[error("owner membership is immutable")]
    OwnerImmutable,

    #[error("cannot modify your own account through user administration")]
    SelfModificationDenied,

    #[error("unauthenticated: {reason}")]
    Unauthenticated { reason: String },

    /// Backend failure. Detail is for logs only.
    #[error(transparent)]
    Store(StoreError),

    /// Hashing, token signing, or another local failure.
    #[error("internal error: {reason}")]
    Internal { reason: String },
}

impl ServiceError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::PersonalVaultNoMembers => ErrorKind::PersonalVaultNoMembers,
            Self::InvalidRole { .. } => ErrorKind::InvalidRole,
            Self::InvalidStatus { .. } => ErrorKind::InvalidStatus,
            Self::InvalidAccountType { .. } => ErrorKind::InvalidAccountType,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::Conflict { .. } | Self::OwnerImmutable => ErrorKind::Conflict,
            Self::SelfModificationDenied => ErrorKind::SelfModificationDenied,
            Self::Unauthenticated { .. } => ErrorKind::Unauthenticated,
            Self::Store(_) | Self::Internal { .. } => ErrorKind::SystemError,
        }
    }

    /// Only system errors are worth retrying; everything else is a
    /// deterministic answer about the request.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::SystemError)
    }

    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { resource } => Self::NotFound { resource },
            StoreError::Conflict { reason } => Self::Conflict { reason },
            StoreError::OwnerImmutable => Self::OwnerImmutable,
            other @ (StoreError::Unavailable { .. } | StoreError::Backend { .. }) => {
                Self::Store(other)
            }
        }
    }
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::Unauthenticated {
                reason: "token expired".to_owned(),
            },
            TokenError::Invalid { .. } => Self::Unauthenticated {
                reason: "invalid token".to_owned(),
            },
            TokenError::Signing { reason } => Self::Internal { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_system_errors_are_retryable() {
        let unavailable = ServiceError::from(StoreError::Unavailable {
            reason: "pool timed out".to_owned(),
        });
        assert_eq!(unavailable.kind(), ErrorKind::SystemError);
        assert!(unavailable.is_retryable());

        let denied = ServiceError::AccessDenied {
            reason: DenyReason::NoMembership,
        };
        assert!(!denied.is_retryable());
        assert!(!ServiceError::PersonalVaultNoMembers.is_retryable());
    }

    #[test]
    fn store_errors_keep_their_meaning() {
        let nf = ServiceError::from(StoreError::NotFound {
            resource: Resource::Vault,
        });
        assert!(matches!(
            nf,
            ServiceError::NotFound {
                resource: Resource::Vault
            }
        ));
        let owner = ServiceError::from(StoreError::OwnerImmutable);
        assert_eq!(owner.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn system_error_message_is_transparent_for_logs() {
        let err = ServiceError::from(StoreError::Backend {
            reason: "relation \"vaults\" does not exist".to_owned(),
        });
        assert!(err.to_string().contains("vaults"));
    }
}
