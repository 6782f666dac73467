//! HTTP error types for Keyhold server.
//!
//! Maps service errors from `keyhold-core` into HTTP responses. Every error
//! produces a JSON body with a machine-readable `error` field and a
//! human-readable `message`. System errors are logged and masked.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use keyhold_core::error::{ErrorKind, ServiceError};

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// A service operation failed.
    Service(ServiceError),
    /// Missing or malformed credentials on the request itself.
    Unauthorized(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    retryable: bool,
}

const fn status_and_code(kind: ErrorKind) -> (StatusCode, &'static str) {
    match kind {
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        ErrorKind::AccessDenied => (StatusCode::FORBIDDEN, "access_denied"),
        ErrorKind::PersonalVaultNoMembers => {
            (StatusCode::UNPROCESSABLE_ENTITY, "personal_vault_no_members")
        }
        ErrorKind::InvalidRole => (StatusCode::BAD_REQUEST, "invalid_role"),
        ErrorKind::InvalidStatus => (StatusCode::BAD_REQUEST, "invalid_status"),
        ErrorKind::InvalidAccountType => (StatusCode::BAD_REQUEST, "invalid_account_type"),
        ErrorKind::InvalidInput => (StatusCode::BAD_REQUEST, "bad_request"),
        ErrorKind::Conflict => (StatusCode::CONFLICT, "conflict"),
        ErrorKind::SelfModificationDenied => (StatusCode::FORBIDDEN, "self_modification_denied"),
        ErrorKind::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthorized"),
        ErrorKind::SystemError => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message, retryable) = match self {
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, false),
            Self::Service(err) => {
                let (status, code) = status_and_code(err.kind());
                if err.is_retryable() {
                    tracing::error!(error = %err, "internal error");
                    (status, code, "internal server error".to_owned(), true)
                } else {
                    (status, code, err.to_string(), false)
                }
            }
        };

        let body = ErrorBody {
            error,
            message,
            retryable,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        Self::Service(err)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use keyhold_core::error::{Resource, StoreError};
    use keyhold_core::guard::DenyReason;

    use super::*;

    async fn body_of(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn service_errors_map_to_statuses() {
        let cases = [
            (
                ServiceError::NotFound {
                    resource: Resource::Vault,
                },
                StatusCode::NOT_FOUND,
            ),
            (
                ServiceError::AccessDenied {
                    reason: DenyReason::NoMembership,
                },
                StatusCode::FORBIDDEN,
            ),
            (
                ServiceError::PersonalVaultNoMembers,
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ServiceError::InvalidRole {
                    value: "root".to_owned(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (ServiceError::OwnerImmutable, StatusCode::CONFLICT),
            (ServiceError::SelfModificationDenied, StatusCode::FORBIDDEN),
        ];
        for (err, expected) in cases {
            let (status, _) = body_of(AppError::from(err)).await;
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn system_errors_are_masked() {
        let err = ServiceError::from(StoreError::Backend {
            reason: "password authentication failed for user keyhold".to_owned(),
        });
        let (status, body) = body_of(AppError::from(err)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["message"], "internal server error");
        assert_eq!(body["retryable"], true);
    }

    #[tokio::test]
    async fn client_errors_carry_their_message() {
        let (_, body) = body_of(AppError::from(ServiceError::PersonalVaultNoMembers)).await;
        assert_eq!(body["error"], "personal_vault_no_members");
        assert_eq!(body["message"], "personal vaults cannot have members");
        assert!(body.get("retryable").is_none());
    }
}
