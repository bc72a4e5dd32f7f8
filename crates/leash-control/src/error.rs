//! Maps the failure taxonomy in spec.md §4.11/§7 onto HTTP status codes and
//! a structured JSON body. No endpoint ever mutates the store before
//! returning an error (spec.md §4.11's propagation rule).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use leash_dsl::ErrorDetail;
use leash_policy::PolicyError;
use leash_secrets::VaultError;
use serde::Serialize;

/// Every error an endpoint in this crate can return.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The candidate source failed to lex or parse.
    #[error("{0}")]
    Compile(ErrorDetail),

    /// The candidate source compiled to zero rules.
    #[error("policy source compiled to zero rules")]
    EmptyProgram,

    /// The candidate would remove every network-connect allow.
    #[error("candidate policy removes all network-connect allows")]
    UnsafePolicy,

    /// A secret already exists under this id with a different value.
    #[error("secret '{0}' already exists with a different value")]
    Conflict(String),

    /// Bootstrap has not completed or the policy has not compiled.
    #[error("not ready: bootstrap or policy compilation has not completed")]
    NotReady,

    /// The request deadline elapsed before the operation completed.
    #[error("request cancelled: deadline exceeded")]
    Cancelled,

    /// An unrecoverable failure (kernel hard-fail, persistence failure, I/O).
    #[error("{0}")]
    Internal(String),
}

impl From<PolicyError> for ApiError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::CompileFailed(detail) => ApiError::Compile(detail),
            PolicyError::EmptyProgram => ApiError::EmptyProgram,
            PolicyError::RemovesAllConnectAllows => ApiError::UnsafePolicy,
            PolicyError::KernelPublishFailed(reason) => ApiError::Internal(reason),
            PolicyError::TempWriteFailed { .. } | PolicyError::PersistFailed { .. } | PolicyError::ReadFailed { .. } => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<leash_dsl::ParseError> for ApiError {
    fn from(err: leash_dsl::ParseError) -> Self {
        match err {
            leash_dsl::ParseError::Syntax(detail) => ApiError::Compile(detail),
            leash_dsl::ParseError::EmptyProgram => ApiError::EmptyProgram,
        }
    }
}

impl From<VaultError> for ApiError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Conflict(id) => ApiError::Conflict(id),
            VaultError::NotFound(id) => ApiError::Internal(format!("secret '{id}' not found")),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<ErrorDetail>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, detail) = match &self {
            ApiError::Compile(detail) => (StatusCode::BAD_REQUEST, detail.code.clone(), Some(detail.clone())),
            ApiError::EmptyProgram => (StatusCode::BAD_REQUEST, "empty-program".to_string(), None),
            ApiError::UnsafePolicy => (StatusCode::BAD_REQUEST, "no-connect-allow".to_string(), None),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "conflict".to_string(), None),
            ApiError::NotReady => (StatusCode::SERVICE_UNAVAILABLE, "not-ready".to_string(), None),
            ApiError::Cancelled => (StatusCode::SERVICE_UNAVAILABLE, "cancelled".to_string(), None),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal".to_string(), None),
        };
        let body = ErrorBody { code, message: self.to_string(), detail };
        (status, Json(body)).into_response()
    }
}
