use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;
use thiserror::Error;

pub type AuthxResult<T> = Result<T, AuthxError>;

/// Why a request was refused by the authorization gate or a credential check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedReason {
    MissingCredential,
    InsufficientScope,
    Denied,
    InvalidCredentials,
}

impl fmt::Display for UnauthorizedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            UnauthorizedReason::MissingCredential => "missing credential",
            UnauthorizedReason::InsufficientScope => "insufficient scope",
            UnauthorizedReason::Denied => "denied",
            UnauthorizedReason::InvalidCredentials => "invalid credentials",
        };
        f.write_str(reason)
    }
}

/// Why the directory refused a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Validation constraint, e.g. a duplicate `userName` or a password policy.
    Validation,
    /// `If-Match` precondition failed: the record changed since it was read.
    StaleVersion,
}

#[derive(Debug, Error)]
pub enum AuthxError {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("unauthorized: {0}")]
    Unauthorized(UnauthorizedReason),

    #[error("invalid or already used token")]
    InvalidToken,

    #[error("{intent}: issuer rejected the grant: {detail}")]
    UpstreamAuth { intent: String, detail: String },

    #[error("{intent}: {detail}")]
    UpstreamConflict {
        intent: String,
        detail: String,
        kind: ConflictKind,
    },

    #[error("{intent}: upstream failed (status {status:?}): {detail}")]
    Upstream {
        intent: String,
        status: Option<u16>,
        detail: String,
    },

    #[error("{intent}: upstream timed out")]
    UpstreamTimeout { intent: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthxError {
    /// Replace the user-facing intent of an upstream failure, keeping the
    /// upstream detail. Non-upstream kinds pass through untouched.
    pub fn with_intent(self, new_intent: &str) -> Self {
        match self {
            AuthxError::UpstreamAuth { detail, .. } => AuthxError::UpstreamAuth {
                intent: new_intent.to_owned(),
                detail,
            },
            AuthxError::UpstreamConflict { detail, kind, .. } => AuthxError::UpstreamConflict {
                intent: new_intent.to_owned(),
                detail,
                kind,
            },
            AuthxError::Upstream { status, detail, .. } => AuthxError::Upstream {
                intent: new_intent.to_owned(),
                status,
                detail,
            },
            AuthxError::UpstreamTimeout { .. } => AuthxError::UpstreamTimeout {
                intent: new_intent.to_owned(),
            },
            other => other,
        }
    }

    pub fn uninitialized_credential() -> Self {
        AuthxError::Internal("uninitialized credential".to_owned())
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AuthxError::Unauthorized(_))
    }

    /// A conditional write lost against a concurrent update.
    pub fn is_stale_write(&self) -> bool {
        matches!(
            self,
            AuthxError::UpstreamConflict {
                kind: ConflictKind::StaleVersion,
                ..
            }
        )
    }

    fn parts(&self) -> (StatusCode, &'static str, &'static str, String, Option<String>) {
        match self {
            AuthxError::Input(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_input",
                msg.clone(),
                None,
            ),
            AuthxError::Unauthorized(reason) => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "unauthorized",
                reason.to_string(),
                None,
            ),
            AuthxError::InvalidToken => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_token",
                "invalid or already used token".to_owned(),
                None,
            ),
            AuthxError::UpstreamAuth { intent, detail } => (
                StatusCode::BAD_GATEWAY,
                "upstream_error",
                "upstream_auth_failed",
                intent.clone(),
                Some(detail.clone()),
            ),
            AuthxError::UpstreamConflict { intent, detail, .. } => (
                StatusCode::CONFLICT,
                "upstream_error",
                "upstream_conflict",
                intent.clone(),
                Some(detail.clone()),
            ),
            AuthxError::Upstream { intent, detail, .. } => (
                StatusCode::BAD_GATEWAY,
                "upstream_error",
                "upstream_failed",
                intent.clone(),
                Some(detail.clone()),
            ),
            AuthxError::UpstreamTimeout { intent } => (
                StatusCode::GATEWAY_TIMEOUT,
                "timeout_error",
                "upstream_timeout",
                intent.clone(),
                None,
            ),
            AuthxError::Internal(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal_server_error",
                "internal server error".to_owned(),
                Some(detail.clone()),
            ),
        }
    }
}

impl From<JsonRejection> for AuthxError {
    fn from(rejection: JsonRejection) -> Self {
        AuthxError::Input(rejection.body_text())
    }
}

impl IntoResponse for AuthxError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message, detail) = self.parts();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = Json(json!({
            "success": false,
            "error": {
                "message": message,
                "type": error_type,
                "code": code,
                "detail": detail,
            }
        }));

        (status, body).into_response()
    }
}
