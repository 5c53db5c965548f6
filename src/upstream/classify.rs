use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::{AuthxError, ConflictKind};

const DETAIL_LIMIT: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// OAuth2 `access_denied` reported by the issuer.
    AccessDenied,
    /// OAuth2 `invalid_grant` / `invalid_client`: bad username, password or refresh token.
    InvalidGrant,
    /// Directory validation constraint, e.g. a duplicate `userName`.
    Conflict,
    /// Conditional write lost against a concurrent update.
    PreconditionFailed,
    Unclassified,
}

#[derive(Debug)]
pub enum UpstreamFailure {
    Timeout,
    Transport(String),
    Status {
        status: StatusCode,
        class: FailureClass,
        detail: String,
    },
    Malformed(String),
}

impl UpstreamFailure {
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamFailure::Timeout
        } else if err.is_decode() {
            UpstreamFailure::Malformed(err.to_string())
        } else {
            UpstreamFailure::Transport(err.to_string())
        }
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let json: Option<Value> = serde_json::from_str(body).ok();
        let class = classify(status, json.as_ref());
        let detail = json
            .as_ref()
            .and_then(describe)
            .unwrap_or_else(|| truncate(body));
        UpstreamFailure::Status {
            status,
            class,
            detail,
        }
    }

    pub fn class(&self) -> Option<FailureClass> {
        match self {
            UpstreamFailure::Status { class, .. } => Some(*class),
            _ => None,
        }
    }

    pub fn is_access_denied(&self) -> bool {
        self.class() == Some(FailureClass::AccessDenied)
    }

    /// Default mapping onto the error taxonomy.
    pub fn into_error(self, intent: &str) -> AuthxError {
        let intent = intent.to_owned();
        match self {
            UpstreamFailure::Timeout => AuthxError::UpstreamTimeout { intent },
            UpstreamFailure::Transport(detail) | UpstreamFailure::Malformed(detail) => {
                AuthxError::Upstream {
                    intent,
                    status: None,
                    detail,
                }
            }
            UpstreamFailure::Status {
                class: FailureClass::Conflict,
                detail,
                ..
            } => AuthxError::UpstreamConflict {
                intent,
                detail,
                kind: ConflictKind::Validation,
            },
            UpstreamFailure::Status {
                class: FailureClass::PreconditionFailed,
                detail,
                ..
            } => AuthxError::UpstreamConflict {
                intent,
                detail,
                kind: ConflictKind::StaleVersion,
            },
            UpstreamFailure::Status { status, detail, .. } => AuthxError::Upstream {
                intent,
                status: Some(status.as_u16()),
                detail,
            },
        }
    }
}

impl std::fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamFailure::Timeout => write!(f, "timed out"),
            UpstreamFailure::Transport(detail) => write!(f, "transport error: {}", detail),
            UpstreamFailure::Status { status, detail, .. } => write!(f, "{}: {}", status, detail),
            UpstreamFailure::Malformed(detail) => write!(f, "malformed response: {}", detail),
        }
    }
}

fn classify(status: StatusCode, json: Option<&Value>) -> FailureClass {
    let oauth_error = json
        .and_then(|v| v.get("error"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if oauth_error.starts_with("access_denied") {
        return FailureClass::AccessDenied;
    }
    if oauth_error == "invalid_grant" || oauth_error == "invalid_client" {
        return FailureClass::InvalidGrant;
    }
    if status == StatusCode::PRECONDITION_FAILED {
        return FailureClass::PreconditionFailed;
    }

    // SCIM error bodies carry the status as a string: {"status": "409", ...}
    let scim_status = json.and_then(|v| v.get("status")).and_then(|s| match s {
        Value::String(s) => s.parse::<u16>().ok(),
        Value::Number(n) => n.as_u64().map(|n| n as u16),
        _ => None,
    });
    let scim_type = json
        .and_then(|v| v.get("scimType"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if status == StatusCode::CONFLICT || scim_status == Some(409) || scim_type == "uniqueness" {
        return FailureClass::Conflict;
    }
    FailureClass::Unclassified
}

fn describe(json: &Value) -> Option<String> {
    ["detail", "error_description", "error"]
        .iter()
        .find_map(|key| json.get(*key).and_then(Value::as_str))
        .map(truncate)
}

fn truncate(raw: &str) -> String {
    if raw.len() <= DETAIL_LIMIT {
        return raw.to_owned();
    }
    let mut end = DETAIL_LIMIT;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &raw[..end])
}

/// Pass through 2xx responses, classify everything else.
pub async fn expect_success(
    response: Result<reqwest::Response, reqwest::Error>,
) -> Result<reqwest::Response, UpstreamFailure> {
    let response = response.map_err(|e| UpstreamFailure::from_transport(&e))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(UpstreamFailure::from_status(status, &body))
}

pub async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, UpstreamFailure> {
    let body = response
        .text()
        .await
        .map_err(|e| UpstreamFailure::from_transport(&e))?;
    serde_json::from_str(&body).map_err(|e| UpstreamFailure::Malformed(e.to_string()))
}
