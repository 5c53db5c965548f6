use std::sync::Arc;

use tracing::{debug, warn};

use crate::credential::IssuerClient;
use crate::errors::{AuthxError, AuthxResult, UnauthorizedReason};
use crate::observability::metrics::get_metrics;
use crate::upstream::UpstreamFailure;
use crate::utils::constants::BEARER_PREFIX;

const AUTHORIZE_INTENT: &str = "unable to authorize the request";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    Granted,
    MissingCredential,
    InsufficientScope,
    Denied,
}

impl DecisionReason {
    fn as_label(&self) -> &'static str {
        match self {
            DecisionReason::Granted => "granted",
            DecisionReason::MissingCredential => "missing_credential",
            DecisionReason::InsufficientScope => "insufficient_scope",
            DecisionReason::Denied => "denied",
        }
    }
}

/// Outcome of one gate check. Never cached, never persisted.
#[derive(Debug, Clone)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    pub reason: DecisionReason,
    /// Subject reported by introspection, when the caller got that far.
    pub subject: Option<String>,
}

impl AuthorizationDecision {
    fn deny(reason: DecisionReason) -> Self {
        Self {
            allowed: false,
            reason,
            subject: None,
        }
    }

    /// Turn a denial into `Unauthorized`.
    pub fn into_result(self) -> AuthxResult<Self> {
        let reason = match self.reason {
            DecisionReason::Granted => return Ok(self),
            DecisionReason::MissingCredential => UnauthorizedReason::MissingCredential,
            DecisionReason::InsufficientScope => UnauthorizedReason::InsufficientScope,
            DecisionReason::Denied => UnauthorizedReason::Denied,
        };
        Err(AuthxError::Unauthorized(reason))
    }
}

/// Per-request bearer token check against the issuer's introspection endpoint.
pub struct AuthorizationGate {
    issuer: Arc<IssuerClient>,
    default_scope: String,
}

impl AuthorizationGate {
    pub fn new(issuer: Arc<IssuerClient>, default_scope: String) -> Self {
        Self {
            issuer,
            default_scope,
        }
    }

    pub fn default_scope(&self) -> &str {
        &self.default_scope
    }

    /// Allow, or fail with `Unauthorized` / a non-authorization error.
    pub async fn authorize(
        &self,
        authorization_header: Option<&str>,
        required_scope: Option<&str>,
    ) -> AuthxResult<AuthorizationDecision> {
        self.decide(authorization_header, required_scope)
            .await?
            .into_result()
    }

    /// Denials come back as `Ok` decisions; `Err` is reserved for failures
    /// to reach a decision at all.
    pub async fn decide(
        &self,
        authorization_header: Option<&str>,
        required_scope: Option<&str>,
    ) -> AuthxResult<AuthorizationDecision> {
        let scope = required_scope.unwrap_or(&self.default_scope);
        let decision = match bearer_token(authorization_header) {
            None => Ok(AuthorizationDecision::deny(DecisionReason::MissingCredential)),
            Some(token) => self.introspect(token, scope).await,
        };

        let label = match &decision {
            Ok(d) => d.reason.as_label(),
            Err(_) => "error",
        };
        get_metrics()
            .await
            .authorization_decisions
            .with_label_values(&[label])
            .inc();
        debug!(scope, decision = label, "authorization decided");
        decision
    }

    async fn introspect(&self, token: &str, scope: &str) -> AuthxResult<AuthorizationDecision> {
        match self.issuer.introspect(token).await {
            Ok(introspection) if !introspection.active => {
                Ok(AuthorizationDecision::deny(DecisionReason::Denied))
            }
            Ok(introspection) if !introspection.grants(scope) => {
                Ok(AuthorizationDecision::deny(DecisionReason::InsufficientScope))
            }
            Ok(introspection) => Ok(AuthorizationDecision {
                allowed: true,
                reason: DecisionReason::Granted,
                subject: introspection.sub.or(introspection.username),
            }),
            Err(failure) if failure.is_access_denied() => {
                debug!(detail = %failure, "issuer denied access");
                Ok(AuthorizationDecision::deny(DecisionReason::Denied))
            }
            Err(UpstreamFailure::Timeout) => Err(AuthxError::UpstreamTimeout {
                intent: AUTHORIZE_INTENT.to_owned(),
            }),
            Err(failure) => {
                warn!(detail = %failure, "introspection failed");
                Err(AuthxError::Internal(format!("{}: {}", AUTHORIZE_INTENT, failure)))
            }
        }
    }
}

/// The token after the literal `Bearer ` scheme, if any.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    header
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
