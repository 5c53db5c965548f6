use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use http::header::AUTHORIZATION;

use crate::authorization::gate::AuthorizationGate;
use crate::errors::AuthxError;

/// Route-level guard state: the gate plus the scope this route requires
/// (`None` = the gate's default scope).
#[derive(Clone)]
pub struct ScopeGuard {
    gate: Arc<AuthorizationGate>,
    scope: Option<String>,
}

impl ScopeGuard {
    pub fn default_scope(gate: Arc<AuthorizationGate>) -> Self {
        Self { gate, scope: None }
    }

    pub fn scope(gate: Arc<AuthorizationGate>, scope: &str) -> Self {
        Self {
            gate,
            scope: Some(scope.to_owned()),
        }
    }
}

/// axum middleware: rejects before the handler runs, otherwise stores the
/// decision in request extensions.
pub async fn require_scope(
    State(guard): State<ScopeGuard>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthxError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let decision = guard
        .gate
        .authorize(header.as_deref(), guard.scope.as_deref())
        .await?;
    request.extensions_mut().insert(decision);
    Ok(next.run(request).await)
}
