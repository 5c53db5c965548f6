pub mod gate;
pub mod middleware;

pub use gate::{AuthorizationDecision, AuthorizationGate, DecisionReason};
pub use middleware::{require_scope, ScopeGuard};
