//! Shared constants and invariants

/// A credential is refreshed once it is within this many seconds of expiry.
pub const CREDENTIAL_SKEW_SECONDS: i64 = 5;

pub const DEFAULT_DIRECTORY_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_ISSUER_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_WEBHOOK_TIMEOUT_MS: u64 = 5_000;

pub const DEFAULT_ADMIN_SCOPE: &str = "admin";
pub const DEFAULT_GRANT_SCOPES: [&str; 3] = ["uma_protection", "openid", "profile"];

pub const BEARER_PREFIX: &str = "Bearer ";

/// Random bytes behind every workflow token (hex encoded to 32 chars).
pub const WORKFLOW_TOKEN_BYTES: usize = 16;

// SCIM wire constants
pub const SCIM_CONTENT_TYPE: &str = "application/scim+json";
pub const SCIM_USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
pub const SCIM_PATCH_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

// Emitted event names
pub const EVENT_USER_SIGNUP: &str = "user-signup";
pub const EVENT_USER_PASSWORD_RESET: &str = "user-password-reset";

/// Carries the event name on webhook deliveries.
pub const EVENT_HEADER: &str = "x-authx-event";
