use serde::Deserialize;
use std::collections::HashMap;

use crate::config::settings::SettingsConfig;
use crate::config::sinks::NotificationSinkConfig;
use crate::utils::constants::{DEFAULT_ADMIN_SCOPE, DEFAULT_GRANT_SCOPES};

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub settings: SettingsConfig,
    pub openid: OpenIdConfig,
    pub directory: DirectoryConfig,
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub notifications: HashMap<String, NotificationSinkConfig>,
}

/// ================================
/// OpenID issuer (grant, refresh, introspection)
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct OpenIdConfig {
    pub issuer: String,
    pub token_endpoint: String,
    pub introspection_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    /// Scope required by protected operations that do not name one.
    pub default_scope: String,
    #[serde(default = "default_admin_scope")]
    pub admin_scope: String,
    /// Scopes requested by the service's own password grant.
    #[serde(default = "default_grant_scopes")]
    pub grant_scopes: Vec<String>,
    pub http_timeout_ms: Option<u64>,
}

/// ================================
/// SCIM directory
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct DirectoryConfig {
    pub base_url: String,
    /// Service account used for the password grant at startup.
    pub username: String,
    pub password: String,
    pub timeout_ms: Option<u64>,
}

/// ================================
/// Workflow links
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowConfig {
    /// Allowed activation link bases; the first one is the default.
    pub activation_urls: Vec<String>,
    /// Allowed password reset link bases; the first one is the default.
    pub password_reset_urls: Vec<String>,
}

impl WorkflowConfig {
    pub fn activation_url(&self, requested: Option<&str>) -> Option<String> {
        pick_allowed(&self.activation_urls, requested)
    }

    pub fn password_reset_url(&self, requested: Option<&str>) -> Option<String> {
        pick_allowed(&self.password_reset_urls, requested)
    }
}

fn pick_allowed(allowed: &[String], requested: Option<&str>) -> Option<String> {
    match requested {
        Some(url) => allowed.iter().find(|candidate| candidate.as_str() == url).cloned(),
        None => allowed.first().cloned(),
    }
}

fn default_admin_scope() -> String {
    DEFAULT_ADMIN_SCOPE.to_owned()
}

fn default_grant_scopes() -> Vec<String> {
    DEFAULT_GRANT_SCOPES.iter().map(|s| s.to_string()).collect()
}
