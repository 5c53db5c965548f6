//! Configuration validation with aggregated errors.
//! Every problem is collected and reported at once, so a broken deployment
//! is fixed in one round.

use anyhow::{bail, Result};
use tracing::{error, info};

use crate::config::service::{DirectoryConfig, OpenIdConfig, ServiceConfig, WorkflowConfig};
use crate::config::settings::SettingsConfig;
use crate::config::sinks::NotificationSinkType;
use crate::observability::metrics::get_metrics;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Public entrypoint: returns Ok(()) or an error listing every issue.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_openid(&cfg.openid, &mut errors);
    validate_directory(&cfg.directory, &mut errors);
    validate_workflow(&cfg.workflow, &mut errors);

    for (sink_name, sink_cfg) in &cfg.notifications {
        if sink_cfg.sink_type == NotificationSinkType::Webhook {
            match &sink_cfg.url {
                Some(url) => validate_url(&format!("notifications['{}'].url", sink_name), url, &mut errors),
                None => errors.push(format!("notifications['{}'].url is required for webhook sinks", sink_name)),
            }
        }
        if sink_cfg.timeout_ms == Some(0) {
            errors.push(format!("notifications['{}'].timeout_ms must be > 0", sink_name));
        }
    }

    if errors.is_empty() {
        info!("config valid");
        return Ok(());
    }

    error!("configuration validation errors ({}):", errors.len());
    for e in &errors {
        error!(" - {}", e);
    }
    get_metrics().await.config_validation_errors.inc();
    bail!(
        "config is not valid, total errors:{}, \n{}",
        errors.len(),
        errors.join("\n")
    )
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if settings.server.host.is_empty() {
        errors.push("settings.server.host must not be empty".to_owned());
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' must be a valid port",
            settings.server.port
        ));
    }
    if !settings.metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            settings.metrics.path
        ));
    }
    if let Some(logging) = &settings.logging {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' must be one of {:?}",
                logging.level, LOG_LEVELS
            ));
        }
    }
}

fn validate_openid(openid: &OpenIdConfig, errors: &mut Vec<String>) {
    validate_url("openid.token_endpoint", &openid.token_endpoint, errors);
    validate_url("openid.introspection_endpoint", &openid.introspection_endpoint, errors);
    if openid.client_id.is_empty() {
        errors.push("openid.client_id must not be empty".to_owned());
    }
    if openid.default_scope.is_empty() {
        errors.push("openid.default_scope must not be empty".to_owned());
    }
    if openid.admin_scope.is_empty() {
        errors.push("openid.admin_scope must not be empty".to_owned());
    }
    if openid.http_timeout_ms == Some(0) {
        errors.push("openid.http_timeout_ms must be > 0".to_owned());
    }
}

fn validate_directory(directory: &DirectoryConfig, errors: &mut Vec<String>) {
    validate_url("directory.base_url", &directory.base_url, errors);
    if directory.username.is_empty() {
        errors.push("directory.username must not be empty".to_owned());
    }
    if directory.timeout_ms == Some(0) {
        errors.push("directory.timeout_ms must be > 0".to_owned());
    }
}

fn validate_workflow(workflow: &WorkflowConfig, errors: &mut Vec<String>) {
    if workflow.activation_urls.is_empty() {
        errors.push("workflow.activation_urls must contain at least one url".to_owned());
    }
    if workflow.password_reset_urls.is_empty() {
        errors.push("workflow.password_reset_urls must contain at least one url".to_owned());
    }
    for (i, url) in workflow.activation_urls.iter().enumerate() {
        validate_url(&format!("workflow.activation_urls[{}]", i), url, errors);
    }
    for (i, url) in workflow.password_reset_urls.iter().enumerate() {
        validate_url(&format!("workflow.password_reset_urls[{}]", i), url, errors);
    }
}

fn validate_url(field: &str, url: &str, errors: &mut Vec<String>) {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push(format!("{} '{}' must be an http(s) url", field, url));
    }
}
