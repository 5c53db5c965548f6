use crate::config::settings::LoggingConfig;
use crate::config::service::ServiceConfig;
use crate::utils::constants::{DEFAULT_DIRECTORY_TIMEOUT_MS, DEFAULT_ISSUER_TIMEOUT_MS, DEFAULT_WEBHOOK_TIMEOUT_MS};

pub fn initiate_default_values(mut config: ServiceConfig) -> ServiceConfig {
    if config.settings.logging.is_none() {
        config.settings.logging = Some(LoggingConfig::default());
    }
    config.openid.http_timeout_ms.get_or_insert(DEFAULT_ISSUER_TIMEOUT_MS);
    config.directory.timeout_ms.get_or_insert(DEFAULT_DIRECTORY_TIMEOUT_MS);

    config.notifications = config
        .notifications
        .into_iter()
        .map(|(sink_id, mut sink_config)| {
            // propagate sink id to NotificationSinkConfig
            sink_config.sink_id = sink_id.to_owned();
            sink_config.timeout_ms.get_or_insert(DEFAULT_WEBHOOK_TIMEOUT_MS);
            (sink_id, sink_config)
        })
        .collect();

    config
}
