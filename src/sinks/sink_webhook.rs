use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::sinks::NotificationSinkConfig;
use crate::events::NotificationEvent;
use crate::helpers::time::get_instant;
use crate::observability::metrics::get_metrics;
use crate::sinks::manager::NotificationSink;
use crate::upstream::{expect_success, UpstreamFailure};
use crate::utils::constants::{DEFAULT_WEBHOOK_TIMEOUT_MS, EVENT_HEADER};

static WEBHOOK_MSG: &str = "webhook";
static TIMEOUT_MSG: &str = "timeout";
static TRANSPORT_MSG: &str = "transport";
static STATUS_MSG: &str = "status";

/// POSTs each event as JSON. One attempt per event.
pub struct WebhookSink {
    sink_id: String,
    url: String,
    client: Client,
}

impl WebhookSink {
    pub fn new(cfg: &NotificationSinkConfig) -> Result<Self> {
        let url = cfg
            .url
            .clone()
            .ok_or_else(|| anyhow!("webhook sink '{}' has no url", cfg.sink_id))?;
        let timeout = cfg.timeout_ms.unwrap_or(DEFAULT_WEBHOOK_TIMEOUT_MS);
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout))
            .build()?;
        Ok(Self {
            sink_id: cfg.sink_id.clone(),
            url,
            client,
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn sink_id(&self) -> &str {
        &self.sink_id
    }

    async fn deliver(&self, event: &NotificationEvent) {
        let metrics = get_metrics().await;
        let start = get_instant();
        let result = expect_success(
            self.client
                .post(&self.url)
                .header(EVENT_HEADER, event.name())
                .json(event)
                .send()
                .await,
        )
        .await;
        metrics
            .upstream_duration
            .with_label_values(&[WEBHOOK_MSG, event.name()])
            .observe(start.elapsed().as_secs_f64());

        match result {
            Ok(_) => {
                debug!(sink_id = %self.sink_id, event = event.name(), user_id = event.user_id(), "notification delivered");
                metrics
                    .notifications_delivered
                    .with_label_values(&[self.sink_id.as_str(), event.name()])
                    .inc();
            }
            Err(failure) => {
                let reason = match &failure {
                    UpstreamFailure::Timeout => TIMEOUT_MSG,
                    UpstreamFailure::Status { .. } => STATUS_MSG,
                    _ => TRANSPORT_MSG,
                };
                warn!(sink_id = %self.sink_id, event = event.name(), user_id = event.user_id(), %failure, "notification delivery failed");
                metrics
                    .notification_failures
                    .with_label_values(&[self.sink_id.as_str(), reason])
                    .inc();
            }
        }
    }
}
