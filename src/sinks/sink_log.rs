use async_trait::async_trait;
use tracing::info;

use crate::events::NotificationEvent;
use crate::observability::metrics::get_metrics;
use crate::sinks::manager::NotificationSink;
use crate::utils::constants::WORKFLOW_TOKEN_BYTES;

/// Writes events to the service log with the token cut out of the link.
pub struct LogSink {
    sink_id: String,
}

impl LogSink {
    pub fn new(sink_id: &str) -> Self {
        Self {
            sink_id: sink_id.to_owned(),
        }
    }
}

#[async_trait]
impl NotificationSink for LogSink {
    fn sink_id(&self) -> &str {
        &self.sink_id
    }

    async fn deliver(&self, event: &NotificationEvent) {
        info!(
            sink_id = %self.sink_id,
            event = event.name(),
            user_id = event.user_id(),
            link = %redact_link(event.link()),
            "notification"
        );
        get_metrics()
            .await
            .notifications_delivered
            .with_label_values(&[self.sink_id.as_str(), event.name()])
            .inc();
    }
}

pub fn redact_link(link: &str) -> String {
    let token_len = WORKFLOW_TOKEN_BYTES * 2;
    match link.len().checked_sub(token_len) {
        Some(split) if link.is_char_boundary(split) => format!("{}<redacted>", &link[..split]),
        _ => "<redacted>".to_owned(),
    }
}
