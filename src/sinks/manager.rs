use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::sinks::{NotificationSinkConfig, NotificationSinkType};
use crate::events::{EventEmitter, NotificationEvent};
use crate::observability::metrics::get_metrics;
use crate::sinks::sink_log::LogSink;
use crate::sinks::sink_webhook::WebhookSink;

static LAGGED_MSG: &str = "lagged";

/// One delivery backend. Implementations report failures through logs and
/// metrics; nothing flows back to the emitter.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    fn sink_id(&self) -> &str;

    async fn deliver(&self, event: &NotificationEvent);
}

#[derive(Clone)]
pub struct SinkManager {
    pub(crate) sinks: Arc<HashMap<String, NotificationSinkConfig>>,
}

impl SinkManager {
    pub fn new(sinks: HashMap<String, NotificationSinkConfig>) -> Self {
        Self {
            sinks: Arc::new(sinks),
        }
    }

    fn build(cfg: &NotificationSinkConfig) -> Result<Arc<dyn NotificationSink>> {
        Ok(match cfg.sink_type {
            NotificationSinkType::Log => Arc::new(LogSink::new(&cfg.sink_id)),
            NotificationSinkType::Webhook => Arc::new(WebhookSink::new(cfg)?),
        })
    }

    /// Subscribe one worker per configured sink and run them until the
    /// event channel closes.
    pub async fn start_active_sinks(&self, emitter: EventEmitter) -> Result<()> {
        let mut join_set = JoinSet::new();
        for cfg in self.sinks.values() {
            let sink = Self::build(cfg)?;
            info!(sink_id = sink.sink_id(), sink_type = ?cfg.sink_type, "start notification sink");
            join_set.spawn(run_worker(sink, emitter.subscribe()));
        }
        if join_set.is_empty() {
            warn!("no notification sinks configured, events will be dropped");
        }

        let _ = join_set.join_all().await;
        Ok(())
    }
}

pub(crate) async fn run_worker(sink: Arc<dyn NotificationSink>, mut rx: Receiver<NotificationEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => sink.deliver(&event).await,
            Err(RecvError::Lagged(skipped)) => {
                warn!(sink_id = sink.sink_id(), skipped, "notification sink lagged, events skipped");
                get_metrics()
                    .await
                    .notification_failures
                    .with_label_values(&[sink.sink_id(), LAGGED_MSG])
                    .inc_by(skipped);
            }
            Err(RecvError::Closed) => {
                info!(sink_id = sink.sink_id(), "event channel closed, stop notification sink");
                break;
            }
        }
    }
}
