use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationSinkType {
    /// Writes every event to the service log.
    Log,
    /// POSTs every event as JSON to `url`.
    Webhook,
}

/// One notification delivery backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationSinkConfig {
    /// Filled from the map key by the config initiator.
    #[serde(default)]
    pub sink_id: String,
    #[serde(rename = "type")]
    pub sink_type: NotificationSinkType,
    /// Invariant: required for `webhook`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}
