pub mod manager;
pub mod sink_log;
pub mod sink_webhook;

pub use manager::{NotificationSink, SinkManager};
