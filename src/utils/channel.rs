use tokio::sync::broadcast::{self, Sender};

use crate::events::NotificationEvent;

const BUFFER_SIZE: usize = 50;

/// Event bus between the emitter and the notification sinks.
pub fn run() -> Sender<NotificationEvent> {
    let (event_sender, _) = broadcast::channel(BUFFER_SIZE);
    event_sender
}
