use tokio::sync::broadcast::{Receiver, Sender};
use tracing::{debug, warn};

use crate::events::event::NotificationEvent;

/// Fire-and-forget publisher. Delivery happens in the sink workers, so a
/// slow or failing sink never reaches the request that emitted the event.
#[derive(Clone)]
pub struct EventEmitter {
    sender: Sender<NotificationEvent>,
}

impl EventEmitter {
    pub fn new(sender: Sender<NotificationEvent>) -> Self {
        Self { sender }
    }

    pub fn subscribe(&self) -> Receiver<NotificationEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: NotificationEvent) {
        let name = event.name();
        let user_id = event.user_id().to_owned();
        match self.sender.send(event) {
            Ok(receivers) => debug!(event = name, %user_id, receivers, "event emitted"),
            Err(_) => warn!(event = name, %user_id, "event dropped, no notification sink subscribed"),
        }
    }
}
