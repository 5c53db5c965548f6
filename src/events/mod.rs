pub mod emitter;
pub mod event;

pub use emitter::EventEmitter;
pub use event::{workflow_link, EventPayload, NotificationEvent};
