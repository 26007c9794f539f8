pub mod event;
pub mod event_bus;
pub mod event_log;

pub use event::{Event, EventOrigin, EventPayload, EventType};
pub use event_bus::{EventBus, EventSink, SubscriptionId};
pub use event_log::EventLog;
