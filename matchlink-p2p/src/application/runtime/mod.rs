#[cfg(feature = "native")]
pub mod driver;
pub mod match_context;
pub mod message_queue;
mod session_loop;

#[cfg(feature = "native")]
pub use driver::drive;
pub use match_context::MatchContext;
pub use message_queue::{MessageQueue, QueueError, QueuedMessage};
pub use session_loop::MatchSession;
