use crate::application::event::{Event, EventOrigin, EventType};
use crate::application::event_log::EventLog;
use std::collections::VecDeque;
use std::fmt;

/// Handle returned by `subscribe_*`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Collects events published from inside a subscriber callback
///
/// They are appended to the bus queues once the current pass finishes and
/// are delivered by a later pass of the same `consume_events` call.
#[derive(Debug, Default)]
pub struct EventSink {
    local: Vec<Event>,
    remote: Vec<Event>,
}

impl EventSink {
    pub fn publish_local(&mut self, mut event: Event) {
        event.origin = EventOrigin::Local;
        self.local.push(event);
    }

    pub fn publish_remote(&mut self, mut event: Event) {
        event.origin = EventOrigin::Remote;
        self.remote.push(event);
    }
}

type Callback = Box<dyn FnMut(&Event, &mut EventSink)>;

struct Subscription {
    id: SubscriptionId,
    event_type: EventType,
    callback: Callback,
}

/// Local/remote event queues drained once per tick
pub struct EventBus {
    local: VecDeque<Event>,
    remote: VecDeque<Event>,
    local_subscriptions: Vec<Subscription>,
    remote_subscriptions: Vec<Subscription>,
    next_subscription: u64,
    log: EventLog,
    max_passes: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_limits(8, 100)
    }

    /// `max_passes` bounds reentrant publishing within one drain,
    /// `log_capacity` sizes the consumed-event history.
    pub fn with_limits(max_passes: usize, log_capacity: usize) -> Self {
        Self {
            local: VecDeque::new(),
            remote: VecDeque::new(),
            local_subscriptions: Vec::new(),
            remote_subscriptions: Vec::new(),
            next_subscription: 1,
            log: EventLog::with_capacity(log_capacity),
            max_passes: max_passes.max(1),
        }
    }

    fn next_id(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        id
    }

    /// Subscribe to events raised on this instance
    pub fn subscribe_local<F>(&mut self, event_type: EventType, callback: F) -> SubscriptionId
    where
        F: FnMut(&Event, &mut EventSink) + 'static,
    {
        let id = self.next_id();
        self.local_subscriptions.push(Subscription {
            id,
            event_type,
            callback: Box::new(callback),
        });
        id
    }

    /// Subscribe to events that arrived from peers
    pub fn subscribe_remote<F>(&mut self, event_type: EventType, callback: F) -> SubscriptionId
    where
        F: FnMut(&Event, &mut EventSink) + 'static,
    {
        let id = self.next_id();
        self.remote_subscriptions.push(Subscription {
            id,
            event_type,
            callback: Box::new(callback),
        });
        id
    }

    /// Returns false if the id was unknown
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.local_subscriptions.len() + self.remote_subscriptions.len();
        self.local_subscriptions.retain(|s| s.id != id);
        self.remote_subscriptions.retain(|s| s.id != id);
        before != self.local_subscriptions.len() + self.remote_subscriptions.len()
    }

    pub fn publish_local(&mut self, mut event: Event) {
        event.origin = EventOrigin::Local;
        tracing::trace!("📣 Local event queued: {}", event.event_type);
        self.local.push_back(event);
    }

    pub fn publish_remote(&mut self, mut event: Event) {
        event.origin = EventOrigin::Remote;
        tracing::trace!("📣 Remote event queued: {}", event.event_type);
        self.remote.push_back(event);
    }

    /// Drain both queues, invoking every matching subscriber once per event.
    ///
    /// Returns the number of events drained.
    pub fn consume_events(&mut self) -> usize {
        let mut drained = 0;

        for _ in 0..self.max_passes {
            if self.local.is_empty() && self.remote.is_empty() {
                break;
            }

            let local = std::mem::take(&mut self.local);
            let remote = std::mem::take(&mut self.remote);
            let mut sink = EventSink::default();

            for event in local {
                deliver(&mut self.local_subscriptions, event, &mut sink, &mut self.log);
                drained += 1;
            }

            for event in remote {
                deliver(&mut self.remote_subscriptions, event, &mut sink, &mut self.log);
                drained += 1;
            }

            self.local.extend(sink.local);
            self.remote.extend(sink.remote);
        }

        if !self.local.is_empty() || !self.remote.is_empty() {
            tracing::warn!(
                "⚠️  Event bus still has {} local / {} remote events after {} passes, deferring",
                self.local.len(),
                self.remote.len(),
                self.max_passes
            );
        }

        drained
    }

    pub fn pending_local(&self) -> usize {
        self.local.len()
    }

    pub fn pending_remote(&self) -> usize {
        self.remote.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.local_subscriptions.len() + self.remote_subscriptions.len()
    }

    /// Recently consumed events
    pub fn log(&self) -> &EventLog {
        &self.log
    }
}

fn deliver(
    subscriptions: &mut [Subscription],
    mut event: Event,
    sink: &mut EventSink,
    log: &mut EventLog,
) {
    let event_type = event.event_type;
    for subscription in subscriptions
        .iter_mut()
        .filter(|s| s.event_type == event_type)
    {
        (subscription.callback)(&event, sink);
        event.mark_consumed();
    }

    log.record(event);
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("pending_local", &self.local.len())
            .field("pending_remote", &self.remote.len())
            .field("subscriptions", &self.subscription_count())
            .field("max_passes", &self.max_passes)
            .finish()
    }
}
