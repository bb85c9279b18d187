//! In-process publish/subscribe surface for the host application.
//!
//! Two topics: `message` carries normalized [`Message`] entities,
//! `event` carries lifecycle and diagnostic occurrences. Handlers run
//! synchronously in subscription order for each published value. Once
//! the bus is closed (controller shutdown) nothing is dispatched.

use std::sync::{Arc, Mutex};

use msgr_core::SyncEvent;
use msgr_types::Message;

type MessageHandler = Arc<dyn Fn(&Message) + Send + Sync>;
type EventHandler = Arc<dyn Fn(&Diagnostic) + Send + Sync>;

/// Occurrences published on the `event` topic.
#[derive(Debug, Clone)]
pub enum Diagnostic {
    /// A connection lifecycle event.
    Lifecycle(SyncEvent),
    /// A new resumption token was received and persisted.
    CursorUpdated,
    /// A frame arrived on a topic other than the sync topic.
    IgnoredFrame {
        /// The topic the frame arrived on.
        topic: String,
    },
    /// A delta batch contained a tag this client does not know.
    UnrecognizedDelta {
        /// The unknown tag.
        kind: String,
    },
    /// A delta entry was recognized but unusable.
    MalformedDelta {
        /// The delta tag.
        kind: String,
        /// What was wrong with the entry.
        reason: String,
    },
    /// A whole frame failed to parse. Scoped to that frame only.
    BadFrame {
        /// The parse failure.
        reason: String,
    },
}

#[derive(Default)]
struct BusInner {
    closed: bool,
    message_handlers: Vec<MessageHandler>,
    event_handlers: Vec<EventHandler>,
}

/// The two-topic event bus exposed to the host application.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the `message` topic.
    pub fn subscribe_messages(&self, handler: impl Fn(&Message) + Send + Sync + 'static) {
        self.inner
            .lock()
            .unwrap()
            .message_handlers
            .push(Arc::new(handler));
    }

    /// Subscribe to the `event` topic.
    pub fn subscribe_events(&self, handler: impl Fn(&Diagnostic) + Send + Sync + 'static) {
        self.inner
            .lock()
            .unwrap()
            .event_handlers
            .push(Arc::new(handler));
    }

    /// Publish a message to all `message` subscribers in subscription
    /// order. No-op after close.
    pub fn publish_message(&self, message: &Message) {
        let handlers = {
            let inner = self.inner.lock().unwrap();
            if inner.closed {
                return;
            }
            inner.message_handlers.clone()
        };
        for handler in handlers {
            handler(message);
        }
    }

    /// Publish a diagnostic to all `event` subscribers in subscription
    /// order. No-op after close.
    pub fn publish_event(&self, event: &Diagnostic) {
        let handlers = {
            let inner = self.inner.lock().unwrap();
            if inner.closed {
                return;
            }
            inner.event_handlers.clone()
        };
        for handler in handlers {
            handler(event);
        }
    }

    /// Stop all future dispatch. Idempotent.
    pub fn close(&self) {
        self.inner.lock().unwrap().closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgr_types::ThreadKey;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_message() -> Message {
        Message::new("m1", ThreadKey::Group("42".into()), "7", 1000, "hi")
    }

    #[test]
    fn handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            bus.subscribe_messages(move |_| order.lock().unwrap().push(tag));
        }

        bus.publish_message(&sample_message());
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn topics_are_independent() {
        let bus = EventBus::new();
        let messages = Arc::new(AtomicUsize::new(0));
        let events = Arc::new(AtomicUsize::new(0));

        {
            let messages = Arc::clone(&messages);
            bus.subscribe_messages(move |_| {
                messages.fetch_add(1, Ordering::SeqCst);
            });
        }
        {
            let events = Arc::clone(&events);
            bus.subscribe_events(move |_| {
                events.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.publish_message(&sample_message());
        bus.publish_event(&Diagnostic::CursorUpdated);
        bus.publish_event(&Diagnostic::CursorUpdated);

        assert_eq!(messages.load(Ordering::SeqCst), 1);
        assert_eq!(events.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn every_subscriber_sees_every_value() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = Arc::clone(&count);
            bus.subscribe_messages(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.publish_message(&sample_message());
        bus.publish_message(&sample_message());

        assert_eq!(count.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn closed_bus_stops_dispatching() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = Arc::clone(&count);
            bus.subscribe_messages(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.publish_message(&sample_message());
        bus.close();
        bus.publish_message(&sample_message());

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
