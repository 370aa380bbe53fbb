//! Topic-based publish/subscribe and the bridge between the adapter's
//! internal bus and the subscriber-facing one.
//!
//! Publishing runs every current subscriber of the topic synchronously, in
//! registration order, before returning. Nothing is buffered: a subscriber
//! registered after a publish never sees that event.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::trace;

use crate::wasapi::normalizer::NormalizedMessageEvent;

/// The well-known event topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// A normalized inbound message.
    Message,
    /// The configured device was found; the adapter is ready.
    Ready,
    /// The device check failed; carries remediation instructions.
    AuthFailure,
    /// Host device announcement.
    Host,
}

impl Topic {
    /// Every topic, in a fixed order.
    pub const ALL: [Topic; 4] = [Topic::Message, Topic::Ready, Topic::AuthFailure, Topic::Host];

    /// Wire name of the topic.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Ready => "ready",
            Self::AuthFailure => "auth_failure",
            Self::Host => "host",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of an `auth_failure` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthFailure {
    /// Human-readable steps to fix the problem.
    pub instructions: Vec<String>,
}

/// Payload of a `host` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostInfo {
    /// Device id or phone number of the host.
    pub phone: String,
}

/// An event travelling on a bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum BusEvent {
    /// See [`Topic::Message`].
    Message(NormalizedMessageEvent),
    /// See [`Topic::Ready`].
    Ready,
    /// See [`Topic::AuthFailure`].
    AuthFailure(AuthFailure),
    /// See [`Topic::Host`].
    Host(HostInfo),
}

impl BusEvent {
    /// The topic this event is published on.
    pub fn topic(&self) -> Topic {
        match self {
            Self::Message(_) => Topic::Message,
            Self::Ready => Topic::Ready,
            Self::AuthFailure(_) => Topic::AuthFailure,
            Self::Host(_) => Topic::Host,
        }
    }
}

/// A subscriber callback.
pub type Handler = Arc<dyn Fn(&BusEvent) + Send + Sync>;

/// Topic-keyed subscriber table.
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<Topic, Vec<Handler>>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        let counts: HashMap<&str, usize> = handlers
            .iter()
            .map(|(topic, list)| (topic.as_str(), list.len()))
            .collect();
        f.debug_struct("EventBus").field("subscribers", &counts).finish()
    }
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `topic`.
    pub fn subscribe<F>(&self, topic: Topic, handler: F)
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.entry(topic).or_default().push(Arc::new(handler));
    }

    /// Deliver `event` to every current subscriber of its topic.
    ///
    /// Returns how many subscribers were invoked. Handlers run outside the
    /// table lock, so a handler may itself subscribe or publish.
    pub fn publish(&self, event: BusEvent) -> usize {
        let topic = event.topic();
        let snapshot: Vec<Handler> = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            handlers.get(&topic).cloned().unwrap_or_default()
        };
        for handler in &snapshot {
            handler(&event);
        }
        trace!(%topic, delivered = snapshot.len(), "event published");
        snapshot.len()
    }

    /// Number of subscribers currently registered for `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.get(&topic).map_or(0, Vec::len)
    }
}

/// Republish every event from `internal` onto `external`, for all topics.
pub fn bridge(internal: &EventBus, external: Arc<EventBus>) {
    for topic in Topic::ALL {
        let external = Arc::clone(&external);
        internal.subscribe(topic, move |event| {
            external.publish(event.clone());
        });
    }
}
