//! Typed fan-out of server events to registered observers.
//!
//! Subscribers register per [`EventKind`] as plain closures; publishing
//! delivers synchronously in registration order. Subscribers must not
//! block — the admin console and log sinks hang their lightweight
//! formatting off this bus.

use std::{
    collections::HashMap,
    sync::RwLock,
};

use serde_json::Value;

// ── Event types ──────────────────────────────────────────────────────────────

/// Server lifecycle states observers may display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerState {
    Started { address: String },
    Stopped,
}

/// Session registry changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Added { username: String },
    Removed { username: String },
}

/// One event on the bus.
#[derive(Debug, Clone)]
pub enum Event {
    State(ServerState),
    Log(String),
    Client(ClientEvent),
    Request(Value),
    Response(Value),
}

impl Event {
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::State(_) => EventKind::State,
            Self::Log(_) => EventKind::Log,
            Self::Client(_) => EventKind::Client,
            Self::Request(_) => EventKind::Request,
            Self::Response(_) => EventKind::Response,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    State,
    Log,
    Client,
    Request,
    Response,
}

impl EventKind {
    pub const ALL: [Self; 5] = [
        Self::State,
        Self::Log,
        Self::Client,
        Self::Request,
        Self::Response,
    ];
}

// ── Bus ──────────────────────────────────────────────────────────────────────

pub type Subscriber = Box<dyn Fn(&Event) + Send + Sync>;

/// Per-kind subscriber lists behind one lock; delivery for a kind is
/// serialized by that lock.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<HashMap<EventKind, Vec<Subscriber>>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber` for one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, subscriber: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        if let Ok(mut subs) = self.subscribers.write() {
            subs.entry(kind).or_default().push(Box::new(subscriber));
        }
    }

    /// Deliver `event` to every subscriber of its kind, in order.
    pub fn publish(&self, event: Event) {
        let Ok(subs) = self.subscribers.read() else {
            tracing::warn!("event bus lock poisoned, dropping event");
            return;
        };
        if let Some(list) = subs.get(&event.kind()) {
            for subscriber in list {
                subscriber(&event);
            }
        }
    }

    pub fn publish_log(&self, message: impl Into<String>) {
        self.publish(Event::Log(message.into()));
    }
}
