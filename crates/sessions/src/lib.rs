//! Process-wide registry of authenticated sessions.
//!
//! A session sink is the write end of a connection: an unbounded channel
//! draining into that connection's write loop. A successful login binds
//! username → sink; logout, disconnect, and failed writes unbind. Sinks
//! never outlive their connection — every binding carries the owning
//! connection id so a stale disconnect cannot evict a newer login.

use std::collections::HashMap;

use {
    tokio::sync::{RwLock, mpsc},
    tracing::{debug, warn},
};

use parlor_events::{ClientEvent, Event, EventBus};

pub type SessionSink = mpsc::UnboundedSender<String>;

struct Binding {
    conn_id: u64,
    sink: SessionSink,
}

#[derive(Default)]
pub struct SessionRegistry {
    bindings: RwLock<HashMap<String, Binding>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `username` to a connection sink, replacing any prior binding.
    pub async fn bind(&self, events: &EventBus, username: &str, conn_id: u64, sink: SessionSink) {
        let mut bindings = self.bindings.write().await;
        bindings.insert(username.to_string(), Binding { conn_id, sink });
        drop(bindings);

        debug!(username, conn_id, "session bound");
        events.publish(Event::Client(ClientEvent::Added {
            username: username.to_string(),
        }));
    }

    /// Remove the binding for `username`, if any.
    pub async fn unbind(&self, events: &EventBus, username: &str) -> bool {
        let removed = self.bindings.write().await.remove(username).is_some();
        if removed {
            debug!(username, "session unbound");
            events.publish(Event::Client(ClientEvent::Removed {
                username: username.to_string(),
            }));
        }
        removed
    }

    /// Remove every binding the given connection holds (disconnect
    /// cleanup). Returns the usernames that were bound — normally one,
    /// but a connection may have logged in under several names.
    pub async fn unbind_connection(&self, events: &EventBus, conn_id: u64) -> Vec<String> {
        let mut bindings = self.bindings.write().await;
        let usernames: Vec<String> = bindings
            .iter()
            .filter(|(_, b)| b.conn_id == conn_id)
            .map(|(name, _)| name.clone())
            .collect();
        for name in &usernames {
            bindings.remove(name);
        }
        drop(bindings);

        for name in &usernames {
            debug!(username = %name, conn_id, "session unbound on disconnect");
            events.publish(Event::Client(ClientEvent::Removed {
                username: name.clone(),
            }));
        }
        usernames
    }

    pub async fn lookup(&self, username: &str) -> Option<SessionSink> {
        self.bindings
            .read()
            .await
            .get(username)
            .map(|b| b.sink.clone())
    }

    pub async fn active_usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Best-effort delivery to one session. A failed write means the
    /// connection is gone: the binding is dropped and the failure logged,
    /// never propagated.
    pub async fn send_to(&self, events: &EventBus, username: &str, frame: &str) -> bool {
        let Some(sink) = self.lookup(username).await else {
            return false;
        };
        if sink.send(frame.to_string()).is_ok() {
            return true;
        }
        warn!(username, "peer sink closed, dropping session binding");
        self.unbind(events, username).await;
        false
    }

    /// Deliver `frame` to every active session except `sender`.
    pub async fn broadcast_except(&self, events: &EventBus, sender: &str, frame: &str) {
        let targets: Vec<String> = {
            let bindings = self.bindings.read().await;
            bindings.keys().filter(|name| *name != sender).cloned().collect()
        };
        for username in targets {
            self.send_to(events, &username, frame).await;
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use parlor_events::EventKind;

    use super::*;

    fn sink() -> (SessionSink, mpsc::UnboundedReceiver<String>) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn bind_lookup_unbind() {
        let registry = SessionRegistry::new();
        let events = EventBus::new();
        let (tx, _rx) = sink();

        registry.bind(&events, "alice", 1, tx).await;
        assert!(registry.lookup("alice").await.is_some());
        assert_eq!(registry.active_usernames().await, vec!["alice"]);

        assert!(registry.unbind(&events, "alice").await);
        assert!(registry.lookup("alice").await.is_none());
        assert!(!registry.unbind(&events, "alice").await);
    }

    #[tokio::test]
    async fn bind_publishes_client_events() {
        let registry = SessionRegistry::new();
        let events = EventBus::new();
        let adds = Arc::new(AtomicUsize::new(0));
        let removes = Arc::new(AtomicUsize::new(0));
        let (add_counter, remove_counter) = (Arc::clone(&adds), Arc::clone(&removes));
        events.subscribe(EventKind::Client, move |event| {
            if let Event::Client(client) = event {
                match client {
                    ClientEvent::Added { .. } => add_counter.fetch_add(1, Ordering::SeqCst),
                    ClientEvent::Removed { .. } => remove_counter.fetch_add(1, Ordering::SeqCst),
                };
            }
        });

        let (tx, _rx) = sink();
        registry.bind(&events, "alice", 1, tx).await;
        registry.unbind(&events, "alice").await;

        assert_eq!(adds.load(Ordering::SeqCst), 1);
        assert_eq!(removes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rebind_overwrites_prior_sink() {
        let registry = SessionRegistry::new();
        let events = EventBus::new();
        let (old_tx, _old_rx) = sink();
        let (new_tx, mut new_rx) = sink();

        registry.bind(&events, "alice", 1, old_tx).await;
        registry.bind(&events, "alice", 2, new_tx).await;

        assert!(registry.send_to(&events, "alice", "frame").await);
        assert_eq!(new_rx.recv().await.unwrap(), "frame");
    }

    #[tokio::test]
    async fn stale_disconnect_keeps_newer_binding() {
        let registry = SessionRegistry::new();
        let events = EventBus::new();
        let (old_tx, _old_rx) = sink();
        let (new_tx, _new_rx) = sink();

        registry.bind(&events, "alice", 1, old_tx).await;
        registry.bind(&events, "alice", 2, new_tx).await;

        // Connection 1 closing must not remove the binding made by 2.
        assert!(registry.unbind_connection(&events, 1).await.is_empty());
        assert!(registry.lookup("alice").await.is_some());

        assert_eq!(registry.unbind_connection(&events, 2).await, vec!["alice"]);
        assert!(registry.lookup("alice").await.is_none());
    }

    #[tokio::test]
    async fn disconnect_clears_every_name_bound_by_the_connection() {
        let registry = SessionRegistry::new();
        let events = EventBus::new();
        let (tx, _rx) = sink();

        registry.bind(&events, "alice", 7, tx.clone()).await;
        registry.bind(&events, "alice2", 7, tx).await;

        let mut cleared = registry.unbind_connection(&events, 7).await;
        cleared.sort();
        assert_eq!(cleared, vec!["alice", "alice2"]);
        assert!(registry.active_usernames().await.is_empty());
    }

    #[tokio::test]
    async fn send_to_dead_sink_unbinds() {
        let registry = SessionRegistry::new();
        let events = EventBus::new();
        let (tx, rx) = sink();
        drop(rx);

        registry.bind(&events, "alice", 1, tx).await;
        assert!(!registry.send_to(&events, "alice", "frame").await);
        assert!(registry.lookup("alice").await.is_none());
    }

    #[tokio::test]
    async fn broadcast_skips_sender_and_dead_sinks() {
        let registry = SessionRegistry::new();
        let events = EventBus::new();
        let (alice_tx, mut alice_rx) = sink();
        let (bob_tx, mut bob_rx) = sink();
        let (carol_tx, carol_rx) = sink();
        drop(carol_rx);

        registry.bind(&events, "alice", 1, alice_tx).await;
        registry.bind(&events, "bob", 2, bob_tx).await;
        registry.bind(&events, "carol", 3, carol_tx).await;

        registry.broadcast_except(&events, "alice", "hello all").await;

        assert_eq!(bob_rx.recv().await.unwrap(), "hello all");
        assert!(alice_rx.try_recv().is_err());
        // carol's sink was dead, so her binding is gone.
        assert_eq!(registry.active_usernames().await, vec!["alice", "bob"]);
    }
}
