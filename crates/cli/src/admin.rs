//! Terminal admin console: event-bus subscribers printing server activity.
//!
//! One subscriber per event kind, each a plain closure — the graphical
//! admin panel this replaces consumed the same stream.

use {
    parlor_events::{ClientEvent, Event, EventBus, EventKind, ServerState},
    serde_json::Value,
};

/// Fields never shown on a terminal.
const REDACTED_FIELDS: &[&str] = &["password", "repeat_password"];

/// Subscribe the console printers to every event kind.
pub fn install_console(events: &EventBus) {
    events.subscribe(EventKind::State, |event| {
        if let Event::State(state) = event {
            match state {
                ServerState::Started { address } => println!("[state] listening on {address}"),
                ServerState::Stopped => println!("[state] stopped"),
            }
        }
    });

    events.subscribe(EventKind::Log, |event| {
        if let Event::Log(line) = event {
            println!("[log] {line}");
        }
    });

    events.subscribe(EventKind::Client, |event| {
        if let Event::Client(client) = event {
            match client {
                ClientEvent::Added { username } => println!("[client] + {username}"),
                ClientEvent::Removed { username } => println!("[client] - {username}"),
            }
        }
    });

    events.subscribe(EventKind::Request, |event| {
        if let Event::Request(request) = event {
            println!("[request] {}", redact(request.clone()));
        }
    });

    events.subscribe(EventKind::Response, |event| {
        if let Event::Response(response) = event {
            println!("[response] {response}");
        }
    });
}

/// Blank out credential fields before anything reaches the terminal.
fn redact(mut request: Value) -> Value {
    if let Some(data) = request.get_mut("data").and_then(Value::as_object_mut) {
        for field in REDACTED_FIELDS {
            if let Some(slot) = data.get_mut(*field) {
                *slot = Value::String("********".into());
            }
        }
    }
    request
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn redacts_credentials_only() {
        let request = json!({
            "action": "register",
            "data": {"username": "alice", "password": "pw", "repeat_password": "pw"},
        });
        let redacted = redact(request);
        assert_eq!(redacted["data"]["username"], "alice");
        assert_eq!(redacted["data"]["password"], "********");
        assert_eq!(redacted["data"]["repeat_password"], "********");
    }

    #[test]
    fn leaves_requests_without_data_untouched() {
        let request = json!({"action": "frobnicate"});
        assert_eq!(redact(request.clone()), request);
    }
}
