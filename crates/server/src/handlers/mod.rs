//! Request handlers, one per action verb.
//!
//! A handler is `(request context) → response`. Verbs are values in a
//! route table, not types; modules (`auth`, `chat`) each declare their
//! table and the router collects the installed ones at startup.

pub mod auth;
pub mod chat;

use std::{future::Future, net::SocketAddr, pin::Pin, sync::Arc};

use serde_json::Value;

use {
    parlor_events::EventBus,
    parlor_protocol::{Request, Response},
    parlor_sessions::{SessionRegistry, SessionSink},
    parlor_store::{ChatMessage, Store},
};

/// Everything a handler may touch: the decoded request plus the store,
/// the session registry, and this connection's own sink (so `login` can
/// bind it).
pub struct HandlerContext {
    pub request: Request,
    pub peer: SocketAddr,
    pub conn_id: u64,
    pub sink: SessionSink,
    pub store: Arc<Store>,
    pub sessions: Arc<SessionRegistry>,
    pub events: Arc<EventBus>,
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = crate::Result<Response>> + Send>>;
pub type HandlerFn = Box<dyn Fn(HandlerContext) -> HandlerFuture + Send + Sync>;

/// One row of a module's route table.
pub struct Route {
    pub action: &'static str,
    pub handler: HandlerFn,
}

pub(crate) fn route<F, Fut>(action: &'static str, handler: F) -> Route
where
    F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = crate::Result<Response>> + Send + 'static,
{
    Route {
        action,
        handler: Box::new(move |ctx| Box::pin(handler(ctx))),
    }
}

// ── Shared validation ────────────────────────────────────────────────────────

/// Base request validation: `username` must be a non-empty string.
pub(crate) fn validate_request(request: &Request) -> bool {
    request.data_str("username").is_some()
}

/// Credentialed requests additionally carry a non-empty password.
pub(crate) fn validate_credentials(request: &Request) -> bool {
    validate_request(request) && request.data_str("password").is_some()
}

// ── Shared response helpers ──────────────────────────────────────────────────

pub(crate) const INFO_UNKNOWN_USERNAME: &str = "Username does not exists";

/// Messages as the wire carries them: a list of [sender, text] pairs.
pub(crate) fn messages_to_value(messages: &[ChatMessage]) -> Value {
    Value::Array(
        messages
            .iter()
            .map(|m| {
                Value::Array(vec![
                    Value::String(m.sender_username.clone()),
                    Value::String(m.text.clone()),
                ])
            })
            .collect(),
    )
}

/// Loose truthiness for flag fields the legacy client sends as bool,
/// number, or string.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Null => false,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
