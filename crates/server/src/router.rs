//! Maps action verbs to handlers.
//!
//! Built once at startup from the route tables of the installed modules;
//! immutable afterwards. Dispatch turns the three failure classes into
//! their status codes: missing action → 400, unknown verb → 404, handler
//! error → 500.

use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use parlor_protocol::Response;

use crate::handlers::{self, HandlerContext, HandlerFn};

pub struct Router {
    routes: HashMap<&'static str, HandlerFn>,
}

impl Router {
    /// Collect the route tables of `modules` (unknown names are skipped
    /// with a warning — configuration validation rejects them upstream).
    #[must_use]
    pub fn new(modules: &[String]) -> Self {
        let mut routes: HashMap<&'static str, HandlerFn> = HashMap::new();
        for module in modules {
            let table = match module.as_str() {
                "auth" => handlers::auth::routes(),
                "chat" => handlers::chat::routes(),
                other => {
                    warn!(module = other, "skipping unknown module");
                    continue;
                },
            };
            for route in table {
                routes.insert(route.action, route.handler);
            }
        }
        Self { routes }
    }

    #[must_use]
    pub fn validate_action(&self, action: &str) -> bool {
        self.routes.contains_key(action)
    }

    #[must_use]
    pub fn resolve(&self, action: &str) -> Option<&HandlerFn> {
        self.routes.get(action)
    }

    /// All registered verbs, sorted.
    #[must_use]
    pub fn actions(&self) -> Vec<&'static str> {
        let mut actions: Vec<_> = self.routes.keys().copied().collect();
        actions.sort_unstable();
        actions
    }

    pub async fn dispatch(&self, ctx: HandlerContext) -> Response {
        let Some(action) = ctx.request.action.clone().filter(|a| !a.is_empty()) else {
            warn!(conn_id = ctx.conn_id, "request without action");
            return Response::malformed(None);
        };

        let Some(handler) = self.resolve(&action) else {
            warn!(action = %action, conn_id = ctx.conn_id, "action does not exist");
            return Response::unknown_action(Some(action));
        };

        debug!(action = %action, conn_id = ctx.conn_id, "dispatching");
        match handler(ctx).await {
            Ok(response) => {
                info!(handler = %action, code = response.code, "request handled");
                response
            },
            Err(e) => {
                error!(handler = %action, error = %e, "handler failed");
                Response::internal_error(Some(action))
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn modules(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn collects_installed_module_tables() {
        let router = Router::new(&modules(&["auth", "chat"]));
        assert_eq!(router.actions(), vec![
            "add_contact",
            "add_message",
            "common_chat",
            "delete_contact",
            "get_chat",
            "get_contacts",
            "login",
            "logout",
            "profile",
            "register",
            "search_in_chat",
            "update_profile",
        ]);
    }

    #[test]
    fn auth_only_install() {
        let router = Router::new(&modules(&["auth"]));
        assert!(router.validate_action("login"));
        assert!(!router.validate_action("get_chat"));
    }

    #[test]
    fn unknown_module_is_skipped() {
        let router = Router::new(&modules(&["voice"]));
        assert!(router.actions().is_empty());
    }

    #[test]
    fn unknown_action_does_not_resolve() {
        let router = Router::new(&modules(&["auth", "chat"]));
        assert!(!router.validate_action("message_listener"));
        assert!(!router.validate_action("frobnicate"));
        assert!(router.resolve("frobnicate").is_none());
    }
}
