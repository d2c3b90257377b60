//! The chat server core: action routing, request handlers, per-connection
//! dispatch loops, and the TCP supervisor.

mod connection;
pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use {
    error::{Error, Result},
    router::Router,
    server::Server,
};
