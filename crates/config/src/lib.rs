//! Server configuration: schema, defaults, and file loading.

pub mod error;
pub mod loader;
pub mod schema;

pub use {
    error::{Error, Result},
    loader::{discover_and_load, load_config},
    schema::ServerConfig,
};
