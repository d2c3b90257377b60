//! SQLite persistence for users, contacts, chats, and messages.
//!
//! The store is the single source of truth for the chat domain model.
//! All access goes through short per-call queries on a [`sqlx::SqlitePool`];
//! nothing holds a connection across handler await points.

pub mod chats;
pub mod error;
pub mod messages;
pub mod password;
pub mod schema;
pub mod types;
pub mod users;

use std::path::Path;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

pub use {
    error::{Error, Result},
    types::{Chat, ChatMessage, ChatType, Message, User},
};

pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database at `path` and apply the schema.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory database, used by tests and throwaway servers.
    ///
    /// Capped at a single pooled connection: every additional connection
    /// to `sqlite::memory:` would open its own empty database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Row timestamps, unix seconds.
pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
