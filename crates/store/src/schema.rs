//! Table definitions.
//!
//! Uniqueness the protocol depends on is enforced here rather than in
//! handler code: usernames, one contact row per (owner, contact) pair,
//! one chat per unordered user pair (`pair_key`), and at most one chat
//! with `chat_type = 'common'` (partial unique index).

use crate::{Result, Store};

const SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        username         TEXT    NOT NULL UNIQUE,
        first_name       TEXT,
        second_name      TEXT,
        bio              TEXT,
        password         TEXT    NOT NULL,
        is_authenticated INTEGER NOT NULL DEFAULT 0,
        created          INTEGER NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS contacts (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id   INTEGER NOT NULL REFERENCES users (id),
        contact_id INTEGER NOT NULL REFERENCES users (id),
        created    INTEGER NOT NULL,
        UNIQUE (owner_id, contact_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS chats (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        chat_type TEXT    NOT NULL CHECK (chat_type IN ('single', 'common')),
        pair_key  TEXT    UNIQUE,
        created   INTEGER NOT NULL
    )"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_chats_one_common
        ON chats (chat_type) WHERE chat_type = 'common'"#,
    r#"CREATE TABLE IF NOT EXISTS chat_participants (
        chat_id INTEGER NOT NULL REFERENCES chats (id),
        user_id INTEGER NOT NULL REFERENCES users (id),
        joined  INTEGER NOT NULL,
        PRIMARY KEY (chat_id, user_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS messages (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        sender_id INTEGER NOT NULL REFERENCES users (id),
        chat_id   INTEGER NOT NULL REFERENCES chats (id),
        text      TEXT    NOT NULL,
        created   INTEGER NOT NULL
    )"#,
    r#"CREATE INDEX IF NOT EXISTS idx_messages_chat ON messages (chat_id, id)"#,
    r#"CREATE TABLE IF NOT EXISTS client_history (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        client_id INTEGER NOT NULL REFERENCES users (id),
        address   TEXT    NOT NULL,
        created   INTEGER NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS media (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        kind        TEXT    NOT NULL,
        uploader_id INTEGER NOT NULL REFERENCES users (id),
        path        TEXT    NOT NULL,
        created     INTEGER NOT NULL
    )"#,
];

impl Store {
    /// Create all tables and indexes if absent.
    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(self.pool()).await?;
        }
        Ok(())
    }
}
