//! Chat rows and participant sets.
//!
//! Two uniqueness rules live here: one chat per unordered user pair
//! (canonical `pair_key`) and exactly one common chat system-wide
//! (partial unique index). Both use insert-or-ignore followed by a
//! re-select so concurrent first accesses converge on one row.

use crate::{Chat, Error, Result, Store, unix_now};

fn pair_key(a: i64, b: i64) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}:{hi}")
}

impl Store {
    pub async fn chat_by_id(&self, id: i64) -> Result<Option<Chat>> {
        let chat = sqlx::query_as::<_, Chat>("SELECT * FROM chats WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(chat)
    }

    pub async fn expect_chat(&self, id: i64) -> Result<Chat> {
        self.chat_by_id(id)
            .await?
            .ok_or(Error::UnknownChat { id })
    }

    /// The unique single chat between two users, created on first call
    /// with both users as participants (join order: `user_id`, then
    /// `contact_user_id`).
    pub async fn single_chat_between(&self, user_id: i64, contact_user_id: i64) -> Result<i64> {
        let key = pair_key(user_id, contact_user_id);

        sqlx::query(
            "INSERT INTO chats (chat_type, pair_key, created) VALUES ('single', ?, ?)
             ON CONFLICT (pair_key) DO NOTHING",
        )
        .bind(&key)
        .bind(unix_now())
        .execute(self.pool())
        .await?;

        let (chat_id,): (i64,) = sqlx::query_as("SELECT id FROM chats WHERE pair_key = ?")
            .bind(&key)
            .fetch_one(self.pool())
            .await?;

        self.ensure_participant(chat_id, user_id).await?;
        self.ensure_participant(chat_id, contact_user_id).await?;
        Ok(chat_id)
    }

    /// The singleton common chat, created on first access.
    pub async fn common_chat(&self) -> Result<i64> {
        sqlx::query(
            "INSERT INTO chats (chat_type, created) VALUES ('common', ?)
             ON CONFLICT DO NOTHING",
        )
        .bind(unix_now())
        .execute(self.pool())
        .await?;

        let (chat_id,): (i64,) =
            sqlx::query_as("SELECT id FROM chats WHERE chat_type = 'common'")
                .fetch_one(self.pool())
                .await?;
        Ok(chat_id)
    }

    /// Add a participant unless already present. Returns true when added.
    pub async fn ensure_participant(&self, chat_id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO chat_participants (chat_id, user_id, joined) VALUES (?, ?, ?)
             ON CONFLICT (chat_id, user_id) DO NOTHING",
        )
        .bind(chat_id)
        .bind(user_id)
        .bind(unix_now())
        .execute(self.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn is_participant(&self, chat_id: i64, user_id: i64) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM chat_participants WHERE chat_id = ? AND user_id = ?")
                .bind(chat_id)
                .bind(user_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.is_some())
    }

    /// Participant user ids in join order.
    pub async fn participants(&self, chat_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT user_id FROM chat_participants WHERE chat_id = ? ORDER BY rowid",
        )
        .bind(chat_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
