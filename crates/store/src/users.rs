//! User accounts, contacts, login history, and avatar media.

use crate::{Error, Result, Store, User, password, unix_now};

/// Media row kind for profile avatars.
const KIND_AVATAR: &str = "avatar";

impl Store {
    /// Create a user with a hashed password and empty contact/chat sets.
    /// Returns the new user id.
    pub async fn create_user(&self, username: &str, plain_password: &str) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO users (username, password, created)
             VALUES (?, ?, ?)",
        )
        .bind(username)
        .bind(password::hash_password(plain_password))
        .bind(unix_now())
        .execute(self.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    pub async fn user_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    /// Look a user up by name, failing when absent.
    pub async fn expect_user(&self, username: &str) -> Result<User> {
        self.user_by_username(username)
            .await?
            .ok_or_else(|| Error::UnknownUser {
                username: username.to_string(),
            })
    }

    pub async fn set_authenticated(&self, user_id: i64, authenticated: bool) -> Result<()> {
        sqlx::query("UPDATE users SET is_authenticated = ? WHERE id = ?")
            .bind(authenticated)
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Append the peer address to the user's login history.
    pub async fn record_login(&self, user_id: i64, address: &str) -> Result<()> {
        sqlx::query("INSERT INTO client_history (client_id, address, created) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(address)
            .bind(unix_now())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn login_history(&self, user_id: i64) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT address FROM client_history WHERE client_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(address,)| address).collect())
    }

    /// Update profile fields; `None` leaves the stored value untouched.
    pub async fn update_profile(
        &self,
        user_id: i64,
        first_name: Option<&str>,
        second_name: Option<&str>,
        bio: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE users SET
                first_name  = COALESCE(?, first_name),
                second_name = COALESCE(?, second_name),
                bio         = COALESCE(?, bio)
             WHERE id = ?",
        )
        .bind(first_name)
        .bind(second_name)
        .bind(bio)
        .bind(user_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    // ── Contacts ─────────────────────────────────────────────────────────

    /// The owner's contacts as (username, contact user id), in add order.
    pub async fn contacts_map(&self, owner_id: i64) -> Result<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT u.username, u.id
             FROM contacts c JOIN users u ON u.id = c.contact_id
             WHERE c.owner_id = ?
             ORDER BY c.id",
        )
        .bind(owner_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn has_contact(&self, owner_id: i64, contact_user_id: i64) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM contacts WHERE owner_id = ? AND contact_id = ?")
                .bind(owner_id)
                .bind(contact_user_id)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.is_some())
    }

    pub async fn add_contact(&self, owner_id: i64, contact_user_id: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO contacts (owner_id, contact_id, created) VALUES (?, ?, ?)
             ON CONFLICT (owner_id, contact_id) DO NOTHING",
        )
        .bind(owner_id)
        .bind(contact_user_id)
        .bind(unix_now())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Remove a contact relation. `id` may be the contact user id (the
    /// canonical form) or a legacy relation row id; absent rows are fine.
    pub async fn delete_contact(&self, owner_id: i64, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM contacts WHERE owner_id = ? AND (contact_id = ? OR id = ?)")
            .bind(owner_id)
            .bind(id)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    // ── Avatars ──────────────────────────────────────────────────────────

    /// Replace the user's avatar media row; returns the new file-name token.
    pub async fn set_avatar(&self, user_id: i64, username: &str) -> Result<String> {
        let path = format!("{username}_avatar.png");
        sqlx::query("DELETE FROM media WHERE uploader_id = ? AND kind = ?")
            .bind(user_id)
            .bind(KIND_AVATAR)
            .execute(self.pool())
            .await?;
        sqlx::query("INSERT INTO media (kind, uploader_id, path, created) VALUES (?, ?, ?, ?)")
            .bind(KIND_AVATAR)
            .bind(user_id)
            .bind(&path)
            .bind(unix_now())
            .execute(self.pool())
            .await?;
        Ok(path)
    }

    /// The user's avatar file-name token, if one was uploaded.
    pub async fn avatar_path(&self, user_id: i64) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT path FROM media WHERE uploader_id = ? AND kind = ?")
                .bind(user_id)
                .bind(KIND_AVATAR)
                .fetch_optional(self.pool())
                .await?;
        Ok(row.map(|(path,)| path))
    }
}
