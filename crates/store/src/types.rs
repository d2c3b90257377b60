/// A registered user. `password` holds the PBKDF2 hash, never plaintext.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: Option<String>,
    pub second_name: Option<String>,
    pub bio: Option<String>,
    pub password: String,
    pub is_authenticated: bool,
    pub created: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum ChatType {
    /// Two participants, unique per unordered pair.
    Single,
    /// The one broadcast chat every user may join.
    Common,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Chat {
    pub id: i64,
    pub chat_type: ChatType,
    pub created: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub chat_id: i64,
    pub text: String,
    pub created: i64,
}

/// A message joined with its sender's username, the shape responses carry.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChatMessage {
    pub sender_username: String,
    pub text: String,
}
