use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("unknown user '{username}'")]
    UnknownUser { username: String },

    #[error("unknown user id {id}")]
    UnknownUserId { id: i64 },

    #[error("unknown chat id {id}")]
    UnknownChat { id: i64 },

    #[error("user {user_id} is not a participant of chat {chat_id}")]
    NotAParticipant { user_id: i64, chat_id: i64 },

    #[error("message text is empty")]
    EmptyMessage,
}

pub type Result<T> = std::result::Result<T, Error>;
