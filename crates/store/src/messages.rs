//! Message rows: append, list, search.

use crate::{ChatMessage, Error, Message, Result, Store, unix_now};

impl Store {
    /// Append a message. The sender must be a participant of the chat and
    /// the text non-empty; messages are never edited or deleted.
    pub async fn add_message(&self, sender_id: i64, chat_id: i64, text: &str) -> Result<Message> {
        if text.is_empty() {
            return Err(Error::EmptyMessage);
        }
        self.expect_chat(chat_id).await?;
        if !self.is_participant(chat_id, sender_id).await? {
            return Err(Error::NotAParticipant { user_id: sender_id, chat_id });
        }

        let created = unix_now();
        let result =
            sqlx::query("INSERT INTO messages (sender_id, chat_id, text, created) VALUES (?, ?, ?, ?)")
                .bind(sender_id)
                .bind(chat_id)
                .bind(text)
                .bind(created)
                .execute(self.pool())
                .await?;

        Ok(Message {
            id: result.last_insert_rowid(),
            sender_id,
            chat_id,
            text: text.to_string(),
            created,
        })
    }

    /// All messages of a chat in send order, joined with sender usernames.
    pub async fn chat_messages(&self, chat_id: i64) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, ChatMessage>(
            "SELECT u.username AS sender_username, m.text
             FROM messages m JOIN users u ON u.id = m.sender_id
             WHERE m.chat_id = ?
             ORDER BY m.id",
        )
        .bind(chat_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Raw message rows of a chat in send order.
    pub async fn messages_in(&self, chat_id: i64) -> Result<Vec<Message>> {
        let rows =
            sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE chat_id = ? ORDER BY id")
                .bind(chat_id)
                .fetch_all(self.pool())
                .await?;
        Ok(rows)
    }

    /// Messages of a chat whose text contains `word`, case-insensitively,
    /// in send order.
    pub async fn search_messages(&self, chat_id: i64, word: &str) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query_as::<_, ChatMessage>(
            "SELECT u.username AS sender_username, m.text
             FROM messages m JOIN users u ON u.id = m.sender_id
             WHERE m.chat_id = ? AND instr(lower(m.text), lower(?)) > 0
             ORDER BY m.id",
        )
        .bind(chat_id)
        .bind(word)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use crate::{Error, Store};

    async fn chat_fixture() -> (Store, i64, i64, i64) {
        let store = Store::in_memory().await.unwrap();
        let alice = store.create_user("alice", "x").await.unwrap();
        let bob = store.create_user("bob", "x").await.unwrap();
        let chat = store.single_chat_between(alice, bob).await.unwrap();
        (store, alice, bob, chat)
    }

    #[tokio::test]
    async fn append_and_list_in_send_order() {
        let (store, alice, bob, chat) = chat_fixture().await;

        store.add_message(alice, chat, "hi").await.unwrap();
        store.add_message(bob, chat, "hello").await.unwrap();
        store.add_message(alice, chat, "bye").await.unwrap();

        let messages = store.chat_messages(chat).await.unwrap();
        let pairs: Vec<(&str, &str)> = messages
            .iter()
            .map(|m| (m.sender_username.as_str(), m.text.as_str()))
            .collect();
        assert_eq!(pairs, vec![("alice", "hi"), ("bob", "hello"), ("alice", "bye")]);
    }

    #[tokio::test]
    async fn message_ids_strictly_increase_per_chat() {
        let (store, alice, _bob, chat) = chat_fixture().await;

        for text in ["one", "two", "three"] {
            store.add_message(alice, chat, text).await.unwrap();
        }

        let ids: Vec<i64> = store
            .messages_in(chat)
            .await
            .unwrap()
            .iter()
            .map(|m| m.id)
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn rejects_empty_text() {
        let (store, alice, _bob, chat) = chat_fixture().await;
        assert!(matches!(
            store.add_message(alice, chat, "").await,
            Err(Error::EmptyMessage)
        ));
    }

    #[tokio::test]
    async fn rejects_non_participant_sender() {
        let (store, _alice, _bob, chat) = chat_fixture().await;
        let carol = store.create_user("carol", "x").await.unwrap();
        assert!(matches!(
            store.add_message(carol, chat, "hi").await,
            Err(Error::NotAParticipant { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_unknown_chat() {
        let (store, alice, _bob, _chat) = chat_fixture().await;
        assert!(matches!(
            store.add_message(alice, 999, "hi").await,
            Err(Error::UnknownChat { id: 999 })
        ));
    }

    #[tokio::test]
    async fn search_is_case_insensitive_substring() {
        let (store, alice, _bob, chat) = chat_fixture().await;

        store.add_message(alice, chat, "hi").await.unwrap();
        store.add_message(alice, chat, "HI there").await.unwrap();
        store.add_message(alice, chat, "bye").await.unwrap();

        let hits = store.search_messages(chat, "hi").await.unwrap();
        let texts: Vec<&str> = hits.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["hi", "HI there"]);
    }

    #[tokio::test]
    async fn search_no_hits() {
        let (store, alice, _bob, chat) = chat_fixture().await;
        store.add_message(alice, chat, "hello").await.unwrap();
        assert!(store.search_messages(chat, "xyz").await.unwrap().is_empty());
    }
}
