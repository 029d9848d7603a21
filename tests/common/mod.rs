use std::sync::Mutex;

use async_trait::async_trait;

use huddle::model::Message;
use huddle::store::{Store, StoreError, StoredMessage};

/// In-memory stand-in for Postgres. Row ids rise with insertion order, so
/// newest-first pages come back in descending id order like the real store.
#[derive(Default)]
pub struct MemoryStore {
    pub rows: Mutex<Vec<StoredMessage>>,
    pub members: Mutex<Vec<(String, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<StoredMessage>) -> Self {
        Self {
            rows: Mutex::new(rows),
            members: Mutex::new(Vec::new()),
        }
    }

    pub fn stored_texts(&self) -> Vec<String> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .map(|row| row.message.text.clone())
            .collect()
    }
}

/// Builds a stored row for preloading test fixtures.
pub fn row(id: i64, chat_guid: &str, text: &str) -> StoredMessage {
    StoredMessage {
        id,
        message: Message {
            user_id: "1".into(),
            username: "seed".into(),
            timestamp: format!("stamp-{id}"),
            text: text.into(),
            chat_guid: chat_guid.into(),
        },
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn is_member(&self, user_id: &str, chat_guid: &str) -> Result<bool, StoreError> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .iter()
            .any(|(user, chat)| user == user_id && chat == chat_guid))
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let id = rows.iter().map(|row| row.id).max().unwrap_or(0) + 1;
        rows.push(StoredMessage {
            id,
            message: message.clone(),
        });
        Ok(())
    }

    async fn messages_before(
        &self,
        chat_guid: &str,
        limit: i64,
        before_id: Option<i64>,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let bound = before_id.unwrap_or(i64::MAX);
        let mut page: Vec<StoredMessage> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.message.chat_guid == chat_guid && row.id < bound)
            .cloned()
            .collect();
        page.sort_by(|a, b| b.id.cmp(&a.id));
        page.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(page)
    }
}
