use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use thiserror::Error;

use crate::model::Message;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A message as stored, paired with the row id keyset pagination orders by.
#[derive(Clone, Debug)]
pub struct StoredMessage {
    pub id: i64,
    pub message: Message,
}

/// The relational collaborator: membership checks, durable inserts and
/// keyset page reads. Rooms, admission and the persistence queue only ever
/// see this trait.
#[async_trait]
pub trait Store: Send + Sync {
    /// Whether `user_id` has membership in `chat_guid`.
    async fn is_member(&self, user_id: &str, chat_guid: &str) -> Result<bool, StoreError>;

    /// Durably inserts one accepted message.
    async fn insert_message(&self, message: &Message) -> Result<(), StoreError>;

    /// Up to `limit` messages of `chat_guid` with id strictly below
    /// `before_id` (unbounded when `None`), newest first.
    async fn messages_before(
        &self,
        chat_guid: &str,
        limit: i64,
        before_id: Option<i64>,
    ) -> Result<Vec<StoredMessage>, StoreError>;
}

/// Postgres-backed store over two tables: `messages` and `chats_users`.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().connect(database_url).await?;
        log::info!("Opened a new database connection pool");
        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn is_member(&self, user_id: &str, chat_guid: &str) -> Result<bool, StoreError> {
        let matches: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chats_users WHERE user_id = $1 AND chat_guid = $2",
        )
        .bind(user_id)
        .bind(chat_guid)
        .fetch_one(&self.pool)
        .await?;
        Ok(matches > 0)
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO messages(user_id, text, timestamp, chat_guid) VALUES($1, $2, $3, $4)",
        )
        .bind(&message.user_id)
        .bind(&message.text)
        .bind(&message.timestamp)
        .bind(&message.chat_guid)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn messages_before(
        &self,
        chat_guid: &str,
        limit: i64,
        before_id: Option<i64>,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT m.id, m.user_id, u.username, m.text, m.timestamp, m.chat_guid \
             FROM messages m \
                INNER JOIN users u ON u.id = m.user_id \
             WHERE m.chat_guid = $1 \
             AND m.id < $2 \
             ORDER BY m.timestamp DESC \
             LIMIT $3",
        )
        .bind(chat_guid)
        .bind(before_id.unwrap_or(i64::MAX))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut page = Vec::with_capacity(rows.len());
        for row in rows {
            page.push(StoredMessage {
                id: row.try_get("id")?,
                message: Message {
                    user_id: row.try_get("user_id")?,
                    username: row.try_get("username")?,
                    text: row.try_get("text")?,
                    timestamp: row.try_get("timestamp")?,
                    chat_guid: row.try_get("chat_guid")?,
                },
            });
        }
        Ok(page)
    }
}
