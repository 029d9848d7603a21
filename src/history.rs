use std::sync::Arc;

use thiserror::Error;

use crate::cursor::{CursorCodec, CursorError};
use crate::model::Payload;
use crate::store::{Store, StoreError};

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error(transparent)]
    Cursor(#[from] CursorError),
    #[error("page token does not decode to a message id")]
    BadId,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reads pages of past messages, newest first, addressed by an opaque cursor.
///
/// A pure read against the store: no caching and no retries. A failure here
/// is fatal for the requesting connection's page only.
pub struct HistoryReader {
    store: Arc<dyn Store>,
    codec: Arc<CursorCodec>,
}

impl HistoryReader {
    pub fn new(store: Arc<dyn Store>, codec: Arc<CursorCodec>) -> Self {
        Self { store, codec }
    }

    /// Fetches up to `limit` messages older than the cursor (the most recent
    /// ones when the cursor is empty), together with the token for the page
    /// after this one. An empty page carries an empty token.
    pub async fn read_page(
        &self,
        chat_guid: &str,
        limit: i64,
        page_token: &str,
    ) -> Result<Payload, HistoryError> {
        let id = self.codec.decode(page_token)?;
        let before_id = if id.is_empty() {
            None
        } else {
            Some(id.parse::<i64>().map_err(|_| HistoryError::BadId)?)
        };

        let page = self.store.messages_before(chat_guid, limit, before_id).await?;
        log::info!("Fetched {} messages for chat {chat_guid}", page.len());

        let oldest_id = page.last().map_or(String::new(), |m| m.id.to_string());
        let next_token = self.codec.encode(&oldest_id)?;

        Ok(Payload {
            messages: page.into_iter().map(|m| m.message).collect(),
            page_token: next_token,
            notification: None,
        })
    }
}
