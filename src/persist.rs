use std::sync::Arc;

use tokio::sync::mpsc;

use crate::model::Message;
use crate::store::Store;

/// Handle for submitting accepted messages to the write-behind worker.
///
/// A single worker drains the mailbox in submission order and performs one
/// insert per message, so submission never waits on storage latency. A failed
/// insert is logged and the message is lost from durable storage only; the
/// broadcast already delivered to live clients stands.
#[derive(Clone)]
pub struct PersistQueue {
    tx: mpsc::UnboundedSender<Message>,
}

impl PersistQueue {
    /// Spawns the worker and returns the submission handle.
    pub fn spawn(store: Arc<dyn Store>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match store.insert_message(&message).await {
                    Ok(()) => log::info!("Successfully saved the message to the database"),
                    Err(e) => {
                        log::error!("Message insert failed, dropping from durable storage: {e}");
                    }
                }
            }
        });
        Self { tx }
    }

    /// Hands one stamped message to the worker. The mailbox only closes at
    /// process shutdown; a message lost then matches the best-effort
    /// persistence contract.
    pub fn submit(&self, message: Message) {
        if self.tx.send(message).is_err() {
            log::error!("Persistence worker is gone, dropping message");
        }
    }
}
