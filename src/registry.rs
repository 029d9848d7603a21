use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::history::HistoryReader;
use crate::model::{ClientInfo, Payload};
use crate::persist::PersistQueue;
use crate::room::{self, ConnId, RoomEvent, RoomHandle};

struct Entry {
    handle: RoomHandle,
    connections: usize,
}

/// Process-wide directory of live rooms, keyed by conversation id.
///
/// The map is only ever touched under its mutex. The connection count per
/// entry tracks admitted connections so the entry is removed inside the same
/// disconnect handler that releases the last one; a later join for the same
/// chat then gets a fresh room. The live-client sets themselves live inside
/// the room loops, never here.
pub struct Registry {
    rooms: Mutex<HashMap<String, Entry>>,
    history: Arc<HistoryReader>,
    persist: PersistQueue,
}

impl Registry {
    pub fn new(history: Arc<HistoryReader>, persist: PersistQueue) -> Self {
        log::info!("Started room registry");
        Self {
            rooms: Mutex::new(HashMap::new()),
            history,
            persist,
        }
    }

    /// Attaches an admitted connection to the room for `chat_guid`, creating
    /// the room on first join. Returns the connection's id within the room
    /// and the handle its later frames go through.
    pub async fn route(
        &self,
        chat_guid: &str,
        client: ClientInfo,
        outbound: mpsc::UnboundedSender<Payload>,
    ) -> (ConnId, RoomHandle) {
        let conn = Uuid::new_v4();
        let handle = {
            let mut rooms = self.rooms.lock().await;
            let entry = rooms.entry(chat_guid.to_string()).or_insert_with(|| Entry {
                handle: room::spawn(
                    chat_guid.to_string(),
                    Arc::clone(&self.history),
                    self.persist.clone(),
                ),
                connections: 0,
            });
            entry.connections += 1;
            entry.handle.clone()
        };
        handle.send(RoomEvent::Join {
            conn,
            client,
            tx: outbound,
        });
        (conn, handle)
    }

    /// Terminal disconnect of one connection: queues the leave and, when this
    /// was the chat's last connection, drops the room from the directory.
    pub async fn release(&self, chat_guid: &str, conn: ConnId, handle: &RoomHandle) {
        handle.send(RoomEvent::Leave { conn });

        let mut rooms = self.rooms.lock().await;
        if let Some(entry) = rooms.get_mut(chat_guid) {
            entry.connections = entry.connections.saturating_sub(1);
            if entry.connections == 0 {
                rooms.remove(chat_guid);
                log::info!("Retiring room for chat {chat_guid}");
            }
        }
    }
}
