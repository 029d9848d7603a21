use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::history::HistoryReader;
use crate::model::{now_timestamp, ClientInfo, Message, Payload};
use crate::persist::PersistQueue;

/// Messages per history page, both on join and per pagination request.
pub const PAGE_SIZE: i64 = 25;

/// Submissions with more text than this are dropped without closing the
/// connection.
pub const MAX_TEXT_LEN: usize = 8000;

/// Identifies one live connection within a room.
pub type ConnId = Uuid;

/// Events delivered to a room's mailbox by connection tasks. The room loop is
/// the only code that touches the live-client set, so a room needs no locks.
pub enum RoomEvent {
    Join {
        conn: ConnId,
        client: ClientInfo,
        tx: mpsc::UnboundedSender<Payload>,
    },
    Frame {
        conn: ConnId,
        payload: Payload,
    },
    Leave {
        conn: ConnId,
    },
}

/// Submission side of a room's mailbox.
#[derive(Clone)]
pub struct RoomHandle {
    tx: mpsc::UnboundedSender<RoomEvent>,
}

impl RoomHandle {
    /// Queues an event for the room loop. The loop outlives every connection
    /// the registry routed to it, so a closed mailbox only happens during
    /// process shutdown.
    pub fn send(&self, event: RoomEvent) {
        let _ = self.tx.send(event);
    }
}

struct Room {
    chat_guid: String,
    history: Arc<HistoryReader>,
    persist: PersistQueue,
    clients: HashMap<ConnId, (ClientInfo, mpsc::UnboundedSender<Payload>)>,
}

/// Spawns the broadcast/presence loop for one conversation. The room retires
/// when its mailbox closes, which happens once the registry has dropped its
/// handle and every routed connection is gone; a retired room is never
/// reused.
pub fn spawn(chat_guid: String, history: Arc<HistoryReader>, persist: PersistQueue) -> RoomHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut room = Room {
        chat_guid,
        history,
        persist,
        clients: HashMap::new(),
    };
    tokio::spawn(async move {
        log::info!("Opened a new room for chat {}", room.chat_guid);
        while let Some(event) = rx.recv().await {
            match event {
                RoomEvent::Join { conn, client, tx } => room.join(conn, client, tx).await,
                RoomEvent::Frame { conn, payload } => room.frame(conn, payload).await,
                RoomEvent::Leave { conn } => room.leave(conn),
            }
        }
        log::info!("Room for chat {} retired", room.chat_guid);
    });
    RoomHandle { tx }
}

impl Room {
    async fn join(&mut self, conn: ConnId, client: ClientInfo, tx: mpsc::UnboundedSender<Payload>) {
        log::info!(
            "Adding client {} to the room for chat {}",
            client.user_id,
            self.chat_guid
        );
        self.clients.insert(conn, (client.clone(), tx));

        // Everyone already here learns the newcomer is online; the newcomer
        // never hears about themselves.
        self.broadcast(Payload::presence(client, true), Some(conn));

        // The newcomer gets the current roster, one online notice per other
        // client.
        let roster: Vec<ClientInfo> = self
            .clients
            .iter()
            .filter(|(id, _)| **id != conn)
            .map(|(_, (info, _))| info.clone())
            .collect();
        for other in roster {
            self.send_to(conn, Payload::presence(other, true));
        }

        // One page of recent history, newest first.
        match self.history.read_page(&self.chat_guid, PAGE_SIZE, "").await {
            Ok(page) => self.send_to(conn, page),
            Err(e) => log::error!("Could not read history for chat {}: {e}", self.chat_guid),
        }
    }

    async fn frame(&mut self, conn: ConnId, payload: Payload) {
        // A non-empty cursor makes the frame a pagination request; it is
        // answered to the requester only, never broadcast or persisted.
        if !payload.page_token.is_empty() {
            self.page_request(conn, &payload.page_token).await;
            return;
        }

        let Some(received) = payload.messages.into_iter().next() else {
            log::warn!("Discarding empty frame in chat {}", self.chat_guid);
            return;
        };
        self.submit(conn, received);
    }

    async fn page_request(&mut self, conn: ConnId, page_token: &str) {
        log::info!("Received page token for chat {}", self.chat_guid);
        match self
            .history
            .read_page(&self.chat_guid, PAGE_SIZE, page_token)
            .await
        {
            Ok(page) => self.send_to(conn, page),
            // Fails this request only; the connection stays open and the
            // room keeps running.
            Err(e) => log::warn!("Page request failed in chat {}: {e}", self.chat_guid),
        }
    }

    fn submit(&mut self, conn: ConnId, mut message: Message) {
        let Some((sender, _)) = self.clients.get(&conn) else {
            return;
        };
        let sender = sender.clone();

        if message.text.len() > MAX_TEXT_LEN {
            log::error!(
                "Message too long - length [{}], from client [{}]",
                message.text.len(),
                sender.user_id
            );
            return;
        }

        // The server owns the timestamp, the conversation id and the author
        // identity; whatever the client put in those fields is overwritten.
        message.timestamp = now_timestamp();
        message.chat_guid = self.chat_guid.clone();
        message.user_id = sender.user_id;
        message.username = sender.username;

        log::info!(
            "Message received in chat {} from client {}",
            self.chat_guid,
            message.user_id
        );

        self.persist.submit(message.clone());
        // The sender gets their own message back through the broadcast path
        // and thereby sees the server-assigned timestamp.
        self.broadcast(Payload::single(message), None);
    }

    fn leave(&mut self, conn: ConnId) {
        let Some((client, _)) = self.clients.remove(&conn) else {
            return;
        };
        log::info!(
            "Deleting client {} from the room for chat {}",
            client.user_id,
            self.chat_guid
        );
        // Presence notifications never reach their own subject; the subject
        // is already deregistered here, the exclusion keeps the rule visible.
        self.broadcast(Payload::presence(client, false), Some(conn));
    }

    /// Fans a payload out to every live client except `except`. A client
    /// whose outbound channel is gone is removed on the spot (implicit
    /// leave); one dead client never stops delivery to the rest.
    fn broadcast(&mut self, payload: Payload, except: Option<ConnId>) {
        let mut dead = Vec::new();
        for (id, (_, tx)) in &self.clients {
            if Some(*id) == except {
                continue;
            }
            if tx.send(payload.clone()).is_err() {
                dead.push(*id);
            }
        }
        for id in dead {
            self.leave(id);
        }
    }

    fn send_to(&mut self, conn: ConnId, payload: Payload) {
        let Some((_, tx)) = self.clients.get(&conn) else {
            return;
        };
        if tx.send(payload).is_err() {
            self.leave(conn);
        }
    }
}
