use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Identity of a connected user, as presented to other clients.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientInfo {
    #[serde(rename = "userId", skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
}

/// A chat message. The server stamps `timestamp`, `chat_guid` and the author
/// identity on receipt, overwriting whatever the client sent in those fields;
/// once stamped a message is immutable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    #[serde(rename = "userId", skip_serializing_if = "String::is_empty")]
    pub user_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub timestamp: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(rename = "chatGuid", skip_serializing_if = "String::is_empty")]
    pub chat_guid: String,
}

/// Online/offline notice about another client's connection state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Presence {
    pub client: ClientInfo,
    #[serde(rename = "isOnline")]
    pub is_online: bool,
}

/// The wire envelope, in both directions. Exactly one arm is populated per
/// transmission: a batch of messages (optionally with the cursor for the next
/// page), a presence notification, or an inbound single-message submission.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Payload {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    #[serde(rename = "pageToken", skip_serializing_if = "String::is_empty")]
    pub page_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Presence>,
}

impl Payload {
    /// Envelope carrying one broadcast message.
    pub fn single(message: Message) -> Self {
        Self {
            messages: vec![message],
            ..Self::default()
        }
    }

    /// Envelope carrying one presence notification.
    pub fn presence(client: ClientInfo, is_online: bool) -> Self {
        Self {
            notification: Some(Presence { client, is_online }),
            ..Self::default()
        }
    }
}

/// Server-assigned message timestamp: UTC, microsecond precision.
pub fn now_timestamp() -> String {
    Utc::now().format("%m-%d-%Y %H:%M:%S%.6f UTC").to_string()
}
