use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use warp::http::StatusCode;
use warp::ws::{Message, WebSocket};
use warp::{Filter, Rejection, Reply};

use crate::auth::{origin_allowed, IdentityGate};
use crate::model::{ClientInfo, Payload};
use crate::registry::Registry;
use crate::room::RoomEvent;
use crate::store::Store;

/// A websocket write slower than this counts as a dead client.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Query parameters of the upgrade endpoint.
#[derive(Debug, Deserialize)]
struct ChatQuery {
    #[serde(default)]
    guid: String,
    #[serde(default)]
    token: String,
}

/// Reasons a connection is refused before it may touch any room state.
#[derive(Debug)]
enum Rejected {
    NoUpgrade,
    BadOrigin,
    BadToken,
    BadMembership,
}

impl warp::reject::Reject for Rejected {}

/// Everything the admission checks resolved about a connection.
struct Admitted {
    chat_guid: String,
    client: ClientInfo,
}

/// Shared collaborators of the upgrade endpoint.
pub struct Server {
    pub registry: Arc<Registry>,
    pub gate: IdentityGate,
    pub store: Arc<dyn Store>,
    pub allowed_origins: Vec<String>,
}

/// The single route: `GET /chat?guid=..&token=..`, upgraded to a websocket
/// once origin, upgrade header, token and membership all check out.
pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let admission = Arc::clone(&server);
    warp::path("chat")
        .and(warp::path::end())
        .and(warp::header::optional::<String>("origin"))
        .and(warp::header::optional::<String>("upgrade"))
        .and(warp::query::<ChatQuery>())
        .and_then(
            move |origin: Option<String>, upgrade: Option<String>, query: ChatQuery| {
                let server = Arc::clone(&admission);
                async move { admit(&server, origin, upgrade, query).await }
            },
        )
        .and(warp::ws())
        .map(move |admitted: Admitted, ws: warp::ws::Ws| {
            let server = Arc::clone(&server);
            ws.on_upgrade(move |socket| async move {
                pump(server, admitted, socket).await;
            })
        })
        .recover(handle_rejection)
}

async fn admit(
    server: &Server,
    origin: Option<String>,
    upgrade: Option<String>,
    query: ChatQuery,
) -> Result<Admitted, Rejection> {
    log::info!("Received upgrade request for chat {}", query.guid);

    let origin = origin.unwrap_or_default();
    if !origin_allowed(&server.allowed_origins, &origin) {
        log::warn!("Could not verify origin [{origin}], dropping connection");
        return Err(warp::reject::custom(Rejected::BadOrigin));
    }

    if !upgrade.is_some_and(|value| value.eq_ignore_ascii_case("websocket")) {
        log::warn!("WebSocket upgrade not present in the request, dropping connection");
        return Err(warp::reject::custom(Rejected::NoUpgrade));
    }

    let client = match server.gate.verify(&query.token).await {
        Ok(client) => client,
        Err(e) => {
            log::warn!("Could not verify token: {e}, dropping connection");
            return Err(warp::reject::custom(Rejected::BadToken));
        }
    };

    match server.store.is_member(&client.user_id, &query.guid).await {
        Ok(true) => Ok(Admitted {
            chat_guid: query.guid,
            client,
        }),
        Ok(false) => {
            log::warn!(
                "Bad chat guid [{}] : user [{}], dropping connection",
                query.guid,
                client.user_id
            );
            Err(warp::reject::custom(Rejected::BadMembership))
        }
        Err(e) => {
            log::error!("Membership check failed: {e}, dropping connection");
            Err(warp::reject::custom(Rejected::BadMembership))
        }
    }
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(rejected) = err.find::<Rejected>() {
        let (message, status) = match rejected {
            Rejected::NoUpgrade => (
                "Method not allowed. Need upgrade to websockets",
                StatusCode::METHOD_NOT_ALLOWED,
            ),
            Rejected::BadOrigin => ("Bad Origin", StatusCode::FORBIDDEN),
            Rejected::BadToken => ("Bad token", StatusCode::FORBIDDEN),
            Rejected::BadMembership => ("Bad GUID", StatusCode::FORBIDDEN),
        };
        return Ok(warp::reply::with_status(message, status));
    }
    Err(err)
}

/// Runs one admitted connection: registers it with its room, pumps the
/// room's payloads into the socket under a bounded per-write timeout, and
/// feeds inbound frames to the room until the client goes away.
async fn pump(server: Arc<Server>, admitted: Admitted, ws: WebSocket) {
    let Admitted { chat_guid, client } = admitted;
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Payload>();

    let (conn, room) = server.registry.route(&chat_guid, client, tx).await;

    // Writer: drains the room's payloads into the socket. A write that fails
    // or overruns the timeout means the client is unreachable; the reader
    // below watches for the writer's exit and tears the connection down.
    let mut writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            let text = match serde_json::to_string(&payload) {
                Ok(text) => text,
                Err(e) => {
                    log::error!("Could not serialize outbound payload: {e}");
                    continue;
                }
            };
            match tokio::time::timeout(WRITE_TIMEOUT, ws_tx.send(Message::text(text))).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::error!("WebSocket write failed: {e}");
                    break;
                }
                Err(_) => {
                    log::error!("WebSocket write timed out, treating client as gone");
                    break;
                }
            }
        }
        let _ = ws_tx.close().await;
    });

    // Reader: every inbound frame goes into the room's mailbox; the room
    // loop is the only place that interprets it. The writer's exit counts as
    // a disconnect too, so a dead client is released from the registry right
    // away instead of lingering until the peer's read side errors.
    loop {
        tokio::select! {
            _ = &mut writer => break,
            next = ws_rx.next() => match next {
                Some(Ok(frame)) => {
                    if let Ok(text) = frame.to_str() {
                        match serde_json::from_str::<Payload>(text) {
                            Ok(payload) => room.send(RoomEvent::Frame { conn, payload }),
                            Err(e) => log::warn!("Discarding undecodable frame: {e}"),
                        }
                    }
                }
                Some(Err(e)) => {
                    log::error!("WebSocket read failed: {e}");
                    break;
                }
                None => break,
            },
        }
    }

    server.registry.release(&chat_guid, conn, &room).await;
    writer.abort();
}
