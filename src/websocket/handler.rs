use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::utils::scope_guard::count_scope;
use crate::ws::registry::RoomRegistry;
use crate::ws::room::SessionLink;
use crate::ws::session::ConnectionSession;

static ACTIVE_CONNECTIONS: AtomicUsize = AtomicUsize::new(0);

/// Number of websocket connections currently open
pub fn active_connections() -> usize {
    ACTIVE_CONNECTIONS.load(Ordering::SeqCst)
}

/// WebSocket handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(registry): State<Arc<RoomRegistry>>,
) -> Response {
    debug!("New WebSocket connection attempt");
    ws.on_upgrade(move |socket| handle_socket(socket, registry))
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, registry: Arc<RoomRegistry>) {
    let _connection = count_scope(&ACTIVE_CONNECTIONS);

    let queue_size = registry.settings().outbound_queue_size;
    let send_timeout = registry.settings().send_timeout;
    let (link, outbox) = SessionLink::channel(queue_size);
    let closer = link.closer();
    let mut session = ConnectionSession::new(registry, link);
    let session_id = session.session_id().to_string();
    info!("WebSocket connection established with session_id: {}", session_id);

    let (sender, mut receiver) = socket.split();

    // Only this task writes to the socket
    let mut send_task = tokio::spawn(write_frames(
        sender,
        outbox,
        closer,
        send_timeout,
        session_id.clone(),
    ));

    // Messages are handled to completion; the writer ending is only noticed between them
    loop {
        let incoming = tokio::select! {
            incoming = receiver.next() => incoming,
            _ = (&mut send_task) => {
                debug!("Writer of session {} finished", session_id);
                break;
            }
        };

        match incoming {
            Some(Ok(Message::Text(text))) => session.handle_text(&text).await,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                warn!("WebSocket error on session {}: {}", session_id, e);
                break;
            }
        }
    }

    send_task.abort();
    debug!("Session {} ends in state {:?}", session_id, session.state());
    session.close().await;
    info!("WebSocket connection terminated for session_id: {}", session_id);
}

/// Drain the session's outgoing queue into the socket until the queue closes,
/// a write fails or times out, or a close is requested.
async fn write_frames<S>(
    mut sender: S,
    mut outbox: mpsc::Receiver<Arc<str>>,
    closer: Arc<Notify>,
    send_timeout: Duration,
    session_id: String,
) where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    loop {
        tokio::select! {
            frame = outbox.recv() => {
                let Some(frame) = frame else {
                    break;
                };
                match timeout(send_timeout, sender.send(Message::Text(frame.to_string()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!("Failed to send to session {}: {}", session_id, e);
                        break;
                    }
                    Err(_) => {
                        warn!("Send to session {} timed out after {:?}", session_id, send_timeout);
                        break;
                    }
                }
            }
            _ = closer.notified() => {
                info!("Closing session {} on server request", session_id);
                if let Ok(Err(e)) = timeout(send_timeout, sender.send(Message::Close(None))).await {
                    debug!("Close frame for session {} not sent: {}", session_id, e);
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryRoomStore;
    use crate::db::RoomStore;
    use crate::ws::registry::RegistrySettings;
    use axum::{routing::get, Router};
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use tokio::net::TcpStream;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn serve(registry: Arc<RoomRegistry>) -> SocketAddr {
        let app = Router::new()
            .route("/ws", get(websocket_handler))
            .with_state(registry);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    async fn connect(addr: SocketAddr) -> Client {
        let (client, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
        client
    }

    async fn send(client: &mut Client, value: Value) {
        client
            .send(tokio_tungstenite::tungstenite::Message::Text(value.to_string().into()))
            .await
            .unwrap();
    }

    async fn next_json(client: &mut Client) -> Value {
        loop {
            let message = timeout(Duration::from_secs(5), client.next())
                .await
                .expect("no message in time")
                .expect("stream ended")
                .expect("websocket error");
            if message.is_text() {
                return serde_json::from_str(message.to_text().unwrap()).unwrap();
            }
        }
    }

    /// Join and consume the four snapshot frames
    async fn join(client: &mut Client, code: &str, name: &str) -> Vec<Value> {
        send(client, json!({"type": "join-room", "code": code, "user": {"name": name}})).await;
        let mut frames = Vec::new();
        for _ in 0..4 {
            frames.push(next_json(client).await);
        }
        frames
    }

    #[tokio::test]
    async fn test_two_clients_collaborate_over_websocket() {
        let store = Arc::new(MemoryRoomStore::new());
        let registry = Arc::new(RoomRegistry::new(store.clone(), RegistrySettings::default()));
        let addr = serve(registry.clone()).await;

        let mut ada = connect(addr).await;
        let snapshots = join(&mut ada, "ABC123", "Ada").await;
        let types: Vec<&str> = snapshots.iter().map(|f| f["type"].as_str().unwrap()).collect();
        assert_eq!(types, vec!["initial-content", "comments-sync", "media-sync", "users-sync"]);

        let mut bob = connect(addr).await;
        join(&mut bob, "ABC123", "Bob").await;
        let joined = next_json(&mut ada).await;
        assert_eq!(joined["type"], "user-joined");
        assert_eq!(joined["user"]["name"], "Bob");

        send(&mut ada, json!({"type": "text-update", "code": "ABC123", "content": "hello"})).await;
        let update = next_json(&mut bob).await;
        assert_eq!(update["type"], "text-update");
        assert_eq!(update["content"], "hello");
        assert_eq!(store.get_room_content("ABC123").await.unwrap(), "hello");

        send(&mut bob, json!({"type": "ping", "code": "ABC123"})).await;
        assert_eq!(next_json(&mut bob).await["type"], "pong");

        ada.close(None).await.unwrap();
        let left = next_json(&mut bob).await;
        assert_eq!(left["type"], "user-left");
        assert_eq!(left["user"]["name"], "Ada");
    }

    #[tokio::test]
    async fn test_malformed_frames_keep_the_connection_open() {
        let registry = Arc::new(RoomRegistry::new(
            Arc::new(MemoryRoomStore::new()),
            RegistrySettings::default(),
        ));
        let addr = serve(registry).await;

        let mut client = connect(addr).await;
        client
            .send(tokio_tungstenite::tungstenite::Message::Text("{not json".into()))
            .await
            .unwrap();
        send(&mut client, json!({"type": "no-such-type", "code": "r"})).await;

        let frames = join(&mut client, "r", "Ada").await;
        assert_eq!(frames[0]["type"], "initial-content");
    }

    #[tokio::test]
    async fn test_purge_closes_connected_clients() {
        let registry = Arc::new(RoomRegistry::new(
            Arc::new(MemoryRoomStore::new()),
            RegistrySettings::default(),
        ));
        let addr = serve(registry.clone()).await;

        let mut client = connect(addr).await;
        join(&mut client, "r", "Ada").await;

        let outcome = registry.purge("r").await.unwrap();
        assert_eq!(outcome.disconnected, 1);

        // The server sends a close frame and then drops the connection
        let closed = timeout(Duration::from_secs(5), async {
            loop {
                match client.next().await {
                    Some(Ok(message)) if message.is_close() => return true,
                    Some(Ok(_)) => continue,
                    Some(Err(_)) | None => return true,
                }
            }
        })
        .await
        .unwrap();
        assert!(closed);
    }

    #[tokio::test]
    async fn test_writer_gives_up_on_a_stalled_socket() {
        let stalled = Box::pin(futures_util::sink::unfold((), |(), _: Message| {
            futures_util::future::pending::<Result<(), std::io::Error>>()
        }));
        let (link, outbox) = SessionLink::channel(4);
        link.try_send(Arc::from("{}")).unwrap();

        timeout(
            Duration::from_secs(2),
            write_frames(stalled, outbox, link.closer(), Duration::from_millis(50), "s1".to_string()),
        )
        .await
        .expect("writer should stop once a send times out");
    }

    #[tokio::test]
    async fn test_unread_connection_is_dropped_and_announced() {
        let registry = Arc::new(RoomRegistry::new(
            Arc::new(MemoryRoomStore::new()),
            RegistrySettings {
                send_timeout: Duration::from_millis(100),
                outbound_queue_size: 64,
                ..Default::default()
            },
        ));
        let addr = serve(registry.clone()).await;

        // Joins and then never reads again
        let mut stalled = connect(addr).await;
        join(&mut stalled, "r", "Idle").await;
        let mut writer = connect(addr).await;
        join(&mut writer, "r", "Ada").await;

        let content = "x".repeat(512 * 1024);
        let mut announced = false;
        for _ in 0..400 {
            send(&mut writer, json!({"type": "text-update", "code": "r", "content": content})).await;
            if let Ok(Some(Ok(message))) = timeout(Duration::from_millis(5), writer.next()).await {
                if message.is_text() {
                    let frame: Value = serde_json::from_str(message.to_text().unwrap()).unwrap();
                    if frame["type"] == "user-left" {
                        assert_eq!(frame["user"]["name"], "Idle");
                        announced = true;
                        break;
                    }
                }
            }
        }
        assert!(announced);
        assert_eq!(registry.summary("r").await.unwrap().n_sessions, 1);
    }
}
