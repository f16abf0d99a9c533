//! Realtime Hub: spec.md §4.8.
//!
//! Each open WebSocket connection registers a bounded, non-blocking
//! outbound queue under the rooms it belongs to: `org:<id>` and
//! `user:<id>` on connect, plus on-demand `video:<id>` rooms a client
//! joins by sending a `subscribe:video <id>` text frame. A single
//! background task (spawned from `main`, see [`bridge_progress`]) drains
//! `ProgressChannel::subscribe_all()` and rebroadcasts each event to the
//! rooms it's relevant to, after resolving the event's video to its
//! owning tenant so a `video:progress` tick never reaches a connection
//! outside that video's organization.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;
use tracing::{debug, info, warn};

use vms_firestore::VideoRepository;
use vms_models::{RealtimeEvent, Room, VideoId};
use vms_queue::ProgressChannel;

use crate::auth::AuthContext;
use crate::metrics;
use crate::state::AppState;

/// Outbound queue depth per connection. A connection that can't keep up
/// with its own stream has new messages dropped rather than stalling the
/// broadcast for every other connection sharing a room.
const ROOM_QUEUE_SIZE: usize = 64;
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

static ACTIVE_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

type ConnId = u64;

/// In-process room registry bridging Redis pub/sub events to connected
/// WebSocket clients.
#[derive(Default)]
pub struct RealtimeHub {
    rooms: RwLock<HashMap<String, HashMap<ConnId, mpsc::Sender<Message>>>>,
    next_id: AtomicU64,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection under `rooms`, returning its id.
    async fn join(&self, rooms: &[String], tx: mpsc::Sender<Message>) -> ConnId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut guard = self.rooms.write().await;
        for room in rooms {
            guard.entry(room.clone()).or_default().insert(id, tx.clone());
        }
        id
    }

    async fn subscribe(&self, room: &str, id: ConnId, tx: mpsc::Sender<Message>) {
        let mut guard = self.rooms.write().await;
        guard.entry(room.to_string()).or_default().insert(id, tx);
    }

    async fn unsubscribe(&self, room: &str, id: ConnId) {
        let mut guard = self.rooms.write().await;
        if let Some(members) = guard.get_mut(room) {
            members.remove(&id);
            if members.is_empty() {
                guard.remove(room);
            }
        }
    }

    async fn leave_all(&self, id: ConnId) {
        let mut guard = self.rooms.write().await;
        guard.retain(|_, members| {
            members.remove(&id);
            !members.is_empty()
        });
    }

    /// Non-blocking fan-out of `message` to every connection in `room`.
    pub async fn broadcast(&self, room: &str, message: Message) {
        let guard = self.rooms.read().await;
        let Some(members) = guard.get(room) else {
            return;
        };
        for tx in members.values() {
            if tx.try_send(message.clone()).is_err() {
                debug!(room, "dropped realtime message, connection queue full or closed");
            }
        }
    }

    #[cfg(test)]
    async fn room_size(&self, room: &str) -> usize {
        self.rooms.read().await.get(room).map(|m| m.len()).unwrap_or(0)
    }
}

/// Background task: bridges worker progress events into the hub's rooms.
/// Spawned once at startup and runs for the life of the process.
pub async fn bridge_progress(
    progress: Arc<ProgressChannel>,
    firestore: Arc<vms_firestore::FirestoreClient>,
    hub: Arc<RealtimeHub>,
) {
    let videos = VideoRepository::new((*firestore).clone());
    let mut stream = match progress.subscribe_all().await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "realtime hub could not subscribe to progress events, bridge not running");
            return;
        }
    };

    while let Some(event) = stream.next().await {
        let video_id = match &event {
            RealtimeEvent::VideoProgress { video_id, .. } => video_id.clone(),
            RealtimeEvent::VideoProcessComplete { video_id, .. } => video_id.clone(),
            RealtimeEvent::VideoProcessFailed { video_id, .. } => video_id.clone(),
            RealtimeEvent::Connected => continue,
        };

        let video = match videos.get(&video_id).await {
            Ok(Some(v)) => v,
            Ok(None) => continue,
            Err(e) => {
                warn!(%video_id, error = %e, "failed to resolve video for realtime event");
                continue;
            }
        };

        let payload = match serde_json::to_string(&event) {
            Ok(p) => p,
            Err(_) => continue,
        };
        let message = Message::Text(payload);

        hub.broadcast(&Room::organization(video.organization_id.as_str().to_string()).name(), message.clone())
            .await;
        hub.broadcast(&Room::user(video.uploaded_by.as_str().to_string()).name(), message.clone())
            .await;
        hub.broadcast(&Room::video(video_id.as_str().to_string()).name(), message)
            .await;
    }

    warn!("realtime progress bridge stream ended");
}

/// `GET /api/realtime` upgrade handler. Authentication happens before the
/// upgrade via the ordinary [`AuthContext`] extractor so a bad or missing
/// token is rejected with a normal 401 instead of an upgraded-then-closed
/// socket.
pub async fn ws_connect(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ctx: AuthContext,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, ctx))
}

async fn handle_socket(socket: WebSocket, state: AppState, ctx: AuthContext) {
    let count = ACTIVE_CONNECTIONS.fetch_add(1, Ordering::SeqCst) + 1;
    metrics::set_ws_active_connections(count);
    metrics::record_ws_connection("realtime");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(ROOM_QUEUE_SIZE);

    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let initial_rooms = vec![
        Room::organization(ctx.tenant_id.as_str().to_string()).name(),
        Room::user(ctx.subject_id.as_str().to_string()).name(),
    ];
    let conn_id = state.realtime.join(&initial_rooms, tx.clone()).await;

    if let Ok(connected) = serde_json::to_string(&RealtimeEvent::Connected) {
        let _ = tx.send(Message::Text(connected)).await;
        metrics::record_ws_message_sent("realtime", "connected");
    }

    let mut heartbeat = interval(HEARTBEAT_INTERVAL);
    let mut subscribed_videos: Vec<String> = Vec::new();

    loop {
        if ctx.is_expired() {
            info!(subject_id = %ctx.subject_id, "closing realtime connection, token expired");
            break;
        }

        tokio::select! {
            client_msg = ws_receiver.next() => {
                match client_msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics::record_ws_message_received("realtime");
                        handle_client_text(
                            &text,
                            &state,
                            conn_id,
                            &tx,
                            &mut subscribed_videos,
                        )
                        .await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(subject_id = %ctx.subject_id, "realtime connection closed by client");
                        break;
                    }
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Ping(_))) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "realtime connection read error");
                        break;
                    }
                    _ => {}
                }
            }
            _ = heartbeat.tick() => {
                if tx.send(Message::Ping(vec![])).await.is_err() {
                    break;
                }
            }
        }
    }

    for room in &subscribed_videos {
        state.realtime.unsubscribe(room, conn_id).await;
    }
    state.realtime.leave_all(conn_id).await;
    drop(tx);
    let _ = send_task.await;

    let count = ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
    metrics::set_ws_active_connections(count);
}

/// Handles the small client->server text protocol: `subscribe:video <id>`
/// and `unsubscribe:video <id>`, the only messages a client ever sends on
/// this socket.
async fn handle_client_text(
    text: &str,
    state: &AppState,
    conn_id: ConnId,
    tx: &mpsc::Sender<Message>,
    subscribed_videos: &mut Vec<String>,
) {
    let mut parts = text.splitn(2, ' ');
    let command = parts.next().unwrap_or_default();
    let arg = parts.next().unwrap_or_default().trim();

    match command {
        "subscribe:video" if !arg.is_empty() => {
            let video_id = VideoId::from(arg.to_string());
            let room = Room::video(video_id.as_str().to_string()).name();
            state.realtime.subscribe(&room, conn_id, tx.clone()).await;
            if !subscribed_videos.contains(&room) {
                subscribed_videos.push(room);
            }
        }
        "unsubscribe:video" if !arg.is_empty() => {
            let video_id = VideoId::from(arg.to_string());
            let room = Room::video(video_id.as_str().to_string()).name();
            state.realtime.unsubscribe(&room, conn_id).await;
            subscribed_videos.retain(|r| r != &room);
        }
        _ => {
            debug!(command, "ignoring unrecognized realtime client message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn join_and_broadcast_reaches_room_members() {
        let hub = RealtimeHub::new();
        let (tx, mut rx) = mpsc::channel(4);
        let id = hub.join(&["org:acme".to_string()], tx).await;
        assert_eq!(hub.room_size("org:acme").await, 1);

        hub.broadcast("org:acme", Message::Text("hi".to_string())).await;
        let received = rx.recv().await.unwrap();
        assert_eq!(received, Message::Text("hi".to_string()));

        hub.leave_all(id).await;
        assert_eq!(hub.room_size("org:acme").await, 0);
    }

    #[tokio::test]
    async fn full_queue_drops_message_instead_of_blocking() {
        let hub = RealtimeHub::new();
        let (tx, _rx) = mpsc::channel(1);
        hub.join(&["video:v1".to_string()], tx).await;

        hub.broadcast("video:v1", Message::Text("a".to_string())).await;
        hub.broadcast("video:v1", Message::Text("b".to_string())).await;
    }

    #[tokio::test]
    async fn subscribe_and_unsubscribe_video_room() {
        let hub = RealtimeHub::new();
        let (tx, _rx) = mpsc::channel(4);
        let id = hub.join(&[], tx.clone()).await;

        hub.subscribe("video:v1", id, tx).await;
        assert_eq!(hub.room_size("video:v1").await, 1);

        hub.unsubscribe("video:v1", id).await;
        assert_eq!(hub.room_size("video:v1").await, 0);
    }
}
