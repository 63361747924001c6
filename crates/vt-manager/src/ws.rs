//! Status sync endpoint workers connect to.

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use tracing::{debug, info, warn};

use vt_models::{SyncMessage, WorkerState};

use crate::metrics;
use crate::state::AppState;
use crate::store::StateStore;

/// Upgrade a worker connection to the sync protocol.
pub async fn ws_sync(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    metrics::record_ws_connection();

    ws.on_upgrade(|socket| async move {
        let connections = state.sync_connections;
        let count = connections.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_ws_active_connections(count);

        handle_sync_socket(socket, state.store).await;

        let count = connections.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_ws_active_connections(count);
    })
}

/// Route frames into the store until the worker hangs up.
async fn handle_sync_socket(mut socket: WebSocket, store: Arc<StateStore>) {
    // Workers announced on this connection and not yet ended
    let mut announced: HashSet<String> = HashSet::new();

    while let Some(frame) = socket.recv().await {
        let message = match frame {
            Ok(Message::Text(text)) => serde_json::from_str::<SyncMessage>(&text),
            Ok(Message::Binary(bytes)) => serde_json::from_slice::<SyncMessage>(&bytes),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("Sync connection error: {}", e);
                break;
            }
        };

        match message {
            Ok(message) => {
                track_announcement(&mut announced, &message);
                metrics::record_sync_message(header(&message));
                store.apply(message).await;
            }
            Err(e) => {
                warn!("Skipping malformed sync frame: {}", e);
                metrics::record_sync_message_rejected();
            }
        }
    }

    if !announced.is_empty() {
        store.remove_workers(&announced).await;
    }
    info!("Sync connection closed");
}

fn track_announcement(announced: &mut HashSet<String>, message: &SyncMessage) {
    if let SyncMessage::Worker(update) = message {
        match update.state {
            WorkerState::Start => {
                announced.insert(update.worker_id.clone());
            }
            WorkerState::End => {
                announced.remove(&update.worker_id);
            }
            WorkerState::AddJob | WorkerState::EndJob => {}
        }
    }
}

fn header(message: &SyncMessage) -> &'static str {
    match message {
        SyncMessage::Worker(_) => "WORKER",
        SyncMessage::Job(_) => "JOB",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_announcement() {
        let mut announced = HashSet::new();
        track_announcement(&mut announced, &SyncMessage::worker(WorkerState::Start, "w1"));
        track_announcement(&mut announced, &SyncMessage::worker(WorkerState::Start, "w2"));
        track_announcement(&mut announced, &SyncMessage::worker(WorkerState::AddJob, "w3"));
        track_announcement(&mut announced, &SyncMessage::worker(WorkerState::End, "w1"));

        assert_eq!(announced, HashSet::from(["w2".to_string()]));
    }
}
