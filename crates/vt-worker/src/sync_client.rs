//! WebSocket client for the manager's status sync channel.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use vt_models::{FullStatusIndicator, SyncMessage, WorkerState};

use crate::error::{WorkerError, WorkerResult};
use crate::reporter::StatusReporter;

const SEND_BUFFER_SIZE: usize = 32;

/// Connection to the manager announcing this worker and its jobs.
pub struct SyncClient {
    worker_id: String,
    tx: mpsc::Sender<Message>,
    send_task: Mutex<Option<JoinHandle<()>>>,
    recv_task: JoinHandle<()>,
}

impl SyncClient {
    /// Dial the manager, pick a fresh worker ID and announce `START`.
    pub async fn connect(url: &str) -> WorkerResult<Self> {
        let (socket, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| WorkerError::sync(format!("connect to {}: {}", url, e)))?;
        let (mut sink, mut stream) = socket.split();

        let (tx, mut rx) = mpsc::channel::<Message>(SEND_BUFFER_SIZE);

        let send_task = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    warn!("Sync channel send failed: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // The manager never sends commands, so reading only services control frames
        let recv_task = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(other) => debug!("Ignoring sync frame: {:?}", other),
                }
            }
        });

        let client = Self {
            worker_id: Uuid::new_v4().to_string(),
            tx,
            send_task: Mutex::new(Some(send_task)),
            recv_task,
        };

        client.send_worker_update(WorkerState::Start).await?;
        info!(worker_id = %client.worker_id, "Connected to manager at {}", url);
        Ok(client)
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub async fn send(&self, message: &SyncMessage) -> WorkerResult<()> {
        let json = serde_json::to_string(message)?;
        self.tx
            .send(Message::Text(json))
            .await
            .map_err(|_| WorkerError::sync("sync channel closed"))
    }

    pub async fn send_worker_update(&self, state: WorkerState) -> WorkerResult<()> {
        self.send(&SyncMessage::worker(state, &self.worker_id)).await
    }

    pub async fn send_job_update(&self, status: FullStatusIndicator) -> WorkerResult<()> {
        self.send(&SyncMessage::Job(status)).await
    }

    /// Announce `END` and close the connection.
    pub async fn disconnect(&self) -> WorkerResult<()> {
        let result = self.send_worker_update(WorkerState::End).await;
        let _ = self.tx.send(Message::Close(None)).await;

        if let Some(handle) = self.send_task.lock().await.take() {
            let _ = handle.await;
        }
        self.recv_task.abort();

        info!(worker_id = %self.worker_id, "Disconnected from manager");
        result
    }
}

#[async_trait]
impl StatusReporter for SyncClient {
    async fn report(&self, message: SyncMessage) -> WorkerResult<()> {
        self.send(&message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use vt_models::FailureMode;

    /// Accept one connection and collect its text frames until close.
    async fn collecting_server() -> (String, JoinHandle<Vec<SyncMessage>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let mut received = Vec::new();
            while let Some(Ok(frame)) = ws.next().await {
                match frame {
                    Message::Text(text) => received.push(serde_json::from_str(&text).unwrap()),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            received
        });

        (format!("ws://{}/ws", addr), handle)
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (url, server) = collecting_server().await;

        let client = SyncClient::connect(&url).await.unwrap();
        let worker_id = client.worker_id().to_string();
        assert!(!worker_id.is_empty());

        client.send_worker_update(WorkerState::AddJob).await.unwrap();
        client
            .send_job_update(FullStatusIndicator::new(
                "job-1",
                FailureMode::InProgress,
                "Encoding",
                "picked up",
            ))
            .await
            .unwrap();
        client.disconnect().await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received.len(), 4);
        assert_eq!(received[0], SyncMessage::worker(WorkerState::Start, &worker_id));
        assert_eq!(received[1], SyncMessage::worker(WorkerState::AddJob, &worker_id));
        assert!(matches!(&received[2], SyncMessage::Job(s) if s.job_id == "job-1"));
        assert_eq!(received[3], SyncMessage::worker(WorkerState::End, &worker_id));
    }

    #[tokio::test]
    async fn test_connect_failure() {
        // Bind then drop to get a port with nothing listening
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let err = SyncClient::connect(&format!("ws://{}/ws", addr))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, WorkerError::Sync(_)));
    }
}
