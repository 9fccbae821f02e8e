//! In-process channel transport: the client and server halves of one
//! connection, wired through bounded channels. This is the test transport
//! and the reference implementation of the single-session contract.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::protocol::ProtocolHandler;
use crate::types::{JsonRpcMessage, JsonRpcNotification, McpError, McpResult};

use super::Transport;

/// One endpoint of an in-process message pipe.
pub struct ChannelTransport {
    tx: mpsc::Sender<JsonRpcMessage>,
    rx: mpsc::Receiver<JsonRpcMessage>,
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, message: JsonRpcMessage) -> McpResult<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| McpError::Transport("peer closed the channel".to_string()))
    }

    async fn receive(&mut self) -> McpResult<Option<JsonRpcMessage>> {
        Ok(self.rx.recv().await)
    }
}

/// Build two connected endpoints.
pub fn channel_pair(buffer: usize) -> (ChannelTransport, ChannelTransport) {
    let (a_tx, a_rx) = mpsc::channel(buffer);
    let (b_tx, b_rx) = mpsc::channel(buffer);
    (
        ChannelTransport { tx: a_tx, rx: b_rx },
        ChannelTransport { tx: b_tx, rx: a_rx },
    )
}

/// Serve one implicit session over an in-process pipe and return the client
/// endpoint. The server side mirrors the stdio loop: one implicit session
/// for the connection's lifetime, per-message task spawning, and a single
/// funnel for responses and notifications.
pub fn spawn_loopback(handler: Arc<ProtocolHandler>, buffer: usize) -> ChannelTransport {
    let (client_side, server_side) = channel_pair(buffer);
    let ChannelTransport {
        tx: out_tx,
        rx: mut in_rx,
    } = server_side;

    let session_id = handler.sessions().create_implicit();

    let (notify_tx, mut notify_rx) = mpsc::channel::<JsonRpcNotification>(buffer);
    if let Err(e) = handler.sessions().attach_outbound(&session_id, notify_tx) {
        tracing::error!("failed to attach loopback push channel: {e}");
    }

    let pump_out = out_tx.clone();
    tokio::spawn(async move {
        while let Some(notification) = notify_rx.recv().await {
            if pump_out
                .send(JsonRpcMessage::Notification(notification))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    tokio::spawn(async move {
        while let Some(message) = in_rx.recv().await {
            // Notifications flip state (readiness, cancellation) and must be
            // applied in arrival order; requests run on their own tasks so a
            // slow handler never blocks the loop.
            if let JsonRpcMessage::Notification(_) = &message {
                handler.handle_message(&session_id, message).await;
                continue;
            }
            let handler = Arc::clone(&handler);
            let out = out_tx.clone();
            let sid = session_id.clone();
            tokio::spawn(async move {
                if let Some(response) = handler.handle_message(&sid, message).await {
                    let _ = out.send(response).await;
                }
            });
        }
        handler.sessions().close(&session_id);
    });

    client_side
}
