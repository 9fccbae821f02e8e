//! stdio transport — newline-delimited JSON over stdin/stdout.
//!
//! One implicit session for the lifetime of the process pair; no session id
//! is ever exchanged. A single writer task owns stdout so responses and
//! notifications never interleave partial lines.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::protocol::ProtocolHandler;
use crate::types::{
    parse_message, EnvelopeFault, JsonRpcMessage, JsonRpcNotification, McpError, McpResult,
};

/// Default depth of the outbound line queue.
const DEFAULT_BUFFER: usize = 64;

/// stdio transport for a single local client.
pub struct StdioTransport {
    handler: Arc<ProtocolHandler>,
    buffer: usize,
}

impl StdioTransport {
    /// Create a new stdio transport over the given dispatcher.
    pub fn new(handler: Arc<ProtocolHandler>) -> Self {
        Self {
            handler,
            buffer: DEFAULT_BUFFER,
        }
    }

    /// Override the outbound queue depth.
    pub fn buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    /// Serve until stdin reaches end-of-file.
    pub async fn run(&self) -> McpResult<()> {
        let session_id = self.handler.sessions().create_implicit();
        tracing::info!("stdio transport ready");

        let (out_tx, mut out_rx) = mpsc::channel::<String>(self.buffer);

        // Sole owner of stdout.
        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(line) = out_rx.recv().await {
                if stdout.write_all(line.as_bytes()).await.is_err()
                    || stdout.write_all(b"\n").await.is_err()
                    || stdout.flush().await.is_err()
                {
                    break;
                }
            }
        });

        let (notify_tx, mut notify_rx) = mpsc::channel::<JsonRpcNotification>(self.buffer);
        self.handler
            .sessions()
            .attach_outbound(&session_id, notify_tx)?;
        let pump_out = out_tx.clone();
        tokio::spawn(async move {
            while let Some(notification) = notify_rx.recv().await {
                let Ok(line) = serde_json::to_string(&JsonRpcMessage::Notification(notification))
                else {
                    continue;
                };
                if pump_out.send(line).await.is_err() {
                    break;
                }
            }
        });

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match parse_message(&line) {
                // Notifications flip state (readiness, cancellation) and are
                // applied in arrival order, inline.
                Ok(message @ JsonRpcMessage::Notification(_)) => {
                    self.handler.handle_message(&session_id, message).await;
                }
                Ok(message) => {
                    let handler = Arc::clone(&self.handler);
                    let out = out_tx.clone();
                    let sid = session_id.clone();
                    // Per-request task: a slow invocation must not stall the
                    // read loop or unrelated requests.
                    tokio::spawn(async move {
                        if let Some(response) = handler.handle_message(&sid, message).await {
                            if let Ok(line) = serde_json::to_string(&response) {
                                let _ = out.send(line).await;
                            }
                        }
                    });
                }
                Err(EnvelopeFault::Recoverable { id, detail }) => {
                    let error = McpError::ParseError(detail).to_json_rpc_error(id);
                    if let Ok(line) = serde_json::to_string(&JsonRpcMessage::Error(error)) {
                        let _ = out_tx.send(line).await;
                    }
                }
                Err(EnvelopeFault::Unrecoverable(detail)) => {
                    tracing::error!("dropping unparseable input line: {detail}");
                }
            }
        }

        // EOF: the connection is the session, so the session dies with it.
        self.handler.sessions().close(&session_id);
        drop(out_tx);
        let _ = writer.await;
        Ok(())
    }
}
