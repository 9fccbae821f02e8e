//! Client-side mirror of the protocol: drives the handshake, issues
//! requests, and consumes server-initiated notifications.
//!
//! Responses and notifications may arrive on logically separate channels in
//! stateful HTTP deployments; the client only assumes ordering within one
//! channel. Every issued request id resolves to exactly one terminal
//! outcome, delivered through a oneshot slot keyed by id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};

use crate::transport::Transport;
use crate::types::{
    methods, Capabilities, Implementation, InitializeParams, InitializeResult, JsonRpcMessage,
    JsonRpcNotification, JsonRpcRequest, ListParams, LogLevel, McpError, McpResult,
    PromptGetResult, PromptListResult, ReadResourceResult, RequestId, ResourceListResult,
    ToolCallResult, ToolListResult, PROTOCOL_VERSION,
};

type PendingMap = Arc<Mutex<HashMap<RequestId, oneshot::Sender<JsonRpcMessage>>>>;

/// Callback invoked for every server-initiated notification.
pub type NotificationCallback = Arc<dyn Fn(JsonRpcNotification) + Send + Sync>;

/// A connected, initialized protocol client.
pub struct Client {
    outbound: mpsc::Sender<JsonRpcMessage>,
    pending: PendingMap,
    next_id: AtomicI64,
    server: InitializeResult,
}

impl Client {
    /// Connect over `transport`, perform the initialize handshake, and
    /// confirm readiness. The returned client gates capability-dependent
    /// calls against what the server actually negotiated.
    pub async fn connect<T>(
        transport: T,
        info: Implementation,
        capabilities: Capabilities,
        on_notification: impl Fn(JsonRpcNotification) + Send + Sync + 'static,
    ) -> McpResult<Self>
    where
        T: Transport + 'static,
    {
        let (out_tx, out_rx) = mpsc::channel::<JsonRpcMessage>(32);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let callback: NotificationCallback = Arc::new(on_notification);

        tokio::spawn(io_loop(transport, out_rx, Arc::clone(&pending), callback));

        let params = InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities,
            client_info: info,
        };
        let result = raw_request(
            &out_tx,
            &pending,
            RequestId::Number(0),
            methods::INITIALIZE,
            Some(serde_json::to_value(&params).map_err(|e| McpError::InternalError(e.to_string()))?),
        )
        .await?;
        let server: InitializeResult =
            serde_json::from_value(result).map_err(|e| McpError::ParseError(e.to_string()))?;

        if server.protocol_version != PROTOCOL_VERSION {
            tracing::warn!(
                server = %server.protocol_version,
                ours = PROTOCOL_VERSION,
                "server answered with a different protocol version"
            );
        }

        out_tx
            .send(JsonRpcMessage::Notification(JsonRpcNotification::new(
                methods::INITIALIZED,
                None,
            )))
            .await
            .map_err(|_| McpError::Transport("connection closed during handshake".to_string()))?;

        tracing::info!(
            server = %server.server_info.name,
            version = %server.server_info.version,
            "handshake complete"
        );

        Ok(Self {
            outbound: out_tx,
            pending,
            next_id: AtomicI64::new(1),
            server,
        })
    }

    /// Server identity from the handshake.
    pub fn server_info(&self) -> &Implementation {
        &self.server.server_info
    }

    /// Negotiated capability set.
    pub fn capabilities(&self) -> &Capabilities {
        &self.server.capabilities
    }

    /// Session identifier, when the transport is session-addressable.
    pub fn session_id(&self) -> Option<&str> {
        self.server.session_id.as_deref()
    }

    /// Health check.
    pub async fn ping(&self) -> McpResult<()> {
        self.request::<Value>(methods::PING, None).await.map(|_| ())
    }

    /// List tools, optionally resuming from a cursor.
    pub async fn list_tools(&self, cursor: Option<String>) -> McpResult<ToolListResult> {
        self.require(self.server.capabilities.tools.is_some(), "tools")?;
        self.request(methods::TOOLS_LIST, Some(list_params(cursor)))
            .await
    }

    /// Invoke a tool by name.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> McpResult<ToolCallResult> {
        self.require(self.server.capabilities.tools.is_some(), "tools")?;
        self.request(
            methods::TOOLS_CALL,
            Some(json!({ "name": name, "arguments": arguments })),
        )
        .await
    }

    /// List prompts, optionally resuming from a cursor.
    pub async fn list_prompts(&self, cursor: Option<String>) -> McpResult<PromptListResult> {
        self.require(self.server.capabilities.prompts.is_some(), "prompts")?;
        self.request(methods::PROMPTS_LIST, Some(list_params(cursor)))
            .await
    }

    /// Expand a prompt by name.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<Value>,
    ) -> McpResult<PromptGetResult> {
        self.require(self.server.capabilities.prompts.is_some(), "prompts")?;
        self.request(
            methods::PROMPTS_GET,
            Some(json!({ "name": name, "arguments": arguments })),
        )
        .await
    }

    /// List resources, optionally resuming from a cursor.
    pub async fn list_resources(&self, cursor: Option<String>) -> McpResult<ResourceListResult> {
        self.require(self.server.capabilities.resources.is_some(), "resources")?;
        self.request(methods::RESOURCES_LIST, Some(list_params(cursor)))
            .await
    }

    /// Read a resource by URI.
    pub async fn read_resource(&self, uri: &str) -> McpResult<ReadResourceResult> {
        self.require(self.server.capabilities.resources.is_some(), "resources")?;
        self.request(methods::RESOURCES_READ, Some(json!({ "uri": uri })))
            .await
    }

    /// Set the session's minimum emitted log severity.
    pub async fn set_log_level(&self, level: LogLevel) -> McpResult<()> {
        self.require(self.server.capabilities.supports_logging(), "logging")?;
        self.request::<Value>(methods::SET_LEVEL, Some(json!({ "level": level })))
            .await
            .map(|_| ())
    }

    /// Ask the server to abort an in-flight request. Best effort; the
    /// original request still resolves with a terminal outcome.
    pub async fn cancel(&self, request_id: RequestId, reason: Option<&str>) -> McpResult<()> {
        let params = json!({ "requestId": request_id, "reason": reason });
        self.outbound
            .send(JsonRpcMessage::Notification(JsonRpcNotification::new(
                methods::CANCELLED,
                Some(params),
            )))
            .await
            .map_err(|_| McpError::Transport("connection closed".to_string()))
    }

    /// Issue a raw request; public so custom extension methods can be called.
    pub async fn call_custom(&self, method: &str, params: Option<Value>) -> McpResult<Value> {
        let id = self.fresh_id();
        raw_request(&self.outbound, &self.pending, id, method, params).await
    }

    async fn request<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> McpResult<R> {
        let id = self.fresh_id();
        let result = raw_request(&self.outbound, &self.pending, id, method, params).await?;
        serde_json::from_value(result).map_err(|e| McpError::ParseError(e.to_string()))
    }

    fn fresh_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn require(&self, negotiated: bool, what: &str) -> McpResult<()> {
        if negotiated {
            Ok(())
        } else {
            Err(McpError::InvalidRequest(format!(
                "server did not negotiate the {what} capability"
            )))
        }
    }
}

fn list_params(cursor: Option<String>) -> Value {
    serde_json::to_value(ListParams { cursor }).unwrap_or_else(|_| json!({}))
}

async fn io_loop<T: Transport>(
    mut transport: T,
    mut out_rx: mpsc::Receiver<JsonRpcMessage>,
    pending: PendingMap,
    callback: NotificationCallback,
) {
    loop {
        tokio::select! {
            outgoing = out_rx.recv() => {
                let Some(message) = outgoing else { break };
                if transport.send(message).await.is_err() {
                    break;
                }
            }
            inbound = transport.receive() => {
                match inbound {
                    Ok(Some(message)) => route(&pending, &callback, message),
                    Ok(None) | Err(_) => break,
                }
            }
        }
    }
    // Dropping the pending slots resolves every outstanding request with a
    // connection-closed error on the caller side.
    pending
        .lock()
        .expect("pending table lock poisoned")
        .clear();
}

fn route(pending: &PendingMap, callback: &NotificationCallback, message: JsonRpcMessage) {
    match message {
        JsonRpcMessage::Response(r) => deliver(pending, r.id.clone(), JsonRpcMessage::Response(r)),
        JsonRpcMessage::Error(e) => deliver(pending, e.id.clone(), JsonRpcMessage::Error(e)),
        JsonRpcMessage::Notification(n) => callback(n),
        JsonRpcMessage::Request(_) => {
            tracing::warn!("server-to-client requests are not supported, dropping");
        }
    }
}

fn deliver(pending: &PendingMap, id: RequestId, message: JsonRpcMessage) {
    let slot = pending
        .lock()
        .expect("pending table lock poisoned")
        .remove(&id);
    match slot {
        Some(tx) => {
            let _ = tx.send(message);
        }
        None => {
            tracing::warn!(id = %id, "response for unknown or already-answered id");
        }
    }
}

async fn raw_request(
    outbound: &mpsc::Sender<JsonRpcMessage>,
    pending: &PendingMap,
    id: RequestId,
    method: &str,
    params: Option<Value>,
) -> McpResult<Value> {
    let (tx, rx) = oneshot::channel();
    pending
        .lock()
        .expect("pending table lock poisoned")
        .insert(id.clone(), tx);

    let request = JsonRpcRequest::new(id.clone(), method, params);
    if outbound
        .send(JsonRpcMessage::Request(request))
        .await
        .is_err()
    {
        pending
            .lock()
            .expect("pending table lock poisoned")
            .remove(&id);
        return Err(McpError::Transport("connection closed".to_string()));
    }

    match rx.await {
        Ok(JsonRpcMessage::Response(response)) => Ok(response.result),
        Ok(JsonRpcMessage::Error(error)) => Err(McpError::Rpc {
            code: error.error.code,
            message: error.error.message,
        }),
        Ok(_) => Err(McpError::Transport(
            "unexpected message delivered to request slot".to_string(),
        )),
        Err(_) => Err(McpError::Transport(
            "connection closed before response".to_string(),
        )),
    }
}
