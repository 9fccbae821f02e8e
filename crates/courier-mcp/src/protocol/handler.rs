//! The dispatcher: routes typed messages to lifecycle handling, the
//! primitive registries, or custom extension methods.
//!
//! Lifecycle methods are always routable; everything else is rejected until
//! the session reaches `Ready`. Every non-notification request receives
//! exactly one terminal response, including cancelled ones.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::task::AbortHandle;

use crate::notify::NotificationHub;
use crate::registry::{self, PromptRegistry, ResourceRegistry, ToolRegistry};
use crate::session::SessionManager;
use crate::types::{
    methods, CancelParams, Capabilities, Implementation, InitializeParams, JsonRpcMessage,
    JsonRpcNotification, JsonRpcRequest, ListParams, McpError, McpResult, PromptGetParams,
    PromptListResult, RequestId, ResourceListResult, ResourceReadParams, SetLevelParams,
    ToolCallParams, ToolListResult,
};

/// A custom extension method registered by the embedding application.
#[async_trait]
pub trait CustomMethod: Send + Sync {
    /// Handle a call. Runs only on `Ready` sessions.
    async fn handle(&self, params: Option<Value>) -> McpResult<Value>;
}

/// Builds a [`ProtocolHandler`], validating custom-method names at
/// configuration time rather than call time.
pub struct ServerBuilder {
    info: Implementation,
    capabilities: Capabilities,
    custom: HashMap<String, Arc<dyn CustomMethod>>,
    page_size: Option<usize>,
}

impl ServerBuilder {
    /// Start a builder for a server with the given identity.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: Implementation {
                name: name.into(),
                version: version.into(),
            },
            capabilities: Capabilities::server_default(),
            custom: HashMap::new(),
            page_size: None,
        }
    }

    /// Override the advertised capability set.
    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Enable cursor paging on list methods with the given page size.
    pub fn page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Register a custom extension method. Reserved names and duplicates are
    /// startup configuration errors.
    pub fn custom_method(
        mut self,
        name: &str,
        handler: Arc<dyn CustomMethod>,
    ) -> McpResult<Self> {
        if methods::is_reserved(name) {
            return Err(McpError::ReservedMethod(name.to_string()));
        }
        if self.custom.contains_key(name) {
            return Err(McpError::DuplicateName {
                kind: "method",
                name: name.to_string(),
            });
        }
        self.custom.insert(name.to_string(), handler);
        Ok(self)
    }

    /// Finish the builder.
    pub fn build(self) -> ProtocolHandler {
        let sessions = Arc::new(SessionManager::new(self.info, self.capabilities));
        let hub = Arc::new(NotificationHub::new(Arc::clone(&sessions)));
        ProtocolHandler {
            tools: Arc::new(ToolRegistry::new(Arc::clone(&hub))),
            prompts: Arc::new(PromptRegistry::new(Arc::clone(&hub))),
            resources: Arc::new(ResourceRegistry::new(Arc::clone(&hub))),
            sessions,
            hub,
            custom: self.custom,
            page_size: self.page_size,
            inflight: Mutex::new(HashMap::new()),
        }
    }
}

type InflightKey = (String, RequestId);

/// Transport-agnostic message dispatcher for one server instance.
///
/// Owned state is explicit — multiple independent handlers can coexist in
/// one process.
pub struct ProtocolHandler {
    sessions: Arc<SessionManager>,
    hub: Arc<NotificationHub>,
    tools: Arc<ToolRegistry>,
    prompts: Arc<PromptRegistry>,
    resources: Arc<ResourceRegistry>,
    custom: HashMap<String, Arc<dyn CustomMethod>>,
    page_size: Option<usize>,
    inflight: Mutex<HashMap<InflightKey, AbortHandle>>,
}

impl ProtocolHandler {
    /// The session table.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// The notification fan-out point.
    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    /// The tool registry.
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// The prompt registry.
    pub fn prompts(&self) -> &Arc<PromptRegistry> {
        &self.prompts
    }

    /// The resource registry.
    pub fn resources(&self) -> &Arc<ResourceRegistry> {
        &self.resources
    }

    /// Handle one inbound message on behalf of `session_id`.
    ///
    /// Returns the terminal response for requests, `None` for notifications.
    pub async fn handle_message(
        &self,
        session_id: &str,
        message: JsonRpcMessage,
    ) -> Option<JsonRpcMessage> {
        match message {
            JsonRpcMessage::Request(request) => {
                Some(self.handle_request(session_id, request).await)
            }
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(session_id, notification).await;
                None
            }
            JsonRpcMessage::Response(_) | JsonRpcMessage::Error(_) => {
                tracing::warn!(session = %session_id, "ignoring response-shaped message from client");
                None
            }
        }
    }

    async fn handle_request(&self, session_id: &str, request: JsonRpcRequest) -> JsonRpcMessage {
        let id = request.id.clone();
        match self
            .dispatch(session_id, &request.method, &request.id, request.params)
            .await
        {
            Ok(result) => {
                JsonRpcMessage::Response(crate::types::JsonRpcResponse::new(id, result))
            }
            Err(e) => {
                tracing::debug!(session = %session_id, id = %id, "request failed: {e}");
                JsonRpcMessage::Error(e.to_json_rpc_error(id))
            }
        }
    }

    async fn dispatch(
        &self,
        session_id: &str,
        method: &str,
        id: &RequestId,
        params: Option<Value>,
    ) -> McpResult<Value> {
        self.sessions.touch(session_id);

        match method {
            methods::INITIALIZE => self.initialize(session_id, params),
            methods::PING => Ok(json!({})),
            methods::SET_LEVEL => {
                self.sessions.ensure_ready(session_id)?;
                let params: SetLevelParams = parse_params(params)?;
                self.sessions.set_log_floor(session_id, params.level)?;
                Ok(json!({}))
            }
            methods::TOOLS_LIST => {
                self.sessions.ensure_ready(session_id)?;
                let params: ListParams = parse_optional_params(params)?;
                let (tools, next_cursor) = registry::paginate(
                    self.tools.list(),
                    params.cursor.as_deref(),
                    self.page_size,
                )?;
                to_result(&ToolListResult { tools, next_cursor })
            }
            methods::TOOLS_CALL => {
                self.sessions.ensure_ready(session_id)?;
                let params: ToolCallParams = parse_params(params)?;
                let tools = Arc::clone(&self.tools);
                self.supervised(session_id, id, async move {
                    let result = tools.call(&params.name, params.arguments).await?;
                    to_result(&result)
                })
                .await
            }
            methods::PROMPTS_LIST => {
                self.sessions.ensure_ready(session_id)?;
                let params: ListParams = parse_optional_params(params)?;
                let (prompts, next_cursor) = registry::paginate(
                    self.prompts.list(),
                    params.cursor.as_deref(),
                    self.page_size,
                )?;
                to_result(&PromptListResult {
                    prompts,
                    next_cursor,
                })
            }
            methods::PROMPTS_GET => {
                self.sessions.ensure_ready(session_id)?;
                let params: PromptGetParams = parse_params(params)?;
                let prompts = Arc::clone(&self.prompts);
                self.supervised(session_id, id, async move {
                    let result = prompts.get(&params.name, params.arguments).await?;
                    to_result(&result)
                })
                .await
            }
            methods::RESOURCES_LIST => {
                self.sessions.ensure_ready(session_id)?;
                let params: ListParams = parse_optional_params(params)?;
                let (resources, next_cursor) = registry::paginate(
                    self.resources.list(),
                    params.cursor.as_deref(),
                    self.page_size,
                )?;
                to_result(&ResourceListResult {
                    resources,
                    next_cursor,
                })
            }
            methods::RESOURCES_READ => {
                self.sessions.ensure_ready(session_id)?;
                let params: ResourceReadParams = parse_params(params)?;
                let resources = Arc::clone(&self.resources);
                self.supervised(session_id, id, async move {
                    let result = resources.read(&params.uri).await?;
                    to_result(&result)
                })
                .await
            }
            custom => {
                let Some(handler) = self.custom.get(custom).cloned() else {
                    return Err(McpError::MethodNotFound(custom.to_string()));
                };
                self.sessions.ensure_ready(session_id)?;
                self.supervised(session_id, id, async move { handler.handle(params).await })
                    .await
            }
        }
    }

    fn initialize(&self, session_id: &str, params: Option<Value>) -> McpResult<Value> {
        let params: InitializeParams = match parse_params(params) {
            Ok(p) => p,
            Err(e) => {
                // A malformed initialize leaves the session closed; retry is
                // the client's decision.
                self.sessions.fail_negotiation(session_id);
                return Err(e);
            }
        };
        let result = self.sessions.initialize(session_id, params)?;
        to_result(&result)
    }

    async fn handle_notification(&self, session_id: &str, notification: JsonRpcNotification) {
        match notification.method.as_str() {
            methods::INITIALIZED => self.sessions.mark_ready(session_id),
            methods::CANCELLED => {
                let params: CancelParams = match parse_params(notification.params) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(session = %session_id, "malformed cancellation: {e}");
                        return;
                    }
                };
                self.cancel(session_id, &params.request_id, params.reason.as_deref());
            }
            other => {
                tracing::warn!(session = %session_id, method = %other, "ignoring unknown notification");
            }
        }
    }

    /// Abort the in-flight request with the given id, if any. The supervised
    /// task still produces a terminal cancelled response for it.
    pub fn cancel(&self, session_id: &str, request_id: &RequestId, reason: Option<&str>) {
        let key = (session_id.to_string(), request_id.clone());
        let handle = self
            .inflight
            .lock()
            .expect("inflight table lock poisoned")
            .remove(&key);
        match handle {
            Some(handle) => {
                tracing::info!(
                    session = %session_id,
                    id = %request_id,
                    reason = reason.unwrap_or("unspecified"),
                    "cancelling in-flight request"
                );
                handle.abort();
            }
            None => {
                tracing::debug!(session = %session_id, id = %request_id, "nothing in flight to cancel");
            }
        }
    }

    /// Run a primitive or custom invocation on its own task so a slow
    /// handler never stalls unrelated requests, and so cancellation can
    /// reach it. The awaiting side always yields a terminal result.
    async fn supervised<F>(&self, session_id: &str, id: &RequestId, fut: F) -> McpResult<Value>
    where
        F: Future<Output = McpResult<Value>> + Send + 'static,
    {
        let task = tokio::spawn(fut);
        let key: InflightKey = (session_id.to_string(), id.clone());
        self.inflight
            .lock()
            .expect("inflight table lock poisoned")
            .insert(key.clone(), task.abort_handle());

        let outcome = task.await;

        self.inflight
            .lock()
            .expect("inflight table lock poisoned")
            .remove(&key);

        match outcome {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(McpError::Cancelled(id.to_string())),
            Err(e) => Err(McpError::InternalError(format!("handler task failed: {e}"))),
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> McpResult<T> {
    let params = params.ok_or_else(|| McpError::InvalidParams("missing params".to_string()))?;
    serde_json::from_value(params).map_err(|e| McpError::InvalidParams(e.to_string()))
}

fn parse_optional_params<T: DeserializeOwned + Default>(params: Option<Value>) -> McpResult<T> {
    match params {
        Some(value) => {
            serde_json::from_value(value).map_err(|e| McpError::InvalidParams(e.to_string()))
        }
        None => Ok(T::default()),
    }
}

fn to_result<T: Serialize>(value: &T) -> McpResult<Value> {
    serde_json::to_value(value).map_err(|e| McpError::InternalError(e.to_string()))
}
