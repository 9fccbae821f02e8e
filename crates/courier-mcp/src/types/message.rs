//! JSON-RPC 2.0 message envelope for the protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 protocol version.
pub const JSONRPC_VERSION: &str = "2.0";

/// Unique request identifier — can be string, number, or null.
///
/// Hashable so the dispatcher and client can key in-flight requests by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String identifier.
    String(String),
    /// Numeric identifier.
    Number(i64),
    /// Null identifier (used when answering a request whose id was null).
    Null,
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::Null => write!(f, "null"),
        }
    }
}

/// A JSON-RPC 2.0 request message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Must be "2.0".
    pub jsonrpc: String,
    /// Unique request identifier.
    pub id: RequestId,
    /// Method name to invoke.
    pub method: String,
    /// Optional parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new request.
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 success response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Must be "2.0".
    pub jsonrpc: String,
    /// Echoes the request id.
    pub id: RequestId,
    /// Result payload.
    pub result: Value,
}

/// A JSON-RPC 2.0 error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Must be "2.0".
    pub jsonrpc: String,
    /// Echoes the request id.
    pub id: RequestId,
    /// Error object.
    pub error: JsonRpcErrorObject,
}

/// Error object within a JSON-RPC error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    /// Numeric error code.
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A JSON-RPC 2.0 notification (no id, no response expected).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    /// Must be "2.0".
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Optional parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Union type for any JSON-RPC message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    /// A request (has id + method).
    Request(JsonRpcRequest),
    /// A success response (has id + result).
    Response(JsonRpcResponse),
    /// An error response (has id + error).
    Error(JsonRpcError),
    /// A notification (has method, no id).
    Notification(JsonRpcNotification),
}

impl JsonRpcResponse {
    /// Create a new success response.
    pub fn new(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result,
        }
    }
}

impl JsonRpcError {
    /// Create a new error response.
    pub fn new(id: RequestId, code: i32, message: String) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            error: JsonRpcErrorObject {
                code,
                message,
                data: None,
            },
        }
    }
}

impl JsonRpcNotification {
    /// Create a new notification.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// Failure mode when raw transport text cannot be decoded into a message.
#[derive(Debug)]
pub enum EnvelopeFault {
    /// The envelope is malformed but its id was salvageable; the transport
    /// should answer with a parse-error response carrying that id.
    Recoverable {
        /// The id recovered from the malformed envelope.
        id: RequestId,
        /// Decoder diagnostic.
        detail: String,
    },
    /// Nothing usable could be recovered; the message is dropped and the
    /// fault surfaces at the transport level.
    Unrecoverable(String),
}

/// Parse one raw JSON text into a typed message.
///
/// Distinguishes recoverable malformation (id present and well-typed) from
/// unrecoverable garbage, per the transport contract.
pub fn parse_message(raw: &str) -> Result<JsonRpcMessage, EnvelopeFault> {
    match serde_json::from_str::<JsonRpcMessage>(raw) {
        Ok(message) => {
            let version = match &message {
                JsonRpcMessage::Request(r) => &r.jsonrpc,
                JsonRpcMessage::Response(r) => &r.jsonrpc,
                JsonRpcMessage::Error(e) => &e.jsonrpc,
                JsonRpcMessage::Notification(n) => &n.jsonrpc,
            };
            if version != JSONRPC_VERSION {
                let detail = format!("unsupported jsonrpc version {version:?}");
                return match salvage_id(raw) {
                    Some(id) => Err(EnvelopeFault::Recoverable { id, detail }),
                    None => Err(EnvelopeFault::Unrecoverable(detail)),
                };
            }
            Ok(message)
        }
        Err(e) => {
            let detail = e.to_string();
            match salvage_id(raw) {
                Some(id) => Err(EnvelopeFault::Recoverable { id, detail }),
                None => Err(EnvelopeFault::Unrecoverable(detail)),
            }
        }
    }
}

/// Recover the id field of a malformed envelope, if it is itself well-formed.
fn salvage_id(raw: &str) -> Option<RequestId> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let id = value.get("id")?;
    serde_json::from_value(id.clone()).ok()
}
