//! Shared fixtures for protocol integration tests.

use std::sync::Arc;

use serde_json::{json, Value};

use courier_mcp::builtin::register_builtins;
use courier_mcp::protocol::ServerBuilder;
use courier_mcp::types::{
    JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, RequestId, PROTOCOL_VERSION,
};
use courier_mcp::ProtocolHandler;

/// Build a handler with the built-in demo primitives registered.
pub fn test_handler() -> Arc<ProtocolHandler> {
    let handler = ServerBuilder::new("courier-test", "0.0.0").build();
    register_builtins(&handler).expect("builtin registration failed");
    Arc::new(handler)
}

/// Default initialize params: a client that accepts every server capability.
pub fn init_params() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {
            "logging": {},
            "tools": { "listChanged": true },
            "prompts": { "listChanged": true },
            "resources": { "listChanged": true }
        },
        "clientInfo": { "name": "test-client", "version": "0.0.0" }
    })
}

/// Create an implicit session and drive it through the full handshake.
pub async fn ready_session(handler: &ProtocolHandler) -> String {
    let session = handler.sessions().create_implicit();
    let response = request(handler, &session, 0, "initialize", Some(init_params())).await;
    assert!(
        matches!(response, JsonRpcMessage::Response(_)),
        "handshake initialize failed: {response:?}"
    );
    notify(handler, &session, "notifications/initialized", None).await;
    session
}

/// Issue one request and return its terminal response.
pub async fn request(
    handler: &ProtocolHandler,
    session: &str,
    id: i64,
    method: &str,
    params: Option<Value>,
) -> JsonRpcMessage {
    let message = JsonRpcMessage::Request(JsonRpcRequest::new(RequestId::Number(id), method, params));
    handler
        .handle_message(session, message)
        .await
        .expect("request must produce a terminal response")
}

/// Deliver one notification (no response expected).
pub async fn notify(handler: &ProtocolHandler, session: &str, method: &str, params: Option<Value>) {
    let message = JsonRpcMessage::Notification(JsonRpcNotification::new(method, params));
    let out = handler.handle_message(session, message).await;
    assert!(out.is_none(), "notifications must not be answered");
}

/// Unwrap a success response, panicking on an error envelope.
pub fn expect_result(message: JsonRpcMessage) -> Value {
    match message {
        JsonRpcMessage::Response(r) => r.result,
        other => panic!("expected success response, got {other:?}"),
    }
}

/// Unwrap an error envelope, returning its code.
pub fn expect_error_code(message: JsonRpcMessage) -> i32 {
    match message {
        JsonRpcMessage::Error(e) => e.error.code,
        other => panic!("expected error response, got {other:?}"),
    }
}
