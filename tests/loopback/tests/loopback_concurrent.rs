//! Concurrent access: many in-flight requests on one session, and many
//! sessions on one handler.
//!
//! Tests verify the exactly-once response contract: every issued id resolves
//! to exactly one terminal outcome, with no cross-talk between ids or
//! sessions.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Barrier;

use courier_mcp::builtin::register_builtins;
use courier_mcp::protocol::ServerBuilder;
use courier_mcp::registry::ToolHandler;
use courier_mcp::transport::spawn_loopback;
use courier_mcp::types::{
    Capabilities, Implementation, JsonRpcMessage, JsonRpcRequest, McpResult, RequestId,
    ToolCallResult, ToolDefinition,
};
use courier_mcp::{Client, ProtocolHandler};

// ─── Helpers ───────────────────────────────────────────────────────────────

/// Sleeps briefly, then echoes its `tag` argument. The sleep forces requests
/// to overlap instead of completing in arrival order.
struct StaggerTool;

#[async_trait]
impl ToolHandler for StaggerTool {
    async fn call(&self, arguments: Value) -> McpResult<ToolCallResult> {
        let tag = arguments
            .get("tag")
            .and_then(Value::as_i64)
            .unwrap_or_default();
        // Later tags finish earlier.
        let delay = 50u64.saturating_sub((tag as u64) * 5);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        Ok(ToolCallResult::structured(json!({ "tag": tag })))
    }
}

fn server() -> Arc<ProtocolHandler> {
    let handler = ServerBuilder::new("concurrent-server", "0.0.0").build();
    register_builtins(&handler).expect("builtin registration failed");
    handler
        .tools()
        .register(
            ToolDefinition::new(
                "stagger",
                json!({
                    "type": "object",
                    "properties": { "tag": { "type": "integer" } },
                    "required": ["tag"]
                }),
            ),
            Arc::new(StaggerTool),
        )
        .unwrap();
    Arc::new(handler)
}

async fn connect(handler: &Arc<ProtocolHandler>) -> Arc<Client> {
    let transport = spawn_loopback(Arc::clone(handler), 64);
    let info = Implementation {
        name: "concurrent-client".to_string(),
        version: "0.0.0".to_string(),
    };
    Arc::new(
        Client::connect(transport, info, Capabilities::client_default(), |_| {})
            .await
            .expect("handshake failed"),
    )
}

// ─── Tests ─────────────────────────────────────────────────────────────────

/// Many overlapping requests on one session, answered out of order.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_requests_resolve_to_their_own_ids() {
    let handler = server();
    let client = connect(&handler).await;

    let barrier = Arc::new(Barrier::new(10));
    let mut tasks = Vec::new();
    for tag in 0..10i64 {
        let client = Arc::clone(&client);
        let barrier = Arc::clone(&barrier);
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            let result = client
                .call_tool("stagger", Some(json!({ "tag": tag })))
                .await
                .unwrap();
            (tag, result)
        }));
    }

    for task in tasks {
        let (tag, result) = task.await.unwrap();
        // Each caller got the answer to its own question.
        assert_eq!(result.structured_content.unwrap()["tag"], tag);
    }
}

/// Raw envelopes with distinct ids: each id is answered exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_exactly_once_per_id() {
    use courier_mcp::transport::Transport;
    use courier_mcp::types::{JsonRpcNotification, PROTOCOL_VERSION};

    let handler = server();
    let mut transport = spawn_loopback(Arc::clone(&handler), 64);

    // Handshake by hand.
    transport
        .send(JsonRpcMessage::Request(JsonRpcRequest::new(
            RequestId::Number(0),
            "initialize",
            Some(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": Capabilities::client_default(),
                "clientInfo": { "name": "raw", "version": "0" }
            })),
        )))
        .await
        .unwrap();
    assert!(matches!(
        transport.receive().await.unwrap(),
        Some(JsonRpcMessage::Response(_))
    ));
    transport
        .send(JsonRpcMessage::Notification(JsonRpcNotification::new(
            "notifications/initialized",
            None,
        )))
        .await
        .unwrap();

    for tag in 1..=20i64 {
        transport
            .send(JsonRpcMessage::Request(JsonRpcRequest::new(
                RequestId::Number(tag),
                "tools/call",
                Some(json!({ "name": "stagger", "arguments": { "tag": tag } })),
            )))
            .await
            .unwrap();
    }

    let mut answered = HashSet::new();
    for _ in 0..20 {
        let message = tokio::time::timeout(Duration::from_secs(5), transport.receive())
            .await
            .expect("responses must keep arriving")
            .unwrap()
            .expect("channel must stay open");
        let id = match message {
            JsonRpcMessage::Response(r) => r.id,
            JsonRpcMessage::Error(e) => panic!("unexpected error envelope: {:?}", e.error),
            other => panic!("unexpected message: {other:?}"),
        };
        // Exactly once: a second response for any id would trip this.
        assert!(answered.insert(id), "duplicate response id");
    }
    assert_eq!(answered.len(), 20);
}

/// Sessions are isolated: concurrent clients never see each other's state.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_independent_sessions_share_one_handler() {
    let handler = server();

    let mut tasks = Vec::new();
    for i in 0..5i64 {
        let handler = Arc::clone(&handler);
        tasks.push(tokio::spawn(async move {
            let client = connect(&handler).await;
            for j in 0..10i64 {
                let result = client
                    .call_tool("stagger", Some(json!({ "tag": i * 10 + j })))
                    .await
                    .unwrap();
                assert_eq!(result.structured_content.unwrap()["tag"], i * 10 + j);
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
}

/// Registrations racing a listing loop: a snapshot never shrinks and never
/// contains a partially-constructed definition.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_listing_races_registration() {
    let handler = server();
    let client = connect(&handler).await;

    let registrar = Arc::clone(&handler);
    let writer = tokio::spawn(async move {
        for i in 0..50 {
            let mut definition = ToolDefinition::new(
                format!("burst-{i}"),
                json!({
                    "type": "object",
                    "properties": { "tag": { "type": "integer" } },
                    "required": ["tag"]
                }),
            );
            definition.description = Some(format!("burst tool {i}"));
            registrar
                .tools()
                .register(definition, Arc::new(StaggerTool))
                .unwrap();
            tokio::task::yield_now().await;
        }
    });

    let mut last_len = 0;
    let mut complete = 0;
    for _ in 0..10_000 {
        let listed = client.list_tools(None).await.unwrap().tools;
        assert!(listed.len() >= last_len, "a snapshot went backwards");
        last_len = listed.len();

        complete = 0;
        for definition in &listed {
            assert_eq!(definition.input_schema["type"], "object");
            if definition.name.starts_with("burst-") {
                // Visible means fully formed: schema and description
                // landed together with the name.
                assert_eq!(definition.input_schema["required"][0], "tag");
                assert!(definition
                    .description
                    .as_deref()
                    .unwrap_or_default()
                    .starts_with("burst tool"));
                complete += 1;
            }
        }
        if writer.is_finished() && complete == 50 {
            break;
        }
    }
    writer.await.unwrap();
    assert_eq!(complete, 50);

    // The freshly registered entries are invocable mid-churn too.
    let result = client
        .call_tool("burst-49", Some(json!({ "tag": 49 })))
        .await
        .unwrap();
    assert_eq!(result.structured_content.unwrap()["tag"], 49);
}

/// Closing one client's channel does not disturb the others.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_disconnect_is_isolated() {
    let handler = server();

    let doomed = spawn_loopback(Arc::clone(&handler), 8);
    let survivor = connect(&handler).await;

    drop(doomed);
    tokio::time::sleep(Duration::from_millis(50)).await;

    survivor.ping().await.unwrap();
    let result = survivor
        .call_tool("echo", Some(json!({ "text": "still alive" })))
        .await
        .unwrap();
    assert!(!result.failed());
}
