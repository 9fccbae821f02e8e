//! End-to-end client tests over the in-process loopback transport: handshake,
//! every primitive surface, capability gating, and push notifications.

use std::sync::{Arc, Mutex};

use serde_json::json;

use courier_mcp::builtin::register_builtins;
use courier_mcp::protocol::ServerBuilder;
use courier_mcp::transport::spawn_loopback;
use courier_mcp::types::{
    Capabilities, Implementation, JsonRpcNotification, LogLevel, McpError, ToolDefinition,
};
use courier_mcp::{Client, ProtocolHandler};

// ─── Helpers ───────────────────────────────────────────────────────────────

fn server() -> Arc<ProtocolHandler> {
    let handler = ServerBuilder::new("loopback-server", "0.0.0").build();
    register_builtins(&handler).expect("builtin registration failed");
    Arc::new(handler)
}

fn client_info() -> Implementation {
    Implementation {
        name: "loopback-client".to_string(),
        version: "0.0.0".to_string(),
    }
}

async fn connect(handler: &Arc<ProtocolHandler>) -> Client {
    let transport = spawn_loopback(Arc::clone(handler), 32);
    Client::connect(transport, client_info(), Capabilities::client_default(), |_| {})
        .await
        .expect("handshake failed")
}

// ─── Tests ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_handshake_and_identity() {
    let handler = server();
    let client = connect(&handler).await;

    assert_eq!(client.server_info().name, "loopback-server");
    assert!(client.capabilities().tools.is_some());
    // Loopback sessions are implicit: no id on the wire.
    assert!(client.session_id().is_none());

    client.ping().await.unwrap();
}

#[tokio::test]
async fn test_primitive_round_trips() {
    let handler = server();
    let client = connect(&handler).await;

    let tools = client.list_tools(None).await.unwrap();
    assert_eq!(tools.tools.len(), 1);
    assert_eq!(tools.tools[0].name, "echo");

    let result = client
        .call_tool("echo", Some(json!({ "text": "round trip" })))
        .await
        .unwrap();
    assert!(!result.failed());

    let prompts = client.list_prompts(None).await.unwrap();
    assert_eq!(prompts.prompts[0].name, "greeting");
    let expansion = client
        .get_prompt("greeting", Some(json!({ "name": "Grace" })))
        .await
        .unwrap();
    assert_eq!(expansion.messages.len(), 1);

    let resources = client.list_resources(None).await.unwrap();
    let uri = resources.resources[0].uri.clone();
    let contents = client.read_resource(&uri).await.unwrap();
    assert_eq!(contents.contents[0].uri, uri);
}

#[tokio::test]
async fn test_server_errors_surface_as_rpc_errors() {
    let handler = server();
    let client = connect(&handler).await;

    let err = client.call_tool("missing", None).await.unwrap_err();
    assert!(matches!(err, McpError::Rpc { .. }));

    let err = client
        .call_tool("echo", Some(json!({ "text": 12 })))
        .await
        .unwrap_err();
    assert!(matches!(err, McpError::Rpc { code: -32015, .. }));
}

#[tokio::test]
async fn test_capability_gating_on_the_client() {
    let handler = server();
    let transport = spawn_loopback(Arc::clone(&handler), 32);

    // Declare nothing: every gated call must fail locally.
    let client = Client::connect(transport, client_info(), Capabilities::default(), |_| {})
        .await
        .unwrap();

    assert!(client.capabilities().tools.is_none());
    assert!(client.list_tools(None).await.is_err());
    assert!(client.set_log_level(LogLevel::Info).await.is_err());
    // Ping is never gated.
    client.ping().await.unwrap();
}

#[tokio::test]
async fn test_push_notifications_reach_the_callback() {
    let handler = server();
    let transport = spawn_loopback(Arc::clone(&handler), 32);

    let seen: Arc<Mutex<Vec<JsonRpcNotification>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let client = Client::connect(transport, client_info(), Capabilities::client_default(), {
        move |n| sink.lock().unwrap().push(n)
    })
    .await
    .unwrap();

    client.set_log_level(LogLevel::Info).await.unwrap();
    handler
        .tools()
        .register(
            ToolDefinition::new("pushed", json!({ "type": "object" })),
            courier_mcp::builtin::EchoTool::new(),
        )
        .unwrap();
    handler.hub().log(LogLevel::Warning, Some("test"), json!("hello"));

    // Give the pump a moment to flush.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let seen = seen.lock().unwrap();
    let methods: Vec<&str> = seen.iter().map(|n| n.method.as_str()).collect();
    assert_eq!(
        methods,
        vec!["notifications/tools/list_changed", "notifications/message"]
    );
}

#[tokio::test]
async fn test_custom_method_via_client() {
    use async_trait::async_trait;
    use courier_mcp::protocol::CustomMethod;
    use courier_mcp::types::McpResult;
    use serde_json::Value;

    struct Shout;

    #[async_trait]
    impl CustomMethod for Shout {
        async fn handle(&self, params: Option<Value>) -> McpResult<Value> {
            let text = params
                .as_ref()
                .and_then(|p| p.get("text"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(json!({ "text": text.to_uppercase() }))
        }
    }

    let handler = ServerBuilder::new("loopback-server", "0.0.0")
        .custom_method("text/shout", Arc::new(Shout))
        .unwrap()
        .build();
    register_builtins(&handler).unwrap();
    let handler = Arc::new(handler);

    let client = connect(&handler).await;
    let result = client
        .call_custom("text/shout", Some(json!({ "text": "quiet" })))
        .await
        .unwrap();
    assert_eq!(result["text"], "QUIET");
}
