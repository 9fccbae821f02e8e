//! Streamable HTTP transport tests: session-header semantics, stateless
//! mode, stale sessions over the wire, and the SSE push path.

#![cfg(feature = "http")]

mod common;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use courier_mcp::builtin::{register_builtins, EchoTool};
use courier_mcp::protocol::ServerBuilder;
use courier_mcp::transport::HttpTransport;
use courier_mcp::types::{mcp_error_codes, ToolDefinition};
use courier_mcp::ProtocolHandler;

use common::fixtures::init_params;

// ─── Helpers ───────────────────────────────────────────────────────────────

fn handler() -> Arc<ProtocolHandler> {
    let handler = ServerBuilder::new("http-test", "0.0.0").build();
    register_builtins(&handler).expect("builtin registration failed");
    Arc::new(handler)
}

/// Serve a transport's router on an ephemeral port.
async fn serve(transport: HttpTransport) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = transport.router();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

struct RawResponse {
    status: u16,
    headers: String,
    body: String,
}

impl RawResponse {
    fn header(&self, name: &str) -> Option<String> {
        self.headers.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }

    fn json(&self) -> Value {
        serde_json::from_str(&self.body)
            .unwrap_or_else(|e| panic!("non-JSON body ({e}): {:?}", self.body))
    }

    fn error_code(&self) -> i64 {
        self.json()["error"]["code"]
            .as_i64()
            .expect("expected an error envelope")
    }
}

/// One HTTP/1.1 exchange over a fresh connection.
async fn exchange(
    addr: SocketAddr,
    method: &str,
    extra_headers: &[(&str, &str)],
    body: &str,
) -> RawResponse {
    let mut request = format!(
        "{method} /mcp HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\
         Content-Type: application/json\r\nContent-Length: {}\r\n",
        body.len()
    );
    for (name, value) in extra_headers {
        request.push_str(&format!("{name}: {value}\r\n"));
    }
    request.push_str("\r\n");
    request.push_str(body);

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8_lossy(&raw).to_string();

    let (head, body) = raw.split_once("\r\n\r\n").expect("malformed response");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .expect("missing status line");
    RawResponse {
        status,
        headers: head.to_string(),
        body: body.to_string(),
    }
}

async fn post(addr: SocketAddr, session: Option<&str>, message: Value) -> RawResponse {
    let headers: Vec<(&str, &str)> = session.map(|s| ("mcp-session-id", s)).into_iter().collect();
    exchange(addr, "POST", &headers, &message.to_string()).await
}

fn request_body(id: i64, method: &str, params: Option<Value>) -> Value {
    let mut body = json!({ "jsonrpc": "2.0", "id": id, "method": method });
    if let Some(params) = params {
        body["params"] = params;
    }
    body
}

/// Drive a stateful deployment through the handshake, returning the minted id.
async fn handshake(addr: SocketAddr) -> String {
    let response = post(addr, None, request_body(0, "initialize", Some(init_params()))).await;
    assert_eq!(response.status, 200);
    let session = response
        .header("mcp-session-id")
        .expect("initialize must mint a session header");

    let response = post(
        addr,
        Some(&session),
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
    )
    .await;
    assert_eq!(response.status, 202);
    session
}

// ─── Tests ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_initialize_mints_the_session_header() {
    let handler = handler();
    let addr = serve(HttpTransport::stateful(Arc::clone(&handler), Duration::from_secs(300))).await;

    let response = post(addr, None, request_body(0, "initialize", Some(init_params()))).await;
    assert_eq!(response.status, 200);
    let session = response.header("mcp-session-id").unwrap();
    // The body advertises the same id the header carries.
    assert_eq!(response.json()["result"]["sessionId"], session.as_str());

    // The minted id addresses a live session.
    let response = post(
        addr,
        Some(&session),
        json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
    )
    .await;
    assert_eq!(response.status, 202);
    let response = post(addr, Some(&session), request_body(1, "tools/list", None)).await;
    assert_eq!(response.json()["result"]["tools"][0]["name"], "echo");
}

#[tokio::test]
async fn test_unknown_session_id_is_a_protocol_error() {
    let handler = handler();
    let addr = serve(HttpTransport::stateful(handler, Duration::from_secs(300))).await;

    let response = post(addr, Some("not-a-session"), request_body(1, "ping", None)).await;
    assert_eq!(
        response.error_code(),
        i64::from(mcp_error_codes::SESSION_NOT_FOUND)
    );
    // No implicit session was minted for the bogus id.
    assert!(response.header("mcp-session-id").is_none());
}

#[tokio::test]
async fn test_missing_session_header_is_a_protocol_error() {
    let handler = handler();
    let addr = serve(HttpTransport::stateful(handler, Duration::from_secs(300))).await;

    // Only initialize may arrive headerless.
    let response = post(addr, None, request_body(1, "tools/list", None)).await;
    assert_eq!(
        response.error_code(),
        i64::from(mcp_error_codes::SESSION_NOT_FOUND)
    );
}

#[tokio::test]
async fn test_delete_closes_the_session() {
    let handler = handler();
    let addr = serve(HttpTransport::stateful(Arc::clone(&handler), Duration::from_secs(300))).await;
    let session = handshake(addr).await;

    let response = exchange(addr, "DELETE", &[("mcp-session-id", &session)], "").await;
    assert_eq!(response.status, 204);

    let response = post(addr, Some(&session), request_body(1, "tools/list", None)).await;
    assert_eq!(
        response.error_code(),
        i64::from(mcp_error_codes::SESSION_CLOSED)
    );

    let response = exchange(addr, "DELETE", &[("mcp-session-id", "bogus")], "").await;
    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn test_swept_session_goes_stale_then_unknown() {
    let handler = handler();
    let addr = serve(HttpTransport::stateful(Arc::clone(&handler), Duration::from_secs(300))).await;
    let session = handshake(addr).await;

    // Sweep with a timeout the session has outlived: closed, record kept.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let closed = handler.sessions().sweep_idle(Duration::from_millis(100));
    assert_eq!(closed, vec![session.clone()]);

    let response = post(addr, Some(&session), request_body(1, "tools/list", None)).await;
    assert_eq!(
        response.error_code(),
        i64::from(mcp_error_codes::SESSION_CLOSED)
    );

    // Past the grace period the record is pruned and the id becomes unknown.
    tokio::time::sleep(Duration::from_millis(150)).await;
    handler.sessions().sweep_idle(Duration::from_millis(100));
    let response = post(addr, Some(&session), request_body(2, "tools/list", None)).await;
    assert_eq!(
        response.error_code(),
        i64::from(mcp_error_codes::SESSION_NOT_FOUND)
    );
}

#[tokio::test]
async fn test_stateless_post_is_self_contained() {
    let handler = handler();
    let addr = serve(HttpTransport::stateless(Arc::clone(&handler))).await;

    // No handshake, no header: primitives answer directly.
    let response = post(
        addr,
        None,
        request_body(
            1,
            "tools/call",
            Some(json!({ "name": "echo", "arguments": { "text": "standalone" } })),
        ),
    )
    .await;
    assert_eq!(response.status, 200);
    assert_eq!(
        response.json()["result"]["content"][0]["text"],
        "standalone"
    );

    // Initialize is answered but mints nothing.
    let response = post(addr, None, request_body(2, "initialize", Some(init_params()))).await;
    assert_eq!(response.status, 200);
    assert!(response.header("mcp-session-id").is_none());
    assert!(response.json()["result"].get("sessionId").is_none());

    // No push path and no sessions to close.
    let response = exchange(addr, "GET", &[], "").await;
    assert_eq!(response.status, 405);
    let response = exchange(addr, "DELETE", &[], "").await;
    assert_eq!(response.status, 405);
}

#[tokio::test]
async fn test_malformed_body_answers_parse_error() {
    let handler = handler();
    let addr = serve(HttpTransport::stateful(handler, Duration::from_secs(300))).await;

    // Unsalvageable garbage is a plain bad request.
    let response = exchange(addr, "POST", &[], "not json").await;
    assert_eq!(response.status, 400);

    // A salvageable id comes back in a parse-error envelope.
    let response = exchange(addr, "POST", &[], r#"{"jsonrpc":"2.0","id":9,"method":7}"#).await;
    assert_eq!(response.json()["error"]["code"], -32700);
    assert_eq!(response.json()["id"], 9);
}

/// Open the notification stream and wait for `marker` to appear on it.
async fn read_stream_until(addr: SocketAddr, session: &str, marker: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET /mcp HTTP/1.1\r\nHost: {addr}\r\nAccept: text/event-stream\r\n\
         mcp-session-id: {session}\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut seen = String::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let mut buf = [0u8; 4096];
    while !seen.contains(marker) {
        let n = tokio::time::timeout_at(deadline, stream.read(&mut buf))
            .await
            .expect("timed out waiting for the stream")
            .unwrap();
        assert!(n > 0, "stream closed before {marker:?} arrived");
        seen.push_str(&String::from_utf8_lossy(&buf[..n]));
    }
    seen
}

#[tokio::test]
async fn test_notification_stream_delivers_and_reopens() {
    let handler = handler();
    let addr = serve(HttpTransport::stateful(Arc::clone(&handler), Duration::from_secs(300))).await;
    let session = handshake(addr).await;

    let register_handler = Arc::clone(&handler);
    tokio::spawn(async move {
        // Give the GET time to attach before mutating the registry.
        tokio::time::sleep(Duration::from_millis(200)).await;
        register_handler
            .tools()
            .register(
                ToolDefinition::new("streamed", json!({ "type": "object" })),
                EchoTool::new(),
            )
            .unwrap();
    });
    let seen = read_stream_until(addr, &session, "notifications/tools/list_changed").await;
    assert!(seen.contains("text/event-stream"));

    // Dropping the stream does not kill the session; a reopened stream
    // receives fresh notifications.
    let register_handler = Arc::clone(&handler);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        register_handler.tools().unregister("streamed").unwrap();
    });
    read_stream_until(addr, &session, "notifications/tools/list_changed").await;

    let response = post(addr, Some(&session), request_body(3, "ping", None)).await;
    assert_eq!(response.status, 200);
}
