//! Streamable HTTP transport, stateful and stateless.
//!
//! Stateful mode: `initialize` mints a session id returned in the
//! `Mcp-Session-Id` header; every later request must present it. A GET on
//! the same endpoint opens an SSE stream for server-initiated notifications,
//! and DELETE closes the session. Idle sessions are swept to closed.
//!
//! Stateless mode: no session header and no push path; every request runs
//! against a request-scoped session, which trades notifications for
//! load-balancer-friendly horizontal scaling.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::Stream;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::protocol::ProtocolHandler;
use crate::types::{
    methods, parse_message, EnvelopeFault, JsonRpcMessage, JsonRpcNotification, McpError,
    RequestId,
};

/// HTTP header carrying the session identifier in stateful mode.
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Default depth of the per-session notification queue.
const DEFAULT_BUFFER: usize = 64;

#[derive(Clone)]
struct AppState {
    handler: Arc<ProtocolHandler>,
    stateful: bool,
    buffer: usize,
}

/// Streamable HTTP transport.
pub struct HttpTransport {
    handler: Arc<ProtocolHandler>,
    stateful: bool,
    idle_timeout: Duration,
    buffer: usize,
}

impl HttpTransport {
    /// Session-addressable mode with server-initiated push and idle sweep.
    pub fn stateful(handler: Arc<ProtocolHandler>, idle_timeout: Duration) -> Self {
        Self {
            handler,
            stateful: true,
            idle_timeout,
            buffer: DEFAULT_BUFFER,
        }
    }

    /// Request-scoped mode: no session identity, no push path.
    pub fn stateless(handler: Arc<ProtocolHandler>) -> Self {
        Self {
            handler,
            stateful: false,
            idle_timeout: Duration::ZERO,
            buffer: DEFAULT_BUFFER,
        }
    }

    /// Override the notification queue depth.
    pub fn buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    /// The axum router serving this transport, for embedding or testing
    /// behind a caller-owned listener. `run` adds the idle sweeper on top.
    pub fn router(&self) -> Router {
        let state = AppState {
            handler: Arc::clone(&self.handler),
            stateful: self.stateful,
            buffer: self.buffer,
        };

        Router::new()
            .route(
                "/mcp",
                axum::routing::post(post_mcp)
                    .get(open_stream)
                    .delete(close_session),
            )
            .route("/health", get(|| async { "ok" }))
            .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
            .with_state(state)
    }

    /// Serve on the given address until ctrl-c.
    pub async fn run(&self, addr: &str) -> crate::types::McpResult<()> {
        let app = self.router();

        if self.stateful {
            let sessions = Arc::clone(self.handler.sessions());
            let timeout = self.idle_timeout;
            let interval = std::cmp::max(timeout / 4, Duration::from_secs(1));
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;
                    sessions.sweep_idle(timeout);
                }
            });
        }

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(McpError::Io)?;
        tracing::info!(
            addr = %addr,
            mode = if self.stateful { "stateful" } else { "stateless" },
            "http transport listening"
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutdown signal received");
            })
            .await
            .map_err(|e| McpError::Transport(e.to_string()))
    }
}

async fn post_mcp(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    let message = match parse_message(&body) {
        Ok(message) => message,
        Err(EnvelopeFault::Recoverable { id, detail }) => {
            let error = McpError::ParseError(detail).to_json_rpc_error(id);
            return Json(JsonRpcMessage::Error(error)).into_response();
        }
        Err(EnvelopeFault::Unrecoverable(detail)) => {
            return (StatusCode::BAD_REQUEST, detail).into_response();
        }
    };

    if state.stateful {
        stateful_exchange(state, headers, message).await
    } else {
        stateless_exchange(state, message).await
    }
}

async fn stateful_exchange(state: AppState, headers: HeaderMap, message: JsonRpcMessage) -> Response {
    let presented = presented_session(&headers);
    let session_id = match presented {
        Some(id) => {
            if !state.handler.sessions().exists(&id) {
                // An unknown id is a protocol error, never an implicit new
                // session.
                return error_response(&message, McpError::SessionNotFound(id));
            }
            id
        }
        None if is_initialize(&message) => state.handler.sessions().create_addressable(),
        None => {
            return error_response(
                &message,
                McpError::SessionNotFound("missing session header".to_string()),
            )
        }
    };

    let response = state.handler.handle_message(&session_id, message).await;
    let mut http = match response {
        Some(message) => Json(message).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    };
    if let Ok(value) = HeaderValue::from_str(&session_id) {
        http.headers_mut().insert(SESSION_HEADER, value);
    }
    http
}

async fn stateless_exchange(state: AppState, message: JsonRpcMessage) -> Response {
    let sessions = state.handler.sessions();
    // Negotiation, if the client performs it, is request-scoped; every other
    // request runs against a session born ready.
    let session_id = if is_initialize(&message) {
        sessions.create_implicit()
    } else {
        sessions.create_ephemeral()
    };

    let response = state.handler.handle_message(&session_id, message).await;
    sessions.remove(&session_id);

    match response {
        Some(message) => Json(message).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

async fn open_stream(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !state.stateful {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            "no push path in stateless mode",
        )
            .into_response();
    }
    let Some(session_id) = presented_session(&headers) else {
        return (StatusCode::BAD_REQUEST, "missing session header").into_response();
    };

    let (tx, rx) = mpsc::channel::<JsonRpcNotification>(state.buffer);
    if let Err(e) = state.handler.sessions().attach_outbound(&session_id, tx) {
        return (StatusCode::NOT_FOUND, e.to_string()).into_response();
    }

    Sse::new(notification_stream(rx))
        .keep_alive(KeepAlive::default())
        .into_response()
}

async fn close_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !state.stateful {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            "no sessions in stateless mode",
        )
            .into_response();
    }
    let Some(session_id) = presented_session(&headers) else {
        return (StatusCode::BAD_REQUEST, "missing session header").into_response();
    };
    if !state.handler.sessions().exists(&session_id) {
        return (StatusCode::NOT_FOUND, "unknown session").into_response();
    }
    state.handler.sessions().close(&session_id);
    StatusCode::NO_CONTENT.into_response()
}

fn presented_session(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn is_initialize(message: &JsonRpcMessage) -> bool {
    matches!(message, JsonRpcMessage::Request(r) if r.method == methods::INITIALIZE)
}

fn error_response(message: &JsonRpcMessage, error: McpError) -> Response {
    let id = match message {
        JsonRpcMessage::Request(r) => r.id.clone(),
        _ => RequestId::Null,
    };
    Json(JsonRpcMessage::Error(error.to_json_rpc_error(id))).into_response()
}

fn notification_stream(
    rx: mpsc::Receiver<JsonRpcNotification>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures_util::stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Some(notification) => {
                let data = serde_json::to_string(&notification).unwrap_or_default();
                Some((Ok(Event::default().event("message").data(data)), rx))
            }
            None => None,
        }
    })
}
