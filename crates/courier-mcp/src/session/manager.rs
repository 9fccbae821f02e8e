//! Session tracking: creation, negotiation, readiness gating, idle sweep.
//!
//! The manager owns every session's lifecycle state, negotiated capability
//! set, log-level floor, and outbound notification channel. The registries
//! and the notification hub reference sessions only through this manager,
//! never owning them.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::types::{
    Capabilities, Implementation, InitializeParams, InitializeResult, JsonRpcNotification,
    LogLevel, McpError, McpResult, PROTOCOL_VERSION,
};

use super::SessionState;

/// Per-session record.
pub(crate) struct SessionEntry {
    pub(crate) state: SessionState,
    pub(crate) negotiated: Capabilities,
    pub(crate) log_floor: LogLevel,
    pub(crate) outbound: Option<mpsc::Sender<JsonRpcNotification>>,
    pub(crate) last_activity: Instant,
    pub(crate) closed_at: Option<Instant>,
    /// Whether the session is addressed by an on-the-wire identifier
    /// (stateful HTTP). Implicit transport sessions are never idle-swept.
    pub(crate) addressable: bool,
}

impl SessionEntry {
    fn new(state: SessionState, addressable: bool) -> Self {
        Self {
            state,
            negotiated: Capabilities::default(),
            log_floor: LogLevel::Debug,
            outbound: None,
            last_activity: Instant::now(),
            closed_at: None,
            addressable,
        }
    }
}

/// Tracks all live sessions for one server instance.
pub struct SessionManager {
    server_info: Implementation,
    server_caps: Capabilities,
    entries: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionManager {
    /// Create a manager advertising the given server identity and capabilities.
    pub fn new(server_info: Implementation, server_caps: Capabilities) -> Self {
        Self {
            server_info,
            server_caps,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Server identity advertised at initialize time.
    pub fn server_info(&self) -> &Implementation {
        &self.server_info
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, SessionEntry>> {
        self.entries.write().expect("session table lock poisoned")
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, SessionEntry>> {
        self.entries.read().expect("session table lock poisoned")
    }

    /// Create the implicit session of a connection-scoped transport (stdio,
    /// loopback). No identifier is ever exchanged on the wire.
    pub fn create_implicit(&self) -> String {
        self.insert(SessionState::Uninitialized, false)
    }

    /// Create a wire-addressable session (stateful HTTP).
    pub fn create_addressable(&self) -> String {
        self.insert(SessionState::Uninitialized, true)
    }

    /// Create a request-scoped session that is born ready with the server's
    /// full capability set (stateless HTTP).
    pub fn create_ephemeral(&self) -> String {
        let id = self.insert(SessionState::Ready, false);
        if let Some(entry) = self.write().get_mut(&id) {
            entry.negotiated = self.server_caps.clone();
        }
        id
    }

    fn insert(&self, state: SessionState, addressable: bool) -> String {
        let id = Uuid::new_v4().to_string();
        self.write()
            .insert(id.clone(), SessionEntry::new(state, addressable));
        tracing::debug!(session = %id, "session created");
        id
    }

    /// Drop a session record entirely (request-scoped sessions only).
    pub fn remove(&self, id: &str) {
        self.write().remove(id);
    }

    /// Whether a session exists under this identifier.
    pub fn exists(&self, id: &str) -> bool {
        self.read().contains_key(id)
    }

    /// Current lifecycle state, if the session exists.
    pub fn state(&self, id: &str) -> Option<SessionState> {
        self.read().get(id).map(|e| e.state)
    }

    /// Process an initialize request for the session.
    ///
    /// Computes the capability intersection and moves the session to
    /// `Negotiating`. Re-initializing a negotiating or ready session is a
    /// protocol violation, never a silent reset.
    pub fn initialize(&self, id: &str, params: InitializeParams) -> McpResult<InitializeResult> {
        let mut entries = self.write();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| McpError::SessionNotFound(id.to_string()))?;

        match entry.state {
            SessionState::Uninitialized => {}
            SessionState::Negotiating | SessionState::Ready => {
                return Err(McpError::AlreadyInitialized)
            }
            SessionState::Closed => return Err(McpError::SessionClosed),
        }

        if params.protocol_version != PROTOCOL_VERSION {
            tracing::warn!(
                requested = %params.protocol_version,
                supported = PROTOCOL_VERSION,
                "client requested a different protocol version, answering with ours"
            );
        }

        let negotiated = self.server_caps.intersect(&params.capabilities);
        entry.negotiated = negotiated.clone();
        entry.state = SessionState::Negotiating;
        entry.last_activity = Instant::now();

        tracing::info!(
            session = %id,
            client = %params.client_info.name,
            client_version = %params.client_info.version,
            "capability negotiation started"
        );

        Ok(InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: negotiated,
            server_info: self.server_info.clone(),
            session_id: entry.addressable.then(|| id.to_string()),
            instructions: None,
        })
    }

    /// Close the session after a malformed or incompatible initialize.
    /// Retry is a client-side decision; the server never re-opens it.
    pub fn fail_negotiation(&self, id: &str) {
        if let Some(entry) = self.write().get_mut(id) {
            entry.state = SessionState::Closed;
            entry.closed_at = Some(Instant::now());
            entry.outbound = None;
            tracing::warn!(session = %id, "negotiation failed, session closed");
        }
    }

    /// Handle the initialized confirmation: `Negotiating → Ready`.
    ///
    /// Confirmations arrive as notifications, so a stray one cannot be
    /// answered with an error; it is logged and ignored.
    pub fn mark_ready(&self, id: &str) {
        let mut entries = self.write();
        let Some(entry) = entries.get_mut(id) else {
            tracing::warn!(session = %id, "initialized confirmation for unknown session");
            return;
        };
        match entry.state {
            SessionState::Negotiating => {
                entry.state = SessionState::Ready;
                entry.last_activity = Instant::now();
                tracing::info!(session = %id, "handshake complete");
            }
            other => {
                tracing::warn!(session = %id, state = ?other, "unexpected initialized confirmation");
            }
        }
    }

    /// Gate for primitive and custom methods.
    pub fn ensure_ready(&self, id: &str) -> McpResult<()> {
        match self.state(id) {
            None => Err(McpError::SessionNotFound(id.to_string())),
            Some(SessionState::Ready) => Ok(()),
            Some(SessionState::Closed) => Err(McpError::SessionClosed),
            Some(_) => Err(McpError::NotInitialized(
                "complete the initialize handshake first".to_string(),
            )),
        }
    }

    /// Mark the session as active (called on every inbound request).
    pub fn touch(&self, id: &str) {
        if let Some(entry) = self.write().get_mut(id) {
            entry.last_activity = Instant::now();
        }
    }

    /// Close a session. All pending requests fail with a session-closed
    /// error; the outbound channel drops, ending any push stream.
    pub fn close(&self, id: &str) {
        if let Some(entry) = self.write().get_mut(id) {
            if entry.state != SessionState::Closed {
                entry.state = SessionState::Closed;
                entry.closed_at = Some(Instant::now());
                entry.outbound = None;
                tracing::info!(session = %id, "session closed");
            }
        }
    }

    /// Set the minimum emitted log severity for the session.
    pub fn set_log_floor(&self, id: &str, level: LogLevel) -> McpResult<()> {
        let mut entries = self.write();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| McpError::SessionNotFound(id.to_string()))?;
        entry.log_floor = level;
        tracing::debug!(session = %id, level = ?level, "log floor updated");
        Ok(())
    }

    /// Current log floor for the session.
    pub fn log_floor(&self, id: &str) -> Option<LogLevel> {
        self.read().get(id).map(|e| e.log_floor)
    }

    /// Negotiated capability set, once negotiation has started.
    pub fn negotiated(&self, id: &str) -> Option<Capabilities> {
        self.read().get(id).map(|e| e.negotiated.clone())
    }

    /// Attach the server-to-client push channel for the session. Replaces
    /// any previous channel, so a client may close and reopen its stream
    /// without destroying the session.
    pub fn attach_outbound(
        &self,
        id: &str,
        sender: mpsc::Sender<JsonRpcNotification>,
    ) -> McpResult<()> {
        let mut entries = self.write();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| McpError::SessionNotFound(id.to_string()))?;
        if entry.state == SessionState::Closed {
            return Err(McpError::SessionClosed);
        }
        entry.outbound = Some(sender);
        Ok(())
    }

    /// Detach the push channel without closing the session.
    pub fn detach_outbound(&self, id: &str) {
        if let Some(entry) = self.write().get_mut(id) {
            entry.outbound = None;
        }
    }

    /// Close addressable sessions idle past `timeout` and prune records that
    /// have been closed for longer than the same duration. Returns the ids
    /// closed by this sweep.
    pub fn sweep_idle(&self, timeout: Duration) -> Vec<String> {
        let mut closed = Vec::new();
        let mut entries = self.write();
        for (id, entry) in entries.iter_mut() {
            if entry.addressable
                && entry.state != SessionState::Closed
                && entry.last_activity.elapsed() >= timeout
            {
                entry.state = SessionState::Closed;
                entry.closed_at = Some(Instant::now());
                entry.outbound = None;
                closed.push(id.clone());
            }
        }
        // Stale ids must answer with a session-closed error for a grace
        // period before the record itself is dropped.
        entries.retain(|_, entry| match entry.closed_at {
            Some(at) => at.elapsed() < timeout,
            None => true,
        });
        for id in &closed {
            tracing::info!(session = %id, "session closed by idle timeout");
        }
        closed
    }

    /// Visit every ready session, for notification fan-out.
    pub(crate) fn with_ready_entries(&self, mut f: impl FnMut(&str, &SessionEntry)) {
        for (id, entry) in self.read().iter() {
            if entry.state == SessionState::Ready {
                f(id, entry);
            }
        }
    }
}
