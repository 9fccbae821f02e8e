//! Notification fan-out: list-changed events and leveled log messages.
//!
//! Emission goes through each session's bounded outbound queue, which feeds
//! the single writer of that session's transport. Sessions that are not yet
//! ready, have no push channel attached, or whose queue is full simply drop
//! the message; nothing is buffered indefinitely.

use std::sync::Arc;

use serde_json::Value;

use crate::session::manager::SessionEntry;
use crate::session::SessionManager;
use crate::types::{
    JsonRpcNotification, LogLevel, LogMessageParams, PrimitiveKind,
};

/// Fan-out point for server-initiated notifications.
pub struct NotificationHub {
    sessions: Arc<SessionManager>,
}

impl NotificationHub {
    /// Create a hub over the given session table.
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    /// Emit a list-changed notification for the given primitive kind to every
    /// ready session that negotiated the corresponding capability.
    pub fn list_changed(&self, kind: PrimitiveKind) {
        self.sessions.with_ready_entries(|id, entry| {
            let negotiated = match kind {
                PrimitiveKind::Tool => entry.negotiated.tools_list_changed(),
                PrimitiveKind::Prompt => entry.negotiated.prompts_list_changed(),
                PrimitiveKind::Resource => entry.negotiated.resources_list_changed(),
            };
            if !negotiated {
                return;
            }
            push(
                id,
                entry,
                JsonRpcNotification::new(kind.list_changed_method(), None),
            );
        });
    }

    /// Emit a leveled log message to every ready session that negotiated
    /// logging and whose floor admits the level. Filtering happens here,
    /// before serialization reaches any transport.
    pub fn log(&self, level: LogLevel, logger: Option<&str>, data: Value) {
        self.sessions.with_ready_entries(|id, entry| {
            if !entry.negotiated.supports_logging() || level < entry.log_floor {
                return;
            }
            let params = LogMessageParams {
                level,
                logger: logger.map(str::to_string),
                data: data.clone(),
            };
            let Ok(params) = serde_json::to_value(&params) else {
                return;
            };
            push(
                id,
                entry,
                JsonRpcNotification::new(crate::types::methods::LOG_MESSAGE, Some(params)),
            );
        });
    }
}

fn push(id: &str, entry: &SessionEntry, notification: JsonRpcNotification) {
    let Some(tx) = &entry.outbound else {
        tracing::debug!(session = %id, method = %notification.method, "no push channel, dropping notification");
        return;
    };
    if let Err(e) = tx.try_send(notification) {
        tracing::warn!(session = %id, "outbound queue unavailable, dropping notification: {e}");
    }
}
