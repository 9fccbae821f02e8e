//! Notification payloads: leveled log messages and list-changed events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::methods;

/// Log severities, ordered least to most severe (RFC 5424).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Detailed debugging information.
    Debug,
    /// Normal operational messages.
    Info,
    /// Normal but significant events.
    Notice,
    /// Warning conditions.
    Warning,
    /// Error conditions.
    Error,
    /// Critical conditions.
    Critical,
    /// Action must be taken immediately.
    Alert,
    /// System is unusable.
    Emergency,
}

/// Log message notification params (server → client).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMessageParams {
    /// Severity level.
    pub level: LogLevel,
    /// Optional source identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
    /// Structured payload.
    pub data: Value,
}

/// Parameters for logging/setLevel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLevelParams {
    /// New minimum emitted severity for the session.
    pub level: LogLevel,
}

/// The three primitive kinds exposed by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    /// Callable tool.
    Tool,
    /// Expandable prompt template.
    Prompt,
    /// Readable resource.
    Resource,
}

impl PrimitiveKind {
    /// Lowercase kind name, used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveKind::Tool => "tool",
            PrimitiveKind::Prompt => "prompt",
            PrimitiveKind::Resource => "resource",
        }
    }

    /// Wire method of the list-changed notification for this kind.
    pub fn list_changed_method(&self) -> &'static str {
        match self {
            PrimitiveKind::Tool => methods::TOOLS_LIST_CHANGED,
            PrimitiveKind::Prompt => methods::PROMPTS_LIST_CHANGED,
            PrimitiveKind::Resource => methods::RESOURCES_LIST_CHANGED,
        }
    }
}
