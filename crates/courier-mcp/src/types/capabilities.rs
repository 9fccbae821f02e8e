//! Capability flags and initialization types.
//!
//! Both peers declare the same flag structure; the negotiator stores the
//! intersection as the session's negotiated set.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Protocol revision this implementation speaks.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// Implementation info for server or client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    /// Name of the implementation.
    pub name: String,
    /// Version string.
    pub version: String,
}

/// Logging capability marker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingCapability {}

/// Tools capability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    /// Whether tools/list_changed notifications are supported.
    #[serde(default)]
    pub list_changed: bool,
}

/// Prompts capability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptsCapability {
    /// Whether prompts/list_changed notifications are supported.
    #[serde(default)]
    pub list_changed: bool,
}

/// Resources capability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapability {
    /// Whether resources/list_changed notifications are supported.
    #[serde(default)]
    pub list_changed: bool,
}

/// Capability flag set declared by either peer.
///
/// A section that is absent means the feature is unsupported; the negotiated
/// set keeps a section only when both peers declare it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Experimental, free-form capabilities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experimental: Option<HashMap<String, serde_json::Value>>,
    /// Leveled log-message notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapability>,
    /// Tool listing/invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
    /// Prompt listing/expansion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,
    /// Resource listing/reading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
}

impl Capabilities {
    /// Everything this server can offer.
    pub fn server_default() -> Self {
        Self {
            experimental: None,
            logging: Some(LoggingCapability {}),
            tools: Some(ToolsCapability { list_changed: true }),
            prompts: Some(PromptsCapability { list_changed: true }),
            resources: Some(ResourcesCapability { list_changed: true }),
        }
    }

    /// A client that accepts everything the server offers.
    pub fn client_default() -> Self {
        Self::server_default()
    }

    /// Intersection of two declared capability sets.
    pub fn intersect(&self, other: &Capabilities) -> Capabilities {
        Capabilities {
            experimental: None,
            logging: match (&self.logging, &other.logging) {
                (Some(_), Some(_)) => Some(LoggingCapability {}),
                _ => None,
            },
            tools: match (&self.tools, &other.tools) {
                (Some(a), Some(b)) => Some(ToolsCapability {
                    list_changed: a.list_changed && b.list_changed,
                }),
                _ => None,
            },
            prompts: match (&self.prompts, &other.prompts) {
                (Some(a), Some(b)) => Some(PromptsCapability {
                    list_changed: a.list_changed && b.list_changed,
                }),
                _ => None,
            },
            resources: match (&self.resources, &other.resources) {
                (Some(a), Some(b)) => Some(ResourcesCapability {
                    list_changed: a.list_changed && b.list_changed,
                }),
                _ => None,
            },
        }
    }

    /// Whether leveled log notifications were negotiated.
    pub fn supports_logging(&self) -> bool {
        self.logging.is_some()
    }

    /// Whether tools/list_changed was negotiated.
    pub fn tools_list_changed(&self) -> bool {
        self.tools.as_ref().is_some_and(|t| t.list_changed)
    }

    /// Whether prompts/list_changed was negotiated.
    pub fn prompts_list_changed(&self) -> bool {
        self.prompts.as_ref().is_some_and(|p| p.list_changed)
    }

    /// Whether resources/list_changed was negotiated.
    pub fn resources_list_changed(&self) -> bool {
        self.resources.as_ref().is_some_and(|r| r.list_changed)
    }
}

/// Initialize request parameters from the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Requested protocol version.
    pub protocol_version: String,
    /// Client capability declaration.
    pub capabilities: Capabilities,
    /// Client implementation info.
    pub client_info: Implementation,
}

/// Initialize response result from the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Negotiated protocol version.
    pub protocol_version: String,
    /// Negotiated capability set (intersection).
    pub capabilities: Capabilities,
    /// Server implementation info.
    pub server_info: Implementation,
    /// Session identifier, present only on session-addressable transports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Optional instructions for the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}
