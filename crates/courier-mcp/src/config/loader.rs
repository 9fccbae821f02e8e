//! TOML-backed server configuration.
//!
//! Transport selection is deployment-time configuration, never a runtime
//! negotiable. Missing file or missing keys fall back to defaults.

use serde::Deserialize;

use crate::types::{McpError, McpResult};

/// Which transport the binary serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Newline-delimited JSON over stdin/stdout.
    Stdio,
    /// Streamable HTTP.
    Http,
}

/// HTTP transport settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listen address.
    pub bind: String,
    /// Stateful (session-addressable) vs. stateless mode.
    pub stateful: bool,
    /// Idle-session timeout in seconds (stateful mode only).
    pub idle_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
            stateful: true,
            idle_timeout_secs: 300,
        }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Advertised server name.
    pub name: String,
    /// Advertised server version.
    pub version: String,
    /// Transport to serve.
    pub transport: TransportKind,
    /// HTTP transport settings.
    pub http: HttpConfig,
    /// Depth of each session's outbound notification queue.
    pub notification_buffer: usize,
    /// Page size for list methods; absent disables cursor paging.
    pub page_size: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "courier-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            transport: TransportKind::Stdio,
            http: HttpConfig::default(),
            notification_buffer: 64,
            page_size: None,
        }
    }
}

/// Load configuration from a TOML file, or defaults when no path is given.
pub fn load_config(path: Option<&str>) -> McpResult<ServerConfig> {
    let Some(path) = path else {
        return Ok(ServerConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| McpError::Config(format!("failed to read {path}: {e}")))?;
    toml::from_str(&text).map_err(|e| McpError::Config(format!("failed to parse {path}: {e}")))
}
