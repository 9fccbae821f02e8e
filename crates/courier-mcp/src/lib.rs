//! Courier MCP — capability-negotiated RPC core for exposing callable,
//! discoverable primitives (tools, prompts, resources) between a server and
//! its clients, over stdio or streamable HTTP.

pub mod builtin;
pub mod client;
pub mod config;
pub mod notify;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;
pub mod types;

pub use client::Client;
pub use config::ServerConfig;
pub use notify::NotificationHub;
pub use protocol::{ProtocolHandler, ServerBuilder};
pub use session::SessionManager;
