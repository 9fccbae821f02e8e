//! Transport adapters. Every adapter satisfies the same envelope contract;
//! the dispatcher and registries never special-case a transport.

use async_trait::async_trait;

use crate::types::{JsonRpcMessage, McpResult};

#[cfg(feature = "http")]
pub mod http;
pub mod loopback;
pub mod stdio;

#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use loopback::{channel_pair, spawn_loopback, ChannelTransport};
pub use stdio::StdioTransport;

/// A bidirectional, ordered message channel between two peers.
#[async_trait]
pub trait Transport: Send {
    /// Send one message to the peer.
    async fn send(&mut self, message: JsonRpcMessage) -> McpResult<()>;

    /// Receive the next message. `None` means the peer closed the channel.
    async fn receive(&mut self) -> McpResult<Option<JsonRpcMessage>>;
}
