//! Session lifecycle: negotiation state machine and session tracking.

pub mod manager;

pub use manager::SessionManager;

/// Lifecycle states of a session.
///
/// `Uninitialized → Negotiating → Ready → Closed`; `Closed` is terminal and
/// reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, no initialize request seen yet.
    Uninitialized,
    /// Initialize answered, waiting for the initialized confirmation.
    Negotiating,
    /// Handshake complete; primitive calls and notifications may flow.
    Ready,
    /// Closed by the client, a disconnect, or idle timeout. Terminal.
    Closed,
}
