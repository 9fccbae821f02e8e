//! Protocol layer — message dispatch, session gating, and custom methods.

pub mod handler;

pub use handler::{CustomMethod, ProtocolHandler, ServerBuilder};
