//! All wire and error types used by the protocol core.

pub mod capabilities;
pub mod error;
pub mod message;
pub mod methods;
pub mod notification;
pub mod request;
pub mod response;

// Re-export commonly used types for convenience.
pub use capabilities::*;
pub use error::*;
pub use message::*;
pub use notification::*;
pub use request::*;
pub use response::*;
