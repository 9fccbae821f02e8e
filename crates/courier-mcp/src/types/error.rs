//! Error taxonomy for the protocol core.
//!
//! Five families per the error-handling design: transport faults, protocol
//! errors, validation errors, handler/business failures (which are *not*
//! modelled here — they travel as error-flagged results), and output-contract
//! violations. Every variant maps to a machine-distinguishable JSON-RPC code.

use thiserror::Error;

use super::message::{JsonRpcError, RequestId};

/// Convenience result alias used throughout the crate.
pub type McpResult<T> = Result<T, McpError>;

/// Standard JSON-RPC 2.0 error codes.
pub mod error_codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal server error.
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Protocol-specific error codes in the implementation-defined range.
pub mod mcp_error_codes {
    /// Request was cancelled before completion.
    pub const REQUEST_CANCELLED: i32 = -32800;
    /// A primitive or custom method was called before negotiation completed.
    pub const NOT_INITIALIZED: i32 = -32002;
    /// A second initialize was attempted on a live session.
    pub const ALREADY_INITIALIZED: i32 = -32003;
    /// The session has been closed (explicitly or by idle timeout).
    pub const SESSION_CLOSED: i32 = -32004;
    /// The presented session identifier is unknown.
    pub const SESSION_NOT_FOUND: i32 = -32005;
    /// No tool registered under the given name.
    pub const TOOL_NOT_FOUND: i32 = -32010;
    /// No prompt registered under the given name.
    pub const PROMPT_NOT_FOUND: i32 = -32011;
    /// No resource registered under the given URI.
    pub const RESOURCE_NOT_FOUND: i32 = -32012;
    /// Registration collided with an existing name of the same kind.
    pub const DUPLICATE_NAME: i32 = -32013;
    /// A primitive's schema document is itself invalid.
    pub const SCHEMA_ERROR: i32 = -32014;
    /// Supplied arguments failed input-schema validation.
    pub const VALIDATION_ERROR: i32 = -32015;
    /// A handler's result violated its declared output schema.
    pub const OUTPUT_CONTRACT: i32 = -32016;
    /// A custom method was registered under a reserved name.
    pub const RESERVED_METHOD: i32 = -32017;
}

/// All error conditions surfaced by the protocol core.
#[derive(Debug, Error)]
pub enum McpError {
    /// Malformed JSON on the wire.
    #[error("parse error: {0}")]
    ParseError(String),

    /// Structurally invalid request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unknown method name.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// Parameters did not deserialize or were semantically wrong.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Unexpected server-side failure.
    #[error("internal error: {0}")]
    InternalError(String),

    /// Session has not completed capability negotiation.
    #[error("session not initialized: {0}")]
    NotInitialized(String),

    /// Initialize was re-issued on a session that already negotiated.
    #[error("session already initialized")]
    AlreadyInitialized,

    /// Session is closed; the id is stale.
    #[error("session closed")]
    SessionClosed,

    /// No session exists under the presented identifier.
    #[error("unknown session: {0}")]
    SessionNotFound(String),

    /// The request was cancelled by the client.
    #[error("request cancelled: {0}")]
    Cancelled(String),

    /// Tool lookup failed.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Prompt lookup failed.
    #[error("prompt not found: {0}")]
    PromptNotFound(String),

    /// Resource lookup failed.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// A name already exists within the primitive kind.
    #[error("duplicate {kind} name: {name}")]
    DuplicateName {
        /// Primitive kind ("tool", "prompt", "resource").
        kind: &'static str,
        /// The colliding name.
        name: String,
    },

    /// The registered schema document does not compile.
    #[error("invalid schema for {name}: {detail}")]
    SchemaError {
        /// Name of the primitive whose schema failed.
        name: String,
        /// Compiler diagnostic.
        detail: String,
    },

    /// Arguments rejected before the handler ran.
    #[error("argument validation failed: {0}")]
    ValidationError(String),

    /// Handler output violated its declared output schema.
    #[error("output contract violated by {name}: {detail}")]
    OutputContract {
        /// Name of the misbehaving primitive.
        name: String,
        /// Validator diagnostic.
        detail: String,
    },

    /// Startup configuration registered a custom method under a reserved name.
    #[error("reserved method name: {0}")]
    ReservedMethod(String),

    /// The server answered with an error envelope (client side).
    #[error("server error {code}: {message}")]
    Rpc {
        /// Wire error code.
        code: i32,
        /// Wire error message.
        message: String,
    },

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Byte-transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// I/O failure from the underlying stream.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpError {
    /// The JSON-RPC error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            McpError::ParseError(_) => error_codes::PARSE_ERROR,
            McpError::InvalidRequest(_) => error_codes::INVALID_REQUEST,
            McpError::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            McpError::InvalidParams(_) => error_codes::INVALID_PARAMS,
            McpError::InternalError(_)
            | McpError::Io(_)
            | McpError::Transport(_)
            | McpError::Config(_) => error_codes::INTERNAL_ERROR,
            McpError::NotInitialized(_) => mcp_error_codes::NOT_INITIALIZED,
            McpError::AlreadyInitialized => mcp_error_codes::ALREADY_INITIALIZED,
            McpError::SessionClosed => mcp_error_codes::SESSION_CLOSED,
            McpError::SessionNotFound(_) => mcp_error_codes::SESSION_NOT_FOUND,
            McpError::Cancelled(_) => mcp_error_codes::REQUEST_CANCELLED,
            McpError::ToolNotFound(_) => mcp_error_codes::TOOL_NOT_FOUND,
            McpError::PromptNotFound(_) => mcp_error_codes::PROMPT_NOT_FOUND,
            McpError::ResourceNotFound(_) => mcp_error_codes::RESOURCE_NOT_FOUND,
            McpError::DuplicateName { .. } => mcp_error_codes::DUPLICATE_NAME,
            McpError::SchemaError { .. } => mcp_error_codes::SCHEMA_ERROR,
            McpError::ValidationError(_) => mcp_error_codes::VALIDATION_ERROR,
            McpError::OutputContract { .. } => mcp_error_codes::OUTPUT_CONTRACT,
            McpError::ReservedMethod(_) => mcp_error_codes::RESERVED_METHOD,
            McpError::Rpc { code, .. } => *code,
        }
    }

    /// Convert into a JSON-RPC error envelope correlated to `id`.
    pub fn to_json_rpc_error(&self, id: RequestId) -> JsonRpcError {
        JsonRpcError::new(id, self.code(), self.to_string())
    }
}
