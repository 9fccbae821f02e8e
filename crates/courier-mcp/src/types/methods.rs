//! Wire method names and the reserved-method namespace.

/// Begin capability negotiation.
pub const INITIALIZE: &str = "initialize";
/// Client confirmation that negotiation completed.
pub const INITIALIZED: &str = "notifications/initialized";
/// Health check, routable in any session state.
pub const PING: &str = "ping";
/// Set the session's minimum emitted log severity.
pub const SET_LEVEL: &str = "logging/setLevel";
/// Client-issued cancellation of an in-flight request.
pub const CANCELLED: &str = "notifications/cancelled";

/// List registered tools.
pub const TOOLS_LIST: &str = "tools/list";
/// Invoke a tool by name.
pub const TOOLS_CALL: &str = "tools/call";
/// List registered prompts.
pub const PROMPTS_LIST: &str = "prompts/list";
/// Expand a prompt by name.
pub const PROMPTS_GET: &str = "prompts/get";
/// List registered resources.
pub const RESOURCES_LIST: &str = "resources/list";
/// Read a resource by URI.
pub const RESOURCES_READ: &str = "resources/read";

/// Server-to-client log message.
pub const LOG_MESSAGE: &str = "notifications/message";
/// Tool registry changed.
pub const TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
/// Prompt registry changed.
pub const PROMPTS_LIST_CHANGED: &str = "notifications/prompts/list_changed";
/// Resource registry changed.
pub const RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";

/// Names that custom extension methods may never shadow.
pub const RESERVED: &[&str] = &[
    INITIALIZE,
    INITIALIZED,
    PING,
    SET_LEVEL,
    CANCELLED,
    TOOLS_LIST,
    TOOLS_CALL,
    PROMPTS_LIST,
    PROMPTS_GET,
    RESOURCES_LIST,
    RESOURCES_READ,
    LOG_MESSAGE,
    TOOLS_LIST_CHANGED,
    PROMPTS_LIST_CHANGED,
    RESOURCES_LIST_CHANGED,
];

/// Whether a method name belongs to the reserved namespace.
///
/// The `tools/`, `prompts/`, `resources/`, `notifications/`, and `logging/`
/// prefixes are reserved wholesale so future protocol revisions cannot
/// collide with deployed custom methods.
pub fn is_reserved(method: &str) -> bool {
    RESERVED.contains(&method)
        || method.starts_with("tools/")
        || method.starts_with("prompts/")
        || method.starts_with("resources/")
        || method.starts_with("notifications/")
        || method.starts_with("logging/")
}
