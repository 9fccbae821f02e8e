//! Built-in demo primitives served by the binary and exercised by tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::protocol::ProtocolHandler;
use crate::registry::{PromptExpander, ResourceReader, ToolHandler};
use crate::types::{
    McpResult, PromptArgument, PromptDefinition, PromptGetResult, PromptMessage,
    ReadResourceResult, ResourceContent, ResourceDefinition, ToolCallResult, ToolDefinition,
};

/// Echoes its `text` argument back. Counts invocations so tests can assert
/// that validation failures never reach the handler.
pub struct EchoTool {
    calls: AtomicUsize,
}

impl EchoTool {
    /// Create a fresh echo tool.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    /// How many times the handler actually ran.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The echo tool's definition: one required string field `text`.
    pub fn definition() -> ToolDefinition {
        ToolDefinition {
            name: "echo".to_string(),
            title: Some("Echo".to_string()),
            description: Some("Echo the supplied text back to the caller".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string", "description": "Text to echo" }
                },
                "required": ["text"]
            }),
            output_schema: None,
            annotations: Some(json!({ "readOnlyHint": true })),
        }
    }
}

#[async_trait]
impl ToolHandler for EchoTool {
    async fn call(&self, arguments: Value) -> McpResult<ToolCallResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = arguments
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(ToolCallResult::text(text))
    }
}

/// Renders a one-message greeting prompt.
pub struct GreetingPrompt;

impl GreetingPrompt {
    /// The greeting prompt's definition: one required `name` argument.
    pub fn definition() -> PromptDefinition {
        PromptDefinition {
            name: "greeting".to_string(),
            description: Some("Compose a short greeting".to_string()),
            arguments: Some(vec![PromptArgument {
                name: "name".to_string(),
                description: Some("Who to greet".to_string()),
                required: true,
            }]),
        }
    }
}

#[async_trait]
impl PromptExpander for GreetingPrompt {
    async fn expand(&self, arguments: Value) -> McpResult<PromptGetResult> {
        let name = arguments
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("there");
        Ok(PromptGetResult {
            description: Some("A greeting".to_string()),
            messages: vec![PromptMessage::user(format!("Say hello to {name}."))],
        })
    }
}

/// Serves a static description of the server.
pub struct AboutResource;

impl AboutResource {
    /// URI of the about resource.
    pub const URI: &'static str = "courier://about";

    /// The about resource's definition.
    pub fn definition() -> ResourceDefinition {
        ResourceDefinition {
            uri: Self::URI.to_string(),
            name: "About".to_string(),
            description: Some("What this server is".to_string()),
            mime_type: Some("text/plain".to_string()),
            annotations: None,
        }
    }
}

#[async_trait]
impl ResourceReader for AboutResource {
    async fn read(&self, uri: &str) -> McpResult<ReadResourceResult> {
        Ok(ReadResourceResult {
            contents: vec![ResourceContent {
                uri: uri.to_string(),
                mime_type: Some("text/plain".to_string()),
                text: Some(
                    "Courier MCP: capability-negotiated tool, prompt, and resource server."
                        .to_string(),
                ),
                blob: None,
            }],
        })
    }
}

/// Register the demo primitives on a freshly built handler.
pub fn register_builtins(handler: &ProtocolHandler) -> McpResult<()> {
    handler
        .tools()
        .register(EchoTool::definition(), EchoTool::new())?;
    handler
        .prompts()
        .register(GreetingPrompt::definition(), Arc::new(GreetingPrompt))?;
    handler
        .resources()
        .register(AboutResource::definition(), Arc::new(AboutResource))?;
    Ok(())
}
