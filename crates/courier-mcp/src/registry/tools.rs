//! Tool registration, schema validation, and invocation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::notify::NotificationHub;
use crate::types::{
    McpError, McpResult, PrimitiveKind, ToolCallResult, ToolDefinition,
};

/// Implementation of one tool, registered alongside its definition.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool. Arguments have already passed input-schema validation.
    ///
    /// A returned error is a business failure: it travels back to the caller
    /// as an error-flagged result, not as a protocol fault.
    async fn call(&self, arguments: Value) -> McpResult<ToolCallResult>;
}

struct ToolEntry {
    definition: ToolDefinition,
    input: jsonschema::Validator,
    output: Option<jsonschema::Validator>,
    handler: Arc<dyn ToolHandler>,
}

/// Registry of callable tools.
pub struct ToolRegistry {
    entries: RwLock<Vec<Arc<ToolEntry>>>,
    hub: Arc<NotificationHub>,
}

impl ToolRegistry {
    /// Create an empty registry that announces mutations through `hub`.
    pub fn new(hub: Arc<NotificationHub>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            hub,
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<ToolEntry>>> {
        self.entries.write().expect("tool registry lock poisoned")
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<ToolEntry>>> {
        self.entries.read().expect("tool registry lock poisoned")
    }

    /// Register a tool. Fails on a duplicate name or a schema document that
    /// does not compile; success notifies every ready session that
    /// negotiated tools/list_changed.
    pub fn register(
        &self,
        definition: ToolDefinition,
        handler: Arc<dyn ToolHandler>,
    ) -> McpResult<()> {
        let input = jsonschema::validator_for(&definition.input_schema).map_err(|e| {
            McpError::SchemaError {
                name: definition.name.clone(),
                detail: e.to_string(),
            }
        })?;
        let output = definition
            .output_schema
            .as_ref()
            .map(|schema| {
                jsonschema::validator_for(schema).map_err(|e| McpError::SchemaError {
                    name: definition.name.clone(),
                    detail: e.to_string(),
                })
            })
            .transpose()?;

        let mut entries = self.write();
        if entries.iter().any(|e| e.definition.name == definition.name) {
            return Err(McpError::DuplicateName {
                kind: PrimitiveKind::Tool.as_str(),
                name: definition.name,
            });
        }
        tracing::debug!(tool = %definition.name, "tool registered");
        entries.push(Arc::new(ToolEntry {
            definition,
            input,
            output,
            handler,
        }));
        // Emitted under the write lock so notification order matches
        // mutation order.
        self.hub.list_changed(PrimitiveKind::Tool);
        Ok(())
    }

    /// Remove a tool by name, announcing the change.
    pub fn unregister(&self, name: &str) -> McpResult<()> {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|e| e.definition.name != name);
        if entries.len() == before {
            return Err(McpError::ToolNotFound(name.to_string()));
        }
        tracing::debug!(tool = %name, "tool unregistered");
        self.hub.list_changed(PrimitiveKind::Tool);
        Ok(())
    }

    /// Snapshot of all definitions, in registration order.
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.read().iter().map(|e| e.definition.clone()).collect()
    }

    /// Invoke a tool by name.
    ///
    /// Arguments are validated against the input schema before the handler
    /// runs; a declared output schema is checked afterwards, and a
    /// non-conforming result is an output-contract fault, distinct from the
    /// handler's own failure.
    pub async fn call(&self, name: &str, arguments: Option<Value>) -> McpResult<ToolCallResult> {
        let entry = self
            .read()
            .iter()
            .find(|e| e.definition.name == name)
            .cloned()
            .ok_or_else(|| McpError::ToolNotFound(name.to_string()))?;

        let arguments = arguments.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        if let Err(e) = entry.input.validate(&arguments) {
            return Err(McpError::ValidationError(e.to_string()));
        }

        let result = match entry.handler.call(arguments).await {
            Ok(result) => result,
            Err(e) => {
                tracing::debug!(tool = %name, "tool handler failed: {e}");
                ToolCallResult::error(e.to_string())
            }
        };

        if let Some(output) = &entry.output {
            if !result.failed() {
                let structured =
                    result
                        .structured_content
                        .as_ref()
                        .ok_or_else(|| McpError::OutputContract {
                            name: name.to_string(),
                            detail: "declared an output schema but returned no structured content"
                                .to_string(),
                        })?;
                if let Err(e) = output.validate(structured) {
                    return Err(McpError::OutputContract {
                        name: name.to_string(),
                        detail: e.to_string(),
                    });
                }
            }
        }

        Ok(result)
    }
}
