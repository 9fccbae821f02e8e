//! Prompt registration and expansion.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::notify::NotificationHub;
use crate::types::{McpError, McpResult, PrimitiveKind, PromptDefinition, PromptGetResult};

/// Expands one prompt template into rendered messages.
#[async_trait]
pub trait PromptExpander: Send + Sync {
    /// Expand with the given arguments. Required arguments are already
    /// checked against the definition before this runs.
    async fn expand(&self, arguments: Value) -> McpResult<PromptGetResult>;
}

struct PromptEntry {
    definition: PromptDefinition,
    expander: Arc<dyn PromptExpander>,
}

/// Registry of prompt templates.
pub struct PromptRegistry {
    entries: RwLock<Vec<Arc<PromptEntry>>>,
    hub: Arc<NotificationHub>,
}

impl PromptRegistry {
    /// Create an empty registry that announces mutations through `hub`.
    pub fn new(hub: Arc<NotificationHub>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            hub,
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<PromptEntry>>> {
        self.entries.write().expect("prompt registry lock poisoned")
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<PromptEntry>>> {
        self.entries.read().expect("prompt registry lock poisoned")
    }

    /// Register a prompt. Fails on a duplicate name.
    pub fn register(
        &self,
        definition: PromptDefinition,
        expander: Arc<dyn PromptExpander>,
    ) -> McpResult<()> {
        let mut entries = self.write();
        if entries.iter().any(|e| e.definition.name == definition.name) {
            return Err(McpError::DuplicateName {
                kind: PrimitiveKind::Prompt.as_str(),
                name: definition.name,
            });
        }
        tracing::debug!(prompt = %definition.name, "prompt registered");
        entries.push(Arc::new(PromptEntry {
            definition,
            expander,
        }));
        self.hub.list_changed(PrimitiveKind::Prompt);
        Ok(())
    }

    /// Remove a prompt by name, announcing the change.
    pub fn unregister(&self, name: &str) -> McpResult<()> {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|e| e.definition.name != name);
        if entries.len() == before {
            return Err(McpError::PromptNotFound(name.to_string()));
        }
        tracing::debug!(prompt = %name, "prompt unregistered");
        self.hub.list_changed(PrimitiveKind::Prompt);
        Ok(())
    }

    /// Snapshot of all definitions, in registration order.
    pub fn list(&self) -> Vec<PromptDefinition> {
        self.read().iter().map(|e| e.definition.clone()).collect()
    }

    /// Expand a prompt by name, checking required arguments first.
    pub async fn get(&self, name: &str, arguments: Option<Value>) -> McpResult<PromptGetResult> {
        let entry = self
            .read()
            .iter()
            .find(|e| e.definition.name == name)
            .cloned()
            .ok_or_else(|| McpError::PromptNotFound(name.to_string()))?;

        let arguments = arguments.unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        if let Some(declared) = &entry.definition.arguments {
            for arg in declared.iter().filter(|a| a.required) {
                if arguments.get(&arg.name).is_none() {
                    return Err(McpError::ValidationError(format!(
                        "missing required prompt argument: {}",
                        arg.name
                    )));
                }
            }
        }

        entry.expander.expand(arguments).await
    }
}
