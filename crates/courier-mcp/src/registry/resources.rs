//! Resource registration and reading.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::notify::NotificationHub;
use crate::types::{McpError, McpResult, PrimitiveKind, ReadResourceResult, ResourceDefinition};

/// Produces the contents of one resource.
#[async_trait]
pub trait ResourceReader: Send + Sync {
    /// Read the resource identified by `uri`.
    async fn read(&self, uri: &str) -> McpResult<ReadResourceResult>;
}

struct ResourceEntry {
    definition: ResourceDefinition,
    reader: Arc<dyn ResourceReader>,
}

/// Registry of readable resources, keyed by URI.
pub struct ResourceRegistry {
    entries: RwLock<Vec<Arc<ResourceEntry>>>,
    hub: Arc<NotificationHub>,
}

impl ResourceRegistry {
    /// Create an empty registry that announces mutations through `hub`.
    pub fn new(hub: Arc<NotificationHub>) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            hub,
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<ResourceEntry>>> {
        self.entries
            .write()
            .expect("resource registry lock poisoned")
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<ResourceEntry>>> {
        self.entries
            .read()
            .expect("resource registry lock poisoned")
    }

    /// Register a resource. Fails on a duplicate URI.
    pub fn register(
        &self,
        definition: ResourceDefinition,
        reader: Arc<dyn ResourceReader>,
    ) -> McpResult<()> {
        let mut entries = self.write();
        if entries.iter().any(|e| e.definition.uri == definition.uri) {
            return Err(McpError::DuplicateName {
                kind: PrimitiveKind::Resource.as_str(),
                name: definition.uri,
            });
        }
        tracing::debug!(uri = %definition.uri, "resource registered");
        entries.push(Arc::new(ResourceEntry { definition, reader }));
        self.hub.list_changed(PrimitiveKind::Resource);
        Ok(())
    }

    /// Remove a resource by URI, announcing the change.
    pub fn unregister(&self, uri: &str) -> McpResult<()> {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|e| e.definition.uri != uri);
        if entries.len() == before {
            return Err(McpError::ResourceNotFound(uri.to_string()));
        }
        tracing::debug!(uri = %uri, "resource unregistered");
        self.hub.list_changed(PrimitiveKind::Resource);
        Ok(())
    }

    /// Snapshot of all definitions, in registration order.
    pub fn list(&self) -> Vec<ResourceDefinition> {
        self.read_guard()
            .iter()
            .map(|e| e.definition.clone())
            .collect()
    }

    /// Read a resource by URI.
    pub async fn read(&self, uri: &str) -> McpResult<ReadResourceResult> {
        let entry = self
            .read_guard()
            .iter()
            .find(|e| e.definition.uri == uri)
            .cloned()
            .ok_or_else(|| McpError::ResourceNotFound(uri.to_string()))?;
        entry.reader.read(uri).await
    }
}
