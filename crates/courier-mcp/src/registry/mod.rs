//! Primitive registries: tools, prompts, and resources.
//!
//! Registration is write-rare, listing and invocation are read-heavy; each
//! registry keeps its entries behind a read-write lock and hands out
//! snapshots, so a list never observes a half-applied mutation and an invoke
//! runs entirely outside the lock.

pub mod prompts;
pub mod resources;
pub mod tools;

pub use prompts::{PromptExpander, PromptRegistry};
pub use resources::{ResourceReader, ResourceRegistry};
pub use tools::{ToolHandler, ToolRegistry};

use crate::types::{McpError, McpResult};

/// Slice a snapshot into one page. The cursor is an opaque offset token;
/// `page_size: None` disables paging and returns everything.
pub(crate) fn paginate<T: Clone>(
    items: Vec<T>,
    cursor: Option<&str>,
    page_size: Option<usize>,
) -> McpResult<(Vec<T>, Option<String>)> {
    let Some(size) = page_size else {
        return Ok((items, None));
    };
    let start: usize = match cursor {
        Some(c) => c
            .parse()
            .map_err(|_| McpError::InvalidParams(format!("invalid cursor: {c}")))?,
        None => 0,
    };
    if start > items.len() {
        return Err(McpError::InvalidParams(format!(
            "cursor out of range: {start}"
        )));
    }
    let end = usize::min(start + size, items.len());
    let next = (end < items.len()).then(|| end.to_string());
    Ok((items[start..end].to_vec(), next))
}
