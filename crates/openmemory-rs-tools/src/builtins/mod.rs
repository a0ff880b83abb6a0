//! Memory tools exposed over MCP.

mod abstracts;
mod recent;
mod save;

use crate::ToolRegistry;
use log::info;
use openmemory_rs_memory::MemoryService;
use serde_json::Value;
use std::sync::Arc;

pub use abstracts::{RecallMemoryAbstractTool, UpdateMemoryAbstractTool};
pub use recent::GetRecentMemoriesTool;
pub use save::SaveMemoryTool;

/// Register the memory tools with the provided registry.
pub fn register_memory_tools(registry: &ToolRegistry, service: Arc<MemoryService>) {
    registry.register(Arc::new(SaveMemoryTool::new(service.clone())));
    registry.register(Arc::new(RecallMemoryAbstractTool::new(service.clone())));
    registry.register(Arc::new(UpdateMemoryAbstractTool::new(service.clone())));
    registry.register(Arc::new(GetRecentMemoriesTool::new(service)));
    info!("registered memory tools");
}

/// Build a registry pre-populated with the memory tools.
pub fn memory_tool_registry(service: Arc<MemoryService>) -> ToolRegistry {
    let registry = ToolRegistry::new();
    register_memory_tools(&registry, service);
    registry
}

/// Serialize a service report into a tool result.
fn to_result<T: serde::Serialize>(report: &T) -> Result<Value, openmemory_rs_protocol::ToolError> {
    serde_json::to_value(report)
        .map_err(|err| openmemory_rs_protocol::ToolError::ExecutionFailed(err.to_string()))
}
