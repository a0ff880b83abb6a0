//! Tool interfaces and the memory tools served over MCP.

pub mod builtins;
pub mod registry;
pub mod tool;

/// Memory tools and registry helpers.
pub use builtins::{
    GetRecentMemoriesTool, RecallMemoryAbstractTool, SaveMemoryTool, UpdateMemoryAbstractTool,
    memory_tool_registry, register_memory_tools,
};
/// Tool registry type.
pub use registry::ToolRegistry;
/// Tool trait and spec type.
pub use tool::{Tool, ToolSpec};
