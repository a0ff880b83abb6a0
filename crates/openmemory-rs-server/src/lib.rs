//! MCP server exposing memory tools, resources and prompts over stdio.

mod prompts;
mod resources;
mod server;

/// MCP server type and stdio entry point.
pub use server::{MemoryMcpServer, SERVER_NAME};
