//! Read-only `memory://` resources.

use openmemory_rs_memory::MemoryService;
use openmemory_rs_protocol::{JSON_MIME, SCHEMA_URI, STATS_URI};
use rmcp::model::{AnnotateAble, RawResource, Resource};

/// Resources advertised by the server.
pub(crate) fn resource_list() -> Vec<Resource> {
    vec![
        RawResource {
            description: Some("SQLite database schema for memory storage".to_string()),
            mime_type: Some(JSON_MIME.to_string()),
            ..RawResource::new(SCHEMA_URI, "Database Schema")
        }
        .no_annotation(),
        RawResource {
            description: Some("Statistics about stored memories and conversations".to_string()),
            mime_type: Some(JSON_MIME.to_string()),
            ..RawResource::new(STATS_URI, "Memory Statistics")
        }
        .no_annotation(),
    ]
}

/// Render a resource as pretty JSON; `None` for an unknown URI.
pub(crate) async fn render_resource(
    service: &MemoryService,
    uri: &str,
) -> Option<Result<String, serde_json::Error>> {
    match uri {
        SCHEMA_URI => Some(serde_json::to_string_pretty(&service.schema().await)),
        STATS_URI => Some(serde_json::to_string_pretty(&service.stats().await)),
        _ => None,
    }
}
