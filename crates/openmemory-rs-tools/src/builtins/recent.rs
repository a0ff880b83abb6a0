//! Tool listing recent raw messages.

use super::to_result;
use crate::Tool;
use async_trait::async_trait;
use log::debug;
use openmemory_rs_memory::MemoryService;
use openmemory_rs_protocol::{GET_RECENT_MEMORIES, RecentMemoriesArgs, ToolError, parse_args};
use serde_json::{Value, json};
use std::sync::Arc;

/// Lists messages from the last few days without touching the abstract.
#[derive(Debug, Clone)]
pub struct GetRecentMemoriesTool {
    service: Arc<MemoryService>,
}

impl GetRecentMemoriesTool {
    pub fn new(service: Arc<MemoryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for GetRecentMemoriesTool {
    fn name(&self) -> &str {
        GET_RECENT_MEMORIES
    }

    fn description(&self) -> &str {
        "Retrieve raw conversation messages from the last few days. Use this when you need \
         actual conversation history rather than the summary, for example to update the \
         memory abstract."
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "max_days": {
                    "type": "integer",
                    "description": "Maximum days to look back (default: 3)"
                },
                "force_refresh": {
                    "type": "boolean",
                    "description": "Accepted for compatibility; has no effect"
                }
            },
            "required": []
        })
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let input: RecentMemoriesArgs = parse_args(args)?;
        if input.force_refresh {
            debug!("get_recent_memories ignores force_refresh");
        }
        // Zero falls back to the configured default.
        let max_days = input.max_days.filter(|days| *days > 0);
        let recent = self.service.recent(max_days).await;
        to_result(&recent)
    }
}
