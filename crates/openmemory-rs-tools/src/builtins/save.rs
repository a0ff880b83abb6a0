//! Tool that stores a single utterance.

use super::to_result;
use crate::Tool;
use async_trait::async_trait;
use log::debug;
use openmemory_rs_memory::MemoryService;
use openmemory_rs_protocol::{SAVE_MEMORY, SaveMemoryArgs, ToolError, parse_args};
use serde_json::{Value, json};
use std::sync::Arc;

/// Saves one conversation message, normalized, under the current time.
#[derive(Debug, Clone)]
pub struct SaveMemoryTool {
    service: Arc<MemoryService>,
}

impl SaveMemoryTool {
    pub fn new(service: Arc<MemoryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for SaveMemoryTool {
    fn name(&self) -> &str {
        SAVE_MEMORY
    }

    fn description(&self) -> &str {
        "Save an individual conversation message to memory storage. Call this for each \
         significant message or exchange that should be remembered in future conversations."
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "speaker": {
                    "type": "string",
                    "description": "Who spoke: agent, user, or system"
                },
                "message": {
                    "type": "string",
                    "description": "The message content"
                },
                "context": {
                    "type": "string",
                    "description": "Additional context about the conversation"
                }
            },
            "required": ["speaker", "message"]
        })
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let input: SaveMemoryArgs = parse_args(args)?;
        if let Some(context) = input.context.as_deref() {
            debug!("save_memory context (len={})", context.len());
        }
        let report = self.service.save(&input.speaker, &input.message, None).await;
        to_result(&report)
    }
}
