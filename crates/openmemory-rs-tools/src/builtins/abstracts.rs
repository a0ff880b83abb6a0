//! Tools that read and replace the running abstract.

use super::to_result;
use crate::Tool;
use async_trait::async_trait;
use openmemory_rs_memory::MemoryService;
use openmemory_rs_protocol::{
    RECALL_MEMORY_ABSTRACT, RecallAbstractArgs, ToolError, UPDATE_MEMORY_ABSTRACT,
    UpdateAbstractArgs, parse_args,
};
use serde_json::{Value, json};
use std::sync::Arc;

/// Brings the abstract up to date with new messages and returns it.
#[derive(Debug, Clone)]
pub struct RecallMemoryAbstractTool {
    service: Arc<MemoryService>,
}

impl RecallMemoryAbstractTool {
    pub fn new(service: Arc<MemoryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for RecallMemoryAbstractTool {
    fn name(&self) -> &str {
        RECALL_MEMORY_ABSTRACT
    }

    fn description(&self) -> &str {
        "Retrieve the memory abstract that summarizes past conversations. Use this at the \
         beginning of a conversation to remember what was discussed before. Returns the \
         processed summary, not raw messages."
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "force_refresh": {
                    "type": "boolean",
                    "description": "Rebuild the abstract from recent history instead of merging new messages"
                }
            },
            "required": []
        })
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let input: RecallAbstractArgs = parse_args(args)?;
        let recall = self.service.recall_abstract(input.force_refresh).await;
        to_result(&recall)
    }
}

/// Replaces the abstract with content merged by the caller.
#[derive(Debug, Clone)]
pub struct UpdateMemoryAbstractTool {
    service: Arc<MemoryService>,
}

impl UpdateMemoryAbstractTool {
    pub fn new(service: Arc<MemoryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Tool for UpdateMemoryAbstractTool {
    fn name(&self) -> &str {
        UPDATE_MEMORY_ABSTRACT
    }

    fn description(&self) -> &str {
        "Save a new or updated memory abstract after processing recent conversations. \
         Typical workflow: get the current abstract, get recent memories, combine them, \
         then save the result here."
    }

    fn args_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "abstract": {
                    "type": "string",
                    "description": "Updated memory abstract to save"
                },
                "last_processed_timestamp": {
                    "type": "integer",
                    "description": "Epoch seconds of the last processed message (defaults to current time)"
                }
            },
            "required": ["abstract"]
        })
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let input: UpdateAbstractArgs = parse_args(args)?;
        let update = self
            .service
            .update_abstract(&input.abstract_content, input.last_processed_timestamp)
            .await;
        to_result(&update)
    }
}
