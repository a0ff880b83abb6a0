//! The `memory_summary` prompt.

use openmemory_rs_memory::MemoryService;
use openmemory_rs_protocol::{MEMORY_SUMMARY_PROMPT, MemorySummaryArgs};
use serde_json::{Value, json};

/// Wire description of every prompt the server offers.
pub(crate) fn prompt_list_wire() -> Value {
    json!([{
        "name": MEMORY_SUMMARY_PROMPT,
        "description": "Generate a summary of stored memories for an agent",
        "arguments": [
            {
                "name": "agent_name",
                "description": "Name of the agent",
                "required": true
            },
            {
                "name": "days_back",
                "description": "Number of days to look back (default: 7)",
                "required": false
            }
        ]
    }])
}

/// Wire form of a rendered `memory_summary` prompt.
pub(crate) async fn memory_summary_wire(service: &MemoryService, args: &MemorySummaryArgs) -> Value {
    let days = args.days();
    let text = service.summary(&args.agent_name, days).await;
    json!({
        "description": format!(
            "Memory summary for agent {} over the last {days} days",
            args.agent_name
        ),
        "messages": [{
            "role": "user",
            "content": { "type": "text", "text": text }
        }]
    })
}
