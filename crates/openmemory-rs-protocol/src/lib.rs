//! Wire types for the memory MCP surface: tool arguments, names and URIs.

mod tool;

pub use tool::ToolError;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Tool that stores one utterance.
pub const SAVE_MEMORY: &str = "save_memory";
/// Tool that merges new records into the abstract and returns it.
pub const RECALL_MEMORY_ABSTRACT: &str = "recall_memory_abstract";
/// Tool that overwrites the abstract with caller-merged content.
pub const UPDATE_MEMORY_ABSTRACT: &str = "update_memory_abstract";
/// Tool that lists recent records.
pub const GET_RECENT_MEMORIES: &str = "get_recent_memories";

/// Resource listing every table and its columns.
pub const SCHEMA_URI: &str = "memory://schema";
/// Resource with aggregate counts.
pub const STATS_URI: &str = "memory://stats";
/// MIME type of both resources.
pub const JSON_MIME: &str = "application/json";

/// Prompt that summarizes stored memory for an agent.
pub const MEMORY_SUMMARY_PROMPT: &str = "memory_summary";
/// Days covered by the summary prompt when unspecified.
pub const DEFAULT_SUMMARY_DAYS: u32 = 7;

/// Arguments for `save_memory`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaveMemoryArgs {
    /// Who produced the utterance (agent, user, system, ...).
    pub speaker: String,
    /// Raw utterance; markup is stripped before storage.
    pub message: String,
    /// Free-form caller context. Accepted but not stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Arguments for `recall_memory_abstract`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecallAbstractArgs {
    /// Rebuild from the lookback window instead of merging incrementally.
    #[serde(default)]
    pub force_refresh: bool,
}

/// Arguments for `update_memory_abstract`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateAbstractArgs {
    /// Replacement abstract text.
    #[serde(rename = "abstract")]
    pub abstract_content: String,
    /// Watermark; defaults to the current time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_processed_timestamp: Option<i64>,
}

/// Arguments for `get_recent_memories`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecentMemoriesArgs {
    /// Days to look back; the configured default applies when absent.
    #[serde(default, deserialize_with = "lenient_days", skip_serializing_if = "Option::is_none")]
    pub max_days: Option<u32>,
    /// Accepted for compatibility; recent listings never write.
    #[serde(default)]
    pub force_refresh: bool,
}

/// Arguments for the `memory_summary` prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemorySummaryArgs {
    /// Agent the summary is written for.
    pub agent_name: String,
    /// Days to cover; [`DEFAULT_SUMMARY_DAYS`] when absent.
    #[serde(default, deserialize_with = "lenient_days", skip_serializing_if = "Option::is_none")]
    pub days_back: Option<u32>,
}

impl MemorySummaryArgs {
    /// Days to cover, falling back to the default.
    pub fn days(&self) -> u32 {
        self.days_back.unwrap_or(DEFAULT_SUMMARY_DAYS)
    }
}

/// Parse tool arguments, treating `null` as an empty object.
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let args = match args {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    Ok(serde_json::from_value(args)?)
}

/// Accept day counts as numbers or numeric strings; prompt arguments arrive as strings.
fn lenient_days<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number
            .as_u64()
            .and_then(|days| u32::try_from(days).ok())
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("days must be a non-negative integer")),
        Some(Value::String(text)) => text
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("days must be an integer, got {text:?}"))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "days must be an integer, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn save_args_accept_optional_context() {
        let args: SaveMemoryArgs =
            parse_args(json!({ "speaker": "user", "message": "hi there" })).expect("args");
        assert_eq!(args.context, None);

        let args: SaveMemoryArgs = parse_args(json!({
            "speaker": "agent",
            "message": "hello",
            "context": "greeting"
        }))
        .expect("args");
        assert_eq!(args.context.as_deref(), Some("greeting"));
    }

    #[test]
    fn save_args_require_speaker_and_message() {
        let err = parse_args::<SaveMemoryArgs>(json!({ "speaker": "user" })).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(err.to_string().contains("message"));
    }

    #[test]
    fn missing_arguments_use_defaults() {
        let recall: RecallAbstractArgs = parse_args(Value::Null).expect("recall");
        assert!(!recall.force_refresh);
        let recent: RecentMemoriesArgs = parse_args(Value::Null).expect("recent");
        assert_eq!(recent, RecentMemoriesArgs::default());
    }

    #[test]
    fn update_args_use_abstract_key() {
        let args: UpdateAbstractArgs = parse_args(json!({
            "abstract": "merged text",
            "last_processed_timestamp": 0
        }))
        .expect("args");
        assert_eq!(args.abstract_content, "merged text");
        assert_eq!(args.last_processed_timestamp, Some(0));
    }

    #[test]
    fn day_counts_accept_strings_and_numbers() {
        let args: MemorySummaryArgs =
            parse_args(json!({ "agent_name": "helper", "days_back": "30" })).expect("args");
        assert_eq!(args.days(), 30);

        let args: MemorySummaryArgs =
            parse_args(json!({ "agent_name": "helper" })).expect("args");
        assert_eq!(args.days(), DEFAULT_SUMMARY_DAYS);

        let args: RecentMemoriesArgs = parse_args(json!({ "max_days": 5 })).expect("args");
        assert_eq!(args.max_days, Some(5));

        let err = parse_args::<RecentMemoriesArgs>(json!({ "max_days": -2 })).unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn error_payload_wraps_message() {
        let err = ToolError::ExecutionFailed("disk full".to_string());
        assert_eq!(err.to_payload(), json!({ "error": "execution failed: disk full" }));
    }
}
