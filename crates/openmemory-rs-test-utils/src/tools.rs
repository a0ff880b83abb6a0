use async_trait::async_trait;
use openmemory_rs_protocol::ToolError;
use serde_json::{Value, json};

/// Tool returning a fixed result, or a fixed failure.
#[derive(Debug, Clone)]
pub struct DummyTool {
    name: String,
    description: String,
    args_schema: Value,
    result: Result<Value, String>,
}

impl DummyTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: "dummy".to_string(),
            args_schema: json!({ "type": "object" }),
            result: Ok(json!({})),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_result(mut self, result: Value) -> Self {
        self.result = Ok(result);
        self
    }

    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.result = Err(message.into());
        self
    }

    pub fn with_args_schema(mut self, schema: Value) -> Self {
        self.args_schema = schema;
        self
    }
}

#[async_trait]
impl openmemory_rs_tools::Tool for DummyTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn args_schema(&self) -> Value {
        self.args_schema.clone()
    }

    async fn call(&self, _args: Value) -> Result<Value, ToolError> {
        self.result
            .clone()
            .map_err(ToolError::ExecutionFailed)
    }
}
