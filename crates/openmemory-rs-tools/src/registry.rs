//! Registry for tool implementations.

use crate::tool::{Tool, ToolSpec};
use log::debug;
use openmemory_rs_protocol::ToolError;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// In-memory registry for tool implementations, ordered by name.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    /// Map of tool name to implementation.
    tools: Arc<RwLock<BTreeMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    /// Create an empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool by name, replacing any tool with the same name.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        debug!("registering tool (name={})", tool.name());
        self.tools.write().insert(tool.name().to_string(), tool);
    }

    /// Fetch a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    /// List all registered tool names.
    pub fn list(&self) -> Vec<String> {
        self.tools.read().keys().cloned().collect()
    }

    /// Return tool specs for all registered tools.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.read().values().map(|tool| tool.spec()).collect()
    }

    /// Look up a tool and invoke it.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::ToolNotFound(name.to_string()))?;
        debug!("invoking tool (name={name})");
        tool.call(args).await
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::ToolRegistry;
    use crate::Tool;
    use async_trait::async_trait;
    use openmemory_rs_protocol::ToolError;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use std::fmt;
    use std::sync::Arc;

    #[derive(Clone)]
    struct EchoTool {
        name: &'static str,
    }

    impl fmt::Debug for EchoTool {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "EchoTool({})", self.name)
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "echo"
        }

        fn args_schema(&self) -> Value {
            json!({ "type": "object" })
        }

        async fn call(&self, args: Value) -> Result<Value, ToolError> {
            Ok(json!({ "tool": self.name, "args": args }))
        }
    }

    #[test]
    fn registry_lists_tools_in_name_order() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { name: "save" }));
        registry.register(Arc::new(EchoTool { name: "recall" }));

        assert_eq!(registry.list(), vec!["recall", "save"]);
        let spec_names = registry
            .specs()
            .into_iter()
            .map(|spec| spec.name)
            .collect::<Vec<_>>();
        assert_eq!(spec_names, vec!["recall", "save"]);
    }

    #[tokio::test]
    async fn call_dispatches_by_name() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool { name: "save" }));

        let result = registry.call("save", json!({ "x": 1 })).await.expect("call");
        assert_eq!(result, json!({ "tool": "save", "args": { "x": 1 } }));

        let err = registry.call("missing", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::ToolNotFound(name) if name == "missing"));
    }
}
