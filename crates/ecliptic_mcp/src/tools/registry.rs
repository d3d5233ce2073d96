//! Tool discovery and dispatch.

use std::collections::HashMap;

use ecliptic_fault::{ErrorEntry, Result};
use serde_json::Value;
use tracing::debug;

use super::{datastore, table, McpTool, ToolContext};
use crate::protocol::ToolDefinition;

/// Registry of the fixed tool catalog.
pub struct ToolRegistry {
    tools: HashMap<&'static str, Box<dyn McpTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            tools: HashMap::new(),
        };

        registry.register(Box::new(datastore::CreateDatastoreTool));
        registry.register(Box::new(datastore::DropDatastoreTool));
        registry.register(Box::new(datastore::RenameDatastoreTool));
        registry.register(Box::new(datastore::ListDatastoresTool));
        registry.register(Box::new(table::ListTablesTool));
        registry.register(Box::new(table::QueryTool));

        debug!(count = registry.tools.len(), "tools registered");
        registry
    }

    fn register(&mut self, tool: Box<dyn McpTool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub async fn call_tool(
        &self,
        name: &str,
        args: Value,
        tcx: &ToolContext<'_>,
    ) -> Result<Value> {
        let tool = self.tools.get(name).ok_or_else(|| {
            ErrorEntry::bad_request("tool.unknown", format!("unknown tool: {name}"))
                .with_external("en", "Unknown tool")
        })?;
        tool.execute(args, tcx).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_the_fixed_catalog() {
        let registry = ToolRegistry::new();
        for name in [
            "datastore.create",
            "datastore.drop",
            "datastore.rename",
            "datastore.list",
            "table.list",
            "table.query",
        ] {
            assert!(registry.has_tool(name), "missing tool {name}");
        }
        assert!(!registry.has_tool("table.truncate"));
    }

    #[test]
    fn definitions_carry_schemas_and_annotations() {
        let registry = ToolRegistry::new();
        let definitions = registry.list_tools();
        assert_eq!(definitions.len(), 6);

        for definition in &definitions {
            assert!(!definition.description.is_empty());
            assert!(definition.input_schema.is_object());
        }

        let query = definitions
            .iter()
            .find(|d| d.name == "table.query")
            .unwrap();
        assert!(!query.annotations.read_only_hint);
        assert!(query.annotations.open_world_hint);

        let list = definitions
            .iter()
            .find(|d| d.name == "datastore.list")
            .unwrap();
        assert!(list.annotations.read_only_hint);

        let drop = definitions
            .iter()
            .find(|d| d.name == "datastore.drop")
            .unwrap();
        assert!(drop.annotations.destructive_hint);
    }
}
