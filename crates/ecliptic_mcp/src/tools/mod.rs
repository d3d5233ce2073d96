//! Tool implementations.
//!
//! Each tool binds an input schema to a controller under the caller's
//! permission set. Tools are registered in the [`ToolRegistry`] and
//! dispatched by name.

mod datastore;
mod registry;
mod table;

pub use registry::ToolRegistry;

use async_trait::async_trait;
use ecliptic_fault::{ErrorEntry, Result};
use ecliptic_guard::ParsedPermissions;
use ecliptic_service::{AppState, Ctx};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::protocol::{ToolAnnotations, ToolDefinition};
use crate::server::KeyContext;

/// Per-call context handed to every tool.
pub struct ToolContext<'a> {
    pub state: &'a AppState,
    pub caller: &'a KeyContext,
}

impl ToolContext<'_> {
    /// Load the caller's grants fresh from the catalog. Mappings may change
    /// between calls; nothing is cached across requests.
    pub async fn permissions(&self) -> Result<ParsedPermissions> {
        let grants = self
            .state
            .catalog
            .load_grants(&self.caller.organization_id, &self.caller.key_id)
            .await?;
        Ok(ParsedPermissions::from_mappings(grants))
    }

    pub fn ctx(&self) -> Ctx {
        Ctx::new(&self.caller.organization_id)
    }
}

/// Trait for MCP tools.
#[async_trait]
pub trait McpTool: Send + Sync {
    /// Tool name, e.g. `table.query`.
    fn name(&self) -> &'static str;

    fn title(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters.
    fn input_schema(&self) -> Value;

    /// JSON Schema for the result, when stable enough to promise.
    fn output_schema(&self) -> Option<Value> {
        None
    }

    fn annotations(&self) -> ToolAnnotations;

    async fn execute(&self, args: Value, tcx: &ToolContext<'_>) -> Result<Value>;

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            title: self.title().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
            output_schema: self.output_schema(),
            annotations: self.annotations(),
        }
    }
}

pub(crate) fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|err| {
        ErrorEntry::bad_request("tool.invalid_arguments", format!("invalid arguments: {err}"))
            .with_external("en", "Invalid tool arguments")
    })
}

pub(crate) fn permission_denied(detail: impl Into<String>) -> ErrorEntry {
    ErrorEntry::forbidden("permission.denied", detail)
        .with_external("en", "Permission denied")
        .with_external("de", "Zugriff verweigert")
}
