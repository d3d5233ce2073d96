//! Datastore lifecycle tools.

use async_trait::async_trait;
use ecliptic_fault::Result;
use ecliptic_guard::{can_list_datastore, filter_schema};
use ecliptic_schema::Action;
use ecliptic_service::controllers::datastores;
use ecliptic_service::controllers::datastores::CreateDatastoreInput;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_args, permission_denied, McpTool, ToolContext};
use crate::protocol::ToolAnnotations;

pub struct CreateDatastoreTool;

#[derive(Debug, Deserialize)]
struct CreateArgs {
    internal_name: String,
}

#[async_trait]
impl McpTool for CreateDatastoreTool {
    fn name(&self) -> &'static str {
        "datastore.create"
    }

    fn title(&self) -> &'static str {
        "Create datastore"
    }

    fn description(&self) -> &'static str {
        "Create a new, empty datastore in the caller's organization"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "internal_name": {
                    "type": "string",
                    "description": "Human-readable name, unique within the organization"
                }
            },
            "required": ["internal_name"]
        })
    }

    fn annotations(&self) -> ToolAnnotations {
        ToolAnnotations::default()
    }

    async fn execute(&self, args: Value, tcx: &ToolContext<'_>) -> Result<Value> {
        let args: CreateArgs = parse_args(args)?;
        let perms = tcx.permissions().await?;
        if !perms.grants_global(Action::DatastoreCreate) {
            return Err(permission_denied("datastore.create is not granted"));
        }

        let dto = datastores::create_datastore(
            tcx.state,
            &tcx.ctx(),
            CreateDatastoreInput {
                internal_name: args.internal_name,
                provider: "sqlite".to_string(),
            },
        )
        .await?;
        Ok(serde_json::to_value(dto)?)
    }
}

pub struct DropDatastoreTool;

#[derive(Debug, Deserialize)]
struct DropArgs {
    datastore_id: String,
}

#[async_trait]
impl McpTool for DropDatastoreTool {
    fn name(&self) -> &'static str {
        "datastore.drop"
    }

    fn title(&self) -> &'static str {
        "Drop datastore"
    }

    fn description(&self) -> &'static str {
        "Delete a datastore, its file, and every permission target under it"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "datastore_id": { "type": "string" }
            },
            "required": ["datastore_id"]
        })
    }

    fn annotations(&self) -> ToolAnnotations {
        ToolAnnotations::destructive()
    }

    async fn execute(&self, args: Value, tcx: &ToolContext<'_>) -> Result<Value> {
        let args: DropArgs = parse_args(args)?;
        let perms = tcx.permissions().await?;
        if !perms.grants_datastore(Action::DatastoreDrop, &args.datastore_id) {
            return Err(permission_denied("datastore.drop is not granted"));
        }

        datastores::drop_datastore(tcx.state, &tcx.ctx(), &args.datastore_id).await?;
        Ok(json!({ "deleted": true }))
    }
}

pub struct RenameDatastoreTool;

#[derive(Debug, Deserialize)]
struct RenameArgs {
    datastore_id: String,
    internal_name: String,
}

#[async_trait]
impl McpTool for RenameDatastoreTool {
    fn name(&self) -> &'static str {
        "datastore.rename"
    }

    fn title(&self) -> &'static str {
        "Rename datastore"
    }

    fn description(&self) -> &'static str {
        "Change a datastore's internal name"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "datastore_id": { "type": "string" },
                "internal_name": { "type": "string" }
            },
            "required": ["datastore_id", "internal_name"]
        })
    }

    fn annotations(&self) -> ToolAnnotations {
        ToolAnnotations {
            idempotent_hint: true,
            ..ToolAnnotations::default()
        }
    }

    async fn execute(&self, args: Value, tcx: &ToolContext<'_>) -> Result<Value> {
        let args: RenameArgs = parse_args(args)?;
        let perms = tcx.permissions().await?;
        if !perms.grants_datastore(Action::DatastoreRename, &args.datastore_id) {
            return Err(permission_denied("datastore.rename is not granted"));
        }

        let dto = datastores::rename_datastore(
            tcx.state,
            &tcx.ctx(),
            &args.datastore_id,
            &args.internal_name,
        )
        .await?;
        Ok(serde_json::to_value(dto)?)
    }
}

pub struct ListDatastoresTool;

#[async_trait]
impl McpTool for ListDatastoresTool {
    fn name(&self) -> &'static str {
        "datastore.list"
    }

    fn title(&self) -> &'static str {
        "List datastores"
    }

    fn description(&self) -> &'static str {
        "List the datastores the caller may see, with schemas pruned to the visible surface"
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn annotations(&self) -> ToolAnnotations {
        ToolAnnotations::read_only()
    }

    async fn execute(&self, _args: Value, tcx: &ToolContext<'_>) -> Result<Value> {
        let perms = tcx.permissions().await?;
        let all = datastores::list_datastores(tcx.state, &tcx.ctx()).await?;

        let mut visible = Vec::new();
        for mut dto in all {
            if !can_list_datastore(&perms, &dto.id) {
                continue;
            }
            dto.schema = filter_schema(&dto.schema, &perms, &dto.id);
            visible.push(dto);
        }
        Ok(json!({ "datastores": visible }))
    }
}
