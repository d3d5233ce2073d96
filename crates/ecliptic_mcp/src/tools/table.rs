//! Table tools: schema listing and the universal SQL entry point.

use async_trait::async_trait;
use ecliptic_datastore::row_to_json;
use ecliptic_fault::{ErrorEntry, Result};
use ecliptic_guard::{apply_pagination, check_sql, filter_schema, StatementKind};
use ecliptic_schema::SchemaSnapshot;
use ecliptic_service::controllers::schema::change_schema;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{parse_args, permission_denied, McpTool, ToolContext};
use crate::protocol::ToolAnnotations;

pub struct ListTablesTool;

#[derive(Debug, Deserialize)]
struct ListTablesArgs {
    datastore_id: String,
}

#[async_trait]
impl McpTool for ListTablesTool {
    fn name(&self) -> &'static str {
        "table.list"
    }

    fn title(&self) -> &'static str {
        "List tables"
    }

    fn description(&self) -> &'static str {
        "List the tables and columns of a datastore the caller may see"
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
        ToolAnnotations::read_only()
    }

    async fn execute(&self, args: Value, tcx: &ToolContext<'_>) -> Result<Value> {
        let args: ListTablesArgs = parse_args(args)?;
        let perms = tcx.permissions().await?;

        let row = tcx
            .state
            .catalog
            .datastore(&tcx.caller.organization_id, &args.datastore_id)
            .await?;
        let snapshot: SchemaSnapshot = serde_json::from_str(&row.schema_json)
            .map_err(|err| ErrorEntry::internal(format!("corrupt schema snapshot: {err}")))?;

        let visible = filter_schema(&snapshot, &perms, &args.datastore_id);
        Ok(json!({ "tables": visible.tables }))
    }
}

pub struct QueryTool;

#[derive(Debug, Deserialize)]
struct QueryArgs {
    datastore_id: String,
    sql: String,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    10
}

#[async_trait]
impl McpTool for QueryTool {
    fn name(&self) -> &'static str {
        "table.query"
    }

    fn title(&self) -> &'static str {
        "Run SQL"
    }

    fn description(&self) -> &'static str {
        "Run SQL against a datastore under the caller's permission set. \
         SELECT results are paginated; schema-changing statements are applied \
         through the schema-change transactor."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "datastore_id": { "type": "string" },
                "sql": {
                    "type": "string",
                    "description": "One or more ';'-separated SQL statements (SQLite dialect)"
                },
                "limit": {
                    "type": "integer",
                    "default": 10,
                    "description": "Page size applied to SELECT statements"
                },
                "offset": { "type": "integer", "default": 0 }
            },
            "required": ["datastore_id", "sql"]
        })
    }

    fn output_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": {
                "results": {
                    "type": "array",
                    "items": { "type": "object" }
                }
            },
            "required": ["results"]
        }))
    }

    fn annotations(&self) -> ToolAnnotations {
        ToolAnnotations {
            open_world_hint: true,
            ..ToolAnnotations::default()
        }
    }

    async fn execute(&self, args: Value, tcx: &ToolContext<'_>) -> Result<Value> {
        let args: QueryArgs = parse_args(args)?;
        let perms = tcx.permissions().await?;

        let row = tcx
            .state
            .catalog
            .datastore(&tcx.caller.organization_id, &args.datastore_id)
            .await?;
        let snapshot: SchemaSnapshot = serde_json::from_str(&row.schema_json)
            .map_err(|err| ErrorEntry::internal(format!("corrupt schema snapshot: {err}")))?;

        let checks = check_sql(&args.sql, &perms, &args.datastore_id, &snapshot);
        if checks.is_empty() {
            return Err(
                ErrorEntry::bad_request("sql.empty", "no statements to execute")
                    .with_external("en", "No SQL statements given"),
            );
        }

        // The gate: nothing executes unless every statement is allowed.
        let denied: Vec<usize> = checks
            .iter()
            .enumerate()
            .filter(|(_, check)| !check.allowed)
            .map(|(i, _)| i)
            .collect();
        if !denied.is_empty() {
            for index in &denied {
                debug!(
                    statement = index,
                    operation = ?checks[*index].operation(),
                    "statement denied"
                );
            }
            return Err(permission_denied(format!(
                "statement(s) {denied:?} not allowed under this key"
            )));
        }

        let db = tcx.state.datastores.open(&row.external_id).await?;
        let mut results = Vec::with_capacity(checks.len());
        for check in &checks {
            match &check.kind {
                StatementKind::Ddl { operation } => {
                    change_schema(tcx.state, &tcx.ctx(), &args.datastore_id, operation).await?;
                    info!(datastore = %args.datastore_id, op = ?operation, "ddl applied via table.query");
                    results.push(json!({
                        "type": "ddl",
                        "operation": operation,
                    }));
                }
                StatementKind::Select => {
                    let paginated = apply_pagination(&check.sql, args.limit, args.offset);
                    let rows = sqlx::query(&paginated).fetch_all(&db).await.map_err(|err| {
                        let entry = ErrorEntry::engine(format!("query failed: {err}"));
                        tcx.state
                            .catalog
                            .log_error(Some(&tcx.caller.organization_id), &entry);
                        entry
                    })?;
                    let rows = rows.iter().map(row_to_json).collect::<Result<Vec<_>>>()?;
                    results.push(json!({
                        "type": "select",
                        "rows": rows,
                        "pagination": { "limit": args.limit, "offset": args.offset },
                    }));
                }
                StatementKind::Dml => {
                    let executed = sqlx::query(&check.sql).execute(&db).await.map_err(|err| {
                        let entry = ErrorEntry::engine(format!("statement failed: {err}"));
                        tcx.state
                            .catalog
                            .log_error(Some(&tcx.caller.organization_id), &entry);
                        entry
                    })?;
                    results.push(json!({
                        "type": "mutation",
                        "rows_affected": executed.rows_affected(),
                    }));
                }
            }
        }

        Ok(json!({ "results": results }))
    }
}
