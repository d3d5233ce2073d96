//! MCP key and permission-mapping controllers.

use ecliptic_catalog::models::{McpKeyRow, PermissionMappingRow};
use ecliptic_fault::{ErrorEntry, Result};
use ecliptic_schema::Action;
use serde::Serialize;

use crate::{AppState, Ctx};

/// Wire shape of an MCP key. The token appears exactly once, on creation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct McpKeyDto {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub revoked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl McpKeyDto {
    fn from_row(row: McpKeyRow, token: Option<String>) -> Self {
        Self {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
            revoked: row.revoked_at.is_some(),
            token,
        }
    }
}

pub async fn create_key(
    state: &AppState,
    ctx: &Ctx,
    user_id: &str,
    name: &str,
) -> Result<McpKeyDto> {
    if name.trim().is_empty() {
        return Err(
            ErrorEntry::bad_request("mcp_key.name_empty", "key name must not be empty")
                .with_external("en", "Key name must not be empty"),
        );
    }
    let token = format!("ek_{}", uuid::Uuid::new_v4().simple());
    let row = state
        .catalog
        .create_mcp_key(&ctx.organization_id, user_id, name.trim(), &token)
        .await?;
    Ok(McpKeyDto::from_row(row, Some(token)))
}

pub async fn list_keys(state: &AppState, ctx: &Ctx) -> Result<Vec<McpKeyDto>> {
    Ok(state
        .catalog
        .list_mcp_keys(&ctx.organization_id)
        .await?
        .into_iter()
        .map(|row| McpKeyDto::from_row(row, None))
        .collect())
}

pub async fn revoke_key(state: &AppState, ctx: &Ctx, key_id: &str) -> Result<()> {
    state
        .catalog
        .revoke_mcp_key(&ctx.organization_id, key_id)
        .await
}

pub async fn grant(
    state: &AppState,
    ctx: &Ctx,
    key_id: &str,
    action: &str,
    target_id: &str,
) -> Result<PermissionMappingRow> {
    let action = Action::parse(action).map_err(|err| {
        ErrorEntry::bad_request("permission_action.unknown", err.to_string())
            .with_external("en", "Unknown permission action")
    })?;
    state
        .catalog
        .grant(&ctx.organization_id, key_id, action, target_id)
        .await
}

pub async fn revoke_grant(state: &AppState, ctx: &Ctx, mapping_id: &str) -> Result<()> {
    state
        .catalog
        .revoke_grant(&ctx.organization_id, mapping_id)
        .await
}

pub async fn list_grants(
    state: &AppState,
    ctx: &Ctx,
    key_id: &str,
) -> Result<Vec<PermissionMappingRow>> {
    // 404 for keys outside the organization before listing.
    state.catalog.mcp_key(&ctx.organization_id, key_id).await?;
    state
        .catalog
        .key_mappings(&ctx.organization_id, key_id)
        .await
}
