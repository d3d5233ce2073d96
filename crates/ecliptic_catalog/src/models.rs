//! Catalog row models.
//!
//! Uses derive macros for FromRow to map database rows to structs. Timestamps
//! are stored as RFC 3339 text.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub created_at: String,
}

/// A session pins a user to exactly one active organization.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub active_organization_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DatastoreRow {
    pub id: String,
    pub organization_id: String,
    pub internal_name: String,
    pub provider: String,
    /// External file handle. Equal to `id`; kept as its own column because
    /// it names a filesystem object, not a catalog row.
    pub external_id: String,
    pub schema_json: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PermissionTargetRow {
    /// The typed path, e.g. `datastore:abc.table:users.column:email`.
    pub id: String,
    /// NULL for global wildcard targets.
    pub organization_id: Option<String>,
    /// NULL for global wildcard targets.
    pub datastore_id: Option<String>,
    pub target_type: String,
    pub internal_name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PermissionActionRow {
    pub id: String,
    pub scope: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PermissionMappingRow {
    pub id: String,
    pub organization_id: String,
    pub mcp_key_id: String,
    pub action_id: String,
    pub target_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct McpKeyRow {
    pub id: String,
    pub organization_id: String,
    pub user_id: String,
    pub name: String,
    /// SHA-256 hex of the presented token. The token itself is never stored.
    pub token_hash: String,
    pub created_at: String,
    pub revoked_at: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LogRow {
    pub id: i64,
    pub organization_id: Option<String>,
    pub code: String,
    pub internal: String,
    pub params_json: Option<String>,
    pub created_at: String,
}
