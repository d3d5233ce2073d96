//! MCP keys and their permission mappings.

use ecliptic_fault::{ErrorEntry, Result};
use ecliptic_schema::{Action, TargetType};
use sha2::{Digest, Sha256};

use crate::models::{McpKeyRow, PermissionMappingRow};
use crate::{is_unique_violation, new_id, now_rfc3339, Catalog};

/// SHA-256 hex of an MCP key token.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

fn key_missing(id: &str) -> ErrorEntry {
    ErrorEntry::not_found("mcp_key.not_found", format!("mcp key {id} not found"))
        .with_external("en", "MCP key not found")
        .with_external("de", "MCP-Schlüssel nicht gefunden")
}

impl Catalog {
    /// Store a new key for `token`. The token itself never lands in the
    /// catalog, only its hash.
    pub async fn create_mcp_key(
        &self,
        organization_id: &str,
        user_id: &str,
        name: &str,
        token: &str,
    ) -> Result<McpKeyRow> {
        let row = McpKeyRow {
            id: new_id(),
            organization_id: organization_id.to_string(),
            user_id: user_id.to_string(),
            name: name.to_string(),
            token_hash: hash_token(token),
            created_at: now_rfc3339(),
            revoked_at: None,
        };
        sqlx::query(
            "INSERT INTO mcp_key (id, organization_id, user_id, name, token_hash, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.organization_id)
        .bind(&row.user_id)
        .bind(&row.name)
        .bind(&row.token_hash)
        .bind(&row.created_at)
        .execute(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn list_mcp_keys(&self, organization_id: &str) -> Result<Vec<McpKeyRow>> {
        Ok(sqlx::query_as::<_, McpKeyRow>(
            "SELECT * FROM mcp_key WHERE organization_id = ? ORDER BY created_at, id",
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn mcp_key(&self, organization_id: &str, key_id: &str) -> Result<McpKeyRow> {
        sqlx::query_as::<_, McpKeyRow>(
            "SELECT * FROM mcp_key WHERE organization_id = ? AND id = ?",
        )
        .bind(organization_id)
        .bind(key_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| key_missing(key_id))
    }

    pub async fn revoke_mcp_key(&self, organization_id: &str, key_id: &str) -> Result<()> {
        let updated = sqlx::query(
            "UPDATE mcp_key SET revoked_at = ? \
             WHERE organization_id = ? AND id = ? AND revoked_at IS NULL",
        )
        .bind(now_rfc3339())
        .bind(organization_id)
        .bind(key_id)
        .execute(&self.pool)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(key_missing(key_id));
        }
        Ok(())
    }

    /// Resolve a presented token to its key row. Unknown or revoked tokens
    /// are indistinguishable to the caller.
    pub async fn resolve_mcp_key(&self, token: &str) -> Result<McpKeyRow> {
        sqlx::query_as::<_, McpKeyRow>(
            "SELECT * FROM mcp_key WHERE token_hash = ? AND revoked_at IS NULL",
        )
        .bind(hash_token(token))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            ErrorEntry::forbidden("mcp_key.invalid", "unknown or revoked mcp key")
                .with_external("en", "Invalid MCP key")
                .with_external("de", "Ungültiger MCP-Schlüssel")
        })
    }

    /// Grant `action` on `target_id` to a key.
    ///
    /// Enforces the static allowed-actions-by-type constraint and that the
    /// target is visible to the organization.
    pub async fn grant(
        &self,
        organization_id: &str,
        key_id: &str,
        action: Action,
        target_id: &str,
    ) -> Result<PermissionMappingRow> {
        self.mcp_key(organization_id, key_id).await?;

        let target = self
            .target(organization_id, target_id)
            .await?
            .ok_or_else(|| {
                ErrorEntry::not_found(
                    "permission_target.not_found",
                    format!("target {target_id} not found"),
                )
                .with_external("en", "Permission target not found")
            })?;

        let target_type = TargetType::parse(&target.target_type)
            .map_err(|e| ErrorEntry::internal(e.to_string()))?;
        if !target_type.allows(action) {
            return Err(ErrorEntry::bad_request(
                "permission_mapping.action_not_allowed",
                format!(
                    "action {action} cannot be attached to {} targets",
                    target.target_type
                ),
            )
            .with_external("en", "This action cannot be attached to this target"));
        }

        let row = PermissionMappingRow {
            id: new_id(),
            organization_id: organization_id.to_string(),
            mcp_key_id: key_id.to_string(),
            action_id: action.as_str().to_string(),
            target_id: target_id.to_string(),
            created_at: now_rfc3339(),
        };
        let inserted = sqlx::query(
            "INSERT INTO permission_mapping \
             (id, organization_id, mcp_key_id, action_id, target_id, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.organization_id)
        .bind(&row.mcp_key_id)
        .bind(&row.action_id)
        .bind(&row.target_id)
        .bind(&row.created_at)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(row),
            Err(err) if is_unique_violation(&err) => Err(ErrorEntry::conflict(
                "permission_mapping.duplicate",
                "mapping already exists",
            )
            .with_external("en", "This permission is already granted")),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn revoke_grant(&self, organization_id: &str, mapping_id: &str) -> Result<()> {
        let deleted =
            sqlx::query("DELETE FROM permission_mapping WHERE organization_id = ? AND id = ?")
                .bind(organization_id)
                .bind(mapping_id)
                .execute(&self.pool)
                .await?;
        if deleted.rows_affected() == 0 {
            return Err(ErrorEntry::not_found(
                "permission_mapping.not_found",
                format!("mapping {mapping_id} not found"),
            ));
        }
        Ok(())
    }

    pub async fn key_mappings(
        &self,
        organization_id: &str,
        key_id: &str,
    ) -> Result<Vec<PermissionMappingRow>> {
        Ok(sqlx::query_as::<_, PermissionMappingRow>(
            "SELECT * FROM permission_mapping \
             WHERE organization_id = ? AND mcp_key_id = ? ORDER BY created_at, id",
        )
        .bind(organization_id)
        .bind(key_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// All `(action, target)` pairs of one key, for projection into a parsed
    /// permission set.
    pub async fn load_grants(
        &self,
        organization_id: &str,
        key_id: &str,
    ) -> Result<Vec<(String, String)>> {
        Ok(sqlx::query_as::<_, (String, String)>(
            "SELECT action_id, target_id FROM permission_mapping \
             WHERE organization_id = ? AND mcp_key_id = ?",
        )
        .bind(organization_id)
        .bind(key_id)
        .fetch_all(&self.pool)
        .await?)
    }
}
