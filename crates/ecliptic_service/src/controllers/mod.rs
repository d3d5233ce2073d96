//! One controller per user-facing operation.

pub mod datastores;
pub mod keys;
pub mod permissions;
pub mod rows;
pub mod schema;

use ecliptic_catalog::models::DatastoreRow;
use ecliptic_fault::{ErrorEntry, Result};
use ecliptic_schema::SchemaSnapshot;
use serde::Serialize;

/// Wire shape of a datastore.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatastoreDto {
    pub id: String,
    pub internal_name: String,
    pub provider: String,
    pub status: String,
    pub schema: SchemaSnapshot,
    pub created_at: String,
    pub updated_at: String,
}

impl DatastoreDto {
    pub fn from_row(row: DatastoreRow) -> Result<Self> {
        let schema: SchemaSnapshot = serde_json::from_str(&row.schema_json).map_err(|err| {
            ErrorEntry::internal(format!(
                "corrupt schema snapshot on datastore {}: {err}",
                row.id
            ))
        })?;
        Ok(Self {
            id: row.id,
            internal_name: row.internal_name,
            provider: row.provider,
            status: row.status,
            schema,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub(crate) fn parse_snapshot(row: &DatastoreRow) -> Result<SchemaSnapshot> {
    serde_json::from_str(&row.schema_json).map_err(|err| {
        ErrorEntry::internal(format!(
            "corrupt schema snapshot on datastore {}: {err}",
            row.id
        ))
    })
}
