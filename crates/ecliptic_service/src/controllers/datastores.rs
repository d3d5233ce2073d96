//! Datastore lifecycle controllers.

use ecliptic_fault::{ErrorEntry, Result, RollbackStack};
use serde::Deserialize;
use tracing::{info, warn};

use super::DatastoreDto;
use crate::{AppState, Ctx};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDatastoreInput {
    pub internal_name: String,
    #[serde(default = "default_provider")]
    pub provider: String,
}

fn default_provider() -> String {
    "sqlite".to_string()
}

/// Create a datastore: file first (with a delete rollback), then the catalog
/// transaction. A catalog failure unwinds the file.
pub async fn create_datastore(
    state: &AppState,
    ctx: &Ctx,
    input: CreateDatastoreInput,
) -> Result<DatastoreDto> {
    let name = input.internal_name.trim();
    if name.is_empty() {
        return Err(
            ErrorEntry::bad_request("datastore.name_empty", "internal name must not be empty")
                .with_external("en", "Name must not be empty")
                .with_external("de", "Name darf nicht leer sein"),
        );
    }
    if input.provider != "sqlite" {
        return Err(ErrorEntry::bad_request(
            "datastore.provider_unknown",
            format!("unknown provider {}", input.provider),
        )
        .with_external("en", "Unknown datastore provider"));
    }

    let id = uuid::Uuid::new_v4().simple().to_string();
    let mut rollbacks = RollbackStack::new();

    // The file handle equals the datastore id.
    state.datastores.create(&id, &mut rollbacks).await?;

    let created = state
        .catalog
        .create_datastore(&ctx.organization_id, &id, name, &input.provider)
        .await;

    match created {
        Ok(row) => {
            info!(datastore = %id, organization = %ctx.organization_id, "datastore created");
            DatastoreDto::from_row(row)
        }
        Err(err) => {
            rollbacks.unwind().await;
            state.catalog.log_error(Some(&ctx.organization_id), &err);
            Err(err)
        }
    }
}

pub async fn list_datastores(state: &AppState, ctx: &Ctx) -> Result<Vec<DatastoreDto>> {
    state
        .catalog
        .list_datastores(&ctx.organization_id)
        .await?
        .into_iter()
        .map(DatastoreDto::from_row)
        .collect()
}

pub async fn get_datastore(state: &AppState, ctx: &Ctx, id: &str) -> Result<DatastoreDto> {
    let row = state.catalog.datastore(&ctx.organization_id, id).await?;
    DatastoreDto::from_row(row)
}

pub async fn rename_datastore(
    state: &AppState,
    ctx: &Ctx,
    id: &str,
    internal_name: &str,
) -> Result<DatastoreDto> {
    let name = internal_name.trim();
    if name.is_empty() {
        return Err(
            ErrorEntry::bad_request("datastore.name_empty", "internal name must not be empty")
                .with_external("en", "Name must not be empty"),
        );
    }
    let row = state
        .catalog
        .rename_datastore(&ctx.organization_id, id, name)
        .await?;
    DatastoreDto::from_row(row)
}

/// Drop a datastore. The file is deleted first; the catalog deletion is
/// ordered after it. A failure between the two steps leaves a dangling
/// catalog row, never a deleted-but-referenced file; retrying the drop
/// clears the dangling row.
pub async fn drop_datastore(state: &AppState, ctx: &Ctx, id: &str) -> Result<()> {
    let row = state.catalog.datastore(&ctx.organization_id, id).await?;

    state.datastores.delete_file(&row.external_id).await?;

    if let Err(err) = state
        .catalog
        .delete_datastore(&ctx.organization_id, id)
        .await
    {
        let entry = ErrorEntry::engine(format!(
            "datastore {id} file deleted but catalog deletion failed: {}",
            err.internal
        ))
        .with_params(serde_json::json!({ "datastore": id }));
        warn!(datastore = %id, "dangling catalog row left behind");
        state.catalog.log_error(Some(&ctx.organization_id), &entry);
        return Err(err);
    }

    info!(datastore = %id, organization = %ctx.organization_id, "datastore dropped");
    Ok(())
}
