//! Schema-change controller.

use ecliptic_datastore::apply_schema_change;
use ecliptic_fault::Result;
use ecliptic_schema::SchemaChange;
use tracing::info;

use super::DatastoreDto;
use crate::{AppState, Ctx};

/// Apply one typed schema change and return the refreshed datastore.
pub async fn change_schema(
    state: &AppState,
    ctx: &Ctx,
    datastore_id: &str,
    op: &SchemaChange,
) -> Result<DatastoreDto> {
    let row = state
        .catalog
        .datastore(&ctx.organization_id, datastore_id)
        .await?;

    let result = apply_schema_change(&state.catalog, &state.datastores, &row, op).await;
    if let Err(err) = &result {
        state.catalog.log_error(Some(&ctx.organization_id), err);
    }
    result?;

    info!(datastore = %datastore_id, op = ?op, "schema changed");
    let row = state
        .catalog
        .datastore(&ctx.organization_id, datastore_id)
        .await?;
    DatastoreDto::from_row(row)
}
