//! Row-operation controllers.

use ecliptic_datastore::{DeleteResult, InsertResult, SelectResult, UpdateResult};
use ecliptic_fault::Result;
use ecliptic_schema::{RowFilter, SortSpec};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::parse_snapshot;
use crate::{AppState, Ctx};

/// Query inputs of the table-data endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableQueryInput {
    #[serde(default)]
    pub filters: Vec<RowFilter>,
    #[serde(default)]
    pub sort: Vec<SortSpec>,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

impl Default for TableQueryInput {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: Vec::new(),
            page_size: default_page_size(),
            offset: 0,
            columns: None,
        }
    }
}

fn default_page_size() -> i64 {
    50
}

pub async fn get_table_data(
    state: &AppState,
    ctx: &Ctx,
    datastore_id: &str,
    table: &str,
    input: TableQueryInput,
) -> Result<SelectResult> {
    let row = state
        .catalog
        .datastore(&ctx.organization_id, datastore_id)
        .await?;
    let snapshot = parse_snapshot(&row)?;
    let db = state.datastores.open(&row.external_id).await?;

    ecliptic_datastore::select_rows(
        &db,
        &snapshot,
        table,
        &input.filters,
        &input.sort,
        input.page_size,
        input.offset,
        input.columns.as_deref(),
    )
    .await
}

pub async fn insert_rows(
    state: &AppState,
    ctx: &Ctx,
    datastore_id: &str,
    table: &str,
    rows: &[Map<String, Value>],
) -> Result<InsertResult> {
    let row = state
        .catalog
        .datastore(&ctx.organization_id, datastore_id)
        .await?;
    let snapshot = parse_snapshot(&row)?;
    let db = state.datastores.open(&row.external_id).await?;

    let result = ecliptic_datastore::insert_rows(&db, &snapshot, table, rows).await;
    if let Err(err) = &result {
        state.catalog.log_error(Some(&ctx.organization_id), err);
    }
    result
}

pub async fn update_rows(
    state: &AppState,
    ctx: &Ctx,
    datastore_id: &str,
    table: &str,
    filters: &[RowFilter],
    values: &Map<String, Value>,
) -> Result<UpdateResult> {
    let row = state
        .catalog
        .datastore(&ctx.organization_id, datastore_id)
        .await?;
    let snapshot = parse_snapshot(&row)?;
    let db = state.datastores.open(&row.external_id).await?;

    let result = ecliptic_datastore::update_rows(&db, &snapshot, table, filters, values).await;
    if let Err(err) = &result {
        state.catalog.log_error(Some(&ctx.organization_id), err);
    }
    result
}

pub async fn delete_rows(
    state: &AppState,
    ctx: &Ctx,
    datastore_id: &str,
    table: &str,
    rowids: &[i64],
) -> Result<DeleteResult> {
    let row = state
        .catalog
        .datastore(&ctx.organization_id, datastore_id)
        .await?;
    let snapshot = parse_snapshot(&row)?;
    // Table existence is checked against the snapshot before the engine sees
    // the statement.
    if snapshot.table(table).is_none() && ecliptic_schema::is_valid_identifier(table) {
        return Err(ecliptic_fault::ErrorEntry::not_found(
            "table.not_found",
            format!("table {table} not found"),
        )
        .with_external("en", "Table not found"));
    }
    let db = state.datastores.open(&row.external_id).await?;

    let result = ecliptic_datastore::delete_rows(&db, table, rowids).await;
    if let Err(err) = &result {
        state.catalog.log_error(Some(&ctx.organization_id), err);
    }
    result
}
