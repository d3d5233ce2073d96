//! Schema-change transactor.
//!
//! Applies one typed operation to the datastore file AND the catalog. The
//! file mutation happens first; the catalog transaction (snapshot + target
//! sync) commits second. If the catalog transaction fails, the inverse DDL
//! unwinds the file mutation where an inverse exists.

use ecliptic_catalog::models::DatastoreRow;
use ecliptic_catalog::Catalog;
use ecliptic_fault::{ErrorEntry, Result, RollbackOutcome, RollbackStack};
use ecliptic_schema::{SchemaChange, SchemaSnapshot};
use tracing::{info, warn};

use crate::introspect::introspect;
use crate::pool::DatastorePool;

/// Apply `op` to `datastore`, returning the fresh snapshot.
pub async fn apply_schema_change(
    catalog: &Catalog,
    pool: &DatastorePool,
    datastore: &DatastoreRow,
    op: &SchemaChange,
) -> Result<SchemaSnapshot> {
    let ddl = op.build_ddl().map_err(|err| {
        ErrorEntry::bad_request("schema_change.invalid", err.to_string())
            .with_external("en", "Invalid schema change")
            .with_external("de", "Ungültige Schemaänderung")
    })?;
    let inverse = op.inverse_ddl();

    let db = pool.open(&datastore.external_id).await?;

    sqlx::query(&ddl).execute(&db).await.map_err(|err| {
        ErrorEntry::engine(format!("schema change failed: {err}"))
            .with_external("en", "Schema change failed")
            .with_params(serde_json::json!({
                "datastore": datastore.id,
                "ddl": ddl,
            }))
    })?;

    let snapshot = introspect(&db).await?;
    let snapshot_json = serde_json::to_string(&snapshot)?;

    let committed = catalog
        .commit_schema_change(
            &datastore.organization_id,
            &datastore.id,
            &snapshot_json,
            op,
        )
        .await;

    if let Err(err) = committed {
        let mut rollbacks = RollbackStack::new();
        if let Some(inverse_ddl) = inverse {
            let db = db.clone();
            rollbacks.push("revert datastore ddl", move || async move {
                match sqlx::query(&inverse_ddl).execute(&db).await {
                    Ok(_) => RollbackOutcome::ok(),
                    Err(err) => RollbackOutcome::failed(ErrorEntry::engine(format!(
                        "inverse ddl failed: {err}"
                    ))),
                }
            });
        }
        let trail = rollbacks.unwind().await;
        warn!(
            datastore = %datastore.id,
            steps = trail.len(),
            "schema change rolled back after catalog failure"
        );
        return Err(err);
    }

    info!(datastore = %datastore.id, op = ?op, "schema change applied");
    Ok(snapshot)
}
