//! Row operations against a dynamic schema.
//!
//! Every operation validates table and column names against the strict
//! identifier rule and the schema snapshot before touching the engine.
//! Mutations run inside one transaction; a failure anywhere rolls the whole
//! operation back.

use ecliptic_fault::{ErrorEntry, Result};
use ecliptic_schema::{
    ensure_identifier, quote_identifier, FilterOp, RowFilter, SchemaSnapshot, SortSpec,
    TableSchema,
};
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;

use crate::value::{row_to_json, Bound, JsonMap};
use crate::ROWID_COLUMN;

#[derive(Debug, Serialize)]
pub struct InsertResult {
    pub rows: Vec<JsonMap>,
}

#[derive(Debug, Serialize)]
pub struct UpdateResult {
    pub updated: u64,
    pub rows: Vec<JsonMap>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResult {
    pub deleted: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page_size: i64,
    pub offset: i64,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct SelectResult {
    pub data: Vec<JsonMap>,
    pub pagination: Pagination,
}

fn table_missing(table: &str) -> ErrorEntry {
    ErrorEntry::not_found("table.not_found", format!("table {table} not found"))
        .with_external("en", "Table not found")
        .with_external("de", "Tabelle nicht gefunden")
}

fn column_unknown(column: &str) -> ErrorEntry {
    ErrorEntry::bad_request("column.unknown", format!("unknown column {column}"))
        .with_external("en", "Unknown column")
        .with_external("de", "Unbekannte Spalte")
}

fn invalid_identifier(name: &str) -> ErrorEntry {
    ErrorEntry::bad_request(
        "identifier.invalid",
        format!("invalid identifier: {name}"),
    )
    .with_external("en", "Invalid identifier")
}

fn checked_table<'a>(snapshot: &'a SchemaSnapshot, table: &str) -> Result<&'a TableSchema> {
    ensure_identifier(table).map_err(|_| invalid_identifier(table))?;
    snapshot.table(table).ok_or_else(|| table_missing(table))
}

/// Insert one or more rows. All rows must share one column set; the whole
/// batch commits or rolls back as a unit.
pub async fn insert_rows(
    pool: &SqlitePool,
    snapshot: &SchemaSnapshot,
    table: &str,
    rows: &[JsonMap],
) -> Result<InsertResult> {
    let schema = checked_table(snapshot, table)?;
    if rows.is_empty() {
        return Err(
            ErrorEntry::bad_request("row.insert_empty", "no rows to insert")
                .with_external("en", "Nothing to insert"),
        );
    }

    let columns: Vec<&str> = rows[0].keys().map(String::as_str).collect();
    for row in &rows[1..] {
        let same = row.len() == columns.len() && columns.iter().all(|c| row.contains_key(*c));
        if !same {
            return Err(ErrorEntry::bad_request(
                "row.insert_ragged",
                "all rows must share the same column set",
            )
            .with_external("en", "All rows must have the same columns"));
        }
    }

    for column in &columns {
        if *column == ROWID_COLUMN {
            return Err(column_unknown(column));
        }
        if schema.column(column).is_none() {
            return Err(column_unknown(column));
        }
    }

    // NOT NULL columns without a default must be present in the column set.
    for column in schema.columns.values() {
        let required = column.notnull && column.dflt_value.is_none() && !column.autoincrement;
        if required && !columns.contains(&column.name.as_str()) {
            return Err(ErrorEntry::bad_request(
                "row.missing_required_column",
                format!("column {} is NOT NULL and has no default", column.name),
            )
            .with_external("en", "A required column is missing"));
        }
    }

    // Validate every value before touching the engine.
    let mut bound_rows: Vec<Vec<Bound>> = Vec::with_capacity(rows.len());
    for row in rows {
        let mut bounds = Vec::with_capacity(columns.len());
        for column in &columns {
            let schema_column = schema.column(column).expect("validated above");
            let value = row.get(*column).expect("validated above");
            if schema_column.notnull && value.is_null() {
                return Err(ErrorEntry::bad_request(
                    "row.null_in_notnull",
                    format!("column {column} is NOT NULL"),
                )
                .with_external("en", "Null value in a NOT NULL column"));
            }
            bounds.push(Bound::from_json_typed(schema_column.db_type, value)?);
        }
        bound_rows.push(bounds);
    }

    let placeholders = vec!["?"; columns.len()].join(", ");
    let column_list = columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({column_list}) VALUES ({placeholders})",
        quote_identifier(table)
    );

    let mut tx = pool.begin().await?;
    let mut out = Vec::with_capacity(rows.len());
    for (row, bounds) in rows.iter().zip(bound_rows) {
        let mut query = sqlx::query(&sql);
        for bound in bounds {
            query = bound.bind(query);
        }
        let executed = match query.execute(&mut *tx).await {
            Ok(executed) => executed,
            Err(err) => {
                tx.rollback().await.ok();
                return Err(ErrorEntry::engine(format!("insert failed: {err}")));
            }
        };
        let mut echoed = row.clone();
        echoed.insert(
            ROWID_COLUMN.to_string(),
            Value::from(executed.last_insert_rowid()),
        );
        out.push(echoed);
    }
    tx.commit().await?;

    Ok(InsertResult { rows: out })
}

/// Update rows matched by a non-empty filter list. Returns the rows after
/// the update.
pub async fn update_rows(
    pool: &SqlitePool,
    snapshot: &SchemaSnapshot,
    table: &str,
    filters: &[RowFilter],
    values: &JsonMap,
) -> Result<UpdateResult> {
    let schema = checked_table(snapshot, table)?;
    if filters.is_empty() {
        // No full-table updates through this surface.
        return Err(ErrorEntry::bad_request(
            "row.update_missing_filters",
            "update requires at least one filter",
        )
        .with_external("en", "Update requires a filter")
        .with_external("de", "Aktualisierung erfordert einen Filter"));
    }
    if values.is_empty() {
        return Err(
            ErrorEntry::bad_request("row.update_empty", "no values to set")
                .with_external("en", "Nothing to update"),
        );
    }

    let mut set_fragments = Vec::with_capacity(values.len());
    let mut set_bounds = Vec::with_capacity(values.len());
    for (column, value) in values {
        let schema_column = schema
            .column(column)
            .ok_or_else(|| column_unknown(column))?;
        if schema_column.notnull && value.is_null() {
            return Err(ErrorEntry::bad_request(
                "row.null_in_notnull",
                format!("column {column} is NOT NULL"),
            ));
        }
        set_fragments.push(format!("{} = ?", quote_identifier(column)));
        set_bounds.push(Bound::from_json_typed(schema_column.db_type, value)?);
    }

    let (where_sql, where_bounds) = build_where(schema, filters)?;

    let mut tx = pool.begin().await?;

    // Pin the affected rowids first so the returned rows are exactly the
    // updated ones even when the update changes filtered columns.
    let select_ids = format!("SELECT rowid FROM {} WHERE {where_sql}", quote_identifier(table));
    let mut query = sqlx::query_scalar::<_, i64>(&select_ids);
    for bound in where_bounds {
        query = match bound {
            Bound::Null => query.bind(None::<String>),
            Bound::Int(i) => query.bind(i),
            Bound::Real(f) => query.bind(f),
            Bound::Text(s) => query.bind(s),
        };
    }
    let rowids = query.fetch_all(&mut *tx).await?;

    if rowids.is_empty() {
        tx.commit().await?;
        return Ok(UpdateResult {
            updated: 0,
            rows: Vec::new(),
        });
    }

    let id_placeholders = vec!["?"; rowids.len()].join(", ");
    let update_sql = format!(
        "UPDATE {} SET {} WHERE rowid IN ({id_placeholders})",
        quote_identifier(table),
        set_fragments.join(", ")
    );
    let mut query = sqlx::query(&update_sql);
    for bound in set_bounds {
        query = bound.bind(query);
    }
    for rowid in &rowids {
        query = query.bind(rowid);
    }
    let updated = match query.execute(&mut *tx).await {
        Ok(executed) => executed.rows_affected(),
        Err(err) => {
            tx.rollback().await.ok();
            return Err(ErrorEntry::engine(format!("update failed: {err}")));
        }
    };

    let select_sql = format!(
        "SELECT rowid AS {ROWID_COLUMN}, {} FROM {} WHERE rowid IN ({id_placeholders})",
        all_columns_sql(schema),
        quote_identifier(table)
    );
    let mut query = sqlx::query(&select_sql);
    for rowid in &rowids {
        query = query.bind(rowid);
    }
    let rows = query.fetch_all(&mut *tx).await?;
    tx.commit().await?;

    Ok(UpdateResult {
        updated,
        rows: rows.iter().map(row_to_json).collect::<Result<_>>()?,
    })
}

/// Delete rows keyed exclusively by `_rowid` values.
pub async fn delete_rows(
    pool: &SqlitePool,
    table: &str,
    rowids: &[i64],
) -> Result<DeleteResult> {
    ensure_identifier(table).map_err(|_| invalid_identifier(table))?;
    if rowids.is_empty() {
        return Err(ErrorEntry::bad_request(
            "row.delete_missing_rowids",
            "delete requires at least one rowid",
        )
        .with_external("en", "Delete requires row ids")
        .with_external("de", "Löschen erfordert Zeilen-IDs"));
    }

    let placeholders = vec!["?"; rowids.len()].join(", ");
    let sql = format!(
        "DELETE FROM {} WHERE rowid IN ({placeholders})",
        quote_identifier(table)
    );
    let mut query = sqlx::query(&sql);
    for rowid in rowids {
        query = query.bind(rowid);
    }
    let deleted = query
        .execute(pool)
        .await
        .map_err(|err| ErrorEntry::engine(format!("delete failed: {err}")))?
        .rows_affected();

    Ok(DeleteResult { deleted })
}

/// Paginated select. Requests one row past the page to learn whether more
/// rows exist without a second count query.
pub async fn select_rows(
    pool: &SqlitePool,
    snapshot: &SchemaSnapshot,
    table: &str,
    filters: &[RowFilter],
    sort: &[SortSpec],
    page_size: i64,
    offset: i64,
    columns: Option<&[String]>,
) -> Result<SelectResult> {
    let schema = checked_table(snapshot, table)?;
    if page_size < 1 {
        return Err(ErrorEntry::bad_request(
            "page.size_invalid",
            format!("invalid page size {page_size}"),
        ));
    }
    if offset < 0 {
        return Err(ErrorEntry::bad_request(
            "page.offset_invalid",
            format!("invalid offset {offset}"),
        ));
    }

    let column_sql = match columns {
        None => all_columns_sql(schema),
        Some(list) => {
            let mut fragments = Vec::new();
            for column in list {
                if column == ROWID_COLUMN {
                    // Always selected via the alias below.
                    continue;
                }
                if schema.column(column).is_none() {
                    return Err(column_unknown(column));
                }
                fragments.push(quote_identifier(column));
            }
            if fragments.is_empty() {
                all_columns_sql(schema)
            } else {
                fragments.join(", ")
            }
        }
    };

    let mut sql = format!(
        "SELECT rowid AS {ROWID_COLUMN}, {column_sql} FROM {}",
        quote_identifier(table)
    );

    let mut bounds = Vec::new();
    if !filters.is_empty() {
        let (where_sql, where_bounds) = build_where(schema, filters)?;
        sql.push_str(" WHERE ");
        sql.push_str(&where_sql);
        bounds = where_bounds;
    }

    if !sort.is_empty() {
        let mut terms = Vec::with_capacity(sort.len());
        for spec in sort {
            let column_sql = if spec.column == ROWID_COLUMN {
                "rowid".to_string()
            } else {
                if schema.column(&spec.column).is_none() {
                    return Err(column_unknown(&spec.column));
                }
                quote_identifier(&spec.column)
            };
            terms.push(format!("{column_sql} {}", spec.direction.as_sql()));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&terms.join(", "));
    }

    sql.push_str(" LIMIT ? OFFSET ?");

    let mut query = sqlx::query(&sql);
    for bound in bounds {
        query = bound.bind(query);
    }
    query = query.bind(page_size + 1).bind(offset);

    let mut rows = query
        .fetch_all(pool)
        .await
        .map_err(|err| ErrorEntry::engine(format!("select failed: {err}")))?;

    let has_more = rows.len() as i64 > page_size;
    if has_more {
        rows.truncate(page_size as usize);
    }

    Ok(SelectResult {
        data: rows.iter().map(row_to_json).collect::<Result<_>>()?,
        pagination: Pagination {
            page_size,
            offset,
            has_more,
        },
    })
}

fn all_columns_sql(schema: &TableSchema) -> String {
    schema
        .column_names_ordered()
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn build_where(
    schema: &TableSchema,
    filters: &[RowFilter],
) -> Result<(String, Vec<Bound>)> {
    let mut clauses = Vec::with_capacity(filters.len());
    let mut bounds = Vec::new();

    for filter in filters {
        let column_sql = if filter.column == ROWID_COLUMN {
            "rowid".to_string()
        } else {
            if schema.column(&filter.column).is_none() {
                return Err(column_unknown(&filter.column));
            }
            quote_identifier(&filter.column)
        };

        match filter.op {
            FilterOp::IsNull | FilterOp::IsNotNull => {
                clauses.push(format!("{column_sql} {}", filter.op.as_sql()));
            }
            FilterOp::In => {
                let items = filter.value.as_array().ok_or_else(|| {
                    ErrorEntry::bad_request(
                        "filter.in_requires_array",
                        "`in` filter requires an array value",
                    )
                })?;
                if items.is_empty() {
                    return Err(ErrorEntry::bad_request(
                        "filter.in_empty",
                        "`in` filter requires a non-empty array",
                    ));
                }
                let placeholders = vec!["?"; items.len()].join(", ");
                clauses.push(format!("{column_sql} IN ({placeholders})"));
                for item in items {
                    bounds.push(Bound::from_json(item)?);
                }
            }
            _ => {
                clauses.push(format!("{column_sql} {} ?", filter.op.as_sql()));
                bounds.push(Bound::from_json(&filter.value)?);
            }
        }
    }

    Ok((clauses.join(" AND "), bounds))
}
