//! Schema and datastore-list filtering.
//!
//! Agents only see the surface they can touch: tables with any select/list
//! grant, and within them only the selectable columns.

use ecliptic_schema::{Action, SchemaSnapshot, TableSchema};

use crate::parsed::ParsedPermissions;

/// Prune `snapshot` to what the caller may see.
pub fn filter_schema(
    snapshot: &SchemaSnapshot,
    perms: &ParsedPermissions,
    datastore_id: &str,
) -> SchemaSnapshot {
    let mut out = SchemaSnapshot::default();
    for (table_name, table) in &snapshot.tables {
        let table_visible = perms.grants_table(Action::TableList, datastore_id, table_name)
            || perms.grants_table(Action::RowSelect, datastore_id, table_name);

        let mut kept = TableSchema::default();
        for (column_name, column) in &table.columns {
            if perms.grants_column(Action::ColumnSelect, datastore_id, table_name, column_name) {
                kept.columns.insert(column_name.clone(), column.clone());
            }
        }

        if table_visible || !kept.columns.is_empty() {
            out.tables.insert(table_name.clone(), kept);
        }
    }
    out
}

/// Whether a datastore appears in the caller's listing at all.
pub fn can_list_datastore(perms: &ParsedPermissions, datastore_id: &str) -> bool {
    perms.grants_datastore(Action::DatastoreList, datastore_id)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use ecliptic_schema::{ColumnSchema, DbType, SchemaSnapshot, TableSchema};

    use super::*;
    use crate::parsed::ParsedPermissions;

    fn snapshot(tables: &[(&str, &[&str])]) -> SchemaSnapshot {
        let mut out = SchemaSnapshot::default();
        for (table, columns) in tables {
            let mut schema = TableSchema {
                columns: BTreeMap::new(),
            };
            for (i, column) in columns.iter().enumerate() {
                schema.columns.insert(
                    column.to_string(),
                    ColumnSchema {
                        name: column.to_string(),
                        order: i as i64,
                        db_type: DbType::Text,
                        dflt_value: None,
                        notnull: false,
                        autoincrement: false,
                        foreign_key: None,
                    },
                );
            }
            out.tables.insert(table.to_string(), schema);
        }
        out
    }

    #[test]
    fn prunes_to_selectable_surface() {
        let snapshot = snapshot(&[
            ("users", &["_id", "email", "secret"]),
            ("posts", &["_id", "title"]),
            ("audit", &["_id", "entry"]),
        ]);
        let perms = ParsedPermissions::from_mappings([
            (
                "datastore.table.row.select",
                "datastore:abc.table:users".to_string(),
            ),
            (
                "datastore.table.column.select",
                "datastore:abc.table:users.column:email".to_string(),
            ),
            (
                "datastore.table.column.select",
                "datastore:abc.table:posts.column:title".to_string(),
            ),
        ]);

        let filtered = filter_schema(&snapshot, &perms, "abc");

        // users: table-level select, one visible column.
        let users = filtered.table("users").unwrap();
        assert!(users.column("email").is_some());
        assert!(users.column("secret").is_none());

        // posts: no table grant, but a column select keeps it listed.
        let posts = filtered.table("posts").unwrap();
        assert!(posts.column("title").is_some());
        assert!(posts.column("_id").is_none());

        // audit: nothing visible.
        assert!(filtered.table("audit").is_none());
    }

    #[test]
    fn wildcards_expose_everything() {
        let snapshot = snapshot(&[("users", &["_id", "email"])]);
        let perms = ParsedPermissions::from_mappings([
            ("datastore.table.list", "datastore:*.table:*"),
            ("datastore.table.column.select", "datastore:*.table:*.column:*"),
        ]);

        let filtered = filter_schema(&snapshot, &perms, "any");
        assert_eq!(
            filtered.table("users").unwrap().columns.len(),
            2
        );
    }

    #[test]
    fn datastore_listing_gate() {
        let perms = ParsedPermissions::from_mappings([("datastore.list", "datastore:abc")]);
        assert!(can_list_datastore(&perms, "abc"));
        assert!(!can_list_datastore(&perms, "other"));

        let wildcard = ParsedPermissions::from_mappings([("datastore.list", "datastore:*")]);
        assert!(can_list_datastore(&wildcard, "anything"));
    }
}
