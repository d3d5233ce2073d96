//! Schema snapshot: the derived JSON cache of a datastore's shape.
//!
//! The authoritative source is always the datastore file itself; the snapshot
//! stored on the catalog row must equal a fresh introspection after every
//! committed schema change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Column storage class. Closed set matching the SQLite storage classes the
/// service exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DbType {
    Text,
    Integer,
    Real,
    Blob,
}

impl DbType {
    /// SQL type name as written into DDL.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Blob => "BLOB",
        }
    }

    /// Parse one of the four canonical names. Anything else is rejected.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "TEXT" => Some(Self::Text),
            "INTEGER" => Some(Self::Integer),
            "REAL" => Some(Self::Real),
            "BLOB" => Some(Self::Blob),
            _ => None,
        }
    }

    /// SQLite type affinity for an arbitrary declared type.
    ///
    /// Used when introspecting files whose DDL was not written by this
    /// service. Follows the engine's affinity rules, collapsed onto the
    /// closed set.
    pub fn affinity_of(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        if upper.contains("INT") {
            Self::Integer
        } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
            Self::Text
        } else if upper.is_empty() || upper.contains("BLOB") {
            Self::Blob
        } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
            Self::Real
        } else {
            Self::Text
        }
    }
}

/// Foreign key reference attached to a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<String>,
}

/// One column of a table snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub order: i64,
    pub db_type: DbType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dflt_value: Option<String>,
    #[serde(default)]
    pub notnull: bool,
    #[serde(default)]
    pub autoincrement: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyRef>,
}

/// One table of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: BTreeMap<String, ColumnSchema>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.get(name)
    }

    /// Column names in declaration order.
    pub fn column_names_ordered(&self) -> Vec<&str> {
        let mut cols: Vec<&ColumnSchema> = self.columns.values().collect();
        cols.sort_by_key(|c| c.order);
        cols.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Derived cache of a datastore's table/column shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: BTreeMap<String, TableSchema>,
}

impl SchemaSnapshot {
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_type_parse_is_strict() {
        assert_eq!(DbType::parse("INTEGER"), Some(DbType::Integer));
        assert_eq!(DbType::parse("integer"), None);
        assert_eq!(DbType::parse("BIGINT"), None);
    }

    #[test]
    fn affinity_follows_engine_rules() {
        assert_eq!(DbType::affinity_of("BIGINT"), DbType::Integer);
        assert_eq!(DbType::affinity_of("VARCHAR(255)"), DbType::Text);
        assert_eq!(DbType::affinity_of(""), DbType::Blob);
        assert_eq!(DbType::affinity_of("DOUBLE PRECISION"), DbType::Real);
        assert_eq!(DbType::affinity_of("NUMERIC"), DbType::Text);
    }

    #[test]
    fn snapshot_serializes_to_spec_shape() {
        let mut tables = BTreeMap::new();
        let mut columns = BTreeMap::new();
        columns.insert(
            "_id".to_string(),
            ColumnSchema {
                name: "_id".to_string(),
                order: 0,
                db_type: DbType::Integer,
                dflt_value: None,
                notnull: false,
                autoincrement: true,
                foreign_key: None,
            },
        );
        tables.insert("users".to_string(), TableSchema { columns });
        let snapshot = SchemaSnapshot { tables };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json["tables"]["users"]["columns"]["_id"]["db_type"],
            "INTEGER"
        );
        assert_eq!(
            json["tables"]["users"]["columns"]["_id"]["autoincrement"],
            true
        );
        assert!(json["tables"]["users"]["columns"]["_id"]
            .get("dflt_value")
            .is_none());
    }

    #[test]
    fn ordered_column_names_follow_declaration_order() {
        let mut columns = BTreeMap::new();
        for (i, name) in ["zeta", "alpha"].iter().enumerate() {
            columns.insert(
                name.to_string(),
                ColumnSchema {
                    name: name.to_string(),
                    order: i as i64,
                    db_type: DbType::Text,
                    dflt_value: None,
                    notnull: false,
                    autoincrement: false,
                    foreign_key: None,
                },
            );
        }
        let table = TableSchema { columns };
        assert_eq!(table.column_names_ordered(), vec!["zeta", "alpha"]);
    }
}
