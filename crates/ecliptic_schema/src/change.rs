//! Typed schema-change operations and their DDL rendering.

use serde::{Deserialize, Serialize};

use crate::ident::{ensure_identifier, quote_identifier};
use crate::snapshot::{DbType, ForeignKeyRef};
use crate::SchemaError;

/// One schema-change operation against a datastore.
///
/// The tagged serde form matches the wire shape of the schema PATCH endpoint
/// and of DDL results returned by the SQL checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SchemaChange {
    AddColumn {
        table: String,
        column: String,
        db_type: DbType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        foreign_key: Option<ForeignKeyRef>,
    },
    DropColumn {
        table: String,
        column: String,
    },
    RenameColumn {
        table: String,
        column: String,
        new_name: String,
    },
    AddTable {
        table: String,
    },
    DropTable {
        table: String,
    },
    RenameTable {
        table: String,
        new_name: String,
    },
}

impl SchemaChange {
    /// Table the operation applies to.
    pub fn table(&self) -> &str {
        match self {
            Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::RenameColumn { table, .. }
            | Self::AddTable { table }
            | Self::DropTable { table }
            | Self::RenameTable { table, .. } => table,
        }
    }

    /// Validate all identifiers the operation names.
    pub fn validate(&self) -> Result<(), SchemaError> {
        ensure_identifier(self.table())?;
        match self {
            Self::AddColumn {
                column,
                foreign_key,
                ..
            } => {
                ensure_identifier(column)?;
                if let Some(fk) = foreign_key {
                    ensure_identifier(&fk.table)?;
                    ensure_identifier(&fk.column)?;
                }
            }
            Self::DropColumn { column, .. } => {
                ensure_identifier(column)?;
            }
            Self::RenameColumn {
                column, new_name, ..
            } => {
                ensure_identifier(column)?;
                ensure_identifier(new_name)?;
            }
            Self::RenameTable { new_name, .. } => {
                ensure_identifier(new_name)?;
            }
            Self::AddTable { .. } | Self::DropTable { .. } => {}
        }
        Ok(())
    }

    /// Render the engine-native DDL string.
    pub fn build_ddl(&self) -> Result<String, SchemaError> {
        self.validate()?;
        Ok(match self {
            Self::AddColumn {
                table,
                column,
                db_type,
                foreign_key,
            } => {
                let mut ddl = format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    quote_identifier(table),
                    quote_identifier(column),
                    db_type.as_sql()
                );
                if let Some(fk) = foreign_key {
                    ddl.push_str(&format!(
                        " REFERENCES {}({})",
                        quote_identifier(&fk.table),
                        quote_identifier(&fk.column)
                    ));
                    if let Some(on_update) = &fk.on_update {
                        ddl.push_str(&format!(" ON UPDATE {on_update}"));
                    }
                    if let Some(on_delete) = &fk.on_delete {
                        ddl.push_str(&format!(" ON DELETE {on_delete}"));
                    }
                }
                ddl
            }
            Self::DropColumn { table, column } => format!(
                "ALTER TABLE {} DROP COLUMN {}",
                quote_identifier(table),
                quote_identifier(column)
            ),
            Self::RenameColumn {
                table,
                column,
                new_name,
            } => format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                quote_identifier(table),
                quote_identifier(column),
                quote_identifier(new_name)
            ),
            // New tables always carry the synthetic autoincrement `_id`.
            Self::AddTable { table } => format!(
                "CREATE TABLE {} (\"_id\" INTEGER PRIMARY KEY AUTOINCREMENT)",
                quote_identifier(table)
            ),
            Self::DropTable { table } => format!("DROP TABLE {}", quote_identifier(table)),
            Self::RenameTable { table, new_name } => format!(
                "ALTER TABLE {} RENAME TO {}",
                quote_identifier(table),
                quote_identifier(new_name)
            ),
        })
    }

    /// Render the compensating DDL, if one exists.
    ///
    /// `drop-table` and `drop-column` are terminal inside the file; their
    /// safety comes from the catalog transaction committing or rolling back
    /// as a unit.
    pub fn inverse_ddl(&self) -> Option<String> {
        let inverse = match self {
            Self::AddColumn { table, column, .. } => Self::DropColumn {
                table: table.clone(),
                column: column.clone(),
            },
            Self::RenameColumn {
                table,
                column,
                new_name,
            } => Self::RenameColumn {
                table: table.clone(),
                column: new_name.clone(),
                new_name: column.clone(),
            },
            Self::AddTable { table } => Self::DropTable {
                table: table.clone(),
            },
            Self::RenameTable { table, new_name } => Self::RenameTable {
                table: new_name.clone(),
                new_name: table.clone(),
            },
            Self::DropColumn { .. } | Self::DropTable { .. } => return None,
        };
        inverse.build_ddl().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_uses_kebab_case_tags() {
        let op = SchemaChange::AddColumn {
            table: "users".to_string(),
            column: "age".to_string(),
            db_type: DbType::Integer,
            foreign_key: None,
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["type"], "add-column");
        assert_eq!(json["db_type"], "INTEGER");

        let parsed: SchemaChange = serde_json::from_value(serde_json::json!({
            "type": "rename-column",
            "table": "users",
            "column": "age",
            "new_name": "years",
        }))
        .unwrap();
        assert_eq!(
            parsed,
            SchemaChange::RenameColumn {
                table: "users".to_string(),
                column: "age".to_string(),
                new_name: "years".to_string(),
            }
        );
    }

    #[test]
    fn ddl_rendering() {
        let add = SchemaChange::AddColumn {
            table: "users".to_string(),
            column: "age".to_string(),
            db_type: DbType::Integer,
            foreign_key: None,
        };
        assert_eq!(
            add.build_ddl().unwrap(),
            "ALTER TABLE \"users\" ADD COLUMN \"age\" INTEGER"
        );
        assert_eq!(
            add.inverse_ddl().unwrap(),
            "ALTER TABLE \"users\" DROP COLUMN \"age\""
        );

        let add_fk = SchemaChange::AddColumn {
            table: "posts".to_string(),
            column: "author_id".to_string(),
            db_type: DbType::Integer,
            foreign_key: Some(ForeignKeyRef {
                table: "users".to_string(),
                column: "_id".to_string(),
                on_update: None,
                on_delete: Some("CASCADE".to_string()),
            }),
        };
        assert_eq!(
            add_fk.build_ddl().unwrap(),
            "ALTER TABLE \"posts\" ADD COLUMN \"author_id\" INTEGER REFERENCES \"users\"(\"_id\") ON DELETE CASCADE"
        );

        let add_table = SchemaChange::AddTable {
            table: "events".to_string(),
        };
        assert_eq!(
            add_table.build_ddl().unwrap(),
            "CREATE TABLE \"events\" (\"_id\" INTEGER PRIMARY KEY AUTOINCREMENT)"
        );
        assert_eq!(add_table.inverse_ddl().unwrap(), "DROP TABLE \"events\"");
    }

    #[test]
    fn drops_have_no_inverse() {
        assert!(SchemaChange::DropTable {
            table: "users".to_string()
        }
        .inverse_ddl()
        .is_none());
        assert!(SchemaChange::DropColumn {
            table: "users".to_string(),
            column: "age".to_string()
        }
        .inverse_ddl()
        .is_none());
    }

    #[test]
    fn hostile_identifiers_are_rejected() {
        let op = SchemaChange::AddTable {
            table: "users; DROP TABLE users".to_string(),
        };
        assert!(matches!(
            op.build_ddl(),
            Err(SchemaError::InvalidIdentifier(_))
        ));
    }
}
