//! The closed permission vocabulary and typed target paths.

use serde::{Deserialize, Serialize};

use crate::SchemaError;

/// Level a permission action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionScope {
    Global,
    Datastore,
    Table,
    Column,
}

macro_rules! actions {
    ($( $variant:ident => ($name:literal, $scope:ident) ),+ $(,)?) => {
        /// One verb of the closed permission vocabulary.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum Action {
            $( #[serde(rename = $name)] $variant, )+
        }

        impl Action {
            /// All actions, in vocabulary order.
            pub const ALL: &'static [Action] = &[ $( Action::$variant, )+ ];

            /// Dotted action name.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Action::$variant => $name, )+
                }
            }

            /// Parse a dotted action name.
            pub fn parse(name: &str) -> Result<Self, SchemaError> {
                match name {
                    $( $name => Ok(Action::$variant), )+
                    other => Err(SchemaError::UnknownAction(other.to_string())),
                }
            }

            /// Level the action applies to.
            pub fn scope(&self) -> ActionScope {
                match self {
                    $( Action::$variant => ActionScope::$scope, )+
                }
            }
        }
    };
}

actions! {
    DatastoreCreate => ("datastore.create", Global),
    DatastoreList => ("datastore.list", Datastore),
    DatastoreRename => ("datastore.rename", Datastore),
    DatastoreDrop => ("datastore.drop", Datastore),
    TableCreate => ("datastore.table.create", Datastore),
    TableList => ("datastore.table.list", Table),
    TableRename => ("datastore.table.rename", Table),
    TableDrop => ("datastore.table.drop", Table),
    SchemaChange => ("datastore.table.schema.change", Table),
    RowInsert => ("datastore.table.row.insert", Table),
    RowUpdate => ("datastore.table.row.update", Table),
    RowDelete => ("datastore.table.row.delete", Table),
    RowSelect => ("datastore.table.row.select", Table),
    ColumnRename => ("datastore.table.column.rename", Column),
    ColumnDrop => ("datastore.table.column.drop", Column),
    ColumnInsert => ("datastore.table.column.insert", Column),
    ColumnUpdate => ("datastore.table.column.update", Column),
    ColumnDelete => ("datastore.table.column.delete", Column),
    ColumnSelect => ("datastore.table.column.select", Column),
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of a permission target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetType {
    #[serde(rename = "datastore")]
    Datastore,
    #[serde(rename = "datastore.table")]
    Table,
    #[serde(rename = "datastore.table.column")]
    Column,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Datastore => "datastore",
            Self::Table => "datastore.table",
            Self::Column => "datastore.table.column",
        }
    }

    pub fn parse(name: &str) -> Result<Self, SchemaError> {
        match name {
            "datastore" => Ok(Self::Datastore),
            "datastore.table" => Ok(Self::Table),
            "datastore.table.column" => Ok(Self::Column),
            other => Err(SchemaError::InvalidTarget(other.to_string())),
        }
    }

    /// Whether an action may be attached to targets of this type.
    ///
    /// This is the static `allowedActionsByType` constraint; the catalog
    /// seeds it into a table and enforces it on every mapping insert.
    pub fn allows(&self, action: Action) -> bool {
        match self {
            // Global actions ride on the datastore wildcard target.
            Self::Datastore => matches!(
                action.scope(),
                ActionScope::Global | ActionScope::Datastore
            ),
            Self::Table => action.scope() == ActionScope::Table,
            Self::Column => action.scope() == ActionScope::Column,
        }
    }
}

impl std::fmt::Display for TargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, possibly-wildcarded permission target path.
///
/// Wire forms: `datastore:<id>`, `datastore:<id>.table:<name>`,
/// `datastore:<id>.table:<name>.column:<name>`. Any segment value may be the
/// literal `*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetPath {
    pub datastore: String,
    pub table: Option<String>,
    pub column: Option<String>,
}

impl TargetPath {
    pub fn datastore(id: impl Into<String>) -> Self {
        Self {
            datastore: id.into(),
            table: None,
            column: None,
        }
    }

    pub fn table(id: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            datastore: id.into(),
            table: Some(table.into()),
            column: None,
        }
    }

    pub fn column(
        id: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self {
            datastore: id.into(),
            table: Some(table.into()),
            column: Some(column.into()),
        }
    }

    pub fn target_type(&self) -> TargetType {
        match (&self.table, &self.column) {
            (None, _) => TargetType::Datastore,
            (Some(_), None) => TargetType::Table,
            (Some(_), Some(_)) => TargetType::Column,
        }
    }

    /// Parse the wire form.
    pub fn parse(path: &str) -> Result<Self, SchemaError> {
        let invalid = || SchemaError::InvalidTarget(path.to_string());

        let rest = path.strip_prefix("datastore:").ok_or_else(invalid)?;
        let (datastore, rest) = match rest.find(".table:") {
            Some(idx) => (&rest[..idx], Some(&rest[idx + ".table:".len()..])),
            None => (rest, None),
        };
        if datastore.is_empty() {
            return Err(invalid());
        }

        let (table, column) = match rest {
            None => (None, None),
            Some(rest) => match rest.find(".column:") {
                Some(idx) => (
                    Some(&rest[..idx]),
                    Some(&rest[idx + ".column:".len()..]),
                ),
                None => (Some(rest), None),
            },
        };
        if table.is_some_and(str::is_empty) || column.is_some_and(str::is_empty) {
            return Err(invalid());
        }

        Ok(Self {
            datastore: datastore.to_string(),
            table: table.map(str::to_string),
            column: column.map(str::to_string),
        })
    }
}

impl std::fmt::Display for TargetPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "datastore:{}", self.datastore)?;
        if let Some(table) = &self.table {
            write!(f, ".table:{table}")?;
        }
        if let Some(column) = &self.column {
            write!(f, ".column:{column}")?;
        }
        Ok(())
    }
}
