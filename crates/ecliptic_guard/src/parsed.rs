//! In-memory projection of one MCP key's permission mappings.

use std::collections::{HashMap, HashSet};

use ecliptic_schema::{Action, ActionScope, TargetPath};
use tracing::warn;

/// Grants scoped to one named table.
#[derive(Debug, Clone, Default)]
pub struct TablePermissions {
    /// Table actions for this named table.
    pub actions: HashSet<Action>,
    /// Column actions over `column:*` of this table.
    pub all_columns: HashSet<Action>,
    /// Column actions per named column.
    pub columns: HashMap<String, HashSet<Action>>,
}

/// Grants scoped to one named datastore.
#[derive(Debug, Clone, Default)]
pub struct DatastorePermissions {
    /// Datastore actions for this datastore.
    pub actions: HashSet<Action>,
    /// Table actions over `table:*` of this datastore.
    pub all_tables: HashSet<Action>,
    /// Column actions over `table:*.column:*` of this datastore.
    pub all_columns: HashSet<Action>,
    /// Per named table.
    pub tables: HashMap<String, TablePermissions>,
}

/// Parsed permission set, organized for O(1) hierarchical lookup.
///
/// Evaluation order is exact leaf first, then the enclosing wildcard levels:
/// named column, the table's `column:*`, the datastore's wildcards, and
/// finally the global wildcards.
#[derive(Debug, Clone, Default)]
pub struct ParsedPermissions {
    /// Global actions (from any target, e.g. `datastore.create`).
    pub global: HashSet<Action>,
    /// Datastore actions from `datastore:*`.
    pub all_datastores: HashSet<Action>,
    /// Table actions from `datastore:*.table:*`.
    pub all_tables: HashSet<Action>,
    /// Column actions from `datastore:*.table:*.column:*`.
    pub all_columns: HashSet<Action>,
    /// Per named datastore.
    pub datastores: HashMap<String, DatastorePermissions>,
}

impl ParsedPermissions {
    /// Project `(action, target)` pairs into the lookup structure.
    ///
    /// Pairs that fail to parse are skipped with a warning; a malformed
    /// mapping row must never widen or narrow the rest of the set.
    pub fn from_mappings<A, T>(mappings: impl IntoIterator<Item = (A, T)>) -> Self
    where
        A: AsRef<str>,
        T: AsRef<str>,
    {
        let mut parsed = Self::default();
        for (action_raw, target_raw) in mappings {
            let action = match Action::parse(action_raw.as_ref()) {
                Ok(action) => action,
                Err(err) => {
                    warn!(action = action_raw.as_ref(), %err, "skipping mapping");
                    continue;
                }
            };
            let target = match TargetPath::parse(target_raw.as_ref()) {
                Ok(target) => target,
                Err(err) => {
                    warn!(path = target_raw.as_ref(), %err, "skipping mapping");
                    continue;
                }
            };
            parsed.insert(action, &target);
        }
        parsed
    }

    fn insert(&mut self, action: Action, target: &TargetPath) {
        if action.scope() == ActionScope::Global {
            self.global.insert(action);
            return;
        }

        let wildcard_ds = target.datastore == "*";
        match (&target.table, &target.column) {
            (None, _) => {
                if wildcard_ds {
                    self.all_datastores.insert(action);
                } else {
                    self.datastore_mut(&target.datastore).actions.insert(action);
                }
            }
            (Some(table), None) => match (wildcard_ds, table.as_str()) {
                (true, "*") => {
                    self.all_tables.insert(action);
                }
                (true, _) => {
                    // Named table under every datastore has no lookup slot.
                    warn!(path = %target, "unsupported wildcard shape, skipping");
                }
                (false, "*") => {
                    self.datastore_mut(&target.datastore)
                        .all_tables
                        .insert(action);
                }
                (false, _) => {
                    self.table_mut(&target.datastore, table).actions.insert(action);
                }
            },
            (Some(table), Some(column)) => {
                match (wildcard_ds, table.as_str(), column.as_str()) {
                    (true, "*", "*") => {
                        self.all_columns.insert(action);
                    }
                    (false, "*", "*") => {
                        self.datastore_mut(&target.datastore)
                            .all_columns
                            .insert(action);
                    }
                    (false, "*", _) | (true, _, _) => {
                        warn!(path = %target, "unsupported wildcard shape, skipping");
                    }
                    (false, _, "*") => {
                        self.table_mut(&target.datastore, table)
                            .all_columns
                            .insert(action);
                    }
                    (false, _, _) => {
                        self.table_mut(&target.datastore, table)
                            .columns
                            .entry(column.clone())
                            .or_default()
                            .insert(action);
                    }
                }
            }
        }
    }

    fn datastore_mut(&mut self, datastore: &str) -> &mut DatastorePermissions {
        self.datastores.entry(datastore.to_string()).or_default()
    }

    fn table_mut(&mut self, datastore: &str, table: &str) -> &mut TablePermissions {
        self.datastore_mut(datastore)
            .tables
            .entry(table.to_string())
            .or_default()
    }

    /// Whether a global action is granted.
    pub fn grants_global(&self, action: Action) -> bool {
        self.global.contains(&action)
    }

    /// Whether a datastore action is granted on `datastore`.
    pub fn grants_datastore(&self, action: Action, datastore: &str) -> bool {
        if let Some(ds) = self.datastores.get(datastore) {
            if ds.actions.contains(&action) {
                return true;
            }
        }
        self.all_datastores.contains(&action)
    }

    /// Whether a table action is granted on `(datastore, table)`.
    pub fn grants_table(&self, action: Action, datastore: &str, table: &str) -> bool {
        if let Some(ds) = self.datastores.get(datastore) {
            if let Some(t) = ds.tables.get(table) {
                if t.actions.contains(&action) {
                    return true;
                }
            }
            if ds.all_tables.contains(&action) {
                return true;
            }
        }
        self.all_tables.contains(&action)
    }

    /// Whether a column action is granted on `(datastore, table, column)`.
    pub fn grants_column(
        &self,
        action: Action,
        datastore: &str,
        table: &str,
        column: &str,
    ) -> bool {
        if let Some(ds) = self.datastores.get(datastore) {
            if let Some(t) = ds.tables.get(table) {
                if let Some(c) = t.columns.get(column) {
                    if c.contains(&action) {
                        return true;
                    }
                }
                if t.all_columns.contains(&action) {
                    return true;
                }
            }
            if ds.all_columns.contains(&action) {
                return true;
            }
        }
        self.all_columns.contains(&action)
    }

    /// Dispatch on the action's scope.
    pub fn grants(
        &self,
        action: Action,
        datastore: &str,
        table: Option<&str>,
        column: Option<&str>,
    ) -> bool {
        match action.scope() {
            ActionScope::Global => self.grants_global(action),
            ActionScope::Datastore => self.grants_datastore(action, datastore),
            ActionScope::Table => table
                .map(|t| self.grants_table(action, datastore, t))
                .unwrap_or(false),
            ActionScope::Column => match (table, column) {
                (Some(t), Some(c)) => self.grants_column(action, datastore, t, c),
                _ => false,
            },
        }
    }
}
