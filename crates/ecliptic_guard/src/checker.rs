//! SQL access checker.
//!
//! Parses arbitrary SQL (SQLite dialect), decomposes each statement into the
//! `(table, column, action)` claims it makes, and intersects those claims
//! with a parsed permission set. Schema-changing statements additionally
//! yield the typed operation that drives the schema-change transactor - the
//! operation is extracted whether or not the statement is allowed, so the
//! caller can log exactly what was attempted.

use ecliptic_schema::{
    Action, DbType, ForeignKeyRef, SchemaChange, SchemaSnapshot,
};
use serde::Serialize;
use sqlparser::ast::{
    AlterTableOperation, AssignmentTarget, ColumnDef, ColumnOption, Expr, FromTable,
    FunctionArg, FunctionArgExpr, FunctionArguments, GroupByExpr, JoinConstraint, JoinOperator,
    ObjectName, ObjectType, Query, Select, SelectItem, SetExpr, Statement, TableFactor,
    TableWithJoins,
};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use crate::parsed::ParsedPermissions;

/// Classification of one checked statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatementKind {
    /// A SELECT (paginatable by the tool surface).
    Select,
    /// Any other non-DDL statement, including unparseable input.
    Dml,
    /// Schema-changing statement with its typed operation.
    Ddl { operation: SchemaChange },
}

/// Per-statement check result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlCheck {
    pub allowed: bool,
    #[serde(flatten)]
    pub kind: StatementKind,
    /// Regenerated statement text, executable on its own.
    pub sql: String,
}

impl SqlCheck {
    pub fn is_ddl(&self) -> bool {
        matches!(self.kind, StatementKind::Ddl { .. })
    }

    pub fn operation(&self) -> Option<&SchemaChange> {
        match &self.kind {
            StatementKind::Ddl { operation } => Some(operation),
            _ => None,
        }
    }
}

/// Check every statement in `sql` against `perms` for `datastore_id`.
///
/// Statements are independent: one denied statement does not change the
/// result of its neighbors. The outer gate is responsible for refusing to
/// execute anything unless every result is allowed. Input that fails to
/// parse yields a single denied result.
pub fn check_sql(
    sql: &str,
    perms: &ParsedPermissions,
    datastore_id: &str,
    snapshot: &SchemaSnapshot,
) -> Vec<SqlCheck> {
    let statements = match Parser::parse_sql(&SQLiteDialect {}, sql) {
        Ok(statements) => statements,
        Err(err) => {
            debug!(%err, "sql parse failed, denying");
            return vec![SqlCheck {
                allowed: false,
                kind: StatementKind::Dml,
                sql: sql.to_string(),
            }];
        }
    };

    statements
        .iter()
        .map(|statement| check_statement(statement, perms, datastore_id, snapshot))
        .collect()
}

fn check_statement(
    statement: &Statement,
    perms: &ParsedPermissions,
    datastore_id: &str,
    snapshot: &SchemaSnapshot,
) -> SqlCheck {
    let sql = statement.to_string();
    match statement {
        Statement::Query(query) => {
            let mut claims = Claims::default();
            walk_query(query, snapshot, &mut claims, None, &[]);
            SqlCheck {
                allowed: claims.granted(perms, datastore_id),
                kind: StatementKind::Select,
                sql,
            }
        }
        Statement::Insert(insert) => {
            let mut claims = Claims::default();
            let table = object_name_tail(&insert.table_name);
            claims.table(Action::RowInsert, &table);
            let known = snapshot.has_table(&table);
            if !known {
                claims.deny();
            }

            if insert.columns.is_empty() {
                // Unlisted columns mean every schema column.
                if let Some(schema) = snapshot.table(&table) {
                    for column in schema.columns.keys() {
                        claims.column(Action::ColumnInsert, &table, column);
                    }
                }
            } else {
                for column in &insert.columns {
                    let name = column.value.clone();
                    if known
                        && snapshot
                            .table(&table)
                            .is_some_and(|t| t.column(&name).is_none())
                    {
                        claims.deny();
                    }
                    claims.column(Action::ColumnInsert, &table, &name);
                }
            }

            if let Some(source) = &insert.source {
                walk_query(source, snapshot, &mut claims, None, &[]);
            }

            SqlCheck {
                allowed: claims.granted(perms, datastore_id),
                kind: StatementKind::Dml,
                sql,
            }
        }
        Statement::Update {
            table,
            assignments,
            from,
            selection,
            ..
        } => {
            let mut claims = Claims::default();
            let mut scope = Scope::new(None);
            let target_table = relation_real_name(&table.relation);

            // The target enters the scope without a select claim: UPDATE
            // needs row.update on the table, not row.select.
            match &target_table {
                Some(table_name) => {
                    claims.table(Action::RowUpdate, table_name);
                    if !snapshot.has_table(table_name) {
                        claims.deny();
                    }
                    scope.entries.push(ScopeEntry {
                        name: relation_scope_name(&table.relation)
                            .unwrap_or_else(|| table_name.clone()),
                        real: Some(table_name.clone()),
                    });
                }
                None => claims.deny(),
            }

            if let Some(from) = from {
                collect_table_with_joins(from, snapshot, &mut claims, &mut scope, &[]);
            }

            for assignment in assignments {
                match (&assignment.target, &target_table) {
                    (AssignmentTarget::ColumnName(column), Some(table_name)) => {
                        let column = object_name_tail(column);
                        if snapshot
                            .table(table_name)
                            .is_some_and(|t| t.column(&column).is_none())
                        {
                            claims.deny();
                        }
                        claims.column(Action::ColumnUpdate, table_name, &column);
                    }
                    _ => claims.deny(),
                }
                walk_expr(&assignment.value, snapshot, &mut claims, &scope, &[]);
            }

            if let Some(selection) = selection {
                walk_expr(selection, snapshot, &mut claims, &scope, &[]);
            }

            SqlCheck {
                allowed: claims.granted(perms, datastore_id),
                kind: StatementKind::Dml,
                sql,
            }
        }
        Statement::Delete(delete) => {
            let mut claims = Claims::default();
            let mut scope = Scope::new(None);

            let relations: &[TableWithJoins] = match &delete.from {
                FromTable::WithFromKeyword(relations) => relations,
                FromTable::WithoutKeyword(relations) => relations,
            };
            // Delete targets claim row.delete, not row.select.
            for table_with_joins in relations {
                match relation_real_name(&table_with_joins.relation) {
                    Some(table_name) => {
                        claims.table(Action::RowDelete, &table_name);
                        if !snapshot.has_table(&table_name) {
                            claims.deny();
                        }
                        scope.entries.push(ScopeEntry {
                            name: relation_scope_name(&table_with_joins.relation)
                                .unwrap_or_else(|| table_name.clone()),
                            real: Some(table_name),
                        });
                    }
                    None => claims.deny(),
                }
                if !table_with_joins.joins.is_empty() {
                    claims.deny();
                }
            }
            if relations.is_empty() {
                claims.deny();
            }

            if let Some(using) = &delete.using {
                for table_with_joins in using {
                    collect_table_with_joins(
                        table_with_joins,
                        snapshot,
                        &mut claims,
                        &mut scope,
                        &[],
                    );
                }
            }

            if let Some(selection) = &delete.selection {
                walk_expr(selection, snapshot, &mut claims, &scope, &[]);
            }

            SqlCheck {
                allowed: claims.granted(perms, datastore_id),
                kind: StatementKind::Dml,
                sql,
            }
        }
        Statement::AlterTable {
            name, operations, ..
        } => check_alter_table(name, operations, perms, datastore_id, snapshot, sql),
        Statement::CreateTable(create) => {
            let table = object_name_tail(&create.name);
            let allowed = perms.grants_datastore(Action::TableCreate, datastore_id);
            SqlCheck {
                allowed,
                kind: StatementKind::Ddl {
                    operation: SchemaChange::AddTable { table },
                },
                sql,
            }
        }
        Statement::Drop {
            object_type: ObjectType::Table,
            names,
            ..
        } => {
            let Some(name) = names.first() else {
                return denied_dml(sql);
            };
            let table = object_name_tail(name);
            let allowed = snapshot.has_table(&table)
                && perms.grants_table(Action::TableDrop, datastore_id, &table);
            SqlCheck {
                allowed,
                kind: StatementKind::Ddl {
                    operation: SchemaChange::DropTable { table },
                },
                sql,
            }
        }
        // Everything else (PRAGMA, ATTACH, transactions, ...) is refused.
        _ => denied_dml(sql),
    }
}

fn denied_dml(sql: String) -> SqlCheck {
    SqlCheck {
        allowed: false,
        kind: StatementKind::Dml,
        sql,
    }
}

fn check_alter_table(
    name: &ObjectName,
    operations: &[AlterTableOperation],
    perms: &ParsedPermissions,
    datastore_id: &str,
    snapshot: &SchemaSnapshot,
    sql: String,
) -> SqlCheck {
    let table = object_name_tail(name);
    // SQLite accepts exactly one operation per ALTER TABLE.
    let [operation] = operations else {
        return denied_dml(sql);
    };

    let known = snapshot.has_table(&table);
    let schema_change_granted =
        known && perms.grants_table(Action::SchemaChange, datastore_id, &table);

    let (operation, allowed) = match operation {
        AlterTableOperation::AddColumn { column_def, .. } => {
            let Some(db_type) = parse_db_type(column_def) else {
                // Not one of the four storage classes; there is no operation
                // to extract.
                return denied_dml(sql);
            };
            let operation = SchemaChange::AddColumn {
                table: table.clone(),
                column: column_def.name.value.clone(),
                db_type,
                foreign_key: foreign_key_of(column_def),
            };
            (operation, schema_change_granted)
        }
        AlterTableOperation::DropColumn { column_name, .. } => {
            let column = column_name.value.clone();
            let allowed = schema_change_granted
                && perms.grants_column(Action::ColumnDrop, datastore_id, &table, &column);
            (
                SchemaChange::DropColumn {
                    table: table.clone(),
                    column,
                },
                allowed,
            )
        }
        AlterTableOperation::RenameColumn {
            old_column_name,
            new_column_name,
        } => {
            let column = old_column_name.value.clone();
            let allowed = schema_change_granted
                && perms.grants_column(Action::ColumnRename, datastore_id, &table, &column);
            (
                SchemaChange::RenameColumn {
                    table: table.clone(),
                    column,
                    new_name: new_column_name.value.clone(),
                },
                allowed,
            )
        }
        AlterTableOperation::RenameTable { table_name } => {
            let allowed = schema_change_granted
                && perms.grants_table(Action::TableRename, datastore_id, &table);
            (
                SchemaChange::RenameTable {
                    table: table.clone(),
                    new_name: object_name_tail(table_name),
                },
                allowed,
            )
        }
        _ => return denied_dml(sql),
    };

    SqlCheck {
        allowed,
        kind: StatementKind::Ddl { operation },
        sql,
    }
}

/// Column types accepted in DDL: the four canonical storage class names.
fn parse_db_type(column_def: &ColumnDef) -> Option<DbType> {
    DbType::parse(&column_def.data_type.to_string().to_ascii_uppercase())
}

fn foreign_key_of(column_def: &ColumnDef) -> Option<ForeignKeyRef> {
    for option in &column_def.options {
        if let ColumnOption::ForeignKey {
            foreign_table,
            referred_columns,
            on_delete,
            on_update,
            ..
        } = &option.option
        {
            return Some(ForeignKeyRef {
                table: object_name_tail(foreign_table),
                column: referred_columns
                    .first()
                    .map(|c| c.value.clone())
                    .unwrap_or_else(|| "_id".to_string()),
                on_update: on_update.as_ref().map(|a| a.to_string()),
                on_delete: on_delete.as_ref().map(|a| a.to_string()),
            });
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Claim collection
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Claims {
    table_actions: Vec<(Action, String)>,
    column_actions: Vec<(Action, String, String)>,
    /// Set when the statement references something no permission could
    /// match: an unknown table or column, or an unresolvable name.
    unknown: bool,
}

impl Claims {
    fn table(&mut self, action: Action, table: &str) {
        self.table_actions.push((action, table.to_string()));
    }

    fn column(&mut self, action: Action, table: &str, column: &str) {
        self.column_actions
            .push((action, table.to_string(), column.to_string()));
    }

    fn deny(&mut self) {
        self.unknown = true;
    }

    fn granted(&self, perms: &ParsedPermissions, datastore_id: &str) -> bool {
        if self.unknown {
            return false;
        }
        self.table_actions
            .iter()
            .all(|(action, table)| perms.grants_table(*action, datastore_id, table))
            && self
                .column_actions
                .iter()
                .all(|(action, table, column)| {
                    perms.grants_column(*action, datastore_id, table, column)
                })
    }
}

/// One relation visible in a SELECT scope.
struct ScopeEntry {
    /// Name used for qualification: the alias when present, else the table
    /// name itself.
    name: String,
    /// Real table name; `None` for derived tables and CTE references.
    real: Option<String>,
}

/// Name scope of one SELECT, chained to the enclosing scope so correlated
/// subqueries resolve outer references.
struct Scope<'a> {
    parent: Option<&'a Scope<'a>>,
    entries: Vec<ScopeEntry>,
}

enum Resolution {
    Real(String),
    Derived,
    Unknown,
}

impl<'a> Scope<'a> {
    fn new(parent: Option<&'a Scope<'a>>) -> Self {
        Self {
            parent,
            entries: Vec::new(),
        }
    }

    fn resolve_qualified(&self, qualifier: &str, column: &str, snapshot: &SchemaSnapshot) -> Resolution {
        for entry in &self.entries {
            if entry.name == qualifier {
                return match &entry.real {
                    Some(table) => {
                        let exists = snapshot
                            .table(table)
                            .is_some_and(|t| t.column(column).is_some());
                        if exists {
                            Resolution::Real(table.clone())
                        } else {
                            Resolution::Unknown
                        }
                    }
                    None => Resolution::Derived,
                };
            }
        }
        match self.parent {
            Some(parent) => parent.resolve_qualified(qualifier, column, snapshot),
            None => Resolution::Unknown,
        }
    }

    fn resolve_unqualified(&self, column: &str, snapshot: &SchemaSnapshot) -> Resolution {
        let mut derived_here = false;
        for entry in &self.entries {
            match &entry.real {
                Some(table) => {
                    if snapshot
                        .table(table)
                        .is_some_and(|t| t.column(column).is_some())
                    {
                        return Resolution::Real(table.clone());
                    }
                }
                None => derived_here = true,
            }
        }
        if derived_here {
            // Not in any real table at this level; attribute it to a derived
            // relation whose output columns were already claimed inside.
            return Resolution::Derived;
        }
        match self.parent {
            Some(parent) => parent.resolve_unqualified(column, snapshot),
            None => Resolution::Unknown,
        }
    }
}

fn object_name_tail(name: &ObjectName) -> String {
    name.0
        .last()
        .map(|ident| ident.value.clone())
        .unwrap_or_default()
}

fn relation_real_name(factor: &TableFactor) -> Option<String> {
    match factor {
        TableFactor::Table { name, .. } => Some(object_name_tail(name)),
        _ => None,
    }
}

fn relation_scope_name(factor: &TableFactor) -> Option<String> {
    match factor {
        TableFactor::Table { alias, .. } => alias.as_ref().map(|a| a.name.value.clone()),
        _ => None,
    }
}

fn walk_query(
    query: &Query,
    snapshot: &SchemaSnapshot,
    claims: &mut Claims,
    parent: Option<&Scope<'_>>,
    outer_ctes: &[String],
) {
    let mut ctes: Vec<String> = outer_ctes.to_vec();
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            if with.recursive {
                // A recursive CTE references its own name inside its body.
                let mut with_self = ctes.clone();
                with_self.push(cte.alias.name.value.clone());
                walk_query(&cte.query, snapshot, claims, parent, &with_self);
            } else {
                walk_query(&cte.query, snapshot, claims, parent, &ctes);
            }
            ctes.push(cte.alias.name.value.clone());
        }
    }

    walk_set_expr(&query.body, snapshot, claims, parent, &ctes, Some(query));
}

fn walk_set_expr(
    body: &SetExpr,
    snapshot: &SchemaSnapshot,
    claims: &mut Claims,
    parent: Option<&Scope<'_>>,
    ctes: &[String],
    enclosing: Option<&Query>,
) {
    match body {
        SetExpr::Select(select) => {
            walk_select(select, snapshot, claims, parent, ctes, enclosing);
        }
        SetExpr::Query(query) => walk_query(query, snapshot, claims, parent, ctes),
        SetExpr::SetOperation { left, right, .. } => {
            walk_set_expr(left, snapshot, claims, parent, ctes, None);
            walk_set_expr(right, snapshot, claims, parent, ctes, None);
        }
        SetExpr::Values(values) => {
            let scope = Scope::new(parent);
            for row in &values.rows {
                for expr in row {
                    walk_expr(expr, snapshot, claims, &scope, ctes);
                }
            }
        }
        _ => claims.deny(),
    }
}

fn walk_select(
    select: &Select,
    snapshot: &SchemaSnapshot,
    claims: &mut Claims,
    parent: Option<&Scope<'_>>,
    ctes: &[String],
    enclosing: Option<&Query>,
) {
    let mut scope = Scope::new(parent);
    for table_with_joins in &select.from {
        collect_table_with_joins(table_with_joins, snapshot, claims, &mut scope, ctes);
    }

    for item in &select.projection {
        match item {
            SelectItem::Wildcard(_) => expand_wildcard(&scope, None, snapshot, claims),
            SelectItem::QualifiedWildcard(name, _) => {
                expand_wildcard(&scope, Some(&object_name_tail(name)), snapshot, claims)
            }
            SelectItem::UnnamedExpr(expr) => walk_expr(expr, snapshot, claims, &scope, ctes),
            SelectItem::ExprWithAlias { expr, .. } => {
                walk_expr(expr, snapshot, claims, &scope, ctes)
            }
        }
    }

    // Join constraints reference columns of the joined tables.
    for table_with_joins in &select.from {
        for join in &table_with_joins.joins {
            match join_constraint(&join.join_operator) {
                Some(JoinConstraint::On(expr)) => {
                    walk_expr(expr, snapshot, claims, &scope, ctes)
                }
                Some(JoinConstraint::Using(columns)) => {
                    for column in columns {
                        claim_unqualified(&column.value, &scope, snapshot, claims);
                    }
                }
                _ => {}
            }
        }
    }

    if let Some(selection) = &select.selection {
        walk_expr(selection, snapshot, claims, &scope, ctes);
    }
    if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
        for expr in exprs {
            walk_expr(expr, snapshot, claims, &scope, ctes);
        }
    }
    if let Some(having) = &select.having {
        walk_expr(having, snapshot, claims, &scope, ctes);
    }

    // ORDER BY of the enclosing query resolves in this select's scope.
    if let Some(query) = enclosing {
        if let Some(order_by) = &query.order_by {
            for order in &order_by.exprs {
                walk_expr(&order.expr, snapshot, claims, &scope, ctes);
            }
        }
    }
}

fn collect_table_with_joins(
    table_with_joins: &TableWithJoins,
    snapshot: &SchemaSnapshot,
    claims: &mut Claims,
    scope: &mut Scope<'_>,
    ctes: &[String],
) {
    collect_relation(&table_with_joins.relation, snapshot, claims, scope, ctes);
    for join in &table_with_joins.joins {
        collect_relation(&join.relation, snapshot, claims, scope, ctes);
    }
}

fn collect_relation(
    factor: &TableFactor,
    snapshot: &SchemaSnapshot,
    claims: &mut Claims,
    scope: &mut Scope<'_>,
    ctes: &[String],
) {
    match factor {
        TableFactor::Table { name, alias, .. } => {
            let table = object_name_tail(name);
            let scope_name = alias
                .as_ref()
                .map(|a| a.name.value.clone())
                .unwrap_or_else(|| table.clone());
            if ctes.iter().any(|cte| cte == &table) {
                scope.entries.push(ScopeEntry {
                    name: scope_name,
                    real: None,
                });
            } else {
                if !snapshot.has_table(&table) {
                    claims.deny();
                }
                claims.table(Action::RowSelect, &table);
                scope.entries.push(ScopeEntry {
                    name: scope_name,
                    real: Some(table),
                });
            }
        }
        TableFactor::Derived {
            subquery, alias, ..
        } => {
            walk_query(subquery, snapshot, claims, scope.parent, ctes);
            scope.entries.push(ScopeEntry {
                name: alias
                    .as_ref()
                    .map(|a| a.name.value.clone())
                    .unwrap_or_default(),
                real: None,
            });
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            collect_table_with_joins(table_with_joins, snapshot, claims, scope, ctes);
        }
        // Table functions and the rest have no permission surface here.
        _ => claims.deny(),
    }
}

fn expand_wildcard(
    scope: &Scope<'_>,
    qualifier: Option<&str>,
    snapshot: &SchemaSnapshot,
    claims: &mut Claims,
) {
    let mut matched = false;
    for entry in &scope.entries {
        if let Some(qualifier) = qualifier {
            if entry.name != qualifier {
                continue;
            }
        }
        matched = true;
        if let Some(table) = &entry.real {
            match snapshot.table(table) {
                Some(schema) => {
                    // `*` means every schema column of that table.
                    for column in schema.columns.keys() {
                        claims.column(Action::ColumnSelect, table, column);
                    }
                }
                None => claims.deny(),
            }
        }
    }
    if qualifier.is_some() && !matched {
        claims.deny();
    }
}

fn claim_unqualified(
    column: &str,
    scope: &Scope<'_>,
    snapshot: &SchemaSnapshot,
    claims: &mut Claims,
) {
    match scope.resolve_unqualified(column, snapshot) {
        Resolution::Real(table) => claims.column(Action::ColumnSelect, &table, column),
        Resolution::Derived => {}
        Resolution::Unknown => claims.deny(),
    }
}

fn join_constraint(operator: &JoinOperator) -> Option<&JoinConstraint> {
    match operator {
        JoinOperator::Inner(constraint)
        | JoinOperator::LeftOuter(constraint)
        | JoinOperator::RightOuter(constraint)
        | JoinOperator::FullOuter(constraint)
        | JoinOperator::LeftSemi(constraint)
        | JoinOperator::RightSemi(constraint)
        | JoinOperator::LeftAnti(constraint)
        | JoinOperator::RightAnti(constraint) => Some(constraint),
        _ => None,
    }
}

fn walk_expr(
    expr: &Expr,
    snapshot: &SchemaSnapshot,
    claims: &mut Claims,
    scope: &Scope<'_>,
    ctes: &[String],
) {
    match expr {
        Expr::Identifier(ident) => {
            claim_unqualified(&ident.value, scope, snapshot, claims);
        }
        Expr::CompoundIdentifier(idents) => {
            if idents.len() < 2 {
                claims.deny();
                return;
            }
            let qualifier = &idents[idents.len() - 2].value;
            let column = &idents[idents.len() - 1].value;
            match scope.resolve_qualified(qualifier, column, snapshot) {
                Resolution::Real(table) => claims.column(Action::ColumnSelect, &table, column),
                Resolution::Derived => {}
                Resolution::Unknown => claims.deny(),
            }
        }
        Expr::BinaryOp { left, right, .. } => {
            walk_expr(left, snapshot, claims, scope, ctes);
            walk_expr(right, snapshot, claims, scope, ctes);
        }
        Expr::UnaryOp { expr, .. }
        | Expr::Nested(expr)
        | Expr::IsNull(expr)
        | Expr::IsNotNull(expr)
        | Expr::IsTrue(expr)
        | Expr::IsNotTrue(expr)
        | Expr::IsFalse(expr)
        | Expr::IsNotFalse(expr)
        | Expr::Cast { expr, .. } => {
            walk_expr(expr, snapshot, claims, scope, ctes);
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            walk_expr(expr, snapshot, claims, scope, ctes);
            walk_expr(low, snapshot, claims, scope, ctes);
            walk_expr(high, snapshot, claims, scope, ctes);
        }
        Expr::Like { expr, pattern, .. }
        | Expr::ILike { expr, pattern, .. }
        | Expr::SimilarTo { expr, pattern, .. } => {
            walk_expr(expr, snapshot, claims, scope, ctes);
            walk_expr(pattern, snapshot, claims, scope, ctes);
        }
        Expr::InList { expr, list, .. } => {
            walk_expr(expr, snapshot, claims, scope, ctes);
            for item in list {
                walk_expr(item, snapshot, claims, scope, ctes);
            }
        }
        Expr::InSubquery { expr, subquery, .. } => {
            walk_expr(expr, snapshot, claims, scope, ctes);
            walk_query(subquery, snapshot, claims, Some(scope), ctes);
        }
        Expr::Subquery(subquery) | Expr::Exists { subquery, .. } => {
            walk_query(subquery, snapshot, claims, Some(scope), ctes);
        }
        Expr::Case {
            operand,
            conditions,
            results,
            else_result,
            ..
        } => {
            if let Some(operand) = operand {
                walk_expr(operand, snapshot, claims, scope, ctes);
            }
            for condition in conditions {
                walk_expr(condition, snapshot, claims, scope, ctes);
            }
            for result in results {
                walk_expr(result, snapshot, claims, scope, ctes);
            }
            if let Some(else_result) = else_result {
                walk_expr(else_result, snapshot, claims, scope, ctes);
            }
        }
        Expr::Function(function) => match &function.args {
            FunctionArguments::List(list) => {
                for arg in &list.args {
                    let arg_expr = match arg {
                        FunctionArg::Named { arg, .. } => arg,
                        FunctionArg::Unnamed(arg) => arg,
                    };
                    match arg_expr {
                        FunctionArgExpr::Expr(expr) => {
                            walk_expr(expr, snapshot, claims, scope, ctes)
                        }
                        // COUNT(*) touches rows, not named columns.
                        FunctionArgExpr::Wildcard
                        | FunctionArgExpr::QualifiedWildcard(_) => {}
                    }
                }
            }
            FunctionArguments::Subquery(subquery) => {
                walk_query(subquery, snapshot, claims, Some(scope), ctes);
            }
            FunctionArguments::None => {}
        },
        Expr::Tuple(exprs) => {
            for expr in exprs {
                walk_expr(expr, snapshot, claims, scope, ctes);
            }
        }
        // Literals and the remaining exotic forms carry no column references
        // we enforce on.
        _ => {}
    }
}
