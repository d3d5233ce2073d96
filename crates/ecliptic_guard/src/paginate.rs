//! AST-driven pagination rewrite for SELECT statements.

use sqlparser::ast::{Expr, Offset, OffsetRows, Statement, Value};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

fn number(n: i64) -> Expr {
    Expr::Value(Value::Number(n.to_string(), false))
}

/// Set (or replace) LIMIT/OFFSET on a single SELECT statement.
///
/// Non-SELECT statements, multi-statement input, and unparseable input pass
/// through unchanged; the checker has already decided what may execute.
pub fn apply_pagination(sql: &str, limit: i64, offset: i64) -> String {
    let mut statements = match Parser::parse_sql(&SQLiteDialect {}, sql) {
        Ok(statements) => statements,
        Err(_) => return sql.to_string(),
    };
    if statements.len() != 1 {
        return sql.to_string();
    }

    if let Statement::Query(query) = &mut statements[0] {
        query.limit = Some(number(limit));
        query.offset = Some(Offset {
            value: number(offset),
            rows: OffsetRows::None,
        });
        return statements[0].to_string();
    }

    sql.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_limit_and_offset() {
        assert_eq!(
            apply_pagination("SELECT * FROM users", 10, 0),
            "SELECT * FROM users LIMIT 10 OFFSET 0"
        );
    }

    #[test]
    fn replaces_existing_limit_and_offset() {
        assert_eq!(
            apply_pagination("SELECT * FROM users LIMIT 500 OFFSET 90", 25, 50),
            "SELECT * FROM users LIMIT 25 OFFSET 50"
        );
    }

    #[test]
    fn keeps_order_by_in_place() {
        assert_eq!(
            apply_pagination("SELECT name FROM users ORDER BY name DESC", 5, 10),
            "SELECT name FROM users ORDER BY name DESC LIMIT 5 OFFSET 10"
        );
    }

    #[test]
    fn non_select_passes_through() {
        for sql in [
            "INSERT INTO users (name) VALUES ('x')",
            "UPDATE users SET name = 'y'",
            "DELETE FROM users",
            "ALTER TABLE users ADD COLUMN age INTEGER",
            "not sql at all",
        ] {
            assert_eq!(apply_pagination(sql, 10, 0), sql);
        }
    }
}
