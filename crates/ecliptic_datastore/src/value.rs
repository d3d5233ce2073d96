//! JSON value binding and row decoding against the dynamic schema.

use ecliptic_fault::{ErrorEntry, Result};
use ecliptic_schema::DbType;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

pub(crate) type JsonMap = Map<String, Value>;
pub(crate) type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>>;

/// A JSON scalar lowered to an engine value.
#[derive(Debug, Clone)]
pub(crate) enum Bound {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
}

impl Bound {
    /// Lower a JSON scalar without a declared type (filter values).
    pub(crate) fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Int(*b as i64)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Real(f))
                } else {
                    Err(value_error(value))
                }
            }
            Value::String(s) => Ok(Self::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => Err(value_error(value)),
        }
    }

    /// Lower a JSON scalar into a declared column type. Rejects values that
    /// do not coerce.
    pub(crate) fn from_json_typed(db_type: DbType, value: &Value) -> Result<Self> {
        let bound = match (db_type, value) {
            (_, Value::Null) => Self::Null,
            (DbType::Integer, Value::Bool(b)) => Self::Int(*b as i64),
            (DbType::Integer, Value::Number(n)) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => return Err(coercion_error(db_type, value)),
            },
            (DbType::Real, Value::Number(n)) => match n.as_f64() {
                Some(f) => Self::Real(f),
                None => return Err(coercion_error(db_type, value)),
            },
            (DbType::Text, Value::String(s)) | (DbType::Blob, Value::String(s)) => {
                Self::Text(s.clone())
            }
            _ => return Err(coercion_error(db_type, value)),
        };
        Ok(bound)
    }

    pub(crate) fn bind<'q>(self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        match self {
            Self::Null => query.bind(None::<String>),
            Self::Int(i) => query.bind(i),
            Self::Real(f) => query.bind(f),
            Self::Text(s) => query.bind(s),
        }
    }
}

fn value_error(value: &Value) -> ErrorEntry {
    ErrorEntry::bad_request(
        "row.value_invalid",
        format!("value {value} cannot be bound"),
    )
    .with_external("en", "Value cannot be stored")
}

fn coercion_error(db_type: DbType, value: &Value) -> ErrorEntry {
    ErrorEntry::bad_request(
        "row.value_type_mismatch",
        format!("value {value} is not coercible to {}", db_type.as_sql()),
    )
    .with_external("en", "Value does not match the column type")
    .with_external("de", "Wert passt nicht zum Spaltentyp")
}

/// Decode one engine row into a JSON object keyed by column name.
pub fn row_to_json(row: &SqliteRow) -> Result<Map<String, Value>> {
    let mut out = Map::with_capacity(row.columns().len());
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" => Value::from(row.try_get::<i64, _>(i)?),
                "REAL" => Value::from(row.try_get::<f64, _>(i)?),
                "BLOB" => Value::String(hex::encode(row.try_get::<Vec<u8>, _>(i)?)),
                _ => Value::String(row.try_get::<String, _>(i)?),
            }
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_coercion() {
        assert!(Bound::from_json_typed(DbType::Integer, &json!(42)).is_ok());
        assert!(Bound::from_json_typed(DbType::Integer, &json!(true)).is_ok());
        assert!(Bound::from_json_typed(DbType::Integer, &json!(1.5)).is_err());
        assert!(Bound::from_json_typed(DbType::Integer, &json!("42")).is_err());
        assert!(Bound::from_json_typed(DbType::Real, &json!(1.5)).is_ok());
        assert!(Bound::from_json_typed(DbType::Real, &json!(2)).is_ok());
        assert!(Bound::from_json_typed(DbType::Text, &json!("hi")).is_ok());
        assert!(Bound::from_json_typed(DbType::Text, &json!(7)).is_err());
        assert!(Bound::from_json_typed(DbType::Blob, &json!([1, 2])).is_err());
        assert!(Bound::from_json_typed(DbType::Text, &Value::Null).is_ok());
    }

    #[test]
    fn untyped_rejects_compounds() {
        assert!(Bound::from_json(&json!({"a": 1})).is_err());
        assert!(Bound::from_json(&json!([1])).is_err());
        assert!(Bound::from_json(&json!("x")).is_ok());
    }
}
