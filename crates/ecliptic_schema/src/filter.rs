//! Row filter and sort inputs for the row-operation surface.

use serde::{Deserialize, Serialize};

/// Comparison operator of one WHERE filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    In,
    IsNull,
    IsNotNull,
}

impl FilterOp {
    /// SQL operator fragment. `in` and the null checks are rendered
    /// separately by the filter builder.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Like => "LIKE",
            Self::In => "IN",
            Self::IsNull => "IS NULL",
            Self::IsNotNull => "IS NOT NULL",
        }
    }
}

/// One WHERE filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub op: FilterOp,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Sort direction, ascending by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One ORDER BY term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_ops_deserialize_from_snake_case() {
        let filter: RowFilter =
            serde_json::from_str(r#"{"column":"age","op":"gte","value":21}"#).unwrap();
        assert_eq!(filter.op, FilterOp::Gte);
        assert_eq!(filter.value, serde_json::json!(21));

        let null_check: RowFilter =
            serde_json::from_str(r#"{"column":"email","op":"is_not_null"}"#).unwrap();
        assert_eq!(null_check.op, FilterOp::IsNotNull);
        assert!(null_check.value.is_null());
    }

    #[test]
    fn sort_defaults_ascending() {
        let sort: SortSpec = serde_json::from_str(r#"{"column":"name"}"#).unwrap();
        assert_eq!(sort.direction, SortDirection::Asc);
    }
}
