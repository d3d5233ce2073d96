//! Shared contracts for Ecliptic.
//!
//! These types are the single source of truth across the catalog, the
//! datastore layer, the permission checker, and the tool surface: the schema
//! snapshot shape, the typed schema-change operations, row filter inputs,
//! identifier validation, and the closed permission vocabulary.

mod change;
mod filter;
mod ident;
mod permission;
mod snapshot;

pub use change::SchemaChange;
pub use filter::{FilterOp, RowFilter, SortDirection, SortSpec};
pub use ident::{ensure_identifier, escape_like, is_valid_identifier, quote_identifier};
pub use permission::{Action, ActionScope, TargetPath, TargetType};
pub use snapshot::{ColumnSchema, DbType, ForeignKeyRef, SchemaSnapshot, TableSchema};

use thiserror::Error;

/// Errors from contract-level validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Table or column name failed the strict identifier rule.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Permission target path could not be parsed.
    #[error("invalid permission target: {0}")]
    InvalidTarget(String),

    /// Action name outside the closed vocabulary.
    #[error("unknown permission action: {0}")]
    UnknownAction(String),
}
