//! Per-datastore SQLite files.
//!
//! One embedded database file per datastore, opened through a process-wide
//! pool ([`DatastorePool`]), introspected into the shared snapshot shape,
//! mutated by the schema-change transactor, and queried/edited through the
//! row-operation surface.

mod change;
mod introspect;
mod pool;
mod rows;
mod value;

pub use change::apply_schema_change;
pub use introspect::introspect;
pub use pool::DatastorePool;
pub use rows::{
    delete_rows, insert_rows, select_rows, update_rows, DeleteResult, InsertResult, Pagination,
    SelectResult, UpdateResult,
};
pub use value::row_to_json;

/// Rowid pseudo-column exposed to callers. External mutators reference rows
/// exclusively through it.
pub const ROWID_COLUMN: &str = "_rowid";
