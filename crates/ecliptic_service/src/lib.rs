//! Controllers and process state.
//!
//! One controller per user-facing operation. Each validates its inputs,
//! scopes every catalog access to the caller's active organization,
//! orchestrates the datastore layer under the rollback fabric, and returns a
//! result-pair. Controllers never panic across their boundary.

pub mod controllers;

mod ctx;
mod state;

pub use ctx::Ctx;
pub use state::{AppState, EclipticConfig};
