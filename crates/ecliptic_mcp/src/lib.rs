//! MCP tool surface.
//!
//! JSON-RPC 2.0 over stdio. The server is bound to one MCP key; every tool
//! call resolves the key's grants fresh from the catalog and runs under the
//! resulting permission set.

pub mod protocol;
pub mod server;
pub mod tools;

pub use server::{KeyContext, McpServer, McpServerConfig};
