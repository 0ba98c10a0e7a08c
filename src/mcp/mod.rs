//! MCP (Model Context Protocol) server module.
//!
//! Exposes the C++ index queries as tools over JSON-RPC 2.0 on STDIO.

pub mod server;
pub mod tools;
pub mod types;
