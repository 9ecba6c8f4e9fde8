//! SQLite EXPLAIN bytecode analyzer and the MCP server around it.
//! The binary entry point lives in src/main.rs.

pub mod analyzer;
pub mod config;
pub mod db;
pub mod query;
pub mod schema;
pub mod server;
pub mod sql_parser;
#[cfg(test)]
pub mod test_helpers;
