use std::str::FromStr;
use std::sync::Arc;
use anyhow::Result;
use tracing::info;

use sqlite_index_mcp::{config, db, server};

#[tokio::main]
async fn main() -> Result<()> {
    // Config loading warns with eprintln!, so it can run before tracing is up.
    let raw_config = config::merge::load_config()?;

    // stdout is the JSON-RPC transport; logs go to stderr only.
    let level = tracing::Level::from_str(&raw_config.monitoring.log_level)
        .unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
    info!("sqlite-index-mcp starting");

    raw_config.validate()?;
    let config = Arc::new(raw_config);
    info!("Configuration loaded");

    let db = Arc::new(db::DbPool::new(config.clone()).await?);

    let mcp_server = server::McpServer::new(config, db);
    info!("MCP server starting on stdio");
    mcp_server.run().await?;

    Ok(())
}
