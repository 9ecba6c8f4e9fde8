use std::sync::Arc;
use anyhow::Result;
use rmcp::{
    ServerHandler, ServiceExt,
    model::{
        ServerInfo, ServerCapabilities, Implementation, ProtocolVersion,
        ListToolsResult, CallToolResult, CallToolRequestParams,
        Tool, PaginatedRequestParams,
        ErrorCode,
    },
    service::RequestContext,
    RoleServer,
    ErrorData as McpError,
    transport::stdio,
};

use crate::analyzer::{AnalysisUnit, AnalyzeError, AnalyzeOptions, Analyzer};
use crate::config::Config;
use crate::db::DbPool;
use crate::query::explain::SqliteExplainer;
use crate::schema::SchemaIntrospector;

pub(crate) mod error;
mod tool_schemas;
mod handlers;

use tool_schemas::*;

pub struct McpServer {
    pub config: Arc<Config>,
    pub db: Arc<DbPool>,
    pub introspector: Arc<SchemaIntrospector>,
    explainer: SqliteExplainer,
}

impl McpServer {
    pub fn new(config: Arc<Config>, db: Arc<DbPool>) -> Self {
        let introspector = Arc::new(SchemaIntrospector::new(
            db.pool().clone(),
            config.pool.cache_ttl_secs,
        ));
        let explainer = SqliteExplainer::new(
            db.pool().clone(),
            config.pool.query_timeout_ms,
            config.pool.max_retries,
        );
        Self { config, db, introspector, explainer }
    }

    pub async fn run(self) -> Result<()> {
        let service = self.serve(stdio()).await?;
        service.waiting().await?;
        Ok(())
    }

    /// Analyze `sql` against the current schema snapshot.
    pub async fn analyze(&self, sql: &str) -> Result<Vec<AnalysisUnit>, AnalyzeError> {
        let snapshot = self
            .introspector
            .snapshot()
            .await
            .map_err(AnalyzeError::Catalog)?;
        let options = AnalyzeOptions {
            analyze_subqueries: self.config.analyzer.analyze_subqueries,
        };
        Analyzer::new(snapshot.as_ref(), &self.explainer)
            .with_options(options)
            .analyze(sql)
            .await
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: "sqlite-index-mcp".to_string(),
                title: Some("SQLite Index Advisor".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                description: Some("Reads SQLite EXPLAIN bytecode to report per-table filter/sort columns and covering indexes".to_string()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Use sqlite_analyze_query to see which columns a SELECT filters and sorts on, per table and index, and whether an index covers them.".to_string()
            ),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        async move {
            let tools = vec![
                Tool::new(
                    "sqlite_analyze_query",
                    concat!(
                        "Analyze a SELECT without running it. ",
                        "Returns one unit per table or index the plan touches: where_columns, order_columns, ",
                        "where_expressions (reconstructed comparisons), used_indexes, and covering_index_name ",
                        "(empty when no index covers the filter+sort columns in order). ",
                        "Optional: suggestions (CREATE INDEX statements for tables without a covering index).",
                    ),
                    sqlite_analyze_query_schema(),
                ),
                Tool::new(
                    "sqlite_explain",
                    "Return the raw EXPLAIN opcode trace of a SELECT: addr, opcode, p1..p5, comment.",
                    sqlite_explain_schema(),
                ),
                Tool::new(
                    "sqlite_schema_info",
                    "Get columns, primary key, root page and indexes (with ordered columns) of a table. Pass refresh:true after schema changes.",
                    sqlite_schema_info_schema(),
                ),
            ];

            Ok(ListToolsResult {
                meta: None,
                tools,
                next_cursor: None,
            })
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            let args = request.arguments.unwrap_or_default();
            match request.name.as_ref() {
                "sqlite_analyze_query" => self.handle_analyze_query(args).await,
                "sqlite_explain"       => self.handle_explain(args).await,
                "sqlite_schema_info"   => self.handle_schema_info(args).await,
                name => Err(McpError::new(
                    ErrorCode::METHOD_NOT_FOUND,
                    format!("Unknown tool: {}", name),
                    None,
                )),
            }
        }
    }
}
