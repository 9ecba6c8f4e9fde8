use std::time::Instant;

use rmcp::model::{CallToolResult, Content};
use serde_json::json;

use super::tool_schemas::serialize_response;
use super::McpServer;
use crate::analyzer::covering::suggest_index_ddl;
use crate::query::explain::ExplainProvider;
use crate::sql_parser::parse_sql;
use crate::tool_error;

/// Maximum SQL statement length (1 MB).
const MAX_SQL_LEN: usize = 1_000_000;

/// Check that a SQL string is within the allowed length limit.
/// Returns `Err(CallToolResult)` with an error message when the limit is exceeded.
fn check_sql_length(sql: &str) -> Result<(), CallToolResult> {
    if sql.len() > MAX_SQL_LEN {
        Err(CallToolResult::error(vec![Content::text(format!(
            "SQL too large: {} bytes (max {} bytes / 1 MB)",
            sql.len(),
            MAX_SQL_LEN
        ))]))
    } else {
        Ok(())
    }
}

/// The `sql` argument, length-checked and restricted to SELECT.
fn select_argument(
    args: &serde_json::Map<String, serde_json::Value>,
    tool: &str,
) -> Result<String, CallToolResult> {
    let sql = match args.get("sql").and_then(|v| v.as_str()) {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => {
            return Err(CallToolResult::error(vec![Content::text(
                "Missing required argument: sql",
            )]))
        }
    };
    check_sql_length(&sql)?;
    let statement_type = parse_sql(&sql).map_err(|e| {
        CallToolResult::error(vec![Content::text(format!("SQL parse error: {}", e))])
    })?;
    if !statement_type.is_read_only() {
        return Err(CallToolResult::error(vec![Content::text(format!(
            "{} only supports SELECT statements, got: {}",
            tool,
            statement_type.name()
        ))]));
    }
    Ok(sql)
}

impl McpServer {
    // ------------------------------------------------------------------
    // Tool handler: sqlite_analyze_query
    // ------------------------------------------------------------------
    pub(crate) async fn handle_analyze_query(
        &self,
        args: serde_json::Map<String, serde_json::Value>,
    ) -> anyhow::Result<CallToolResult, rmcp::ErrorData> {
        let sql = match select_argument(&args, "sqlite_analyze_query") {
            Ok(s) => s,
            Err(e) => return Ok(e),
        };
        let suggest = args
            .get("suggest_index")
            .and_then(|v| v.as_bool())
            .unwrap_or(self.config.analyzer.suggest_covering);

        let started = Instant::now();
        let units = match self.analyze(&sql).await {
            Ok(units) => units,
            Err(e) => return tool_error!("{}", e),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(units = units.len(), elapsed_ms, "Analyzed query");

        let units_json = match serde_json::to_value(&units) {
            Ok(v) => v,
            Err(e) => return tool_error!("Internal error: failed to serialize units: {}", e),
        };
        let mut output = json!({
            "units": units_json,
            "analysis_time_ms": elapsed_ms,
        });
        if suggest {
            let suggestions: Vec<serde_json::Value> = units
                .iter()
                .filter_map(|u| {
                    suggest_index_ddl(u).map(|ddl| json!({ "table": u.name, "create_index": ddl }))
                })
                .collect();
            if !suggestions.is_empty() {
                output["suggestions"] = json!(suggestions);
            }
        }
        Ok(serialize_response(&output))
    }

    // ------------------------------------------------------------------
    // Tool handler: sqlite_explain
    // ------------------------------------------------------------------
    pub(crate) async fn handle_explain(
        &self,
        args: serde_json::Map<String, serde_json::Value>,
    ) -> anyhow::Result<CallToolResult, rmcp::ErrorData> {
        let sql = match select_argument(&args, "sqlite_explain") {
            Ok(s) => s,
            Err(e) => return Ok(e),
        };
        match self.explainer.explain(&sql).await {
            Ok(rows) => Ok(serialize_response(&json!({
                "row_count": rows.len(),
                "rows": rows,
                "note": "Bytecode only; the statement was not executed",
            }))),
            Err(e) => tool_error!("EXPLAIN failed: {:#}", e),
        }
    }

    // ------------------------------------------------------------------
    // Tool handler: sqlite_schema_info
    // ------------------------------------------------------------------
    pub(crate) async fn handle_schema_info(
        &self,
        args: serde_json::Map<String, serde_json::Value>,
    ) -> anyhow::Result<CallToolResult, rmcp::ErrorData> {
        let table = match args.get("table").and_then(|v| v.as_str()) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => return tool_error!("Missing required parameter: table"),
        };
        if args.get("refresh").and_then(|v| v.as_bool()).unwrap_or(false) {
            self.introspector.invalidate().await;
        }
        match self.introspector.table_info(&table).await {
            Ok(info) => Ok(serialize_response(&info)),
            Err(e) => tool_error!("Schema info error for '{}': {}", table, e),
        }
    }
}
