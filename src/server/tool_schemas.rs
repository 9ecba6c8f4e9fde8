use rmcp::model::Content;
use serde_json::json;
use std::sync::Arc;

pub(crate) fn sqlite_analyze_query_schema() -> Arc<serde_json::Map<String, serde_json::Value>> {
    Arc::new(rmcp::model::object(json!({
        "type": "object",
        "properties": {
            "sql": {
                "type": "string",
                "description": "The SELECT statement to analyze. It is compiled with EXPLAIN, never executed."
            },
            "suggest_index": {
                "type": "boolean",
                "description": "Include a CREATE INDEX suggestion for each table with filter/sort columns but no covering index (default: server setting, normally true)."
            }
        },
        "required": ["sql"]
    })))
}

pub(crate) fn sqlite_explain_schema() -> Arc<serde_json::Map<String, serde_json::Value>> {
    Arc::new(rmcp::model::object(json!({
        "type": "object",
        "properties": {
            "sql": {
                "type": "string",
                "description": "The SELECT statement to explain"
            }
        },
        "required": ["sql"]
    })))
}

pub(crate) fn sqlite_schema_info_schema() -> Arc<serde_json::Map<String, serde_json::Value>> {
    Arc::new(rmcp::model::object(json!({
        "type": "object",
        "properties": {
            "table": { "type": "string", "description": "Table name (case-insensitive)" },
            "refresh": {
                "type": "boolean",
                "description": "Drop the cached schema snapshot before reading (default: false)"
            }
        },
        "required": ["table"]
    })))
}

/// Serialize a JSON value to pretty-printed text and wrap in a successful CallToolResult.
/// Returns a CallToolResult::error on serialization failure.
pub(crate) fn serialize_response(value: &serde_json::Value) -> rmcp::model::CallToolResult {
    match serde_json::to_string_pretty(value) {
        Ok(s) => rmcp::model::CallToolResult::success(vec![Content::text(s)]),
        Err(e) => {
            tracing::error!("Failed to serialize response: {}", e);
            rmcp::model::CallToolResult::error(vec![Content::text(format!(
                "Internal error: failed to serialize response: {}",
                e
            ))])
        }
    }
}
