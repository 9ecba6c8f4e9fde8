use anyhow::{bail, Result};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

mod classify;

/// The type of SQL statement parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Alter,
    Drop,
    Pragma,
    /// EXPLAIN / EXPLAIN QUERY PLAN
    Explain,
    /// Other statements we don't explicitly categorize
    Other(String),
}

impl StatementType {
    /// Only plain queries are explained and analyzed.
    pub fn is_read_only(&self) -> bool {
        matches!(self, StatementType::Select)
    }

    /// Human-readable name for error messages
    pub fn name(&self) -> &str {
        match self {
            StatementType::Select => "SELECT",
            StatementType::Insert => "INSERT",
            StatementType::Update => "UPDATE",
            StatementType::Delete => "DELETE",
            StatementType::Create => "CREATE",
            StatementType::Alter => "ALTER",
            StatementType::Drop => "DROP",
            StatementType::Pragma => "PRAGMA",
            StatementType::Explain => "EXPLAIN",
            StatementType::Other(s) => s.as_str(),
        }
    }
}

/// Classify a single SQL statement.
///
/// SQLite accepts syntax sqlparser does not (`INDEXED BY`, some pragmas in
/// expressions), so a parse failure falls back to the leading keyword rather
/// than rejecting the statement. Empty input and multiple statements are
/// errors.
pub fn parse_sql(sql: &str) -> Result<StatementType> {
    let dialect = SQLiteDialect {};
    match Parser::parse_sql(&dialect, sql) {
        Ok(statements) => {
            if statements.is_empty() {
                bail!("Empty SQL statement");
            }
            if statements.len() > 1 {
                bail!("Multi-statement SQL is not supported. Send one statement at a time.");
            }
            Ok(classify::classify_statement(&statements[0]))
        }
        Err(e) => {
            let Some(keyword) = classify::leading_keyword(sql) else {
                bail!("Empty SQL statement");
            };
            tracing::debug!(error = %e, keyword = %keyword, "sqlparser rejected statement, classifying by keyword");
            Ok(classify::type_of_keyword(&keyword))
        }
    }
}
