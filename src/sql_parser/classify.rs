use sqlparser::ast::Statement;
use sqlparser::dialect::SQLiteDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

use super::StatementType;

pub(super) fn classify_statement(stmt: &Statement) -> StatementType {
    match stmt {
        Statement::Query(_) => StatementType::Select,
        Statement::Insert(_) => StatementType::Insert,
        Statement::Update { .. } => StatementType::Update,
        Statement::Delete(_) => StatementType::Delete,
        Statement::CreateTable(_)
        | Statement::CreateIndex(_)
        | Statement::CreateView { .. }
        | Statement::CreateVirtualTable { .. } => StatementType::Create,
        Statement::AlterTable { .. } => StatementType::Alter,
        Statement::Drop { .. } => StatementType::Drop,
        Statement::Pragma { .. } => StatementType::Pragma,
        Statement::Explain { .. } | Statement::ExplainTable { .. } => StatementType::Explain,
        other => {
            let text = other.to_string();
            let keyword = text.split_whitespace().next().unwrap_or("UNKNOWN");
            StatementType::Other(keyword.to_ascii_uppercase())
        }
    }
}

/// First word of the statement, uppercased, skipping comments and
/// parentheses.
pub(super) fn leading_keyword(sql: &str) -> Option<String> {
    let dialect = SQLiteDialect {};
    let tokens = Tokenizer::new(&dialect, sql).tokenize().ok()?;
    tokens.into_iter().find_map(|t| match t {
        Token::Word(w) => Some(w.value.to_ascii_uppercase()),
        _ => None,
    })
}

pub(super) fn type_of_keyword(keyword: &str) -> StatementType {
    match keyword {
        "SELECT" | "WITH" | "VALUES" => StatementType::Select,
        "INSERT" | "REPLACE" => StatementType::Insert,
        "UPDATE" => StatementType::Update,
        "DELETE" => StatementType::Delete,
        "CREATE" => StatementType::Create,
        "ALTER" => StatementType::Alter,
        "DROP" => StatementType::Drop,
        "PRAGMA" => StatementType::Pragma,
        "EXPLAIN" => StatementType::Explain,
        other => StatementType::Other(other.to_string()),
    }
}
