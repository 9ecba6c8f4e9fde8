//! Best-effort lexical fallbacks over SQL text.
//!
//! These are token-level pattern matches, not a parser. They recover what
//! the bytecode cannot tell apart: table aliases, the textual ORDER BY list,
//! `IS [NOT] NULL` tests, and parenthesized sub-selects. Anything they do
//! not understand yields an empty answer.

use sqlparser::dialect::SQLiteDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Word};

/// Words that are never a table name, alias or column name.
const RESERVED_WORDS: &[&str] = &[
    "WHERE", "JOIN", "ON", "USING", "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS",
    "NATURAL", "ORDER", "GROUP", "BY", "HAVING", "LIMIT", "OFFSET", "UNION", "EXCEPT",
    "INTERSECT", "WINDOW", "INDEXED", "FROM", "AS", "SELECT", "VALUES", "AND", "OR", "NOT",
    "IS", "ISNULL", "NOTNULL", "NULL", "IN", "LIKE", "GLOB", "BETWEEN", "EXISTS", "CASE",
    "WHEN", "THEN", "ELSE", "END", "ASC", "DESC", "COLLATE", "NULLS",
];

/// A possibly qualified column reference: `col` or `qualifier.col`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectItem {
    /// The column the item reads, when the item is a bare column reference.
    pub column: Option<ColumnRef>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NullTest {
    pub column: ColumnRef,
    pub negated: bool,
}

/// Significant tokens of `sql` (whitespace and comments dropped). A
/// statement the tokenizer rejects has no tokens.
pub fn tokenize(sql: &str) -> Vec<Token> {
    let dialect = SQLiteDialect {};
    match Tokenizer::new(&dialect, sql).with_unescape(false).tokenize() {
        Ok(tokens) => tokens
            .into_iter()
            .filter(|t| !matches!(t, Token::Whitespace(_) | Token::EOF))
            .collect(),
        Err(e) => {
            tracing::debug!(error = %e, "SQL text did not tokenize; lexical fallbacks disabled");
            Vec::new()
        }
    }
}

/// Render tokens back to SQL separated by single spaces.
pub fn render(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical spelling of a statement: its tokens joined by single spaces.
/// Sub-select text produced by [`subselect_spans`] is already in this form.
pub fn normalize(sql: &str) -> String {
    render(&tokenize(sql))
}

fn as_word(token: &Token) -> Option<&Word> {
    match token {
        Token::Word(w) => Some(w),
        _ => None,
    }
}

/// Unquoted word equal to `keyword`, ignoring case.
fn is_keyword(token: &Token, keyword: &str) -> bool {
    as_word(token).is_some_and(|w| w.quote_style.is_none() && w.value.eq_ignore_ascii_case(keyword))
}

fn is_reserved(token: &Token) -> bool {
    RESERVED_WORDS.iter().any(|k| is_keyword(token, k))
}

/// An identifier usable as a name or alias.
fn identifier(token: &Token) -> Option<String> {
    let w = as_word(token)?;
    if w.quote_style.is_none() && is_reserved(token) {
        return None;
    }
    Some(w.value.clone())
}

/// Position of the `)` closing the `(` at `open`.
fn matching_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (pos, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(pos);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parenthesis depth before each token.
fn depths(tokens: &[Token]) -> Vec<usize> {
    let mut depth = 0usize;
    tokens
        .iter()
        .map(|t| {
            let before = depth;
            match t {
                Token::LParen => depth += 1,
                Token::RParen => depth = depth.saturating_sub(1),
                _ => {}
            }
            before
        })
        .collect()
}

/// Every maximal parenthesized span that starts with `SELECT`, excluding a
/// span covering the whole statement. Nested sub-selects are left for the
/// recursive analysis of the enclosing span.
pub fn subselect_spans(sql: &str) -> Vec<String> {
    let tokens = tokenize(sql);
    let mut spans = Vec::new();
    let mut pos = 0;
    while pos < tokens.len() {
        if tokens[pos] != Token::LParen {
            pos += 1;
            continue;
        }
        let Some(close) = matching_paren(&tokens, pos) else {
            break;
        };
        let whole_statement = pos == 0 && trailing_is_end(&tokens, close);
        let starts_select = tokens.get(pos + 1).is_some_and(|t| is_keyword(t, "SELECT"));
        if starts_select && !whole_statement && close > pos + 1 {
            spans.push(render(&tokens[pos + 1..close]));
            pos = close + 1;
        } else {
            pos += 1;
        }
    }
    spans
}

fn trailing_is_end(tokens: &[Token], close: usize) -> bool {
    tokens[close + 1..].iter().all(|t| *t == Token::SemiColon)
}

/// Tables named after `FROM` and `JOIN` with their aliases, at any depth.
pub fn table_refs(tokens: &[Token]) -> Vec<TableRef> {
    let mut refs = Vec::new();
    let mut pos = 0;
    while pos < tokens.len() {
        if !(is_keyword(&tokens[pos], "FROM") || is_keyword(&tokens[pos], "JOIN")) {
            pos += 1;
            continue;
        }
        pos += 1;
        loop {
            pos = read_table_ref(tokens, pos, &mut refs);
            if tokens.get(pos) == Some(&Token::Comma) {
                pos += 1;
            } else {
                break;
            }
        }
    }
    refs
}

/// Read one `name [AS] alias` (or a parenthesized source with an alias,
/// which names no table) starting at `pos`; returns the position after it.
fn read_table_ref(tokens: &[Token], mut pos: usize, refs: &mut Vec<TableRef>) -> usize {
    let mut name = None;
    match tokens.get(pos) {
        Some(Token::LParen) => {
            let Some(close) = matching_paren(tokens, pos) else {
                return tokens.len();
            };
            refs.extend(table_refs(&tokens[pos + 1..close]));
            return skip_alias(tokens, close + 1);
        }
        Some(t) => {
            if let Some(first) = identifier(t) {
                name = Some(first);
                pos += 1;
                // schema.table
                while tokens.get(pos) == Some(&Token::Period) {
                    match tokens.get(pos + 1).and_then(identifier) {
                        Some(part) => {
                            name = Some(part);
                            pos += 2;
                        }
                        None => break,
                    }
                }
            }
        }
        None => {}
    }
    let Some(name) = name else {
        return pos;
    };
    let (alias, next) = read_alias(tokens, pos);
    refs.push(TableRef { name, alias });
    next
}

fn read_alias(tokens: &[Token], mut pos: usize) -> (Option<String>, usize) {
    if tokens.get(pos).is_some_and(|t| is_keyword(t, "AS")) {
        pos += 1;
    }
    match tokens.get(pos).and_then(identifier) {
        Some(alias) => (Some(alias), pos + 1),
        None => (None, pos),
    }
}

fn skip_alias(tokens: &[Token], pos: usize) -> usize {
    read_alias(tokens, pos).1
}

/// Table name a qualifier refers to: an alias first, then a table name.
pub fn resolve_qualifier<'a>(refs: &'a [TableRef], qualifier: &str) -> Option<&'a str> {
    refs.iter()
        .find(|r| r.alias.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(qualifier)))
        .or_else(|| refs.iter().find(|r| r.name.eq_ignore_ascii_case(qualifier)))
        .map(|r| r.name.as_str())
}

/// Parse `col` or `q.col` spanning exactly `tokens`.
fn column_ref(tokens: &[Token]) -> Option<ColumnRef> {
    match tokens {
        [col] => Some(ColumnRef {
            qualifier: None,
            column: identifier(col)?,
        }),
        [q, Token::Period, col] => Some(ColumnRef {
            qualifier: Some(identifier(q)?),
            column: identifier(col)?,
        }),
        _ => None,
    }
}

/// Split `tokens` on commas at depth zero.
fn split_top_level(tokens: &[Token]) -> Vec<&[Token]> {
    let depth = depths(tokens);
    let mut parts = Vec::new();
    let mut start = 0;
    for (pos, token) in tokens.iter().enumerate() {
        if *token == Token::Comma && depth[pos] == 0 {
            parts.push(&tokens[start..pos]);
            start = pos + 1;
        }
    }
    if start < tokens.len() {
        parts.push(&tokens[start..]);
    }
    parts
}

/// Items of the outermost select list.
pub fn select_items(tokens: &[Token]) -> Vec<SelectItem> {
    let depth = depths(tokens);
    let Some(select) = (0..tokens.len()).find(|&p| depth[p] == 0 && is_keyword(&tokens[p], "SELECT"))
    else {
        return Vec::new();
    };
    let mut start = select + 1;
    if tokens
        .get(start)
        .is_some_and(|t| is_keyword(t, "DISTINCT") || is_keyword(t, "ALL"))
    {
        start += 1;
    }
    let end = (start..tokens.len())
        .find(|&p| depth[p] == 0 && is_keyword(&tokens[p], "FROM"))
        .unwrap_or(tokens.len());

    split_top_level(&tokens[start..end])
        .into_iter()
        .map(|item| {
            let n = item.len();
            if n >= 2 && is_keyword(&item[n - 2], "AS") {
                SelectItem {
                    column: column_ref(&item[..n - 2]),
                    alias: identifier(&item[n - 1]),
                }
            } else if n >= 2 && column_ref(&item[..n - 1]).is_some() && identifier(&item[n - 1]).is_some() {
                SelectItem {
                    column: column_ref(&item[..n - 1]),
                    alias: identifier(&item[n - 1]),
                }
            } else {
                SelectItem {
                    column: column_ref(item),
                    alias: None,
                }
            }
        })
        .collect()
}

/// Terms of the outermost `ORDER BY`, each resolved to a column reference
/// where possible: positional terms and select-list aliases are replaced by
/// the select item they name. Expressions resolve to `None` but still count
/// toward the sort width.
pub fn order_by_columns(tokens: &[Token]) -> Vec<Option<ColumnRef>> {
    let depth = depths(tokens);
    let Some(order) = (0..tokens.len().saturating_sub(1)).rev().find(|&p| {
        depth[p] == 0 && is_keyword(&tokens[p], "ORDER") && is_keyword(&tokens[p + 1], "BY")
    }) else {
        return Vec::new();
    };
    let start = order + 2;
    let end = (start..tokens.len())
        .find(|&p| {
            depth[p] == 0
                && (is_keyword(&tokens[p], "LIMIT")
                    || tokens[p] == Token::SemiColon
                    || tokens[p] == Token::RParen)
        })
        .unwrap_or(tokens.len());

    let items = select_items(tokens);
    split_top_level(&tokens[start..end])
        .into_iter()
        .map(|term| resolve_order_term(strip_sort_modifiers(term), &items))
        .collect()
}

fn strip_sort_modifiers(mut term: &[Token]) -> &[Token] {
    loop {
        let n = term.len();
        if n >= 2 && is_keyword(&term[n - 2], "NULLS")
            && (is_keyword(&term[n - 1], "FIRST") || is_keyword(&term[n - 1], "LAST"))
        {
            term = &term[..n - 2];
        } else if n >= 1 && (is_keyword(&term[n - 1], "ASC") || is_keyword(&term[n - 1], "DESC")) {
            term = &term[..n - 1];
        } else if n >= 2 && is_keyword(&term[n - 2], "COLLATE") {
            term = &term[..n - 2];
        } else {
            return term;
        }
    }
}

fn resolve_order_term(term: &[Token], items: &[SelectItem]) -> Option<ColumnRef> {
    if let [Token::Number(n, _)] = term {
        let index: usize = n.parse().ok()?;
        return items.get(index.checked_sub(1)?)?.column.clone();
    }
    let reference = column_ref(term)?;
    if reference.qualifier.is_none() {
        let aliased = items.iter().find(|i| {
            i.alias
                .as_deref()
                .is_some_and(|a| a.eq_ignore_ascii_case(&reference.column))
        });
        if let Some(item) = aliased {
            return item.column.clone();
        }
    }
    Some(reference)
}

/// `[q.]col IS [NOT] NULL`, `[q.]col NOT NULL`, `col ISNULL`, `col NOTNULL`.
pub fn null_tests(tokens: &[Token]) -> Vec<NullTest> {
    let mut tests = Vec::new();
    for pos in 0..tokens.len() {
        let Some((negated, _)) = null_test_suffix(&tokens[pos..]) else {
            continue;
        };
        let reference = pos
            .checked_sub(3)
            .and_then(|s| column_ref(&tokens[s..pos]))
            .or_else(|| pos.checked_sub(1).and_then(|s| column_ref(&tokens[s..pos])));
        if let Some(column) = reference {
            let test = NullTest { column, negated };
            if !tests.contains(&test) {
                tests.push(test);
            }
        }
    }
    tests
}

/// Null-test operator at the start of `rest`: `(negated, token count)`.
fn null_test_suffix(rest: &[Token]) -> Option<(bool, usize)> {
    let first = rest.first()?;
    if is_keyword(first, "ISNULL") {
        return Some((false, 1));
    }
    if is_keyword(first, "NOTNULL") {
        return Some((true, 1));
    }
    if is_keyword(first, "IS") {
        if rest.get(1).is_some_and(|t| is_keyword(t, "NULL")) {
            return Some((false, 2));
        }
        if rest.get(1).is_some_and(|t| is_keyword(t, "NOT"))
            && rest.get(2).is_some_and(|t| is_keyword(t, "NULL"))
        {
            return Some((true, 3));
        }
        return None;
    }
    if is_keyword(first, "NOT") && rest.get(1).is_some_and(|t| is_keyword(t, "NULL")) {
        return Some((true, 2));
    }
    None
}
