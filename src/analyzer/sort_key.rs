//! ORDER BY column recovery.
//!
//! Sort idioms are read from the trace first: a sorter or ephemeral b-tree
//! fed by `MakeRecord` rows whose key registers are loaded from table
//! columns. Cursors walked in index order without a sort step fall back to
//! the statement's textual ORDER BY list. Sub-select propagation happens in
//! [`super::subquery`].
//!
//! A sorter read back by a loop that runs `Compare` or `AggStep` groups rows
//! for GROUP BY and contributes no ORDER BY columns. An ORDER BY sorter fed
//! from such a loop reads its keys through a pseudo cursor; those keys are
//! followed back into the grouping sorter's record.

use super::lexical::{self, resolve_qualifier, ColumnRef};
use super::opcode::{OpcodeKind, Trace};
use super::registry::TraceScope;
use super::unit::{Clause, UnitArena, UnitId};
use crate::schema::column_position;

/// Register copies and pseudo-cursor hops deeper than this are not followed.
const MAX_COPY_DEPTH: usize = 4;

pub fn extract_order(arena: &mut UnitArena, scope: &TraceScope<'_>) {
    let terms = lexical::order_by_columns(scope.tokens);
    // Only text that failed to tokenize falls back to KeyInfo widths.
    if terms.is_empty() && !scope.tokens.is_empty() {
        return;
    }
    let sorted = sort_idioms(arena, scope, &terms);
    natural_order(arena, scope, &terms, sorted);
}

/// The open, insert and sort opcodes of one spill-to-sort idiom.
struct SortIdiom {
    open: OpcodeKind,
    insert: OpcodeKind,
    sort: OpcodeKind,
}

const SORTER: SortIdiom = SortIdiom {
    open: OpcodeKind::SorterOpen,
    insert: OpcodeKind::SorterInsert,
    sort: OpcodeKind::SorterSort,
};

const EPHEMERAL: SortIdiom = SortIdiom {
    open: OpcodeKind::OpenEphemeral,
    insert: OpcodeKind::IdxInsert,
    sort: OpcodeKind::Sort,
};

/// Number of key fields declared by a KeyInfo operand such as `k(2,B,-B)`.
fn key_info_width(p4: Option<&str>) -> Option<usize> {
    let inner = p4?.trim().strip_prefix("k(")?;
    let end = inner.find([',', ')'])?;
    inner[..end].trim().parse().ok()
}

/// Returns whether any sort idiom fired.
fn sort_idioms(arena: &mut UnitArena, scope: &TraceScope<'_>, terms: &[Option<ColumnRef>]) -> bool {
    let trace = scope.trace;
    let mut fired = false;
    for (pos, _, kind) in trace.iter() {
        let idiom = match kind {
            k if k == SORTER.insert => &SORTER,
            k if k == EPHEMERAL.insert => &EPHEMERAL,
            _ => continue,
        };
        let Some(keys) = sort_keys(arena, scope, pos, idiom, terms) else {
            continue;
        };
        fired = true;
        for (id, column) in keys {
            arena.record_column(id, Clause::OrderBy, &column);
        }
    }
    fired
}

/// Key columns of the record inserted at `insert_pos`, or `None` when the
/// insert is not part of a complete open/insert/sort idiom.
fn sort_keys(
    arena: &UnitArena,
    scope: &TraceScope<'_>,
    insert_pos: usize,
    idiom: &SortIdiom,
    terms: &[Option<ColumnRef>],
) -> Option<Vec<(UnitId, String)>> {
    let trace = scope.trace;
    let insert = trace.row(insert_pos);
    let cursor = insert.p1_int()?;
    let record_register = insert.p2_int()?;
    let on_cursor = |p: usize, kind: OpcodeKind| trace.kind(p) == kind && trace.row(p).p1_int() == Some(cursor);

    let open_pos = trace.find_backward_until(insert_pos, |p| on_cursor(p, idiom.open), |_| false)?;
    let sort_pos = trace.find_forward_until(insert_pos, |p| on_cursor(p, idiom.sort), |_| false)?;
    if is_grouping_sorter(trace, cursor, sort_pos) {
        return None;
    }
    let record_pos = trace
        .last_writer(insert_pos, record_register)
        .filter(|&p| trace.kind(p) == OpcodeKind::MakeRecord)?;
    let record = trace.row(record_pos);
    let first = record.p1_int()?;
    let count = usize::try_from(record.p2_int()?).ok()?;

    let declared = if terms.is_empty() {
        key_info_width(trace.row(open_pos).p4.as_deref()).unwrap_or(count)
    } else {
        terms.len()
    };
    let width = declared.min(count);

    let mut keys = Vec::new();
    for i in 0..width {
        // Expression terms are computed, not read from a column.
        if matches!(terms.get(i), Some(None)) {
            continue;
        }
        let writer = key_source(trace, record_pos, first + i as i64, 0);
        if let Some(found) = writer.and_then(|w| scope.column_read(arena, w)) {
            keys.push(found);
        }
    }
    Some(keys)
}

/// True when the loop that reads sorter `cursor` back after `sort_pos`
/// compares consecutive keys or steps an aggregate.
fn is_grouping_sorter(trace: &Trace, cursor: i64, sort_pos: usize) -> bool {
    let on_cursor = |p: usize, kind: OpcodeKind| trace.kind(p) == kind && trace.row(p).p1_int() == Some(cursor);
    let Some(data_pos) = trace.find_forward_until(sort_pos, |p| on_cursor(p, OpcodeKind::SorterData), |_| false)
    else {
        return false;
    };
    trace
        .find_forward_until(
            data_pos,
            |p| matches!(trace.kind(p), OpcodeKind::KeyCompare | OpcodeKind::AggStep),
            |p| on_cursor(p, OpcodeKind::Next),
        )
        .is_some()
}

fn reads_pseudo_cursor(trace: &Trace, pos: usize) -> bool {
    let Some(cursor) = trace.row(pos).p1_int() else {
        return false;
    };
    trace
        .iter()
        .any(|(_, row, kind)| kind == OpcodeKind::OpenPseudo && row.p1_int() == Some(cursor))
}

/// A pseudo-cursor `Column` reads field P2 of the sorter row unpacked by
/// `SorterData`; follow it to the register that field was built from.
fn through_sorter(trace: &Trace, column_pos: usize, depth: usize) -> Option<usize> {
    let column = trace.row(column_pos);
    let pseudo = column.p1_int()?;
    let field = column.p2_int()?;
    let data_pos = trace.find_backward_until(
        column_pos,
        |p| trace.kind(p) == OpcodeKind::SorterData && trace.row(p).p3_int() == Some(pseudo),
        |_| false,
    )?;
    let sorter = trace.row(data_pos).p1_int()?;
    let insert_pos = trace.find_backward_until(
        data_pos,
        |p| trace.kind(p) == OpcodeKind::SorterInsert && trace.row(p).p1_int() == Some(sorter),
        |_| false,
    )?;
    let record_pos = trace
        .last_writer(insert_pos, trace.row(insert_pos).p2_int()?)
        .filter(|&p| trace.kind(p) == OpcodeKind::MakeRecord)?;
    let first = trace.row(record_pos).p1_int()?;
    key_source(trace, record_pos, first + field, depth)
}

/// Row that loaded `register` for the record built at `pos`, following
/// register copies and pseudo cursors. The scan stops at the start of the
/// enclosing loop.
fn key_source(trace: &Trace, pos: usize, register: i64, depth: usize) -> Option<usize> {
    if depth > MAX_COPY_DEPTH {
        return None;
    }
    let loop_start = |p: usize| {
        matches!(
            trace.kind(p),
            OpcodeKind::Rewind
                | OpcodeKind::Last
                | OpcodeKind::SeekEnd
                | OpcodeKind::Seek(_)
                | OpcodeKind::Open
                | OpcodeKind::OpenEphemeral
                | OpcodeKind::SorterOpen
        )
    };
    let writer = trace.find_backward_until(pos, |p| trace.written_register(p) == Some(register), loop_start)?;
    match trace.kind(writer) {
        OpcodeKind::Column if reads_pseudo_cursor(trace, writer) => through_sorter(trace, writer, depth + 1),
        OpcodeKind::Column | OpcodeKind::Rowid => Some(writer),
        OpcodeKind::RegisterCopy => key_source(trace, writer, trace.row(writer).p1_int()?, depth + 1),
        _ => None,
    }
}

/// Cursors walked in stored order. `Last`/`SeekEnd` + `Prev` always counts;
/// `Rewind` or a range seek + `Next` only when no sort step exists.
fn ordered_walks(scope: &TraceScope<'_>, include_forward: bool) -> Vec<UnitId> {
    let trace = scope.trace;
    let mut units = Vec::new();
    for (pos, row, kind) in trace.iter() {
        let starts: &[OpcodeKind] = match kind {
            OpcodeKind::Prev => &[OpcodeKind::Last, OpcodeKind::SeekEnd],
            OpcodeKind::Next if include_forward => &[OpcodeKind::Rewind],
            _ => continue,
        };
        let Some(cursor) = row.p1_int() else {
            continue;
        };
        let start = trace.find_backward_until(
            pos,
            |p| {
                let k = trace.kind(p);
                let is_start = starts.contains(&k) || (include_forward && matches!(k, OpcodeKind::Seek(_)));
                is_start && trace.row(p).p1_int() == Some(cursor)
            },
            |_| false,
        );
        if let Some(id) = start.and_then(|p| scope.unit_of(p)) {
            if !units.contains(&id) {
                units.push(id);
            }
        }
    }
    units
}

fn natural_order(arena: &mut UnitArena, scope: &TraceScope<'_>, terms: &[Option<ColumnRef>], sorted: bool) {
    if terms.iter().all(Option::is_none) {
        return;
    }
    let refs = lexical::table_refs(scope.tokens);
    for id in ordered_walks(scope, !sorted) {
        if !arena.get(id).order_columns.is_empty() {
            continue;
        }
        let (own_table, columns) = {
            let unit = arena.get(id);
            if unit.is_index() {
                (
                    unit.owning_table_name.clone(),
                    scope.catalog.columns_of_index(&unit.name),
                )
            } else {
                (unit.name.clone(), scope.catalog.columns_of_table(&unit.name))
            }
        };
        for term in terms.iter().flatten() {
            if let Some(qualifier) = &term.qualifier {
                let table = resolve_qualifier(&refs, qualifier);
                if !table.is_some_and(|t| t.eq_ignore_ascii_case(&own_table)) {
                    continue;
                }
            }
            if let Some(p) = column_position(&columns, &term.column) {
                arena.record_column(id, Clause::OrderBy, &columns[p]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::opcode::OpcodeRow;
    use crate::analyzer::registry::CursorRegistry;
    use crate::schema::{Catalog, CatalogSnapshot, ObjectKind};

    fn catalog() -> CatalogSnapshot {
        CatalogSnapshot::new()
            .with_table("posts", 2, &["id", "author", "score", "created"], Some("id"))
            .with_index("idx_posts_created", 3, "posts", &["created"])
    }

    fn run(cat: &dyn Catalog, sql: &str, rows: Vec<OpcodeRow>) -> UnitArena {
        let trace = Trace::from_rows(rows);
        let tokens = lexical::tokenize(sql);
        let mut arena = UnitArena::new();
        let registry = CursorRegistry::scan(&mut arena, cat, &trace);
        let scope = TraceScope {
            trace: &trace,
            catalog: cat,
            registry: &registry,
            tokens: &tokens,
        };
        extract_order(&mut arena, &scope);
        arena
    }

    fn order(arena: &UnitArena, name: &str, kind: ObjectKind) -> Vec<String> {
        let id = arena.find(name, kind).unwrap();
        arena.get(id).order_columns.iter().cloned().collect()
    }

    fn sorter_trace() -> Vec<OpcodeRow> {
        vec![
            OpcodeRow::new(0, "Init").with_p2(14),
            OpcodeRow::new(1, "SorterOpen").with_p1(1).with_p2(4).with_p4("k(2,-B,B)"),
            OpcodeRow::new(2, "OpenRead").with_p1(0).with_p2(2),
            OpcodeRow::new(3, "Rewind").with_p1(0).with_p2(9),
            OpcodeRow::new(4, "Column").with_p1(0).with_p2(2).with_p3(2),
            OpcodeRow::new(5, "Column").with_p1(0).with_p2(1).with_p3(3),
            OpcodeRow::new(6, "Column").with_p1(0).with_p2(3).with_p3(4),
            OpcodeRow::new(7, "MakeRecord").with_p1(2).with_p2(3).with_p3(5),
            OpcodeRow::new(8, "SorterInsert").with_p1(1).with_p2(5),
            OpcodeRow::new(9, "Next").with_p1(0).with_p2(4),
            OpcodeRow::new(10, "OpenPseudo").with_p1(2).with_p2(6).with_p3(4),
            OpcodeRow::new(11, "SorterSort").with_p1(1).with_p2(13),
            OpcodeRow::new(12, "SorterNext").with_p1(1).with_p2(11),
            OpcodeRow::new(13, "Halt"),
            OpcodeRow::new(14, "Goto").with_p2(1),
        ]
    }

    #[test]
    fn test_sorter_keys_in_record_order() {
        let cat = catalog();
        let arena = run(
            &cat,
            "SELECT created FROM posts ORDER BY score DESC, author",
            sorter_trace(),
        );
        assert_eq!(order(&arena, "posts", ObjectKind::Table), vec!["score", "author"]);
    }

    #[test]
    fn test_sorter_width_from_key_info_without_text() {
        let cat = catalog();
        // Text slicing fails (untokenizable); the KeyInfo says two key fields.
        let arena = run(&cat, "SELECT 'broken", sorter_trace());
        assert_eq!(order(&arena, "posts", ObjectKind::Table), vec!["score", "author"]);
    }

    #[test]
    fn test_expression_term_is_skipped() {
        let cat = catalog();
        let arena = run(
            &cat,
            "SELECT created FROM posts ORDER BY score * 2, author",
            sorter_trace(),
        );
        assert_eq!(order(&arena, "posts", ObjectKind::Table), vec!["author"]);
    }

    #[test]
    fn test_ephemeral_sort_idiom() {
        let cat = catalog();
        let arena = run(
            &cat,
            "SELECT DISTINCT author FROM posts ORDER BY author",
            vec![
                OpcodeRow::new(0, "OpenEphemeral").with_p1(1).with_p2(2).with_p4("k(1,B)"),
                OpcodeRow::new(1, "OpenRead").with_p1(0).with_p2(2),
                OpcodeRow::new(2, "Rewind").with_p1(0).with_p2(7),
                OpcodeRow::new(3, "Column").with_p1(0).with_p2(1).with_p3(1),
                OpcodeRow::new(4, "SCopy").with_p1(1).with_p2(2),
                OpcodeRow::new(5, "MakeRecord").with_p1(2).with_p2(1).with_p3(3),
                OpcodeRow::new(6, "IdxInsert").with_p1(1).with_p2(3),
                OpcodeRow::new(7, "Sort").with_p1(1).with_p2(9),
                OpcodeRow::new(8, "Next").with_p1(1).with_p2(7),
                OpcodeRow::new(9, "Halt"),
            ],
        );
        assert_eq!(order(&arena, "posts", ObjectKind::Table), vec!["author"]);
    }

    #[test]
    fn test_ephemeral_insert_without_sort_is_ignored() {
        let cat = catalog();
        let arena = run(
            &cat,
            "SELECT * FROM posts WHERE author IN (SELECT author FROM posts)",
            vec![
                OpcodeRow::new(0, "OpenEphemeral").with_p1(1).with_p2(1).with_p4("k(1,B)"),
                OpcodeRow::new(1, "OpenRead").with_p1(0).with_p2(2),
                OpcodeRow::new(2, "Column").with_p1(0).with_p2(1).with_p3(1),
                OpcodeRow::new(3, "MakeRecord").with_p1(1).with_p2(1).with_p3(2),
                OpcodeRow::new(4, "IdxInsert").with_p1(1).with_p2(2),
                OpcodeRow::new(5, "Halt"),
            ],
        );
        assert!(order(&arena, "posts", ObjectKind::Table).is_empty());
    }

    #[test]
    fn test_descending_index_walk_uses_text() {
        let cat = catalog();
        let arena = run(
            &cat,
            "SELECT p.id FROM posts AS p ORDER BY p.created DESC",
            vec![
                OpcodeRow::new(0, "OpenRead").with_p1(1).with_p2(3),
                OpcodeRow::new(1, "Last").with_p1(1).with_p2(5),
                OpcodeRow::new(2, "IdxRowid").with_p1(1).with_p2(1),
                OpcodeRow::new(3, "ResultRow").with_p1(1).with_p2(1),
                OpcodeRow::new(4, "Prev").with_p1(1).with_p2(2),
                OpcodeRow::new(5, "Halt"),
            ],
        );
        assert_eq!(order(&arena, "idx_posts_created", ObjectKind::Index), vec!["created"]);
        assert_eq!(order(&arena, "posts", ObjectKind::Table), vec!["created"]);
    }

    #[test]
    fn test_forward_walk_matches_only_own_columns() {
        let cat = catalog();
        let arena = run(
            &cat,
            "SELECT id FROM posts ORDER BY created, score",
            vec![
                OpcodeRow::new(0, "OpenRead").with_p1(1).with_p2(3),
                OpcodeRow::new(1, "Rewind").with_p1(1).with_p2(5),
                OpcodeRow::new(2, "IdxRowid").with_p1(1).with_p2(1),
                OpcodeRow::new(3, "ResultRow").with_p1(1).with_p2(1),
                OpcodeRow::new(4, "Next").with_p1(1).with_p2(2),
                OpcodeRow::new(5, "Halt"),
            ],
        );
        assert_eq!(order(&arena, "idx_posts_created", ObjectKind::Index), vec!["created"]);
    }

    /// `t(id INTEGER PRIMARY KEY, a, b, c)` with `idx_t_ab(a, b)`.
    fn grouped_catalog() -> CatalogSnapshot {
        CatalogSnapshot::new()
            .with_table("t", 2, &["id", "a", "b", "c"], Some("id"))
            .with_index("idx_t_ab", 3, "t", &["a", "b"])
    }

    /// SELECT b, count(*) FROM t GROUP BY b
    fn group_by_trace() -> Vec<OpcodeRow> {
        vec![
            OpcodeRow::new(0, "Init").with_p1(0).with_p2(40).with_p3(0),
            OpcodeRow::new(1, "SorterOpen").with_p1(1).with_p2(1).with_p3(0).with_p4("k(1,B)"),
            OpcodeRow::new(2, "Integer").with_p1(0).with_p2(4).with_p3(0),
            OpcodeRow::new(3, "Null").with_p1(0).with_p2(7).with_p3(7),
            OpcodeRow::new(4, "Gosub").with_p1(6).with_p2(36).with_p3(0),
            OpcodeRow::new(5, "OpenRead").with_p1(2).with_p2(3).with_p3(0).with_p4("k(3,,,)"),
            OpcodeRow::new(6, "Rewind").with_p1(2).with_p2(11).with_p3(9).with_p4("0"),
            OpcodeRow::new(7, "Column").with_p1(2).with_p2(1).with_p3(9),
            OpcodeRow::new(8, "MakeRecord").with_p1(9).with_p2(1).with_p3(10),
            OpcodeRow::new(9, "SorterInsert").with_p1(1).with_p2(10).with_p3(0),
            OpcodeRow::new(10, "Next").with_p1(2).with_p2(7).with_p3(0),
            OpcodeRow::new(11, "OpenPseudo").with_p1(3).with_p2(9).with_p3(1),
            OpcodeRow::new(12, "SorterSort").with_p1(1).with_p2(39).with_p3(0),
            OpcodeRow::new(13, "SorterData").with_p1(1).with_p2(9).with_p3(3),
            OpcodeRow::new(14, "Column").with_p1(3).with_p2(0).with_p3(8),
            OpcodeRow::new(15, "Compare").with_p1(7).with_p2(8).with_p3(1).with_p4("k(1,B)"),
            OpcodeRow::new(16, "Jump").with_p1(17).with_p2(21).with_p3(17),
            OpcodeRow::new(17, "Move").with_p1(8).with_p2(7).with_p3(1),
            OpcodeRow::new(18, "Gosub").with_p1(5).with_p2(30).with_p3(0),
            OpcodeRow::new(19, "IfPos").with_p1(4).with_p2(39).with_p3(0),
            OpcodeRow::new(20, "Gosub").with_p1(6).with_p2(36).with_p3(0),
            OpcodeRow::new(21, "AggStep").with_p1(0).with_p2(0).with_p3(2).with_p4("count(0)"),
            OpcodeRow::new(22, "If").with_p1(3).with_p2(24).with_p3(0),
            OpcodeRow::new(23, "Column").with_p1(3).with_p2(0).with_p3(1),
            OpcodeRow::new(24, "Integer").with_p1(1).with_p2(3).with_p3(0),
            OpcodeRow::new(25, "SorterNext").with_p1(1).with_p2(13).with_p3(0),
            OpcodeRow::new(26, "Gosub").with_p1(5).with_p2(30).with_p3(0),
            OpcodeRow::new(27, "Goto").with_p1(0).with_p2(39).with_p3(0),
            OpcodeRow::new(28, "Integer").with_p1(1).with_p2(4).with_p3(0),
            OpcodeRow::new(29, "Return").with_p1(5).with_p2(0).with_p3(0),
            OpcodeRow::new(30, "IfPos").with_p1(3).with_p2(32).with_p3(0),
            OpcodeRow::new(31, "Return").with_p1(5).with_p2(0).with_p3(0),
            OpcodeRow::new(32, "AggFinal").with_p1(2).with_p2(0).with_p3(0).with_p4("count(0)"),
            OpcodeRow::new(33, "Copy").with_p1(1).with_p2(11).with_p3(1),
            OpcodeRow::new(34, "ResultRow").with_p1(11).with_p2(2).with_p3(0),
            OpcodeRow::new(35, "Return").with_p1(5).with_p2(0).with_p3(0),
            OpcodeRow::new(36, "Null").with_p1(0).with_p2(1).with_p3(2),
            OpcodeRow::new(37, "Integer").with_p1(0).with_p2(3).with_p3(0),
            OpcodeRow::new(38, "Return").with_p1(6).with_p2(0).with_p3(0),
            OpcodeRow::new(39, "Halt").with_p1(0).with_p2(0).with_p3(0),
            OpcodeRow::new(40, "Transaction").with_p1(0).with_p2(0).with_p3(2).with_p4("0"),
            OpcodeRow::new(41, "Goto").with_p1(0).with_p2(1).with_p3(0),
        ]
    }

    /// SELECT b, count(*) FROM t GROUP BY b ORDER BY c
    fn group_by_order_by_trace() -> Vec<OpcodeRow> {
        vec![
            OpcodeRow::new(0, "Init").with_p1(0).with_p2(52).with_p3(0),
            OpcodeRow::new(1, "SorterOpen").with_p1(1).with_p2(4).with_p3(0).with_p4("k(1,B)"),
            OpcodeRow::new(2, "SorterOpen").with_p1(2).with_p2(2).with_p3(0).with_p4("k(1,B)"),
            OpcodeRow::new(3, "Integer").with_p1(0).with_p2(5).with_p3(0),
            OpcodeRow::new(4, "Null").with_p1(0).with_p2(8).with_p3(8),
            OpcodeRow::new(5, "Gosub").with_p1(7).with_p2(41).with_p3(0),
            OpcodeRow::new(6, "OpenRead").with_p1(0).with_p2(2).with_p3(0).with_p4("4"),
            OpcodeRow::new(7, "Rewind").with_p1(0).with_p2(13).with_p3(0),
            OpcodeRow::new(8, "Column").with_p1(0).with_p2(2).with_p3(10),
            OpcodeRow::new(9, "Column").with_p1(0).with_p2(3).with_p3(11),
            OpcodeRow::new(10, "MakeRecord").with_p1(10).with_p2(2).with_p3(12),
            OpcodeRow::new(11, "SorterInsert").with_p1(2).with_p2(12).with_p3(0),
            OpcodeRow::new(12, "Next").with_p1(0).with_p2(8).with_p3(0),
            OpcodeRow::new(13, "OpenPseudo").with_p1(3).with_p2(12).with_p3(2),
            OpcodeRow::new(14, "SorterSort").with_p1(2).with_p2(44).with_p3(0),
            OpcodeRow::new(15, "SorterData").with_p1(2).with_p2(12).with_p3(3),
            OpcodeRow::new(16, "Column").with_p1(3).with_p2(0).with_p3(9),
            OpcodeRow::new(17, "Compare").with_p1(8).with_p2(9).with_p3(1).with_p4("k(1,B)"),
            OpcodeRow::new(18, "Jump").with_p1(19).with_p2(23).with_p3(19),
            OpcodeRow::new(19, "Move").with_p1(9).with_p2(8).with_p3(1),
            OpcodeRow::new(20, "Gosub").with_p1(6).with_p2(33).with_p3(0),
            OpcodeRow::new(21, "IfPos").with_p1(5).with_p2(44).with_p3(0),
            OpcodeRow::new(22, "Gosub").with_p1(7).with_p2(41).with_p3(0),
            OpcodeRow::new(23, "AggStep").with_p1(0).with_p2(0).with_p3(2).with_p4("count(0)"),
            OpcodeRow::new(24, "If").with_p1(4).with_p2(27).with_p3(0),
            OpcodeRow::new(25, "Column").with_p1(3).with_p2(0).with_p3(1),
            OpcodeRow::new(26, "Column").with_p1(3).with_p2(1).with_p3(3),
            OpcodeRow::new(27, "Integer").with_p1(1).with_p2(4).with_p3(0),
            OpcodeRow::new(28, "SorterNext").with_p1(2).with_p2(15).with_p3(0),
            OpcodeRow::new(29, "Gosub").with_p1(6).with_p2(33).with_p3(0),
            OpcodeRow::new(30, "Goto").with_p1(0).with_p2(44).with_p3(0),
            OpcodeRow::new(31, "Integer").with_p1(1).with_p2(5).with_p3(0),
            OpcodeRow::new(32, "Return").with_p1(6).with_p2(0).with_p3(0),
            OpcodeRow::new(33, "IfPos").with_p1(4).with_p2(35).with_p3(0),
            OpcodeRow::new(34, "Return").with_p1(6).with_p2(0).with_p3(0),
            OpcodeRow::new(35, "AggFinal").with_p1(2).with_p2(0).with_p3(0).with_p4("count(0)"),
            OpcodeRow::new(36, "Copy").with_p1(1).with_p2(14).with_p3(1),
            OpcodeRow::new(37, "Copy").with_p1(3).with_p2(13).with_p3(0),
            OpcodeRow::new(38, "MakeRecord").with_p1(13).with_p2(3).with_p3(16),
            OpcodeRow::new(39, "SorterInsert").with_p1(1).with_p2(16).with_p3(13).with_p4("3"),
            OpcodeRow::new(40, "Return").with_p1(6).with_p2(0).with_p3(0),
            OpcodeRow::new(41, "Null").with_p1(0).with_p2(1).with_p3(3),
            OpcodeRow::new(42, "Integer").with_p1(0).with_p2(4).with_p3(0),
            OpcodeRow::new(43, "Return").with_p1(7).with_p2(0).with_p3(0),
            OpcodeRow::new(44, "OpenPseudo").with_p1(4).with_p2(17).with_p3(4),
            OpcodeRow::new(45, "SorterSort").with_p1(1).with_p2(51).with_p3(0),
            OpcodeRow::new(46, "SorterData").with_p1(1).with_p2(17).with_p3(4),
            OpcodeRow::new(47, "Column").with_p1(4).with_p2(2).with_p3(15),
            OpcodeRow::new(48, "Column").with_p1(4).with_p2(1).with_p3(14),
            OpcodeRow::new(49, "ResultRow").with_p1(14).with_p2(2).with_p3(0),
            OpcodeRow::new(50, "SorterNext").with_p1(1).with_p2(46).with_p3(0),
            OpcodeRow::new(51, "Halt").with_p1(0).with_p2(0).with_p3(0),
            OpcodeRow::new(52, "Transaction").with_p1(0).with_p2(0).with_p3(2).with_p4("0"),
            OpcodeRow::new(53, "Goto").with_p1(0).with_p2(1).with_p3(0),
        ]
    }

    #[test]
    fn test_group_by_sorter_is_not_an_order() {
        let cat = grouped_catalog();
        let arena = run(&cat, "SELECT b, count(*) FROM t GROUP BY b", group_by_trace());
        assert!(order(&arena, "t", ObjectKind::Table).is_empty());
        assert!(order(&arena, "idx_t_ab", ObjectKind::Index).is_empty());
    }

    #[test]
    fn test_group_by_sorter_skipped_without_text() {
        let cat = grouped_catalog();
        // untokenizable text leaves only the trace to judge by
        let arena = run(&cat, "SELECT 'broken", group_by_trace());
        assert!(order(&arena, "t", ObjectKind::Table).is_empty());
    }

    #[test]
    fn test_order_by_after_group_by_reads_through_pseudo_cursor() {
        let cat = grouped_catalog();
        let arena = run(
            &cat,
            "SELECT b, count(*) FROM t GROUP BY b ORDER BY c",
            group_by_order_by_trace(),
        );
        assert_eq!(order(&arena, "t", ObjectKind::Table), vec!["c"]);
    }

    #[test]
    fn test_sorter_without_order_by_text_is_ignored() {
        let cat = catalog();
        let arena = run(&cat, "SELECT created FROM posts", sorter_trace());
        assert!(order(&arena, "posts", ObjectKind::Table).is_empty());
    }

    #[test]
    fn test_key_info_width() {
        assert_eq!(key_info_width(Some("k(2,-B,B)")), Some(2));
        assert_eq!(key_info_width(Some("k(1)")), Some(1));
        assert_eq!(key_info_width(Some("binary")), None);
        assert_eq!(key_info_width(None), None);
    }
}
