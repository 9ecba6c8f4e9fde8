//! WHERE column and expression recovery.
//!
//! Five opcode families feed WHERE findings: range seeks and index bounds,
//! register comparisons, rowid lookups, bare column reads, and null tests
//! (the last through the lexical fallback). Each row is handled on its own;
//! the only cross-row work is the bounded register back-scans.

use super::lexical::{self, resolve_qualifier};
use super::literal::{comparison, quote_identifier, recover};
use super::opcode::{CompareOp, OpcodeKind, SeekOp};
use super::registry::TraceScope;
use super::unit::{Clause, UnitArena, UnitId};
use crate::schema::{column_position, ObjectKind};

/// Opcodes that consume a column read for output or record building rather
/// than for a predicate.
fn consumes_column(kind: OpcodeKind) -> bool {
    matches!(
        kind,
        OpcodeKind::IfPos
            | OpcodeKind::Rewind
            | OpcodeKind::Column
            | OpcodeKind::ResultRow
            | OpcodeKind::Rowid
            | OpcodeKind::MakeRecord
    )
}

pub fn extract_where(arena: &mut UnitArena, scope: &TraceScope<'_>) {
    let mut null_tests_done = false;
    for (pos, _, kind) in scope.trace.iter() {
        match kind {
            OpcodeKind::Seek(op) => seek(arena, scope, pos, op, false),
            OpcodeKind::IdxBound(op) => seek(arena, scope, pos, op, true),
            OpcodeKind::Compare(op) => compare(arena, scope, pos, op),
            OpcodeKind::RowidLookup => rowid_lookup(arena, scope, pos),
            OpcodeKind::Column => bare_column(arena, scope, pos),
            OpcodeKind::NullTest(_) if !null_tests_done => {
                null_tests_done = true;
                null_tests(arena, scope);
            }
            _ => {}
        }
    }
}

/// Cursor, first key register and key count of a seek or bound row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SeekKey {
    cursor: i64,
    first_register: Option<i64>,
    count: usize,
}

impl SeekKey {
    fn at(scope: &TraceScope<'_>, pos: usize) -> Option<Self> {
        let row = scope.trace.row(pos);
        Some(Self {
            cursor: row.p1_int()?,
            first_register: row.p3_int(),
            count: row.p4_int().and_then(|n| usize::try_from(n).ok()).unwrap_or(1),
        })
    }

    fn same_key_start(&self, other: &SeekKey) -> bool {
        self.cursor == other.cursor && self.first_register == other.first_register
    }
}

/// The seek/bound row on the same cursor and key registers that closes or
/// opens the range started at `pos`, searched within the current loop.
fn paired_row(scope: &TraceScope<'_>, pos: usize, key: &SeekKey, is_bound: bool) -> Option<(usize, SeekOp, SeekKey)> {
    let trace = scope.trace;
    let is_partner = |p: usize| {
        let other_kind = trace.kind(p);
        let op_matches = if is_bound {
            matches!(other_kind, OpcodeKind::Seek(_))
        } else {
            matches!(other_kind, OpcodeKind::IdxBound(_))
        };
        op_matches && SeekKey::at(scope, p).is_some_and(|k| k.same_key_start(key))
    };
    let loop_edge = |p: usize| {
        matches!(trace.kind(p), OpcodeKind::Next | OpcodeKind::Prev | OpcodeKind::Rewind)
            && trace.row(p).p1_int() == Some(key.cursor)
    };
    let found = if is_bound {
        trace.find_backward_until(pos, is_partner, loop_edge)
    } else {
        trace.find_forward_until(pos, is_partner, loop_edge)
    }?;
    let op = match trace.kind(found) {
        OpcodeKind::Seek(op) | OpcodeKind::IdxBound(op) => op,
        _ => return None,
    };
    Some((found, op, SeekKey::at(scope, found)?))
}

/// `SeekGE` closed by `IdxGT`, or `SeekLE` closed by `IdxLT`, on the same key
/// is an equality range.
fn is_equality_pair(seek: SeekOp, bound: SeekOp) -> bool {
    matches!((seek, bound), (SeekOp::Ge, SeekOp::Gt) | (SeekOp::Le, SeekOp::Lt))
}

/// Operator of the key's last column. Leading columns are always `=`.
fn last_column_op(scope: &TraceScope<'_>, pos: usize, op: SeekOp, key: &SeekKey, is_bound: bool) -> CompareOp {
    let Some((_, other_op, other_key)) = paired_row(scope, pos, key, is_bound) else {
        return if is_bound {
            op.as_compare().negate()
        } else {
            op.as_compare()
        };
    };
    let (seek_op, bound_op, seek_count, bound_count) = if is_bound {
        (other_op, op, other_key.count, key.count)
    } else {
        (op, other_op, key.count, other_key.count)
    };
    let equality = seek_count == bound_count && is_equality_pair(seek_op, bound_op);
    if equality || (is_bound && bound_count < seek_count) {
        CompareOp::Eq
    } else if is_bound {
        op.as_compare().negate()
    } else {
        op.as_compare()
    }
}

fn seek(arena: &mut UnitArena, scope: &TraceScope<'_>, pos: usize, op: SeekOp, is_bound: bool) {
    let Some(id) = scope.unit_of(pos) else {
        return;
    };
    let Some(key) = SeekKey::at(scope, pos) else {
        return;
    };
    let columns: Vec<String> = if arena.get(id).is_index() {
        (0..key.count)
            .map_while(|i| scope.column_name(arena, id, i as i64))
            .collect()
    } else {
        // A seek on a table cursor positions by rowid.
        scope.rowid_column(arena, id).into_iter().collect()
    };
    if columns.is_empty() {
        return;
    }
    let last_op = last_column_op(scope, pos, op, &key, is_bound);
    for (i, column) in columns.iter().enumerate() {
        arena.record_column(id, Clause::Where, column);
        let Some(first) = key.first_register else {
            continue;
        };
        let op = if i + 1 == columns.len() {
            last_op
        } else {
            CompareOp::Eq
        };
        if let Some(literal) = recover(scope.trace, pos, first + i as i64) {
            arena.record_expression(id, comparison(column, op.sql(), &literal));
        }
    }
}

fn compare(arena: &mut UnitArena, scope: &TraceScope<'_>, pos: usize, op: CompareOp) {
    let trace = scope.trace;
    let row = trace.row(pos);
    let (Some(left_register), Some(right_register)) = (row.p1_int(), row.p3_int()) else {
        return;
    };

    let units: &UnitArena = arena;
    let read_of = |register: i64| {
        trace
            .last_writer(pos, register)
            .filter(|&w| trace.kind(w).is_column_read())
            .and_then(|w| scope.column_read(units, w))
    };
    // r[P3] <op> r[P1]
    let p1_read = read_of(left_register);
    let p3_read = read_of(right_register);

    for (id, column) in p1_read.iter().chain(p3_read.iter()) {
        arena.record_column(*id, Clause::Where, column);
    }

    let (id, column, literal_register, op) = match (&p1_read, &p3_read) {
        (None, Some((id, column))) => (*id, column.clone(), left_register, op),
        (Some((id, column)), None) => (*id, column.clone(), right_register, op.mirror()),
        _ => return,
    };
    let Some(literal) = recover(trace, pos, literal_register) else {
        return;
    };
    // A jump to the loop's advance skips the row, so the row qualifies when
    // the comparison fails.
    let op = match trace.jump_target_kind(pos) {
        Some(OpcodeKind::Next | OpcodeKind::Prev) => op.negate(),
        _ => op,
    };
    arena.record_expression(id, comparison(&column, op.sql(), &literal));
}

fn rowid_lookup(arena: &mut UnitArena, scope: &TraceScope<'_>, pos: usize) {
    let trace = scope.trace;
    let Some(id) = scope.unit_of(pos) else {
        return;
    };
    let register = trace.row(pos).p3_int();

    if let Some(pk) = scope.rowid_column(arena, id) {
        arena.record_column(id, Clause::Where, &pk);
        if let Some(literal) = register.and_then(|r| recover(trace, pos, r)) {
            arena.record_expression(id, comparison(&pk, "=", &literal));
        }
    }

    // Join key read from another cursor.
    let feeding = register
        .and_then(|r| trace.last_writer(pos, r))
        .filter(|&w| trace.kind(w) == OpcodeKind::Column)
        .and_then(|w| scope.column_read(arena, w));
    if let Some((source, column)) = feeding {
        arena.record_column(source, Clause::Where, &column);
    }
}

fn bare_column(arena: &mut UnitArena, scope: &TraceScope<'_>, pos: usize) {
    if pos + 1 >= scope.trace.len() || consumes_column(scope.trace.kind(pos + 1)) {
        return;
    }
    if let Some((id, column)) = scope.column_read(arena, pos) {
        arena.record_column(id, Clause::Where, &column);
    }
}

fn null_tests(arena: &mut UnitArena, scope: &TraceScope<'_>) {
    let refs = lexical::table_refs(scope.tokens);
    for test in lexical::null_tests(scope.tokens) {
        let target = match &test.column.qualifier {
            Some(qualifier) => resolve_qualifier(&refs, qualifier)
                .and_then(|table| arena.find(table, ObjectKind::Table))
                .and_then(|id| table_column(arena, scope, id, &test.column.column).map(|c| (id, c))),
            None => {
                let mut owners = arena.ids().filter_map(|id| {
                    if arena.get(id).is_index() {
                        return None;
                    }
                    table_column(arena, scope, id, &test.column.column).map(|c| (id, c))
                });
                match (owners.next(), owners.next()) {
                    (Some(only), None) => Some(only),
                    _ => None,
                }
            }
        };
        let Some((id, column)) = target else {
            tracing::debug!(column = %test.column.column, "Null test did not resolve to one scanned table");
            continue;
        };
        let predicate = if test.negated { "IS NOT NULL" } else { "IS NULL" };
        arena.record_column(id, Clause::Where, &column);
        arena.record_expression(id, format!("{} {}", quote_identifier(&column), predicate));
    }
}

/// Declared spelling of `column` in the table unit `id`.
fn table_column(arena: &UnitArena, scope: &TraceScope<'_>, id: UnitId, column: &str) -> Option<String> {
    let columns = scope.catalog.columns_of_table(&arena.get(id).name);
    column_position(&columns, column).map(|p| columns[p].clone())
}
