use std::collections::HashMap;

use sqlparser::tokenizer::Token;

use crate::schema::{Catalog, ObjectKind};

use super::linkage::link_index_to_table;
use super::opcode::{OpcodeKind, OpcodeRow, Trace};
use super::unit::{AnalysisUnit, UnitArena, UnitId};

/// Maps engine cursor numbers to units. A cursor number can be reopened on
/// a different object later in the same program, so every binding remembers
/// the trace position of the open that created it.
#[derive(Debug, Default)]
pub struct CursorRegistry {
    bindings: HashMap<i64, Vec<(usize, UnitId)>>,
}

impl CursorRegistry {
    /// Resolve every open opcode of `trace` into `arena`.
    pub fn scan(arena: &mut UnitArena, catalog: &dyn Catalog, trace: &Trace) -> Self {
        let mut registry = Self::default();
        for (pos, row, kind) in trace.iter() {
            if kind != OpcodeKind::Open {
                continue;
            }
            if let Some(id) = resolve_open_read(arena, catalog, row) {
                if let Some(cursor) = row.p1_int() {
                    registry.bindings.entry(cursor).or_default().push((pos, id));
                }
            }
        }
        registry
    }

    /// Unit bound to `cursor` at trace position `pos`: the latest open at or
    /// before `pos`, else the first open (cursor used before it is opened in
    /// trace order, e.g. from a subroutine laid out above its caller).
    pub fn unit_at(&self, cursor: i64, pos: usize) -> Option<UnitId> {
        let bindings = self.bindings.get(&cursor)?;
        bindings
            .iter()
            .rev()
            .find(|(open_pos, _)| *open_pos <= pos)
            .or_else(|| bindings.first())
            .map(|(_, id)| *id)
    }

    pub fn unit_for_row(&self, row: &OpcodeRow, pos: usize) -> Option<UnitId> {
        self.unit_at(row.p1_int()?, pos)
    }
}

/// Resolve one open opcode (P1 cursor, P2 root page) to its unit, creating
/// it on first sight. Index units are linked to their owning table unit.
/// A re-open of a known object under a new cursor moves its `cursor_no`.
pub fn resolve_open_read(
    arena: &mut UnitArena,
    catalog: &dyn Catalog,
    row: &OpcodeRow,
) -> Option<UnitId> {
    let cursor = row.p1_int()?;
    let root_page = u64::try_from(row.p2_int()?).ok()?;
    let Some(object) = catalog.object_by_root_page(root_page) else {
        tracing::debug!(root_page, cursor, "No schema object owns root page; skipping open");
        return None;
    };

    let id = match arena.find(&object.name, object.kind) {
        Some(id) => {
            arena.get_mut(id).cursor_no = cursor;
            id
        }
        None => arena.insert(AnalysisUnit::new(
            cursor,
            root_page,
            object.kind,
            &object.name,
            &object.owning_table,
        )),
    };

    if object.kind == ObjectKind::Index {
        link_index_to_table(arena, catalog, id);
    }
    Some(id)
}

/// Everything the extractors read while walking one trace.
pub struct TraceScope<'a> {
    pub trace: &'a Trace,
    pub catalog: &'a dyn Catalog,
    pub registry: &'a CursorRegistry,
    /// Significant tokens of the statement text.
    pub tokens: &'a [Token],
}

impl TraceScope<'_> {
    /// Unit the row at `pos` addresses through its P1 cursor.
    pub fn unit_of(&self, pos: usize) -> Option<UnitId> {
        self.registry.unit_for_row(self.trace.row(pos), pos)
    }

    /// Name of the column at `index` of the unit's object. An index record
    /// carries the table rowid after its declared columns.
    pub fn column_name(&self, arena: &UnitArena, id: UnitId, index: i64) -> Option<String> {
        let index = usize::try_from(index).ok()?;
        let unit = arena.get(id);
        if unit.is_index() {
            let columns = self.catalog.columns_of_index(&unit.name);
            if index == columns.len() {
                return self.catalog.primary_key_column(&unit.owning_table_name);
            }
            columns.get(index).cloned()
        } else {
            self.catalog.columns_of_table(&unit.name).get(index).cloned()
        }
    }

    /// Column holding the rowid of the unit's table.
    pub fn rowid_column(&self, arena: &UnitArena, id: UnitId) -> Option<String> {
        let unit = arena.get(id);
        let table = if unit.is_index() {
            &unit.owning_table_name
        } else {
            &unit.name
        };
        self.catalog.primary_key_column(table)
    }

    /// Unit and column read by a `Column`/`Rowid` row.
    pub fn column_read(&self, arena: &UnitArena, pos: usize) -> Option<(UnitId, String)> {
        let id = self.unit_of(pos)?;
        let column = match self.trace.kind(pos) {
            OpcodeKind::Column => self.column_name(arena, id, self.trace.row(pos).p2_int()?)?,
            OpcodeKind::Rowid => self.rowid_column(arena, id)?,
            _ => return None,
        };
        Some((id, column))
    }
}
