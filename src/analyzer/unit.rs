use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::schema::ObjectKind;

/// Index into a [`UnitArena`].
pub type UnitId = usize;

/// An index observed in use against a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexRef {
    pub cursor_no: i64,
    pub index_name: String,
}

/// A column attributed through a specific index cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexColumn {
    pub cursor_no: i64,
    pub column: String,
}

/// Findings for one table or index touched by a statement. All sets keep
/// discovery order and ignore repeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisUnit {
    pub cursor_no: i64,
    pub root_page: u64,
    pub kind: ObjectKind,
    pub name: String,
    /// Empty for a table.
    pub owning_table_name: String,
    pub used_indexes: IndexSet<IndexRef>,
    pub where_columns: IndexSet<String>,
    pub order_columns: IndexSet<String>,
    pub where_index_columns: IndexSet<IndexColumn>,
    pub order_index_columns: IndexSet<IndexColumn>,
    pub where_expressions: IndexSet<String>,
    pub merged_columns: IndexSet<String>,
    pub covering_index_name: String,
    pub covering_index_columns: IndexSet<IndexColumn>,
}

impl AnalysisUnit {
    pub fn new(cursor_no: i64, root_page: u64, kind: ObjectKind, name: &str, owning_table: &str) -> Self {
        Self {
            cursor_no,
            root_page,
            kind,
            name: name.to_string(),
            owning_table_name: owning_table.to_string(),
            used_indexes: IndexSet::new(),
            where_columns: IndexSet::new(),
            order_columns: IndexSet::new(),
            where_index_columns: IndexSet::new(),
            order_index_columns: IndexSet::new(),
            where_expressions: IndexSet::new(),
            merged_columns: IndexSet::new(),
            covering_index_name: String::new(),
            covering_index_columns: IndexSet::new(),
        }
    }

    pub fn is_index(&self) -> bool {
        self.kind == ObjectKind::Index
    }

    /// Same identity as another unit: one unit per `(name, kind)`.
    pub fn is_named(&self, name: &str, kind: ObjectKind) -> bool {
        self.kind == kind && self.name.eq_ignore_ascii_case(name)
    }

    /// Rebuild `merged_columns` as WHERE columns followed by ORDER BY columns.
    pub fn merge_columns(&mut self) {
        self.merged_columns = self
            .where_columns
            .iter()
            .chain(self.order_columns.iter())
            .cloned()
            .collect();
    }
}

/// Which clause a column finding belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clause {
    Where,
    OrderBy,
}

/// Arena of units for one trace. Index-to-table linkage is an id stored
/// alongside each unit rather than a reference into the arena.
#[derive(Debug, Clone, Default)]
pub struct UnitArena {
    units: Vec<AnalysisUnit>,
    owners: Vec<Option<UnitId>>,
}

impl UnitArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn insert(&mut self, unit: AnalysisUnit) -> UnitId {
        self.units.push(unit);
        self.owners.push(None);
        self.units.len() - 1
    }

    pub fn get(&self, id: UnitId) -> &AnalysisUnit {
        &self.units[id]
    }

    pub fn get_mut(&mut self, id: UnitId) -> &mut AnalysisUnit {
        &mut self.units[id]
    }

    pub fn iter(&self) -> impl Iterator<Item = (UnitId, &AnalysisUnit)> + '_ {
        self.units.iter().enumerate()
    }

    pub fn ids(&self) -> std::ops::Range<UnitId> {
        0..self.units.len()
    }

    pub fn find(&self, name: &str, kind: ObjectKind) -> Option<UnitId> {
        self.units.iter().position(|u| u.is_named(name, kind))
    }

    pub fn find_by_root(&self, name: &str, root_page: u64) -> Option<UnitId> {
        self.units
            .iter()
            .position(|u| u.root_page == root_page && u.name.eq_ignore_ascii_case(name))
    }

    /// Owning table unit of an index unit.
    pub fn owner(&self, id: UnitId) -> Option<UnitId> {
        self.owners[id]
    }

    pub fn set_owner(&mut self, index: UnitId, table: UnitId) {
        self.owners[index] = Some(table);
    }

    /// Record a column finding. Index findings are mirrored onto the owning
    /// table together with the index cursor they came through.
    pub fn record_column(&mut self, id: UnitId, clause: Clause, column: &str) {
        let (is_index, cursor_no) = {
            let unit = &self.units[id];
            (unit.is_index(), unit.cursor_no)
        };
        let index_column = is_index.then(|| IndexColumn {
            cursor_no,
            column: column.to_string(),
        });

        let mut targets = vec![id];
        if is_index {
            targets.extend(self.owners[id]);
        }
        for target in targets {
            let unit = &mut self.units[target];
            let (columns, index_columns) = match clause {
                Clause::Where => (&mut unit.where_columns, &mut unit.where_index_columns),
                Clause::OrderBy => (&mut unit.order_columns, &mut unit.order_index_columns),
            };
            columns.insert(column.to_string());
            if let Some(ic) = &index_column {
                index_columns.insert(ic.clone());
            }
        }
    }

    pub fn record_expression(&mut self, id: UnitId, expression: String) {
        if let Some(owner) = self.units[id].is_index().then(|| self.owners[id]).flatten() {
            self.units[owner].where_expressions.insert(expression.clone());
        }
        self.units[id].where_expressions.insert(expression);
    }

    pub fn into_units(self) -> Vec<AnalysisUnit> {
        self.units
    }
}
