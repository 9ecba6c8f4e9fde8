//! Sub-select recursion and merging.

use std::collections::HashMap;

use indexmap::IndexSet;

use super::lexical;
use super::unit::{IndexColumn, IndexRef, UnitArena, UnitId};
use super::Analyzer;
use crate::query::explain::ExplainProvider;
use crate::schema::ObjectKind;

/// Explain and analyze every parenthesized sub-select of `sql`, merging each
/// result into `arena`. A sub-select that fails to explain is skipped.
pub async fn merge_subqueries<P: ExplainProvider>(arena: &mut UnitArena, analyzer: &Analyzer<'_, P>, sql: &str) {
    for span in lexical::subselect_spans(sql) {
        let rows = match analyzer.provider.explain(&span).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(subquery = %span, error = %e, "Skipping sub-select that failed to explain");
                continue;
            }
        };
        let sub = analyzer.units_for(&span, rows).await;
        merge(arena, sub);
    }
}

/// Merge a sub-select's units into `parent`. Units match by
/// `(name, root_page)`; unmatched units are appended. Index cursor numbers
/// are not stable across traces, so they are translated by index name.
pub fn merge(parent: &mut UnitArena, sub: UnitArena) {
    let mut id_map: HashMap<UnitId, UnitId> = HashMap::new();
    for (sub_id, unit) in sub.iter() {
        let parent_id = match parent.find_by_root(&unit.name, unit.root_page) {
            Some(id) => id,
            None => {
                let mut fresh = unit.clone();
                fresh.used_indexes.clear();
                fresh.where_columns.clear();
                fresh.order_columns.clear();
                fresh.where_index_columns.clear();
                fresh.order_index_columns.clear();
                fresh.where_expressions.clear();
                fresh.merged_columns.clear();
                fresh.covering_index_name.clear();
                fresh.covering_index_columns.clear();
                parent.insert(fresh)
            }
        };
        id_map.insert(sub_id, parent_id);
    }

    for (&sub_id, &parent_id) in &id_map {
        if let (Some(sub_owner), None) = (sub.owner(sub_id), parent.owner(parent_id)) {
            if let Some(&owner) = id_map.get(&sub_owner) {
                parent.set_owner(parent_id, owner);
            }
        }
    }

    let index_names = sub_index_names(&sub);
    let translate = |parent: &UnitArena, cursor: i64| -> i64 {
        index_names
            .get(&cursor)
            .and_then(|name| parent.find(name, ObjectKind::Index))
            .map(|id| parent.get(id).cursor_no)
            .unwrap_or(cursor)
    };

    for (sub_id, unit) in sub.iter() {
        let parent_id = id_map[&sub_id];
        let used: Vec<IndexRef> = unit
            .used_indexes
            .iter()
            .map(|r| IndexRef {
                cursor_no: parent
                    .find(&r.index_name, ObjectKind::Index)
                    .map(|id| parent.get(id).cursor_no)
                    .unwrap_or(r.cursor_no),
                index_name: r.index_name.clone(),
            })
            .collect();
        let where_index = translate_columns(&unit.where_index_columns, |c| translate(parent, c));
        let order_index = translate_columns(&unit.order_index_columns, |c| translate(parent, c));

        let target = parent.get_mut(parent_id);
        target.used_indexes.extend(used);
        target.where_columns.extend(unit.where_columns.iter().cloned());
        target.order_columns.extend(unit.order_columns.iter().cloned());
        target.where_expressions.extend(unit.where_expressions.iter().cloned());
        target.where_index_columns.extend(where_index);
        target.order_index_columns.extend(order_index);
    }
}

/// Cursor number to index name, as seen by the sub-select's trace.
fn sub_index_names(sub: &UnitArena) -> HashMap<i64, String> {
    let mut names = HashMap::new();
    for (_, unit) in sub.iter() {
        for used in &unit.used_indexes {
            names.insert(used.cursor_no, used.index_name.clone());
        }
    }
    for (_, unit) in sub.iter().filter(|(_, u)| u.is_index()) {
        names.insert(unit.cursor_no, unit.name.clone());
    }
    names
}

fn translate_columns(columns: &IndexSet<IndexColumn>, translate: impl Fn(i64) -> i64) -> Vec<IndexColumn> {
    columns
        .iter()
        .map(|c| IndexColumn {
            cursor_no: translate(c.cursor_no),
            column: c.column.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::unit::{AnalysisUnit, Clause};

    fn arena_with_index(table_cursor: i64, index_cursor: i64) -> (UnitArena, UnitId, UnitId) {
        let mut arena = UnitArena::new();
        let table = arena.insert(AnalysisUnit::new(table_cursor, 2, ObjectKind::Table, "t", ""));
        let index = arena.insert(AnalysisUnit::new(index_cursor, 3, ObjectKind::Index, "idx_t_a", "t"));
        arena.set_owner(index, table);
        arena.get_mut(table).used_indexes.insert(IndexRef {
            cursor_no: index_cursor,
            index_name: "idx_t_a".to_string(),
        });
        (arena, table, index)
    }

    #[test]
    fn test_index_cursors_translated_by_name() {
        let (mut parent, p_table, _) = arena_with_index(0, 1);
        let (mut sub, _, s_index) = arena_with_index(3, 7);
        sub.record_column(s_index, Clause::Where, "a");

        merge(&mut parent, sub);
        let t = parent.get(p_table);
        assert!(t.where_columns.contains("a"));
        assert_eq!(
            t.where_index_columns.iter().map(|c| c.cursor_no).collect::<Vec<_>>(),
            vec![1]
        );
        assert_eq!(t.used_indexes.len(), 1);
    }

    #[test]
    fn test_unmatched_units_are_appended_and_relinked() {
        let mut parent = UnitArena::new();
        parent.insert(AnalysisUnit::new(0, 9, ObjectKind::Table, "other", ""));
        let (mut sub, _, s_index) = arena_with_index(-4, 4);
        sub.record_column(s_index, Clause::OrderBy, "a");

        merge(&mut parent, sub);
        assert_eq!(parent.len(), 3);
        let table = parent.find("t", ObjectKind::Table).unwrap();
        let index = parent.find("idx_t_a", ObjectKind::Index).unwrap();
        assert_eq!(parent.owner(index), Some(table));
        assert!(parent.get(table).order_columns.contains("a"));
        assert!(parent.get(index).order_columns.contains("a"));
    }

    #[test]
    fn test_merge_twice_does_not_grow_sets() {
        let (mut parent, p_table, _) = arena_with_index(0, 1);
        let build_sub = || {
            let (mut sub, s_table, _) = arena_with_index(0, 1);
            sub.record_column(s_table, Clause::Where, "b");
            sub.record_expression(s_table, "\"b\"=1".to_string());
            sub
        };
        merge(&mut parent, build_sub());
        merge(&mut parent, build_sub());
        let t = parent.get(p_table);
        assert_eq!(t.where_columns.len(), 1);
        assert_eq!(t.where_expressions.len(), 1);
    }
}
