//! Covering-index verdicts.

use super::literal::quote_identifier;
use super::unit::{AnalysisUnit, IndexColumn, UnitArena};
use crate::schema::Catalog;

/// An index's name and ordered column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexColumns {
    pub name: String,
    pub columns: Vec<String>,
}

/// Exact, order-sensitive, length-equal match of `merged` against `columns`.
/// A prefix match does not cover.
fn covers(merged: &[&String], columns: &[String]) -> bool {
    merged.len() == columns.len()
        && merged
            .iter()
            .zip(columns)
            .all(|(m, c)| m.eq_ignore_ascii_case(c))
}

/// First index covering the unit's merged WHERE+ORDER columns: indexes
/// already used against the table are tried first, then every index of the
/// table in catalog order.
pub fn match_covering<'a>(unit: &AnalysisUnit, all_indexes_of_table: &'a [IndexColumns]) -> Option<&'a IndexColumns> {
    if unit.merged_columns.is_empty() {
        return None;
    }
    let merged: Vec<&String> = unit.merged_columns.iter().collect();
    let used = unit.used_indexes.iter().filter_map(|used| {
        all_indexes_of_table
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(&used.index_name))
    });
    used.chain(all_indexes_of_table.iter())
        .find(|index| covers(&merged, &index.columns))
}

/// Merge each table unit's columns and record its covering index, if any.
pub fn apply(arena: &mut UnitArena, catalog: &dyn Catalog) {
    for id in arena.ids() {
        arena.get_mut(id).merge_columns();
        if arena.get(id).is_index() {
            continue;
        }
        let table = arena.get(id).name.clone();
        let indexes: Vec<IndexColumns> = catalog
            .indexes_of_table(&table)
            .into_iter()
            .map(|name| IndexColumns {
                columns: catalog.columns_of_index(&name),
                name,
            })
            .collect();
        let Some(found) = match_covering(arena.get(id), &indexes).cloned() else {
            continue;
        };

        // Cursor the index was opened under in this trace, else the table's.
        let cursor_no = arena
            .get(id)
            .used_indexes
            .iter()
            .find(|u| u.index_name.eq_ignore_ascii_case(&found.name))
            .map(|u| u.cursor_no)
            .unwrap_or(arena.get(id).cursor_no);
        let unit = arena.get_mut(id);
        unit.covering_index_columns = found
            .columns
            .iter()
            .map(|column| IndexColumn {
                cursor_no,
                column: column.clone(),
            })
            .collect();
        unit.covering_index_name = found.name;
    }
}

/// `CREATE INDEX` for a table unit without a covering index, or `None` when
/// it has one or has no columns to index.
pub fn suggest_index_ddl(unit: &AnalysisUnit) -> Option<String> {
    if unit.is_index() || !unit.covering_index_name.is_empty() || unit.merged_columns.is_empty() {
        return None;
    }
    let name = format!(
        "idx_{}_{}",
        unit.name,
        unit.merged_columns
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("_")
    );
    let columns = unit
        .merged_columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!(
        "CREATE INDEX {} ON {} ({})",
        quote_identifier(&name),
        quote_identifier(&unit.name),
        columns
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::unit::IndexRef;
    use crate::schema::{CatalogSnapshot, ObjectKind};

    fn table_with(merged: &[&str]) -> AnalysisUnit {
        let mut unit = AnalysisUnit::new(0, 2, ObjectKind::Table, "t", "");
        unit.merged_columns = merged.iter().map(|c| c.to_string()).collect();
        unit
    }

    fn idx(name: &str, columns: &[&str]) -> IndexColumns {
        IndexColumns {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_covering_is_order_sensitive() {
        let indexes = vec![idx("idx_ba", &["b", "a"])];
        assert!(match_covering(&table_with(&["a", "b"]), &indexes).is_none());
        assert_eq!(
            match_covering(&table_with(&["b", "a"]), &indexes).map(|i| i.name.as_str()),
            Some("idx_ba")
        );
    }

    #[test]
    fn test_prefix_is_not_covering() {
        let indexes = vec![idx("idx_abc", &["a", "b", "c"])];
        assert!(match_covering(&table_with(&["a", "b"]), &indexes).is_none());
    }

    #[test]
    fn test_used_index_preferred_over_catalog_order() {
        let indexes = vec![idx("idx_x_1", &["x"]), idx("idx_x_2", &["x"])];
        let mut unit = table_with(&["x"]);
        unit.used_indexes.insert(IndexRef {
            cursor_no: 3,
            index_name: "idx_x_2".to_string(),
        });
        assert_eq!(match_covering(&unit, &indexes).unwrap().name, "idx_x_2");
    }

    #[test]
    fn test_empty_merged_columns_never_match() {
        let indexes = vec![idx("idx_empty", &[])];
        assert!(match_covering(&table_with(&[]), &indexes).is_none());
    }

    #[test]
    fn test_apply_scenario_xy() {
        let cat = CatalogSnapshot::new()
            .with_table("t", 2, &["x", "y"], None)
            .with_index("idx_yx", 3, "t", &["y", "x"])
            .with_index("idx_xy", 4, "t", &["x", "y"]);
        let mut arena = UnitArena::new();
        let id = arena.insert(AnalysisUnit::new(0, 2, ObjectKind::Table, "t", ""));
        arena.get_mut(id).where_columns.insert("x".to_string());
        arena.get_mut(id).order_columns.insert("y".to_string());

        apply(&mut arena, &cat);
        let unit = arena.get(id);
        assert_eq!(unit.covering_index_name, "idx_xy");
        assert_eq!(
            unit.covering_index_columns.iter().map(|c| (c.cursor_no, c.column.as_str())).collect::<Vec<_>>(),
            vec![(0, "x"), (0, "y")]
        );
        assert!(suggest_index_ddl(unit).is_none());
    }

    #[test]
    fn test_suggest_index_ddl() {
        let unit = table_with(&["status", "created_at"]);
        assert_eq!(
            suggest_index_ddl(&unit).as_deref(),
            Some("CREATE INDEX \"idx_t_status_created_at\" ON \"t\" (\"status\", \"created_at\")")
        );
    }
}
