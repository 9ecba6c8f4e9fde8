use crate::schema::{Catalog, ObjectKind};

use super::unit::{AnalysisUnit, IndexRef, UnitArena, UnitId};

/// Find or create the owning table unit of `index` and link the two.
///
/// A table first seen through one of its indexes gets the negated index
/// cursor as a placeholder id until the table itself is opened. Returns
/// `None` when the catalog does not know the declared owning table.
pub(crate) fn link_index_to_table(
    arena: &mut UnitArena,
    catalog: &dyn Catalog,
    index: UnitId,
) -> Option<UnitId> {
    let (owning_table, index_cursor, index_name) = {
        let unit = arena.get(index);
        (unit.owning_table_name.clone(), unit.cursor_no, unit.name.clone())
    };

    let table = match arena.find(&owning_table, ObjectKind::Table) {
        Some(id) => id,
        None => {
            let Some(root_page) = catalog.table_root_page(&owning_table) else {
                tracing::debug!(
                    index = %index_name,
                    table = %owning_table,
                    "Owning table of index not in catalog; leaving index unlinked"
                );
                return None;
            };
            arena.insert(AnalysisUnit::new(
                -index_cursor,
                root_page,
                ObjectKind::Table,
                &owning_table,
                "",
            ))
        }
    };

    arena.set_owner(index, table);
    arena.get_mut(table).used_indexes.insert(IndexRef {
        cursor_no: index_cursor,
        index_name,
    });
    Some(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CatalogSnapshot;

    fn catalog() -> CatalogSnapshot {
        CatalogSnapshot::new()
            .with_table("t", 2, &["a", "b"], None)
            .with_index("idx_t_a", 3, "t", &["a"])
            .with_index("idx_orphan", 9, "missing", &["x"])
    }

    #[test]
    fn test_creates_owner_with_negated_cursor() {
        let cat = catalog();
        let mut arena = UnitArena::new();
        let idx = arena.insert(AnalysisUnit::new(4, 3, ObjectKind::Index, "idx_t_a", "t"));

        let table = link_index_to_table(&mut arena, &cat, idx).unwrap();
        let t = arena.get(table);
        assert_eq!(t.cursor_no, -4);
        assert_eq!(t.root_page, 2);
        assert_eq!(arena.owner(idx), Some(table));
        assert!(t.used_indexes.contains(&IndexRef {
            cursor_no: 4,
            index_name: "idx_t_a".to_string()
        }));
    }

    #[test]
    fn test_reuses_existing_table_unit() {
        let cat = catalog();
        let mut arena = UnitArena::new();
        let existing = arena.insert(AnalysisUnit::new(0, 2, ObjectKind::Table, "t", ""));
        let idx = arena.insert(AnalysisUnit::new(1, 3, ObjectKind::Index, "idx_t_a", "t"));

        assert_eq!(link_index_to_table(&mut arena, &cat, idx), Some(existing));
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(existing).cursor_no, 0);
    }

    #[test]
    fn test_catalog_miss_leaves_index_unlinked() {
        let cat = catalog();
        let mut arena = UnitArena::new();
        let idx = arena.insert(AnalysisUnit::new(1, 9, ObjectKind::Index, "idx_orphan", "missing"));

        assert_eq!(link_index_to_table(&mut arena, &cat, idx), None);
        assert_eq!(arena.owner(idx), None);
        assert_eq!(arena.len(), 1);
    }
}
