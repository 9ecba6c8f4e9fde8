use serde::{Deserialize, Serialize};

use super::{column_position, Catalog, IndexDef, ObjectKind, SchemaObject, TableDef};

/// A point-in-time copy of the schema. Tables and indexes keep the order in
/// which they were declared (`sqlite_master` rowid order when loaded from a
/// live database).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub tables: Vec<TableDef>,
    pub indexes: Vec<IndexDef>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style table registration, mostly for fixtures.
    pub fn with_table(
        mut self,
        name: &str,
        root_page: u64,
        columns: &[&str],
        primary_key: Option<&str>,
    ) -> Self {
        self.tables.push(TableDef {
            name: name.to_string(),
            root_page,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            primary_key: primary_key.map(str::to_string),
        });
        self
    }

    pub fn with_index(mut self, name: &str, root_page: u64, table: &str, columns: &[&str]) -> Self {
        self.indexes.push(IndexDef {
            name: name.to_string(),
            table: table.to_string(),
            root_page,
            unique: false,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name.eq_ignore_ascii_case(name))
    }

    /// All index definitions on `table`, in declared order.
    pub fn index_defs_of(&self, table: &str) -> Vec<&IndexDef> {
        self.indexes
            .iter()
            .filter(|i| i.table.eq_ignore_ascii_case(table))
            .collect()
    }
}

impl Catalog for CatalogSnapshot {
    fn object_by_root_page(&self, root_page: u64) -> Option<SchemaObject> {
        if let Some(t) = self.tables.iter().find(|t| t.root_page == root_page) {
            return Some(SchemaObject {
                name: t.name.clone(),
                kind: ObjectKind::Table,
                owning_table: String::new(),
                root_page,
            });
        }
        self.indexes
            .iter()
            .find(|i| i.root_page == root_page)
            .map(|i| SchemaObject {
                name: i.name.clone(),
                kind: ObjectKind::Index,
                owning_table: i.table.clone(),
                root_page,
            })
    }

    fn table_root_page(&self, table: &str) -> Option<u64> {
        self.table(table).map(|t| t.root_page)
    }

    fn columns_of_table(&self, table: &str) -> Vec<String> {
        self.table(table).map(|t| t.columns.clone()).unwrap_or_default()
    }

    fn indexes_of_table(&self, table: &str) -> Vec<String> {
        self.index_defs_of(table).into_iter().map(|i| i.name.clone()).collect()
    }

    fn columns_of_index(&self, index: &str) -> Vec<String> {
        self.index(index).map(|i| i.columns.clone()).unwrap_or_default()
    }

    fn primary_key_column(&self, table: &str) -> Option<String> {
        let t = self.table(table)?;
        let pk = t.primary_key.as_deref()?;
        // A declared key that is not one of the table's columns is a stale snapshot.
        column_position(&t.columns, pk).map(|pos| t.columns[pos].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CatalogSnapshot {
        CatalogSnapshot::new()
            .with_table("users", 2, &["id", "name", "age"], Some("id"))
            .with_index("idx_users_name", 3, "users", &["name"])
            .with_index("idx_users_age_name", 4, "users", &["age", "name"])
            .with_table("orders", 5, &["id", "user_id"], Some("id"))
    }

    #[test]
    fn test_object_by_root_page_resolves_tables_and_indexes() {
        let cat = sample();
        let t = cat.object_by_root_page(2).unwrap();
        assert_eq!(t.kind, ObjectKind::Table);
        assert_eq!(t.name, "users");
        assert!(t.owning_table.is_empty());

        let i = cat.object_by_root_page(4).unwrap();
        assert_eq!(i.kind, ObjectKind::Index);
        assert_eq!(i.owning_table, "users");
        assert!(cat.object_by_root_page(99).is_none());
    }

    #[test]
    fn test_lookups_are_case_insensitive() {
        let cat = sample();
        assert_eq!(cat.columns_of_table("USERS"), vec!["id", "name", "age"]);
        assert_eq!(cat.columns_of_index("IDX_USERS_NAME"), vec!["name"]);
        assert_eq!(cat.primary_key_column("Users").as_deref(), Some("id"));
    }

    #[test]
    fn test_indexes_of_table_keeps_declared_order() {
        let cat = sample();
        assert_eq!(
            cat.indexes_of_table("users"),
            vec!["idx_users_name", "idx_users_age_name"]
        );
        assert!(cat.indexes_of_table("orders").is_empty());
    }

    #[test]
    fn test_primary_key_not_in_columns_is_a_miss() {
        let cat = CatalogSnapshot::new().with_table("t", 2, &["a"], Some("ghost"));
        assert!(cat.primary_key_column("t").is_none());
    }
}
