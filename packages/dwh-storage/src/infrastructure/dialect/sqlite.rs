//! SQLite dialect
//!
//! SQLite has no clustered or column-store indexes and no `ALTER TABLE ...
//! DROP CONSTRAINT`. Constraints managed by the lifecycle are therefore unique
//! indexes (`pk_*`), and the column-store index becomes a covering index over
//! every column. Index names are schema-qualified, the indexed table is not.

use crate::domain::{CatalogObject, Dialect, QualifiedName};

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    fn qualify_object(&self, table: &QualifiedName, name: &str) -> String {
        format!("{}.{}", self.quote_ident(&table.schema), self.quote_ident(name))
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }

    fn drop_constraint(&self, object: &CatalogObject) -> String {
        self.drop_index(object)
    }

    fn drop_index(&self, object: &CatalogObject) -> String {
        format!(
            "DROP INDEX IF EXISTS {}",
            self.qualify_object(&object.table, &object.name)
        )
    }

    fn create_primary_key(&self, table: &QualifiedName, name: &str, column: &str) -> String {
        format!(
            "CREATE UNIQUE INDEX {} ON {} ({})",
            self.qualify_object(table, name),
            self.quote_ident(&table.name),
            self.quote_ident(column)
        )
    }

    fn create_index(
        &self,
        table: &QualifiedName,
        name: &str,
        columns: &[String],
        include: &[String],
        unique: bool,
    ) -> String {
        // Included columns trail the key so the index still covers the query.
        let mut key: Vec<String> = columns.to_vec();
        key.extend(include.iter().filter(|c| !columns.contains(c)).cloned());

        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if unique { "UNIQUE " } else { "" },
            self.qualify_object(table, name),
            self.quote_ident(&table.name),
            self.quote_list(&key)
        )
    }

    fn create_columnstore_index(
        &self,
        table: &QualifiedName,
        name: &str,
        columns: &[String],
    ) -> String {
        format!(
            "CREATE INDEX {} ON {} ({})",
            self.qualify_object(table, name),
            self.quote_ident(&table.name),
            self.quote_list(columns)
        )
    }

    fn truncate(&self, table: &QualifiedName) -> String {
        // Unfiltered DELETE takes SQLite's truncate path
        format!("DELETE FROM {}", self.qualify(table))
    }
}
