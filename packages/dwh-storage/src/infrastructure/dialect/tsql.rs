//! T-SQL dialect (SQL Server / Azure SQL)
//!
//! Used for planning: renders the same statements the SQLite adapter runs, in
//! the form a SQL Server warehouse expects (clustered primary keys, clustered
//! columnstore indexes, `TRUNCATE TABLE`).

use crate::domain::{CatalogObject, Dialect, QualifiedName};

#[derive(Debug, Clone, Copy, Default)]
pub struct TSqlDialect;

impl Dialect for TSqlDialect {
    fn name(&self) -> &'static str {
        "tsql"
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn drop_constraint(&self, object: &CatalogObject) -> String {
        format!(
            "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {}",
            self.qualify(&object.table),
            self.quote_ident(&object.name)
        )
    }

    fn drop_index(&self, object: &CatalogObject) -> String {
        format!(
            "DROP INDEX IF EXISTS {} ON {}",
            self.quote_ident(&object.name),
            self.qualify(&object.table)
        )
    }

    fn create_primary_key(&self, table: &QualifiedName, name: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY CLUSTERED ({})",
            self.qualify(table),
            self.quote_ident(name),
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
        let mut sql = format!(
            "CREATE {}NONCLUSTERED INDEX {} ON {} ({})",
            if unique { "UNIQUE " } else { "" },
            self.quote_ident(name),
            self.qualify(table),
            self.quote_list(columns)
        );
        let include: Vec<String> = include
            .iter()
            .filter(|c| !columns.contains(c))
            .cloned()
            .collect();
        if !include.is_empty() {
            sql.push_str(&format!(" INCLUDE ({})", self.quote_list(&include)));
        }
        sql
    }

    fn create_columnstore_index(
        &self,
        table: &QualifiedName,
        name: &str,
        _columns: &[String],
    ) -> String {
        format!(
            "CREATE CLUSTERED COLUMNSTORE INDEX {} ON {}",
            self.quote_ident(name),
            self.qualify(table)
        )
    }

    fn truncate(&self, table: &QualifiedName) -> String {
        format!("TRUNCATE TABLE {}", self.qualify(table))
    }
}
