//! SQL dialect strategy
//!
//! A [`Dialect`] renders [`MaintenanceStatement`]s for one storage engine.
//! Structural statements differ a lot between engines and are required
//! methods; the load statements are plain `INSERT ... SELECT` with window
//! functions and share a default rendering that only depends on identifier
//! quoting.

use super::models::{CatalogObject, QualifiedName};
use super::statement::{DimensionLoad, FactLoad, MaintenanceStatement};

/// Alias of the deduplication rank column in dimension loads
const DEDUPE_RANK: &str = "__dedupe_rank";

pub trait Dialect: Send + Sync {
    /// Dialect identifier (e.g. "sqlite", "tsql")
    fn name(&self) -> &'static str;

    /// Quote one identifier
    fn quote_ident(&self, ident: &str) -> String;

    fn qualify(&self, name: &QualifiedName) -> String {
        format!(
            "{}.{}",
            self.quote_ident(&name.schema),
            self.quote_ident(&name.name)
        )
    }

    fn quote_list(&self, idents: &[String]) -> String {
        idents
            .iter()
            .map(|c| self.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn drop_constraint(&self, object: &CatalogObject) -> String;

    fn drop_index(&self, object: &CatalogObject) -> String;

    fn create_primary_key(&self, table: &QualifiedName, name: &str, column: &str) -> String;

    fn create_index(
        &self,
        table: &QualifiedName,
        name: &str,
        columns: &[String],
        include: &[String],
        unique: bool,
    ) -> String;

    fn create_columnstore_index(
        &self,
        table: &QualifiedName,
        name: &str,
        columns: &[String],
    ) -> String;

    fn truncate(&self, table: &QualifiedName) -> String;

    fn delete_rows(&self, table: &QualifiedName) -> String {
        format!("DELETE FROM {}", self.qualify(table))
    }

    /// `INSERT ... SELECT` assigning surrogate keys by business key order
    ///
    /// Rows with a null business key are skipped and duplicates collapse to
    /// the first row under `dedupe_order_by`, ties broken by the loaded
    /// columns in order.
    fn dimension_load(&self, load: &DimensionLoad) -> String {
        let q = |ident: &str| self.quote_ident(ident);
        let src = q("src");
        let s = q("s");
        let rank = q(DEDUPE_RANK);
        let business_key = q(&load.business_key);

        // Remaining loaded columns break ties
        let mut dedupe: Vec<String> = load
            .dedupe_order_by
            .iter()
            .map(|order| format!("{}.{} {}", s, q(&order.column), order.direction.as_sql()))
            .collect();
        dedupe.extend(
            load.columns
                .iter()
                .filter(|c| **c != load.business_key)
                .filter(|c| load.dedupe_order_by.as_ref().map_or(true, |o| o.column != **c))
                .map(|c| format!("{}.{}", s, q(c))),
        );
        if dedupe.is_empty() {
            dedupe.push(format!("{}.{}", s, business_key));
        }
        let dedupe = dedupe.join(", ");

        let inner_columns = load
            .columns
            .iter()
            .map(|c| format!("{}.{}", s, q(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let outer_columns = load
            .columns
            .iter()
            .map(|c| format!("{}.{}", src, q(c)))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "INSERT INTO {target} ({sk}, {columns}) \
             SELECT ROW_NUMBER() OVER (ORDER BY {src}.{bk}), {outer} \
             FROM (SELECT {inner}, ROW_NUMBER() OVER (PARTITION BY {s}.{bk} ORDER BY {dedupe}) AS {rank} \
             FROM {source} AS {s} WHERE {s}.{bk} IS NOT NULL) AS {src} \
             WHERE {src}.{rank} = 1",
            target = self.qualify(&load.target),
            sk = q(&load.surrogate_key),
            columns = self.quote_list(&load.columns),
            src = src,
            bk = business_key,
            outer = outer_columns,
            inner = inner_columns,
            s = s,
            dedupe = dedupe,
            rank = rank,
            source = self.qualify(&load.source),
        )
    }

    /// `INSERT ... SELECT` resolving every lookup with a sentinel-safe left join
    fn fact_load(&self, load: &FactLoad) -> String {
        let q = |ident: &str| self.quote_ident(ident);
        let src = q("src");

        let mut target_columns: Vec<String> = load.columns.iter().map(|c| q(c)).collect();
        let mut projections: Vec<String> = load
            .columns
            .iter()
            .map(|c| format!("{}.{}", src, q(c)))
            .collect();
        let mut joins = String::new();

        for (i, lookup) in load.lookups.iter().enumerate() {
            let alias = q(&format!("d{}", i));
            target_columns.push(q(&lookup.target_column));
            projections.push(format!(
                "COALESCE({}.{}, {})",
                alias,
                q(&lookup.surrogate_key),
                load.sentinel
            ));
            joins.push_str(&format!(
                " LEFT JOIN {} AS {} ON {}.{} = {}.{}",
                self.qualify(&lookup.dimension),
                alias,
                alias,
                q(&lookup.business_key),
                src,
                q(&lookup.natural_key),
            ));
        }

        format!(
            "INSERT INTO {} ({}) SELECT {} FROM {} AS {}{}",
            self.qualify(&load.target),
            target_columns.join(", "),
            projections.join(", "),
            self.qualify(&load.source),
            src,
            joins
        )
    }

    fn render(&self, statement: &MaintenanceStatement) -> String {
        match statement {
            MaintenanceStatement::DropConstraint { object } => self.drop_constraint(object),
            MaintenanceStatement::DropIndex { object } => self.drop_index(object),
            MaintenanceStatement::CreatePrimaryKey {
                table,
                name,
                column,
            } => self.create_primary_key(table, name, column),
            MaintenanceStatement::CreateIndex {
                table,
                name,
                columns,
                include,
                unique,
            } => self.create_index(table, name, columns, include, *unique),
            MaintenanceStatement::CreateColumnStoreIndex {
                table,
                name,
                columns,
            } => self.create_columnstore_index(table, name, columns),
            MaintenanceStatement::Truncate { table } => self.truncate(table),
            MaintenanceStatement::DeleteRows { table } => self.delete_rows(table),
            MaintenanceStatement::LoadDimension(load) => self.dimension_load(load),
            MaintenanceStatement::LoadFacts(load) => self.fact_load(load),
        }
    }
}
