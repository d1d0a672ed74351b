//! Metadata Introspector
//!
//! Reads the catalog of one layer at call time and turns what it finds into
//! maintenance statements. Nothing is cached: tables and indexes may appear or
//! disappear between runs. A layer whose schema does not exist yields empty
//! results.

use dwh_storage::{
    CatalogObject, Layer, MaintenanceStatement, QualifiedName, TableDescriptor, Warehouse,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::config::WarehouseConfig;
use crate::error::Result;

#[derive(Clone)]
pub struct MetadataIntrospector {
    warehouse: Arc<dyn Warehouse>,
    registry: Arc<WarehouseConfig>,
}

impl MetadataIntrospector {
    pub fn new(warehouse: Arc<dyn Warehouse>, registry: Arc<WarehouseConfig>) -> Self {
        Self {
            warehouse,
            registry,
        }
    }

    /// Constraints and indexes of the layer
    ///
    /// Constraints come before indexes, then objects are ordered by table and
    /// name. Objects reported twice are kept once.
    pub async fn objects(&self, layer: Layer) -> Result<Vec<CatalogObject>> {
        if !self.warehouse.layer_exists(layer).await? {
            debug!(layer = %layer, "layer schema absent, nothing to introspect");
            return Ok(Vec::new());
        }

        let mut objects = self.warehouse.list_objects(layer).await?;
        objects.sort_by(|a, b| {
            let left = (!a.kind.is_constraint(), &a.table, &a.name);
            let right = (!b.kind.is_constraint(), &b.table, &b.name);
            left.cmp(&right)
        });

        let mut seen = HashSet::new();
        objects.retain(|o| seen.insert((o.table.clone(), o.name.clone())));

        debug!(layer = %layer, count = objects.len(), "introspected catalog objects");
        Ok(objects)
    }

    /// Tables of the layer, classified against the registry
    pub async fn tables(&self, layer: Layer) -> Result<Vec<TableDescriptor>> {
        if !self.warehouse.layer_exists(layer).await? {
            return Ok(Vec::new());
        }

        let tables = self
            .warehouse
            .list_tables(layer)
            .await?
            .into_iter()
            .map(|name| TableDescriptor {
                layer,
                class: self.registry.classify(layer, &name),
                name,
            })
            .collect();
        Ok(tables)
    }

    /// Physical columns of a table, in declaration order
    pub async fn columns(&self, table: &QualifiedName) -> Result<Vec<String>> {
        Ok(self.warehouse.table_columns(table).await?)
    }

    /// Drop statements for every object of the layer, constraints first
    pub async fn cleanup_statements(&self, layer: Layer) -> Result<Vec<MaintenanceStatement>> {
        Ok(self
            .objects(layer)
            .await?
            .into_iter()
            .map(drop_statement)
            .collect())
    }
}

fn drop_statement(object: CatalogObject) -> MaintenanceStatement {
    if object.kind.is_constraint() {
        MaintenanceStatement::DropConstraint { object }
    } else {
        MaintenanceStatement::DropIndex { object }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwh_storage::{ObjectKind, SqliteWarehouse, TableClass};

    fn registry() -> Arc<WarehouseConfig> {
        Arc::new(
            WarehouseConfig::from_yaml_str(
                r#"
version: 1
load:
  dimensions:
    - table: dim_products
      source: raw.v_products
      surrogate_key: product_key
      business_key: product_id
      columns: [product_id]
  facts:
    - table: fact_sales
      source: raw.v_sales
      columns: [product_id]
      lookups:
        - dimension: dim_products
          natural_key: product_id
          target_column: product_key
"#,
            )
            .unwrap(),
        )
    }

    fn introspector() -> (SqliteWarehouse, MetadataIntrospector) {
        let wh = SqliteWarehouse::in_memory(&[Layer::Raw, Layer::Cleansed]).unwrap();
        wh.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TABLE cleansed.dim_products (product_key INTEGER, product_id TEXT);
                 CREATE TABLE cleansed.fact_sales (product_key INTEGER, product_id TEXT);
                 CREATE TABLE cleansed.scratch (x INTEGER);
                 CREATE INDEX cleansed.ix_dim_products_product_id ON dim_products (product_id);
                 CREATE UNIQUE INDEX cleansed.pk_dim_products ON dim_products (product_key);
                 CREATE INDEX cleansed.cci_fact_sales ON fact_sales (product_key, product_id);
                 CREATE UNIQUE INDEX cleansed.uq_scratch_x ON scratch (x);",
            )?;
            Ok(())
        })
        .unwrap();
        let introspector = MetadataIntrospector::new(Arc::new(wh.clone()), registry());
        (wh, introspector)
    }

    #[tokio::test]
    async fn test_constraints_before_indexes() {
        let (_wh, introspector) = introspector();
        let objects = introspector.objects(Layer::Cleansed).await.unwrap();

        let names: Vec<&str> = objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "pk_dim_products",
                "uq_scratch_x",
                "ix_dim_products_product_id",
                "cci_fact_sales"
            ]
        );
        assert_eq!(objects[1].kind, ObjectKind::UniqueConstraint);
    }

    #[tokio::test]
    async fn test_missing_layer_is_empty() {
        let (_wh, introspector) = introspector();
        assert!(introspector.objects(Layer::Reporting).await.unwrap().is_empty());
        assert!(introspector.tables(Layer::Reporting).await.unwrap().is_empty());
        assert!(introspector
            .cleanup_statements(Layer::Reporting)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_tables_classified() {
        let (_wh, introspector) = introspector();
        let tables = introspector.tables(Layer::Cleansed).await.unwrap();
        let classes: Vec<(&str, TableClass)> =
            tables.iter().map(|t| (t.name.as_str(), t.class)).collect();
        assert_eq!(
            classes,
            vec![
                ("dim_products", TableClass::Dimension),
                ("fact_sales", TableClass::Fact),
                ("scratch", TableClass::Unclassified),
            ]
        );
    }

    #[tokio::test]
    async fn test_reflects_catalog_at_call_time() {
        let (wh, introspector) = introspector();
        assert_eq!(introspector.objects(Layer::Cleansed).await.unwrap().len(), 4);

        wh.with_conn(|conn| {
            conn.execute_batch("DROP INDEX cleansed.cci_fact_sales;")?;
            Ok(())
        })
        .unwrap();
        assert_eq!(introspector.objects(Layer::Cleansed).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_cleanup_statements() {
        let (_wh, introspector) = introspector();
        let statements = introspector.cleanup_statements(Layer::Cleansed).await.unwrap();

        assert_eq!(statements.len(), 4);
        assert!(statements.iter().all(|s| s.is_drop()));
        assert_eq!(statements[0].kind(), "drop_constraint");
        assert_eq!(statements[3].kind(), "drop_index");
    }
}
