//! Index Lifecycle Manager
//!
//! `RebuildIndexes(layer)` runs in two phases:
//!
//! 1. **Cleanup**: drop every constraint and index the introspector reports,
//!    constraints first. Objects already gone are skipped.
//! 2. **Build**: apply the fixed per-class policy. Dimensions get a clustering
//!    key on the surrogate key plus row-store indexes on the business key and
//!    the configured filter columns; facts get one column-store index.
//!
//! All drops complete before any create. A failed create is not rolled back;
//! the error names the object and its table.

use dwh_storage::{Layer, MaintenanceStatement, TableClass, Warehouse};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::WarehouseConfig;
use crate::error::{MaintenanceError, Result};
use crate::introspector::MetadataIntrospector;

// ═══════════════════════════════════════════════════════════════════════════
// Policy
// ═══════════════════════════════════════════════════════════════════════════

/// Index policy of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TablePolicy {
    Dimension {
        table: String,
        surrogate_key: String,
        business_key: String,
        index_columns: Vec<String>,
        include_columns: Vec<String>,
    },
    Fact {
        table: String,
    },
}

impl TablePolicy {
    pub fn table(&self) -> &str {
        match self {
            TablePolicy::Dimension { table, .. } | TablePolicy::Fact { table } => table,
        }
    }

    pub fn class(&self) -> TableClass {
        match self {
            TablePolicy::Dimension { .. } => TableClass::Dimension,
            TablePolicy::Fact { .. } => TableClass::Fact,
        }
    }

    /// Create statements for this table
    ///
    /// `columns` are the table's physical columns; only facts use them.
    pub fn statements(&self, layer: Layer, columns: &[String]) -> Vec<MaintenanceStatement> {
        let qualified = layer.table(self.table());
        match self {
            TablePolicy::Dimension {
                table,
                surrogate_key,
                business_key,
                index_columns,
                include_columns,
            } => {
                let mut statements = vec![
                    MaintenanceStatement::CreatePrimaryKey {
                        table: qualified.clone(),
                        name: format!("pk_{}", table),
                        column: surrogate_key.clone(),
                    },
                    MaintenanceStatement::CreateIndex {
                        table: qualified.clone(),
                        name: format!("ix_{}_{}", table, business_key),
                        columns: vec![business_key.clone()],
                        include: Vec::new(),
                        unique: false,
                    },
                ];
                for column in index_columns {
                    if column == business_key || column == surrogate_key {
                        continue;
                    }
                    statements.push(MaintenanceStatement::CreateIndex {
                        table: qualified.clone(),
                        name: format!("ix_{}_{}", table, column),
                        columns: vec![column.clone()],
                        include: include_columns.clone(),
                        unique: false,
                    });
                }
                statements
            }
            TablePolicy::Fact { table } => vec![MaintenanceStatement::CreateColumnStoreIndex {
                table: qualified,
                name: format!("cci_{}", table),
                columns: columns.to_vec(),
            }],
        }
    }
}

/// Fixed table-class-keyed index policy, per layer
#[derive(Debug, Clone, Default)]
pub struct IndexPolicy {
    layers: BTreeMap<Layer, Vec<TablePolicy>>,
}

impl IndexPolicy {
    /// Policy for the load registry plus the `indexing` entries
    pub fn from_config(config: &WarehouseConfig) -> Self {
        let mut layers: BTreeMap<Layer, Vec<TablePolicy>> = BTreeMap::new();

        let load_layer = layers.entry(config.load.layer).or_default();
        for dim in &config.load.dimensions {
            load_layer.push(TablePolicy::Dimension {
                table: dim.table.clone(),
                surrogate_key: dim.surrogate_key.clone(),
                business_key: dim.business_key.clone(),
                index_columns: dim.index_columns.clone(),
                include_columns: dim.include_columns.clone(),
            });
        }
        for fact in &config.load.facts {
            load_layer.push(TablePolicy::Fact {
                table: fact.table.clone(),
            });
        }

        for entry in &config.indexing {
            let policy = match (entry.class, &entry.surrogate_key, &entry.business_key) {
                (TableClass::Dimension, Some(surrogate_key), Some(business_key)) => {
                    TablePolicy::Dimension {
                        table: entry.table.clone(),
                        surrogate_key: surrogate_key.clone(),
                        business_key: business_key.clone(),
                        index_columns: entry.index_columns.clone(),
                        include_columns: entry.include_columns.clone(),
                    }
                }
                (TableClass::Fact, _, _) => TablePolicy::Fact {
                    table: entry.table.clone(),
                },
                // rejected by validation
                _ => continue,
            };
            layers.entry(entry.layer).or_default().push(policy);
        }

        Self { layers }
    }

    pub fn for_layer(&self, layer: Layer) -> &[TablePolicy] {
        self.layers.get(&layer).map(Vec::as_slice).unwrap_or(&[])
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Reports
// ═══════════════════════════════════════════════════════════════════════════

/// Outcome of the build phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildOutcome {
    /// Objects created, in creation order
    pub created: Vec<String>,
    /// Policy tables missing from the catalog
    pub skipped_tables: Vec<String>,
    /// Catalog tables without a policy, left as heaps
    pub unmanaged_tables: Vec<String>,
}

/// Outcome of `RebuildIndexes(layer)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub layer: Layer,
    /// Objects dropped during cleanup (including ones already gone)
    pub dropped: Vec<String>,
    pub created: Vec<String>,
    pub skipped_tables: Vec<String>,
    pub unmanaged_tables: Vec<String>,
}

impl RebuildReport {
    pub fn new(layer: Layer, dropped: Vec<String>, build: BuildOutcome) -> Self {
        Self {
            layer,
            dropped,
            created: build.created,
            skipped_tables: build.skipped_tables,
            unmanaged_tables: build.unmanaged_tables,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Manager
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct IndexLifecycleManager {
    warehouse: Arc<dyn Warehouse>,
    introspector: MetadataIntrospector,
    policy: IndexPolicy,
}

impl IndexLifecycleManager {
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        introspector: MetadataIntrospector,
        policy: IndexPolicy,
    ) -> Self {
        Self {
            warehouse,
            introspector,
            policy,
        }
    }

    pub fn policy(&self) -> &IndexPolicy {
        &self.policy
    }

    /// Drop every constraint and index of the layer
    ///
    /// Returns the names of the dropped objects.
    pub async fn cleanup(&self, layer: Layer) -> Result<Vec<String>> {
        let statements = self.introspector.cleanup_statements(layer).await?;
        let mut dropped = Vec::with_capacity(statements.len());

        for statement in statements {
            let object = statement.object_name().unwrap_or_default().to_string();
            match self.warehouse.execute(&statement).await {
                Ok(_) => debug!(layer = %layer, object = %object, "dropped"),
                Err(e) if e.is_not_found() => {
                    debug!(layer = %layer, object = %object, "already gone")
                }
                Err(source) => {
                    return Err(MaintenanceError::Structural {
                        object,
                        table: statement.table().clone(),
                        source,
                    })
                }
            }
            dropped.push(object);
        }

        info!(layer = %layer, dropped = dropped.len(), "cleanup complete");
        Ok(dropped)
    }

    /// Apply the index policy to the layer's current tables
    pub async fn build(&self, layer: Layer) -> Result<BuildOutcome> {
        let tables = self.introspector.tables(layer).await?;
        let present: HashSet<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        let mut outcome = BuildOutcome::default();

        for policy in self.policy.for_layer(layer) {
            if !present.contains(policy.table()) {
                warn!(
                    layer = %layer,
                    table = policy.table(),
                    "table in policy but not in catalog, skipping"
                );
                outcome.skipped_tables.push(policy.table().to_string());
                continue;
            }

            for statement in self.create_statements(layer, policy).await? {
                let object = statement.object_name().unwrap_or_default().to_string();
                if let Err(source) = self.warehouse.execute(&statement).await {
                    return Err(MaintenanceError::Structural {
                        object,
                        table: statement.table().clone(),
                        source,
                    });
                }
                debug!(layer = %layer, object = %object, "created");
                outcome.created.push(object);
            }
        }

        let managed: HashSet<&str> = self
            .policy
            .for_layer(layer)
            .iter()
            .map(|p| p.table())
            .collect();
        for table in &tables {
            if !managed.contains(table.name.as_str()) {
                info!(layer = %layer, table = %table.name, "no index policy, left as heap");
                outcome.unmanaged_tables.push(table.name.clone());
            }
        }

        info!(
            layer = %layer,
            created = outcome.created.len(),
            skipped = outcome.skipped_tables.len(),
            "build complete"
        );
        Ok(outcome)
    }

    /// Cleanup followed by build
    pub async fn rebuild_indexes(&self, layer: Layer) -> Result<RebuildReport> {
        let dropped = self.cleanup(layer).await?;
        let build = self.build(layer).await?;
        Ok(RebuildReport::new(layer, dropped, build))
    }

    /// Statements a rebuild would issue right now, without executing them
    pub async fn plan(&self, layer: Layer) -> Result<Vec<MaintenanceStatement>> {
        let mut statements = self.introspector.cleanup_statements(layer).await?;
        let present: HashSet<String> = self
            .introspector
            .tables(layer)
            .await?
            .into_iter()
            .map(|t| t.name)
            .collect();

        for policy in self.policy.for_layer(layer) {
            if present.contains(policy.table()) {
                statements.extend(self.create_statements(layer, policy).await?);
            }
        }
        Ok(statements)
    }

    async fn create_statements(
        &self,
        layer: Layer,
        policy: &TablePolicy,
    ) -> Result<Vec<MaintenanceStatement>> {
        let columns = match policy {
            TablePolicy::Fact { table } => self.introspector.columns(&layer.table(table)).await?,
            TablePolicy::Dimension { .. } => Vec::new(),
        };
        Ok(policy.statements(layer, &columns))
    }
}
