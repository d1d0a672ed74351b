//! Dimensional Load Orchestrator
//!
//! Full-replace reload of the load layer: every table is truncated and
//! repopulated from its cleansing relation, dimensions first (assigning fresh
//! surrogate keys), then facts (resolving natural keys against the dimensions
//! just loaded).
//!
//! A failure stops the run where it happened. Tables before it stay loaded,
//! the failing table and everything after it may be empty. Re-run to recover.

use dwh_storage::{Layer, MaintenanceStatement, QualifiedName, TableClass, Warehouse};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{LoadStep, MaintenanceError, Result};
use crate::load_plan::{LoadNode, LoadPlan};

/// Rows loaded into one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableLoad {
    pub table: String,
    pub class: TableClass,
    pub rows: u64,
}

/// Fact rows whose reference did not resolve and carry the sentinel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedReferences {
    pub fact: String,
    pub dimension: String,
    pub column: String,
    pub rows: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub layer: Layer,
    /// Tables in load order
    pub tables: Vec<TableLoad>,
    /// Only lookups with at least one unresolved row
    pub unresolved: Vec<UnresolvedReferences>,
}

impl LoadReport {
    pub fn rows(&self, table: &str) -> Option<u64> {
        self.tables.iter().find(|t| t.table == table).map(|t| t.rows)
    }

    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

#[derive(Clone)]
pub struct LoadOrchestrator {
    warehouse: Arc<dyn Warehouse>,
    plan: LoadPlan,
}

impl LoadOrchestrator {
    pub fn new(warehouse: Arc<dyn Warehouse>, plan: LoadPlan) -> Self {
        Self { warehouse, plan }
    }

    pub fn plan(&self) -> &LoadPlan {
        &self.plan
    }

    /// `LoadLayer()`: dimensions, then facts
    pub async fn load_layer(&self) -> Result<LoadReport> {
        let layer = self.plan.layer();
        let plan = self.plan.execution_plan().replace('\n', "; ");
        info!(layer = %layer, plan = %plan, "starting load");

        let mut report = LoadReport {
            layer,
            tables: Vec::new(),
            unresolved: Vec::new(),
        };

        for node in self.plan.nodes_in_order() {
            let rows = self.load_table(node).await?;
            report.tables.push(TableLoad {
                table: node.table.clone(),
                class: node.class,
                rows,
            });

            if let MaintenanceStatement::LoadFacts(load) = &node.insert {
                for lookup in &load.lookups {
                    let filter = Some((lookup.target_column.as_str(), load.sentinel));
                    let unresolved = self.warehouse.count_rows(&load.target, filter).await?;
                    if unresolved > 0 {
                        warn!(
                            fact = %load.target,
                            dimension = %lookup.dimension,
                            rows = unresolved,
                            sentinel = load.sentinel,
                            "unresolved dimension references"
                        );
                        report.unresolved.push(UnresolvedReferences {
                            fact: node.table.clone(),
                            dimension: lookup.dimension.name.clone(),
                            column: lookup.target_column.clone(),
                            rows: unresolved,
                        });
                    }
                }
            }
        }

        info!(
            layer = %layer,
            tables = report.tables.len(),
            rows = report.total_rows(),
            "load complete"
        );
        Ok(report)
    }

    async fn load_table(&self, node: &LoadNode) -> Result<u64> {
        let target = node.target().clone();

        let truncate = MaintenanceStatement::Truncate {
            table: target.clone(),
        };
        self.step(&target, LoadStep::Truncate, &truncate).await?;
        let rows = self.step(&target, LoadStep::Insert, &node.insert).await?;

        info!(table = %target, class = %node.class, rows, "table loaded");
        Ok(rows)
    }

    async fn step(
        &self,
        table: &QualifiedName,
        step: LoadStep,
        statement: &MaintenanceStatement,
    ) -> Result<u64> {
        debug!(table = %table, step = %step, "load step");
        self.warehouse
            .execute(statement)
            .await
            .map_err(|source| MaintenanceError::Load {
                table: table.clone(),
                step,
                source,
            })
    }
}
