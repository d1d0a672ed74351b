//! Load plan (DAG over fact → dimension references)
//!
//! Every fact depends on the dimensions it resolves surrogate keys against,
//! so a topological sort yields dimensions in the first group and facts
//! after them. Tables within a group are independent.

use dwh_storage::{
    DimensionLoad, DimensionLookup, FactLoad, Layer, MaintenanceStatement, QualifiedName,
    TableClass,
};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::{DimensionConfig, FactConfig, WarehouseConfig};
use crate::error::{MaintenanceError, Result};

/// One table load in the plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadNode {
    pub table: String,
    pub class: TableClass,
    pub dependencies: Vec<String>,
    /// `INSERT ... SELECT` repopulating the table
    pub insert: MaintenanceStatement,
}

impl LoadNode {
    pub fn new(
        table: impl Into<String>,
        class: TableClass,
        dependencies: Vec<String>,
        insert: MaintenanceStatement,
    ) -> Self {
        Self {
            table: table.into(),
            class,
            dependencies,
            insert,
        }
    }

    pub fn target(&self) -> &QualifiedName {
        self.insert.table()
    }
}

/// Ordered load plan for one layer
#[derive(Debug, Clone)]
pub struct LoadPlan {
    layer: Layer,
    nodes: BTreeMap<String, LoadNode>,
    execution_order: Vec<Vec<String>>, // groups of independent tables
}

impl LoadPlan {
    pub fn new(layer: Layer, nodes: Vec<LoadNode>) -> Result<Self> {
        let mut node_map = BTreeMap::new();
        for node in nodes {
            node_map.insert(node.table.clone(), node);
        }

        for node in node_map.values() {
            for dep in &node.dependencies {
                if !node_map.contains_key(dep) {
                    return Err(MaintenanceError::MissingDependency(format!(
                        "{} depends on {}, which is not part of the load plan",
                        node.table, dep
                    )));
                }
            }
        }

        let execution_order = Self::topological_sort(&node_map)?;

        Ok(Self {
            layer,
            nodes: node_map,
            execution_order,
        })
    }

    /// Plan for the configured load registry
    pub fn from_config(config: &WarehouseConfig) -> Result<Self> {
        let layer = config.load.layer;
        let mut nodes = Vec::new();

        for dim in &config.load.dimensions {
            nodes.push(LoadNode::new(
                &dim.table,
                TableClass::Dimension,
                Vec::new(),
                MaintenanceStatement::LoadDimension(dimension_load(layer, dim)?),
            ));
        }

        for fact in &config.load.facts {
            let load = fact_load(config, fact)?;
            let mut dependencies: Vec<String> =
                fact.lookups.iter().map(|l| l.dimension.clone()).collect();
            dependencies.dedup();
            nodes.push(LoadNode::new(
                &fact.table,
                TableClass::Fact,
                dependencies,
                MaintenanceStatement::LoadFacts(load),
            ));
        }

        Self::new(layer, nodes)
    }

    /// Kahn's algorithm with parallel group detection
    fn topological_sort(nodes: &BTreeMap<String, LoadNode>) -> Result<Vec<Vec<String>>> {
        let mut in_degree: BTreeMap<&str, usize> = nodes
            .values()
            .map(|n| {
                let distinct: BTreeSet<&String> = n.dependencies.iter().collect();
                (n.table.as_str(), distinct.len())
            })
            .collect();

        let mut result = Vec::new();

        while !in_degree.is_empty() {
            let ready: Vec<String> = in_degree
                .iter()
                .filter(|(_, &degree)| degree == 0)
                .map(|(&table, _)| table.to_string())
                .collect();

            if ready.is_empty() {
                return Err(MaintenanceError::DependencyCycle(
                    in_degree.keys().map(|t| t.to_string()).collect(),
                ));
            }

            for table in &ready {
                in_degree.remove(table.as_str());
                for dependent in nodes.values() {
                    if dependent.dependencies.contains(table) {
                        if let Some(degree) = in_degree.get_mut(dependent.table.as_str()) {
                            *degree = degree.saturating_sub(1);
                        }
                    }
                }
            }

            result.push(ready);
        }

        Ok(result)
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Groups of independent tables, in execution order
    pub fn execution_order(&self) -> &[Vec<String>] {
        &self.execution_order
    }

    pub fn node(&self, table: &str) -> Option<&LoadNode> {
        self.nodes.get(table)
    }

    /// Nodes in execution order
    pub fn nodes_in_order(&self) -> impl Iterator<Item = &LoadNode> {
        self.execution_order
            .iter()
            .flatten()
            .filter_map(move |table| self.nodes.get(table))
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Human-readable plan (for logging)
    pub fn execution_plan(&self) -> String {
        self.execution_order
            .iter()
            .enumerate()
            .map(|(i, group)| {
                if group.len() > 1 {
                    format!("Phase {}: {} (parallel)", i + 1, group.join(" ∥ "))
                } else {
                    format!("Phase {}: {}", i + 1, group.join(""))
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn source_relation(source: &str) -> Result<QualifiedName> {
    QualifiedName::parse(source).map_err(MaintenanceError::from)
}

fn dimension_load(layer: Layer, dim: &DimensionConfig) -> Result<DimensionLoad> {
    Ok(DimensionLoad {
        target: layer.table(&dim.table),
        source: source_relation(&dim.source)?,
        surrogate_key: dim.surrogate_key.clone(),
        business_key: dim.business_key.clone(),
        columns: dim.columns.clone(),
        dedupe_order_by: dim.dedupe_order_by.clone(),
    })
}

fn fact_load(config: &WarehouseConfig, fact: &FactConfig) -> Result<FactLoad> {
    let layer = config.load.layer;
    let mut lookups = Vec::with_capacity(fact.lookups.len());

    for lookup in &fact.lookups {
        let dim = config.load.dimension(&lookup.dimension).ok_or_else(|| {
            MaintenanceError::MissingDependency(format!(
                "{} references undeclared dimension {}",
                fact.table, lookup.dimension
            ))
        })?;
        lookups.push(DimensionLookup {
            dimension: layer.table(&dim.table),
            natural_key: lookup.natural_key.clone(),
            business_key: dim.business_key.clone(),
            surrogate_key: dim.surrogate_key.clone(),
            target_column: lookup.target_column.clone(),
        });
    }

    Ok(FactLoad {
        target: layer.table(&fact.table),
        source: source_relation(&fact.source)?,
        columns: fact.columns.clone(),
        lookups,
        sentinel: config.load.sentinel,
    })
}
