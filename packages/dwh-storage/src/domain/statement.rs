//! Typed maintenance statements
//!
//! Every statement the maintenance core issues is built as a value of
//! [`MaintenanceStatement`] and rendered to SQL by a [`Dialect`] only at
//! execution (or planning) time. Identifiers never pass through string
//! concatenation outside of a dialect's quoting.
//!
//! [`Dialect`]: super::dialect::Dialect

use serde::{Deserialize, Serialize};
use std::fmt;

use super::models::{CatalogObject, QualifiedName};

/// Sort direction used to pick the surviving row among duplicate business keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// `ORDER BY` term over a source column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Full-replace load of one dimension table
///
/// The surrogate key is assigned by the load (`ROW_NUMBER()` in business key
/// order), never read from the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionLoad {
    pub target: QualifiedName,
    pub source: QualifiedName,
    pub surrogate_key: String,
    pub business_key: String,
    /// Columns copied verbatim from the source (includes the business key)
    pub columns: Vec<String>,
    /// Which duplicate of a business key survives; defaults to the key itself
    pub dedupe_order_by: Option<OrderBy>,
}

/// Resolution of one fact reference against a loaded dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionLookup {
    pub dimension: QualifiedName,
    /// Column in the fact source holding the natural key
    pub natural_key: String,
    /// Business key column of the dimension
    pub business_key: String,
    /// Surrogate key column of the dimension
    pub surrogate_key: String,
    /// Fact column receiving the resolved surrogate key
    pub target_column: String,
}

/// Full-replace load of one fact table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactLoad {
    pub target: QualifiedName,
    pub source: QualifiedName,
    /// Columns copied verbatim from the source (natural keys included)
    pub columns: Vec<String>,
    pub lookups: Vec<DimensionLookup>,
    /// Surrogate value written when a natural key has no dimension row
    pub sentinel: i64,
}

/// Maintenance statement as data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MaintenanceStatement {
    /// Drop a primary key / unique constraint
    DropConstraint { object: CatalogObject },
    /// Drop a row-store or column-store index
    DropIndex { object: CatalogObject },
    /// Clustering primary key on one column
    CreatePrimaryKey {
        table: QualifiedName,
        name: String,
        column: String,
    },
    /// Non-clustered row-store index
    CreateIndex {
        table: QualifiedName,
        name: String,
        columns: Vec<String>,
        include: Vec<String>,
        unique: bool,
    },
    /// Column-oriented clustered index covering the whole table
    CreateColumnStoreIndex {
        table: QualifiedName,
        name: String,
        /// Physical columns of the table at build time
        columns: Vec<String>,
    },
    /// Fast removal of every row (no constraint bookkeeping)
    Truncate { table: QualifiedName },
    /// Row-by-row removal of every row (keeps constraints and indexes)
    DeleteRows { table: QualifiedName },
    LoadDimension(DimensionLoad),
    LoadFacts(FactLoad),
}

impl MaintenanceStatement {
    pub fn kind(&self) -> &'static str {
        match self {
            MaintenanceStatement::DropConstraint { .. } => "drop_constraint",
            MaintenanceStatement::DropIndex { .. } => "drop_index",
            MaintenanceStatement::CreatePrimaryKey { .. } => "create_primary_key",
            MaintenanceStatement::CreateIndex { .. } => "create_index",
            MaintenanceStatement::CreateColumnStoreIndex { .. } => "create_columnstore_index",
            MaintenanceStatement::Truncate { .. } => "truncate",
            MaintenanceStatement::DeleteRows { .. } => "delete_rows",
            MaintenanceStatement::LoadDimension(_) => "load_dimension",
            MaintenanceStatement::LoadFacts(_) => "load_facts",
        }
    }

    /// Table the statement acts on
    pub fn table(&self) -> &QualifiedName {
        match self {
            MaintenanceStatement::DropConstraint { object }
            | MaintenanceStatement::DropIndex { object } => &object.table,
            MaintenanceStatement::CreatePrimaryKey { table, .. }
            | MaintenanceStatement::CreateIndex { table, .. }
            | MaintenanceStatement::CreateColumnStoreIndex { table, .. }
            | MaintenanceStatement::Truncate { table }
            | MaintenanceStatement::DeleteRows { table } => table,
            MaintenanceStatement::LoadDimension(load) => &load.target,
            MaintenanceStatement::LoadFacts(load) => &load.target,
        }
    }

    /// Constraint or index the statement drops or creates
    pub fn object_name(&self) -> Option<&str> {
        match self {
            MaintenanceStatement::DropConstraint { object }
            | MaintenanceStatement::DropIndex { object } => Some(&object.name),
            MaintenanceStatement::CreatePrimaryKey { name, .. }
            | MaintenanceStatement::CreateIndex { name, .. }
            | MaintenanceStatement::CreateColumnStoreIndex { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn is_drop(&self) -> bool {
        matches!(
            self,
            MaintenanceStatement::DropConstraint { .. } | MaintenanceStatement::DropIndex { .. }
        )
    }
}

impl fmt::Display for MaintenanceStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.object_name() {
            Some(object) => write!(f, "{} {} on {}", self.kind(), object, self.table()),
            None => write!(f, "{} {}", self.kind(), self.table()),
        }
    }
}
