//! Warehouse domain models
//!
//! Layers, table descriptors, catalog objects, environment classification and
//! audit entries. Everything here is plain data: discovery and execution live
//! behind the ports in [`super::ports`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StorageError;

// ═══════════════════════════════════════════════════════════════════════════
// Layers & Tables
// ═══════════════════════════════════════════════════════════════════════════

/// Data store stage
///
/// Each layer maps to exactly one schema in the storage engine. The schema
/// name is the lowercase layer name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Raw,
    Cleansed,
    Reporting,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Raw, Layer::Cleansed, Layer::Reporting];

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Raw => "raw",
            Layer::Cleansed => "cleansed",
            Layer::Reporting => "reporting",
        }
    }

    /// Schema the layer's tables live in
    pub fn schema_name(&self) -> &'static str {
        self.as_str()
    }

    /// Qualified name of a table in this layer
    pub fn table(&self, name: impl Into<String>) -> QualifiedName {
        QualifiedName::new(self.schema_name(), name)
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Layer {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" | "bronze" => Ok(Layer::Raw),
            "cleansed" | "silver" => Ok(Layer::Cleansed),
            "reporting" | "gold" => Ok(Layer::Reporting),
            _ => Err(StorageError::config(format!(
                "Unknown layer '{}'. Valid layers: raw, cleansed, reporting",
                s
            ))),
        }
    }
}

/// `schema.relation` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    pub schema: String,
    pub name: String,
}

impl QualifiedName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parse `schema.name`; both parts are required
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        match s.split_once('.') {
            Some((schema, name)) if !schema.is_empty() && !name.is_empty() && !name.contains('.') => {
                Ok(Self::new(schema, name))
            }
            _ => Err(StorageError::config(format!(
                "Expected a qualified name 'schema.relation', got '{}'",
                s
            ))),
        }
    }

    /// Layer owning this relation, if the schema is a layer schema
    pub fn layer(&self) -> Option<Layer> {
        self.schema.parse().ok()
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Logical table classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableClass {
    /// Reference table keyed by a surrogate key
    Dimension,
    /// Append-heavy transactional table
    Fact,
    /// Present in the catalog but unknown to the registry
    Unclassified,
}

impl TableClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableClass::Dimension => "dimension",
            TableClass::Fact => "fact",
            TableClass::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for TableClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Physical table discovered in a layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub layer: Layer,
    pub name: String,
    pub class: TableClass,
}

impl TableDescriptor {
    pub fn qualified_name(&self) -> QualifiedName {
        self.layer.table(&self.name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Catalog Objects
// ═══════════════════════════════════════════════════════════════════════════

/// Kind of schema-level object attached to a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    PrimaryKey,
    UniqueConstraint,
    RowStoreIndex,
    ColumnStoreIndex,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::PrimaryKey => "primary_key",
            ObjectKind::UniqueConstraint => "unique_constraint",
            ObjectKind::RowStoreIndex => "rowstore_index",
            ObjectKind::ColumnStoreIndex => "columnstore_index",
        }
    }

    /// Constraints may back an index and go first during cleanup
    pub fn is_constraint(&self) -> bool {
        matches!(self, ObjectKind::PrimaryKey | ObjectKind::UniqueConstraint)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Constraint or index currently present in the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogObject {
    /// Object name (unique within its schema)
    pub name: String,
    /// Owning table
    pub table: QualifiedName,
    pub kind: ObjectKind,
}

impl CatalogObject {
    pub fn new(name: impl Into<String>, table: QualifiedName, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            table,
            kind,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Environment & Audit
// ═══════════════════════════════════════════════════════════════════════════

/// Execution environment classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

impl Default for Environment {
    /// Unrecognized hosts run in safe, permissive mode
    fn default() -> Self {
        Environment::Development
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Environment {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(StorageError::config(format!("Unknown environment '{}'", s))),
        }
    }
}

/// Audited maintenance operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    ResetLayer,
    RebuildIndexes,
    LoadLayer,
    MaintenanceCycle,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::ResetLayer => "reset_layer",
            OperationKind::RebuildIndexes => "rebuild_indexes",
            OperationKind::LoadLayer => "load_layer",
            OperationKind::MaintenanceCycle => "maintenance_cycle",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reset_layer" => Ok(OperationKind::ResetLayer),
            "rebuild_indexes" => Ok(OperationKind::RebuildIndexes),
            "load_layer" => Ok(OperationKind::LoadLayer),
            "maintenance_cycle" => Ok(OperationKind::MaintenanceCycle),
            _ => Err(StorageError::serialization(format!(
                "Invalid operation kind: {}",
                s
            ))),
        }
    }
}

/// Terminal state of an audited operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Completed,
    Blocked,
    Failed,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Completed => "completed",
            AuditOutcome::Blocked => "blocked",
            AuditOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AuditOutcome {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(AuditOutcome::Completed),
            "blocked" => Ok(AuditOutcome::Blocked),
            "failed" => Ok(AuditOutcome::Failed),
            _ => Err(StorageError::serialization(format!(
                "Invalid audit outcome: {}",
                s
            ))),
        }
    }
}

/// Immutable audit record
///
/// Entries are append-only; nothing in this workspace updates or deletes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub environment: Environment,
    pub operation: OperationKind,
    pub target_layer: Layer,
    pub acting_identity: String,
    pub outcome: AuditOutcome,
    pub detail: String,
}

/// Audit entry as stored, with its log-assigned id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: i64,
    #[serde(flatten)]
    pub entry: AuditEntry,
}
