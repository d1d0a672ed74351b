//! Warehouse Ports (Trait Interfaces)
//!
//! Port/Adapter pattern for backend flexibility:
//! - Execution: SQLite (one attached schema per layer)
//! - Planning: any [`Dialect`] renders the same statements without a backend
//! - Testing: in-memory audit log, wrapping fakes

use async_trait::async_trait;

use super::dialect::Dialect;
use super::models::{AuditEntry, AuditRecord, CatalogObject, Layer, QualifiedName};
use super::statement::MaintenanceStatement;
use crate::Result;

/// Warehouse Port (Primary Interface)
///
/// Catalog reads always reflect the engine's state at call time; adapters
/// must not cache them.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Dialect statements are rendered in before execution
    fn dialect(&self) -> &dyn Dialect;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Catalog
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Whether the layer's schema exists
    async fn layer_exists(&self, layer: Layer) -> Result<bool>;

    /// Table names in the layer, sorted by name
    async fn list_tables(&self, layer: Layer) -> Result<Vec<String>>;

    /// Constraints and indexes attached to tables of the layer
    ///
    /// Objects intrinsic to a table definition (no standalone DDL) are heap
    /// level and not reported.
    async fn list_objects(&self, layer: Layer) -> Result<Vec<CatalogObject>>;

    /// Physical columns of a table in declaration order
    async fn table_columns(&self, table: &QualifiedName) -> Result<Vec<String>>;

    /// Row count, optionally restricted to `column = value`
    async fn count_rows(&self, table: &QualifiedName, filter: Option<(&str, i64)>) -> Result<u64>;

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Execution
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Execute one statement; returns affected rows (0 for DDL)
    async fn execute(&self, statement: &MaintenanceStatement) -> Result<u64>;

    /// Abort the statement currently running, if the engine supports it
    fn interrupt(&self) {}
}

/// Append-only audit log port
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one entry; returns the assigned id
    async fn append(&self, entry: &AuditEntry) -> Result<i64>;

    /// Most recent entries, newest first
    async fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>>;
}
