//! dwh-storage - Warehouse catalog and execution ports
//!
//! Layered warehouse model (raw → cleansed → reporting), the statements the
//! maintenance engine issues, and adapters that run them.
//!
//! ## Layout
//!
//! - `domain`: layers, catalog objects, audit entries, statements, ports
//! - `infrastructure`: SQLite warehouse + audit log, SQL dialects
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dwh_storage::{Layer, SqliteWarehouse, Warehouse};
//!
//! let warehouse = SqliteWarehouse::in_memory(&Layer::ALL)?;
//! for object in warehouse.list_objects(Layer::Cleansed).await? {
//!     println!("{} {} on {}", object.kind, object.name, object.table);
//! }
//! ```

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{ErrorKind, Result, StorageError};

pub use domain::{
    AuditEntry, AuditOutcome, AuditRecord, AuditSink, CatalogObject, Dialect, DimensionLoad,
    DimensionLookup, Environment, FactLoad, Layer, MaintenanceStatement, ObjectKind,
    OperationKind, OrderBy, QualifiedName, SortDirection, TableClass, TableDescriptor, Warehouse,
};
pub use infrastructure::{dialect_by_name, InMemoryAuditLog, SqliteDialect, TSqlDialect};

#[cfg(feature = "sqlite")]
pub use infrastructure::{SqliteAuditLog, SqliteWarehouse};
