//! Warehouse Domain Layer
//!
//! Port/Adapter pattern for storage engine abstraction

pub mod dialect;
pub mod models;
pub mod ports;
pub mod statement;

pub use dialect::Dialect;
pub use models::{
    AuditEntry, AuditOutcome, AuditRecord, CatalogObject, Environment, Layer, ObjectKind,
    OperationKind, QualifiedName, TableClass, TableDescriptor,
};
pub use ports::{AuditSink, Warehouse};
pub use statement::{
    DimensionLoad, DimensionLookup, FactLoad, MaintenanceStatement, OrderBy, SortDirection,
};
