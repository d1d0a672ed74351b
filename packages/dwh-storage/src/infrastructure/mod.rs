//! Infrastructure layer - Warehouse adapters
//!
//! - SQLite warehouse and audit log (feature `sqlite`)
//! - SQL dialects for execution and planning
//! - In-memory audit log for tests and dry runs

pub mod dialect;
pub mod memory_audit;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use dialect::{dialect_by_name, SqliteDialect, TSqlDialect};
pub use memory_audit::InMemoryAuditLog;

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteAuditLog, SqliteWarehouse};
