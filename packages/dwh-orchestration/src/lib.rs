/*
 * DWH Orchestration - Layered Warehouse Maintenance
 *
 * Keeps a raw → cleansed → reporting warehouse rebuildable and reloadable.
 *
 * Architecture:
 * - Metadata Introspector (catalog → statements)
 * - Index Lifecycle Manager (cleanup + policy build)
 * - Load Plan (dimensions before facts) + Load Orchestrator
 * - Environment Guard & Audit Logger
 * - Maintenance Service (guarded, audited, deadline-bound entry points)
 */

// Public modules
pub mod config;
pub mod environment;
pub mod error;
pub mod guard;
pub mod index_lifecycle;
pub mod introspector;
pub mod load_plan;
pub mod loader;
pub mod maintenance;

// Re-exports
pub use config::{ConfigError, WarehouseConfig};
pub use environment::{EnvironmentContext, EnvironmentDetector};
pub use error::{ErrorClass, LoadStep, MaintenanceError, Result};
pub use guard::{AuditLogger, EnvironmentGuard, GuardedRun, LayerReset, ResetRequest, RunState};
pub use index_lifecycle::{
    BuildOutcome, IndexLifecycleManager, IndexPolicy, RebuildReport, TablePolicy,
};
pub use introspector::MetadataIntrospector;
pub use load_plan::{LoadNode, LoadPlan};
pub use loader::{LoadOrchestrator, LoadReport, TableLoad, UnresolvedReferences};
pub use maintenance::{CycleReport, MaintenanceService};
