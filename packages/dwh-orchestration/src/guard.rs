//! Environment Guard & Audit Logger
//!
//! Per invocation a guarded operation moves through
//! `Detected → Validated → Executing → Completed | Failed`, or
//! `Detected → Blocked` when the guard refuses it. Every terminal state is
//! written to the audit log; a failing audit write never changes the result
//! of the operation.

use chrono::Utc;
use dwh_storage::{
    AuditEntry, AuditOutcome, AuditSink, Layer, MaintenanceStatement, OperationKind, QualifiedName,
    Warehouse,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::GuardConfig;
use crate::environment::EnvironmentContext;
use crate::error::{LoadStep, MaintenanceError, Result};
use crate::introspector::MetadataIntrospector;

// ═══════════════════════════════════════════════════════════════════════════
// Reset Request
// ═══════════════════════════════════════════════════════════════════════════

/// Layers to reset, plus the production override
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetRequest {
    pub raw: bool,
    pub cleansed: bool,
    pub reporting: bool,
    pub force: bool,
}

impl ResetRequest {
    pub fn layers(&self) -> Vec<Layer> {
        Layer::ALL
            .into_iter()
            .filter(|layer| match layer {
                Layer::Raw => self.raw,
                Layer::Cleansed => self.cleansed,
                Layer::Reporting => self.reporting,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        !(self.raw || self.cleansed || self.reporting)
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Guard
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct EnvironmentGuard {
    protect_structural_rebuilds: bool,
}

impl EnvironmentGuard {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            protect_structural_rebuilds: config.protect_structural_rebuilds,
        }
    }

    /// Whether `operation` on `layer` needs an override in production
    ///
    /// Raw resets are fast truncates of re-ingestable data and stay allowed.
    pub fn is_protected(&self, operation: OperationKind, layer: Layer) -> bool {
        match operation {
            OperationKind::ResetLayer => layer != Layer::Raw,
            OperationKind::RebuildIndexes | OperationKind::MaintenanceCycle => {
                self.protect_structural_rebuilds
            }
            OperationKind::LoadLayer => false,
        }
    }

    /// Validate every layer before anything is mutated
    pub fn validate(
        &self,
        ctx: &EnvironmentContext,
        operation: OperationKind,
        layers: &[Layer],
        force: bool,
    ) -> Result<()> {
        if !ctx.is_production() || force {
            return Ok(());
        }

        let blocked: Vec<Layer> = layers
            .iter()
            .copied()
            .filter(|layer| self.is_protected(operation, *layer))
            .collect();

        if blocked.is_empty() {
            Ok(())
        } else {
            Err(MaintenanceError::GuardRejected {
                operation,
                environment: ctx.environment,
                layers: blocked,
                identity: ctx.identity.clone(),
            })
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Run State Machine
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Detected,
    Validated,
    Executing,
    Completed,
    Blocked,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Detected => "detected",
            RunState::Validated => "validated",
            RunState::Executing => "executing",
            RunState::Completed => "completed",
            RunState::Blocked => "blocked",
            RunState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Blocked | RunState::Failed)
    }

    /// Audit outcome of a terminal state
    pub fn outcome(&self) -> Option<AuditOutcome> {
        match self {
            RunState::Completed => Some(AuditOutcome::Completed),
            RunState::Blocked => Some(AuditOutcome::Blocked),
            RunState::Failed => Some(AuditOutcome::Failed),
            _ => None,
        }
    }
}

/// One guarded operation of an invocation
#[derive(Debug, Clone)]
pub struct GuardedRun {
    operation: OperationKind,
    state: RunState,
}

impl GuardedRun {
    pub fn new(operation: OperationKind) -> Self {
        Self {
            operation,
            state: RunState::Detected,
        }
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Transition: DETECTED → VALIDATED
    pub fn validated(&mut self) -> Result<()> {
        self.transition(&[RunState::Detected], RunState::Validated)
    }

    /// Transition: DETECTED → BLOCKED
    pub fn blocked(&mut self) -> Result<()> {
        self.transition(&[RunState::Detected], RunState::Blocked)
    }

    /// Transition: VALIDATED → EXECUTING
    pub fn executing(&mut self) -> Result<()> {
        self.transition(&[RunState::Validated], RunState::Executing)
    }

    /// Transition: EXECUTING → COMPLETED
    pub fn completed(&mut self) -> Result<()> {
        self.transition(&[RunState::Executing], RunState::Completed)
    }

    /// Transition: VALIDATED | EXECUTING → FAILED
    pub fn failed(&mut self) -> Result<()> {
        self.transition(&[RunState::Validated, RunState::Executing], RunState::Failed)
    }

    fn transition(&mut self, from: &[RunState], to: RunState) -> Result<()> {
        if from.contains(&self.state) {
            self.state = to;
            Ok(())
        } else {
            Err(MaintenanceError::InvalidStateTransition {
                from: self.state.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Audit Logger
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &Arc<dyn AuditSink> {
        &self.sink
    }

    /// Append one entry; a write failure is logged and swallowed
    pub async fn record(
        &self,
        ctx: &EnvironmentContext,
        operation: OperationKind,
        layer: Layer,
        outcome: AuditOutcome,
        detail: &str,
    ) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            environment: ctx.environment,
            operation,
            target_layer: layer,
            acting_identity: ctx.identity.clone(),
            outcome,
            detail: format!("run={} host={} {}", ctx.run_id, ctx.host, detail)
                .trim_end()
                .to_string(),
        };

        match self.sink.append(&entry).await {
            Ok(id) => info!(
                audit_id = id,
                operation = %operation,
                layer = %layer,
                outcome = %outcome,
                "audit entry written"
            ),
            Err(e) => warn!(
                error = %e,
                operation = %operation,
                layer = %layer,
                outcome = %outcome,
                "failed to write audit entry"
            ),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Layer Reset
// ═══════════════════════════════════════════════════════════════════════════

/// Rows removed from one layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerReset {
    pub layer: Layer,
    pub tables: Vec<String>,
    pub rows: u64,
}

/// Statement clearing a table of `layer`
///
/// Raw tables are truncated; cleansed and reporting tables are emptied with a
/// row delete so their constraints and indexes stay in place.
pub fn reset_statement(layer: Layer, table: QualifiedName) -> MaintenanceStatement {
    match layer {
        Layer::Raw => MaintenanceStatement::Truncate { table },
        Layer::Cleansed | Layer::Reporting => MaintenanceStatement::DeleteRows { table },
    }
}

/// Empty every table of a layer
pub async fn reset_layer(
    warehouse: &dyn Warehouse,
    introspector: &MetadataIntrospector,
    layer: Layer,
) -> Result<LayerReset> {
    let mut reset = LayerReset {
        layer,
        tables: Vec::new(),
        rows: 0,
    };

    for table in introspector.tables(layer).await? {
        let qualified = table.qualified_name();
        let statement = reset_statement(layer, qualified.clone());
        let step = match statement {
            MaintenanceStatement::DeleteRows { .. } => LoadStep::Delete,
            _ => LoadStep::Truncate,
        };
        let rows = warehouse
            .execute(&statement)
            .await
            .map_err(|source| MaintenanceError::Load {
                table: qualified,
                step,
                source,
            })?;
        reset.rows += rows;
        reset.tables.push(table.name);
    }

    info!(layer = %layer, tables = reset.tables.len(), rows = reset.rows, "layer reset");
    Ok(reset)
}
