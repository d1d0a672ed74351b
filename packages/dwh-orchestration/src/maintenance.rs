//! Maintenance Service
//!
//! Public entry points. Each one is wrapped by the environment guard and
//! writes its audit entries, and each phase runs under the optional deadline
//! from `execution.phase_timeout_secs`.
//!
//! | Operation          | Audit entries                 |
//! |--------------------|-------------------------------|
//! | `reset_layers`     | one per layer (one if blocked) |
//! | `rebuild_indexes`  | one                           |
//! | `load_layer`       | one                           |
//! | `maintenance_cycle`| one (cleanup → load → build)  |

use dwh_storage::{
    AuditOutcome, AuditRecord, AuditSink, Dialect, Layer, MaintenanceStatement, OperationKind,
    Warehouse,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::WarehouseConfig;
use crate::environment::EnvironmentContext;
use crate::error::{MaintenanceError, Result};
use crate::guard::{
    reset_layer, AuditLogger, EnvironmentGuard, GuardedRun, LayerReset, ResetRequest,
};
use crate::index_lifecycle::{BuildOutcome, IndexLifecycleManager, IndexPolicy, RebuildReport};
use crate::introspector::MetadataIntrospector;
use crate::load_plan::LoadPlan;
use crate::loader::{LoadOrchestrator, LoadReport};

/// Outcome of the end-to-end cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub layer: Layer,
    pub dropped: Vec<String>,
    pub load: LoadReport,
    pub build: BuildOutcome,
}

#[derive(Clone)]
pub struct MaintenanceService {
    config: Arc<WarehouseConfig>,
    warehouse: Arc<dyn Warehouse>,
    introspector: MetadataIntrospector,
    lifecycle: IndexLifecycleManager,
    loader: LoadOrchestrator,
    guard: EnvironmentGuard,
    audit: AuditLogger,
}

impl MaintenanceService {
    pub fn new(
        config: Arc<WarehouseConfig>,
        warehouse: Arc<dyn Warehouse>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self> {
        let introspector = MetadataIntrospector::new(Arc::clone(&warehouse), Arc::clone(&config));
        let lifecycle = IndexLifecycleManager::new(
            Arc::clone(&warehouse),
            introspector.clone(),
            IndexPolicy::from_config(&config),
        );
        let loader = LoadOrchestrator::new(Arc::clone(&warehouse), LoadPlan::from_config(&config)?);
        let guard = EnvironmentGuard::new(&config.guard);

        Ok(Self {
            config,
            warehouse,
            introspector,
            lifecycle,
            loader,
            guard,
            audit: AuditLogger::new(audit),
        })
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    pub fn introspector(&self) -> &MetadataIntrospector {
        &self.introspector
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Operations
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// `ResetLayers`: empty the requested layers
    ///
    /// All layers are validated first. A refusal writes one Blocked entry for
    /// the first blocked layer and mutates nothing.
    pub async fn reset_layers(
        &self,
        ctx: &EnvironmentContext,
        request: ResetRequest,
    ) -> Result<Vec<LayerReset>> {
        let operation = OperationKind::ResetLayer;
        let layers = request.layers();
        if layers.is_empty() {
            info!("no layer selected for reset");
            return Ok(Vec::new());
        }

        let mut run = GuardedRun::new(operation);
        if let Err(rejection) = self.guard.validate(ctx, operation, &layers, request.force) {
            run.blocked()?;
            let target = match &rejection {
                MaintenanceError::GuardRejected { layers: blocked, .. } => {
                    blocked.first().copied().unwrap_or(layers[0])
                }
                _ => layers[0],
            };
            warn!(layer = %target, identity = %ctx.identity, "reset blocked: {}", rejection);
            self.audit
                .record(ctx, operation, target, AuditOutcome::Blocked, &rejection.to_string())
                .await;
            return Err(rejection);
        }
        run.validated()?;
        run.executing()?;

        let mut resets = Vec::with_capacity(layers.len());
        for (i, layer) in layers.iter().copied().enumerate() {
            let result = self
                .with_deadline(
                    "reset",
                    reset_layer(self.warehouse.as_ref(), &self.introspector, layer),
                )
                .await;

            match result {
                Ok(reset) => {
                    let detail = format!("tables={} rows={}", reset.tables.len(), reset.rows);
                    self.audit
                        .record(ctx, operation, layer, AuditOutcome::Completed, &detail)
                        .await;
                    resets.push(reset);
                }
                Err(e) => {
                    run.failed()?;
                    error!(layer = %layer, error = %e, "reset failed");
                    self.audit
                        .record(ctx, operation, layer, AuditOutcome::Failed, &failure_detail(&e))
                        .await;
                    for skipped in &layers[i + 1..] {
                        let detail = format!("not attempted after failure on {}", layer);
                        self.audit
                            .record(ctx, operation, *skipped, AuditOutcome::Failed, &detail)
                            .await;
                    }
                    return Err(e);
                }
            }
        }

        run.completed()?;
        Ok(resets)
    }

    /// `RebuildIndexes(layer)`
    pub async fn rebuild_indexes(
        &self,
        ctx: &EnvironmentContext,
        layer: Layer,
        force: bool,
    ) -> Result<RebuildReport> {
        let work = async {
            let dropped = self
                .with_deadline("cleanup", self.lifecycle.cleanup(layer))
                .await?;
            let build = self.with_deadline("build", self.lifecycle.build(layer)).await?;
            Ok::<_, MaintenanceError>(RebuildReport::new(layer, dropped, build))
        };

        self.guarded(ctx, OperationKind::RebuildIndexes, layer, force, work, |r: &RebuildReport| {
            format!(
                "dropped={} created={} skipped={} unmanaged={}",
                r.dropped.len(),
                r.created.len(),
                r.skipped_tables.len(),
                r.unmanaged_tables.len()
            )
        })
        .await
    }

    /// `LoadLayer()`
    pub async fn load_layer(&self, ctx: &EnvironmentContext) -> Result<LoadReport> {
        let layer = self.loader.plan().layer();
        let work = self.with_deadline("load", self.loader.load_layer());
        self.guarded(ctx, OperationKind::LoadLayer, layer, false, work, describe_load)
            .await
    }

    /// Cleanup → load → build on the load layer
    pub async fn maintenance_cycle(
        &self,
        ctx: &EnvironmentContext,
        force: bool,
    ) -> Result<CycleReport> {
        let layer = self.loader.plan().layer();
        let work = async {
            let dropped = self
                .with_deadline("cleanup", self.lifecycle.cleanup(layer))
                .await?;
            let load = self.with_deadline("load", self.loader.load_layer()).await?;
            let build = self.with_deadline("build", self.lifecycle.build(layer)).await?;
            Ok::<_, MaintenanceError>(CycleReport {
                layer,
                dropped,
                load,
                build,
            })
        };

        self.guarded(ctx, OperationKind::MaintenanceCycle, layer, force, work, |r: &CycleReport| {
            format!(
                "dropped={} {} created={}",
                r.dropped.len(),
                describe_load(&r.load),
                r.build.created.len()
            )
        })
        .await
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Read-only
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Statements a cycle on `layer` would issue, rendered in `dialect`
    ///
    /// Cleanup drops come first, then (for the load layer) the truncate and
    /// insert of every table in load order, then the index builds.
    pub async fn plan(&self, layer: Layer, dialect: &dyn Dialect) -> Result<Vec<String>> {
        let (drops, creates): (Vec<_>, Vec<_>) = self
            .lifecycle
            .plan(layer)
            .await?
            .into_iter()
            .partition(MaintenanceStatement::is_drop);

        let mut statements = drops;
        if layer == self.loader.plan().layer() {
            for node in self.loader.plan().nodes_in_order() {
                statements.push(MaintenanceStatement::Truncate {
                    table: node.target().clone(),
                });
                statements.push(node.insert.clone());
            }
        }
        statements.extend(creates);

        Ok(statements.iter().map(|s| dialect.render(s)).collect())
    }

    pub async fn recent_audit(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        Ok(self.audit.sink().recent(limit).await?)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Guard & deadline plumbing
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn guarded<T, F>(
        &self,
        ctx: &EnvironmentContext,
        operation: OperationKind,
        layer: Layer,
        force: bool,
        work: F,
        describe: impl Fn(&T) -> String,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let mut run = GuardedRun::new(operation);
        if let Err(rejection) = self.guard.validate(ctx, operation, &[layer], force) {
            run.blocked()?;
            warn!(operation = %operation, layer = %layer, "blocked: {}", rejection);
            self.audit
                .record(ctx, operation, layer, AuditOutcome::Blocked, &rejection.to_string())
                .await;
            return Err(rejection);
        }
        run.validated()?;
        run.executing()?;

        info!(
            operation = %operation,
            layer = %layer,
            environment = %ctx.environment,
            run_id = %ctx.run_id,
            "starting"
        );

        match work.await {
            Ok(value) => {
                run.completed()?;
                self.audit
                    .record(ctx, operation, layer, AuditOutcome::Completed, &describe(&value))
                    .await;
                Ok(value)
            }
            Err(e) => {
                run.failed()?;
                error!(operation = %operation, layer = %layer, error = %e, "failed");
                self.audit
                    .record(ctx, operation, layer, AuditOutcome::Failed, &failure_detail(&e))
                    .await;
                Err(e)
            }
        }
    }

    async fn with_deadline<T>(
        &self,
        phase: &str,
        work: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        let Some(limit) = self.config.execution.phase_timeout() else {
            return work.await;
        };

        match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => {
                self.warehouse.interrupt();
                warn!(
                    phase,
                    secs = limit.as_secs(),
                    "phase deadline exceeded, statement interrupted"
                );
                Err(MaintenanceError::Timeout {
                    phase: phase.to_string(),
                    secs: limit.as_secs(),
                })
            }
        }
    }
}

fn describe_load(report: &LoadReport) -> String {
    let unresolved: u64 = report.unresolved.iter().map(|u| u.rows).sum();
    format!(
        "tables={} rows={} unresolved={}",
        report.tables.len(),
        report.total_rows(),
        unresolved
    )
}

fn failure_detail(error: &MaintenanceError) -> String {
    format!("[{}] {}", error.class(), error)
}
