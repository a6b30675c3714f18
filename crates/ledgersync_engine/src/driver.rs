//! Multi-entity runs in dependency order.

use crate::context::SyncRunContext;
use crate::cursor::CursorStore;
use crate::destination::DestinationTransport;
use crate::error::SyncResult;
use crate::incremental::{IncrementalSyncEngine, SyncRunResult};
use crate::source::SourceTransport;
use crate::tenant::scope_tenant;
use ledgersync_codec::EntityType;
use ledgersync_protocol::{ReconciliationReport, SyncStatusUpdate, TenantSummary};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Outcome of a multi-entity run for one tenant.
#[derive(Debug, Clone)]
pub struct DriverRunResult {
    /// Destination tenant id.
    pub tenant_id: u64,
    /// One result per entity type attempted, in order.
    pub results: Vec<SyncRunResult>,
    /// Whether every entity type succeeded.
    pub success: bool,
    /// Wall time of the run.
    pub duration: Duration,
}

impl DriverRunResult {
    /// Records confirmed across all entity types.
    pub fn total_count(&self) -> u64 {
        self.results.iter().map(|r| r.count).sum()
    }

    /// Entity types that did not succeed.
    pub fn failed_entities(&self) -> Vec<EntityType> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.entity)
            .collect()
    }
}

/// Runs the incremental engine across entity types.
pub struct SyncDriver<S: SourceTransport, D: DestinationTransport, K: CursorStore> {
    engine: IncrementalSyncEngine<S, D, K>,
}

impl<S: SourceTransport, D: DestinationTransport, K: CursorStore> SyncDriver<S, D, K> {
    /// Creates a driver around `engine`.
    pub fn new(engine: IncrementalSyncEngine<S, D, K>) -> Self {
        Self { engine }
    }

    /// Returns the wrapped engine.
    pub fn engine(&self) -> &IncrementalSyncEngine<S, D, K> {
        &self.engine
    }

    /// Tenants the destination has finished importing.
    pub fn imported_tenants(&self, ctx: &SyncRunContext) -> SyncResult<Vec<TenantSummary>> {
        Ok(self
            .engine
            .destination()
            .list_tenants(ctx)?
            .into_iter()
            .filter(TenantSummary::is_imported)
            .collect())
    }

    /// Syncs every entity type in dependency order.
    pub fn run_all(&self, ctx: &SyncRunContext) -> SyncResult<DriverRunResult> {
        self.run_entities(ctx, &EntityType::SYNC_ORDER)
    }

    /// Syncs `entities` in the given order.
    ///
    /// A failing entity type does not stop the ones after it. A tenant
    /// mismatch, an unresolvable tenant or cancellation aborts the run.
    /// Afterwards the tenant's status is reported to the destination.
    pub fn run_entities(
        &self,
        ctx: &SyncRunContext,
        entities: &[EntityType],
    ) -> SyncResult<DriverRunResult> {
        let start = Instant::now();
        let scoped = scope_tenant(&**self.engine.destination(), ctx)?;
        let ctx: &SyncRunContext = &scoped;
        let mut results = Vec::with_capacity(entities.len());

        for (index, &entity) in entities.iter().enumerate() {
            if index > 0 && !ctx.pacing.entity_delay.is_zero() {
                std::thread::sleep(ctx.pacing.entity_delay);
            }
            ctx.check_cancelled()?;

            let entity_start = Instant::now();
            match self.engine.run(ctx, entity) {
                Ok(result) => results.push(result),
                Err(e) if e.aborts_run() => {
                    error!(run_id = %ctx.run_id, tenant = ctx.tenant.id, entity = %entity, error = %e, "run aborted");
                    return Err(e);
                }
                Err(e) => {
                    warn!(run_id = %ctx.run_id, entity = %entity, error = %e, "entity sync failed; continuing");
                    results.push(SyncRunResult::failed(entity, &e, entity_start.elapsed()));
                }
            }
        }

        let success = results.iter().all(|r| r.success);
        if let Err(e) = self
            .engine
            .destination()
            .report_status(ctx, &SyncStatusUpdate::new(success))
        {
            warn!(run_id = %ctx.run_id, tenant = ctx.tenant.id, error = %e, "could not report sync status");
        }

        let run = DriverRunResult {
            tenant_id: ctx.tenant.id,
            results,
            success,
            duration: start.elapsed(),
        };
        info!(
            run_id = %ctx.run_id,
            tenant = ctx.tenant.id,
            success,
            count = run.total_count(),
            "multi-entity run finished"
        );
        Ok(run)
    }

    /// Reconciles `entities` in order, collecting one outcome per type.
    ///
    /// A tenant mismatch or cancellation aborts the remaining types.
    pub fn reconcile_entities(
        &self,
        ctx: &SyncRunContext,
        entities: &[EntityType],
    ) -> SyncResult<Vec<(EntityType, SyncResult<ReconciliationReport>)>> {
        let scoped = scope_tenant(&**self.engine.destination(), ctx)?;
        let ctx: &SyncRunContext = &scoped;
        let mut reports = Vec::with_capacity(entities.len());
        for &entity in entities {
            ctx.check_cancelled()?;
            match self.engine.reconciler().reconcile(ctx, entity) {
                Err(e) if e.aborts_run() => return Err(e),
                outcome => reports.push((entity, outcome)),
            }
        }
        Ok(reports)
    }
}
