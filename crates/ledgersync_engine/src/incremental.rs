//! Incremental sync state machine.

use crate::batch::BatchTransmitter;
use crate::config::SyncConfig;
use crate::context::SyncRunContext;
use crate::cursor::CursorStore;
use crate::destination::DestinationTransport;
use crate::error::{SyncError, SyncResult};
use crate::reconcile::ReconciliationEngine;
use crate::source::SourceTransport;
use crate::tenant::{scope_tenant, TenantContextGuard};
use ledgersync_codec::{decode, EntityType};
use ledgersync_protocol::{ReconciliationReport, Transformer};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Engine is idle, not syncing.
    Idle,
    /// Engine is confirming the source's open tenant.
    CheckingTenant,
    /// Engine is querying the source.
    Fetching,
    /// Engine is decoding the source response.
    Decoding,
    /// Engine is uploading batches.
    Transmitting,
    /// Engine is running a first-time reconciliation.
    Reconciling,
    /// Engine has completed a run.
    Synced,
    /// Engine encountered an error.
    Error,
}

impl SyncState {
    /// Returns true if the engine is in an active sync state.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SyncState::CheckingTenant
                | SyncState::Fetching
                | SyncState::Decoding
                | SyncState::Transmitting
                | SyncState::Reconciling
        )
    }
}

/// Statistics about sync runs.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Runs that confirmed every record.
    pub runs_completed: u64,
    /// Runs that returned an error or stopped at a batch.
    pub runs_failed: u64,
    /// Total records confirmed by the destination.
    pub records_sent: u64,
    /// Total batches confirmed by the destination.
    pub batches_sent: u64,
    /// First-time reconciliations performed.
    pub reconciliations: u64,
    /// Last successful run.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Result of one incremental run.
#[derive(Debug, Clone)]
pub struct SyncRunResult {
    /// Entity type synced.
    pub entity: EntityType,
    /// Records confirmed by the destination.
    pub count: u64,
    /// Cursor after the run; unchanged unless every batch was confirmed.
    pub new_revision_floor: u64,
    /// Whether every batch was confirmed.
    pub success: bool,
    /// Summary for humans.
    pub message: String,
    /// The run started from an empty cursor.
    pub first_time: bool,
    /// Report of the reconciliation run for a first-time sync with no changes.
    pub reconciliation: Option<ReconciliationReport>,
    /// Error that stopped the run, if any.
    pub error: Option<String>,
    /// Whether the failure is transient, so a later run may succeed as is.
    pub retryable: bool,
    /// Wall time of the run.
    pub duration: Duration,
}

impl SyncRunResult {
    /// A result for a run that failed before transmitting.
    pub fn failed(entity: EntityType, error: &SyncError, duration: Duration) -> Self {
        Self {
            entity,
            count: 0,
            new_revision_floor: 0,
            success: false,
            message: format!("{entity} sync failed"),
            first_time: false,
            reconciliation: None,
            error: Some(error.to_string()),
            retryable: error.is_retryable(),
            duration,
        }
    }
}

/// Moves records above the stored cursor from the source to the
/// destination, then advances the cursor.
pub struct IncrementalSyncEngine<S: SourceTransport, D: DestinationTransport, K: CursorStore> {
    config: SyncConfig,
    source: Arc<S>,
    destination: Arc<D>,
    cursors: Arc<K>,
    reconciler: ReconciliationEngine<S, D>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
}

impl<S: SourceTransport, D: DestinationTransport, K: CursorStore> IncrementalSyncEngine<S, D, K> {
    /// Creates a new sync engine.
    pub fn new(config: SyncConfig, source: Arc<S>, destination: Arc<D>, cursors: Arc<K>) -> Self {
        let reconciler =
            ReconciliationEngine::new(config.clone(), Arc::clone(&source), Arc::clone(&destination));
        Self {
            config,
            source,
            destination,
            cursors,
            reconciler,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the destination transport.
    pub fn destination(&self) -> &Arc<D> {
        &self.destination
    }

    /// Returns the reconciliation engine sharing this engine's transports.
    pub fn reconciler(&self) -> &ReconciliationEngine<S, D> {
        &self.reconciler
    }

    /// Sets the state.
    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }

    /// Runs one incremental sync of `entity`.
    ///
    /// Transport, decode and tenant failures are returned as `Err` with the
    /// cursor untouched. A batch the destination rejects is not an `Err`:
    /// the result has `success == false` and counts the confirmed records.
    pub fn run(&self, ctx: &SyncRunContext, entity: EntityType) -> SyncResult<SyncRunResult> {
        let start = Instant::now();
        match self.run_inner(ctx, entity, start) {
            Ok(result) => {
                let mut stats = self.stats.write();
                stats.records_sent += result.count;
                if result.success {
                    self.set_state(SyncState::Synced);
                    stats.runs_completed += 1;
                    stats.last_sync_time = Some(Instant::now());
                    stats.last_error = None;
                } else {
                    self.set_state(SyncState::Error);
                    stats.runs_failed += 1;
                    stats.last_error = result.error.clone();
                }
                Ok(result)
            }
            Err(e) => {
                self.handle_error(&e);
                Err(e)
            }
        }
    }

    fn run_inner(
        &self,
        ctx: &SyncRunContext,
        entity: EntityType,
        start: Instant,
    ) -> SyncResult<SyncRunResult> {
        ctx.check_cancelled()?;

        self.set_state(SyncState::CheckingTenant);
        let scoped = scope_tenant(&*self.destination, ctx)?;
        let ctx: &SyncRunContext = &scoped;
        TenantContextGuard::new(&*self.source, self.config.tenant_policy)
            .enforce(ctx.tenant.name.as_deref().unwrap_or_default())?;

        let stored = self.cursors.read(ctx, entity)?;
        let floor = ctx.revision_floor.unwrap_or(stored.unwrap_or(0));
        let first_time = floor == 0;
        info!(
            run_id = %ctx.run_id,
            tenant = ctx.tenant.id,
            entity = %entity,
            floor,
            first_time,
            "starting incremental sync"
        );

        self.set_state(SyncState::Fetching);
        let document = self.source.fetch(&ctx.query(entity, Some(floor)))?;

        self.set_state(SyncState::Decoding);
        let records = decode(&document, entity)?;

        let mut result = SyncRunResult {
            entity,
            count: 0,
            new_revision_floor: floor.max(stored.unwrap_or(0)),
            success: true,
            message: String::new(),
            first_time,
            reconciliation: None,
            error: None,
            retryable: false,
            duration: Duration::ZERO,
        };

        if records.is_empty() {
            result.message = format!("no {entity} changes since revision {floor}");
            if first_time {
                self.set_state(SyncState::Reconciling);
                self.stats.write().reconciliations += 1;
                match self.reconciler.reconcile(ctx, entity) {
                    Ok(report) => {
                        result.message = format!(
                            "no {entity} records to sync; reconciliation found {} missing and {} stale",
                            report.missing, report.stale
                        );
                        result.reconciliation = Some(report);
                    }
                    Err(e) => {
                        warn!(run_id = %ctx.run_id, entity = %entity, error = %e, "first-time reconciliation failed");
                        result.error = Some(e.to_string());
                    }
                }
            }
            result.duration = start.elapsed();
            return Ok(result);
        }

        ctx.check_cancelled()?;
        self.set_state(SyncState::Transmitting);
        let payloads = Transformer::new(ctx.transform_context()).transform_all(&records);
        let outcome = BatchTransmitter::new(&*self.destination).send(
            ctx,
            entity,
            &payloads,
            ctx.pacing.batch_size(entity),
            ctx.pacing.batch_delay(entity),
        );
        self.stats.write().batches_sent += outcome.batches_sent as u64;
        result.count = outcome.committed;

        if let Some(err) = outcome.first_error {
            warn!(
                run_id = %ctx.run_id,
                entity = %entity,
                committed = outcome.committed,
                error = %err,
                "sync stopped; cursor left at {floor}"
            );
            result.success = false;
            result.message = format!(
                "{entity} sync stopped after {} of {} records",
                outcome.committed,
                payloads.len()
            );
            result.error = Some(err.to_string());
            result.retryable = err.is_retryable();
            result.duration = start.elapsed();
            return Ok(result);
        }

        let max_revision = records
            .iter()
            .map(|r| r.identity().revision)
            .max()
            .unwrap_or(floor);
        let new_floor = floor.max(max_revision);
        if new_floor > stored.unwrap_or(0) {
            self.cursors.write(ctx, entity, new_floor)?;
            debug!(run_id = %ctx.run_id, entity = %entity, new_floor, "cursor advanced");
        }
        result.new_revision_floor = new_floor.max(stored.unwrap_or(0));
        result.message = format!("synced {} {entity} records", outcome.committed);
        result.duration = start.elapsed();

        info!(
            run_id = %ctx.run_id,
            tenant = ctx.tenant.id,
            entity = %entity,
            count = result.count,
            new_floor = result.new_revision_floor,
            "incremental sync finished"
        );
        Ok(result)
    }

    /// Handles an error by updating state and stats.
    fn handle_error(&self, error: &SyncError) {
        self.set_state(SyncState::Error);
        let mut stats = self.stats.write();
        stats.runs_failed += 1;
        stats.last_error = Some(error.to_string());
    }
}
