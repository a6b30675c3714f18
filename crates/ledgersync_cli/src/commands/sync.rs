//! Sync command implementation.

use super::Settings;
use crate::output::CommandOutput;
use chrono::NaiveDate;
use ledgersync_codec::EntityType;
use ledgersync_engine::{
    CursorStore, DestinationTransport, DriverRunResult, SourceTransport, SyncDriver,
    SyncRunContext, SyncRunResult,
};
use ledgersync_protocol::ReconciliationReport;
use serde::Serialize;
use tracing::{error, info};

/// Parsed arguments of `sync`.
#[derive(Debug, Clone)]
pub struct SyncArgs {
    /// Tenant to sync; `None` means every imported tenant.
    pub tenant: Option<u64>,
    /// Tenant name checked against the source.
    pub tenant_name: Option<String>,
    /// Entity types in sync order.
    pub entities: Vec<EntityType>,
    /// Forced revision floor.
    pub revision_floor: Option<u64>,
    /// Period for vouchers.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
}

/// Per-entity line of the sync output.
#[derive(Debug, Serialize)]
pub struct EntitySummary {
    /// Entity type.
    pub entity: String,
    /// Whether every batch was confirmed.
    pub success: bool,
    /// Records confirmed.
    pub count: u64,
    /// Cursor after the run.
    pub new_revision_floor: u64,
    /// Run started from an empty cursor.
    pub first_time: bool,
    /// Summary for humans.
    pub message: String,
    /// Error that stopped the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The error is transient; rerunning may succeed.
    pub retryable: bool,
    /// First-time reconciliation report.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<ReconciliationReport>,
}

impl From<&SyncRunResult> for EntitySummary {
    fn from(r: &SyncRunResult) -> Self {
        Self {
            entity: r.entity.as_str().to_owned(),
            success: r.success,
            count: r.count,
            new_revision_floor: r.new_revision_floor,
            first_time: r.first_time,
            message: r.message.clone(),
            error: r.error.clone(),
            retryable: r.retryable,
            reconciliation: r.reconciliation.clone(),
        }
    }
}

/// Per-tenant block of the sync output.
#[derive(Debug, Serialize)]
pub struct TenantOutcome {
    /// Destination tenant id.
    pub tenant_id: u64,
    /// Whether every entity type succeeded.
    pub success: bool,
    /// Records confirmed.
    pub count: u64,
    /// Entity results in order.
    pub entities: Vec<EntitySummary>,
    /// Error that aborted the tenant's run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the abort was transient.
    pub retryable: bool,
}

impl From<&DriverRunResult> for TenantOutcome {
    fn from(run: &DriverRunResult) -> Self {
        Self {
            tenant_id: run.tenant_id,
            success: run.success,
            count: run.total_count(),
            entities: run.results.iter().map(EntitySummary::from).collect(),
            error: None,
            retryable: run.results.iter().any(|r| r.retryable),
        }
    }
}

/// Runs the sync command against the configured endpoints.
pub fn run(settings: &Settings, args: SyncArgs) -> Result<CommandOutput, Box<dyn std::error::Error>> {
    let driver = SyncDriver::new(settings.engine()?);
    execute(&driver, &settings.context(0, None), args)
}

/// Runs the sync for every targeted tenant.
pub fn execute<S, D, K>(
    driver: &SyncDriver<S, D, K>,
    base: &SyncRunContext,
    args: SyncArgs,
) -> Result<CommandOutput, Box<dyn std::error::Error>>
where
    S: SourceTransport,
    D: DestinationTransport,
    K: CursorStore,
{
    let mut base = base.clone();
    base.revision_floor = args.revision_floor;
    base.date_range = args.date_range;

    let targets: Vec<(u64, Option<String>)> = match args.tenant {
        Some(id) => vec![(id, args.tenant_name)],
        None => driver
            .imported_tenants(&base)?
            .into_iter()
            .map(|t| (t.id, Some(t.name)))
            .collect(),
    };
    if targets.is_empty() {
        return Ok(CommandOutput::new(true, "no imported tenants to sync", 0));
    }

    let mut outcomes = Vec::with_capacity(targets.len());
    for (tenant_id, name) in targets {
        let ctx = base.for_tenant(tenant_id, name);
        let outcome = match driver.run_entities(&ctx, &args.entities) {
            Ok(run) => TenantOutcome::from(&run),
            Err(e) => {
                error!(tenant = tenant_id, error = %e, "tenant sync aborted");
                TenantOutcome {
                    tenant_id,
                    success: false,
                    count: 0,
                    entities: Vec::new(),
                    error: Some(e.to_string()),
                    retryable: e.is_retryable(),
                }
            }
        };
        outcomes.push(outcome);
    }

    let count = outcomes.iter().map(|o| o.count).sum();
    let failed = outcomes.iter().filter(|o| !o.success).count();
    let message = match (failed, outcomes.as_slice()) {
        (0, _) => format!("synced {count} records for {} tenant(s)", outcomes.len()),
        (_, [only]) => only
            .error
            .clone()
            .or_else(|| only.entities.iter().find_map(|e| e.error.clone()))
            .unwrap_or_else(|| "sync finished with failures".to_owned()),
        _ => format!("{failed} of {} tenant(s) failed", outcomes.len()),
    };
    info!(count, failed, "sync command finished");

    Ok(CommandOutput::new(failed == 0, message, count).with("tenants", &outcomes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgersync_engine::{
        IncrementalSyncEngine, MemoryCursorStore, MemoryDestination, MockSource, PacingConfig,
        SyncConfig,
    };
    use ledgersync_protocol::TenantSummary;
    use std::sync::Arc;

    type MemoryDriver = SyncDriver<MockSource, MemoryDestination, MemoryCursorStore>;

    fn driver() -> (Arc<MockSource>, Arc<MemoryDestination>, MemoryDriver) {
        let source = Arc::new(MockSource::new());
        let destination = Arc::new(MemoryDestination::new());
        let engine = IncrementalSyncEngine::new(
            SyncConfig::new("http://dest"),
            Arc::clone(&source),
            Arc::clone(&destination),
            Arc::new(MemoryCursorStore::new()),
        );
        (source, destination, SyncDriver::new(engine))
    }

    fn base() -> SyncRunContext {
        SyncRunContext::new(0, 1).with_pacing(PacingConfig::no_delay())
    }

    fn args(tenant: Option<u64>, entities: &[EntityType]) -> SyncArgs {
        SyncArgs {
            tenant,
            tenant_name: None,
            entities: entities.to_vec(),
            revision_floor: None,
            date_range: None,
        }
    }

    #[test]
    fn single_tenant_single_entity() {
        let (source, destination, driver) = driver();
        source.insert_master(EntityType::Ledger, 1, "a", 4, "Cash");
        source.insert_master(EntityType::Ledger, 2, "b", 6, "Bank");
        source.set_tenants(Some(&["Acme"]));
        destination.add_tenant(TenantSummary::imported(7, "Acme"));

        let output = execute(&driver, &base(), args(Some(7), &[EntityType::Ledger])).unwrap();
        assert!(output.success);
        assert_eq!(output.count, 2);
        assert_eq!(destination.count(7, EntityType::Ledger), 2);
        assert_eq!(output.extra["tenants"][0]["entities"][0]["new_revision_floor"], 6);
    }

    #[test]
    fn all_tenants_come_from_destination() {
        let (source, destination, driver) = driver();
        source.insert_master(EntityType::Unit, 1, "u", 2, "Nos");
        for (id, status) in [(1, "imported"), (2, "imported"), (3, "importing")] {
            destination.add_tenant(TenantSummary {
                id,
                name: format!("T{id}"),
                status: Some(status.into()),
            });
        }
        source.set_tenants(Some(&["T1", "T2", "T3"]));

        let output = execute(&driver, &base(), args(None, &[EntityType::Unit])).unwrap();
        assert!(output.success);
        assert_eq!(output.count, 2);
        assert_eq!(destination.count(3, EntityType::Unit), 0);
    }

    #[test]
    fn aborted_tenant_reports_its_error() {
        let (source, _, driver) = driver();
        source.set_tenants(Some(&["Other"]));
        let mut args = args(Some(1), &[EntityType::Group]);
        args.tenant_name = Some("Acme".into());

        let output = execute(&driver, &base(), args).unwrap();
        assert!(!output.success);
        assert_eq!(output.exit_code(), 1);
        assert!(output.message.contains("Acme"), "{}", output.message);
        assert_eq!(output.extra["tenants"][0]["retryable"], false);
    }

    #[test]
    fn unknown_tenant_id_is_reported_not_synced() {
        let (source, destination, driver) = driver();
        source.insert_master(EntityType::Ledger, 1, "a", 4, "Cash");

        let output = execute(&driver, &base(), args(Some(9), &[EntityType::Ledger])).unwrap();
        assert!(!output.success);
        assert_eq!(destination.count(9, EntityType::Ledger), 0);
        assert!(output.message.contains("not registered"), "{}", output.message);
        assert_eq!(output.extra["tenants"][0]["retryable"], true);
    }
}
