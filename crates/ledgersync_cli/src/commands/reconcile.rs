//! Reconcile command implementation.

use super::Settings;
use crate::output::CommandOutput;
use ledgersync_codec::EntityType;
use ledgersync_engine::{CursorStore, DestinationTransport, SourceTransport, SyncDriver, SyncRunContext};
use ledgersync_protocol::ReconciliationReport;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// An entity type whose reconciliation failed.
#[derive(Debug, Serialize)]
pub struct EntityFailure {
    /// Entity type.
    pub entity: String,
    /// Error text.
    pub error: String,
}

/// Runs the reconcile command against the configured endpoints.
pub fn run(
    settings: &Settings,
    tenant_id: u64,
    tenant_name: Option<&str>,
    entities: &[EntityType],
    report_file: Option<&Path>,
) -> Result<CommandOutput, Box<dyn std::error::Error>> {
    let driver = SyncDriver::new(settings.engine()?);
    let ctx = settings.context(tenant_id, tenant_name);
    execute(&driver, &ctx, entities, report_file)
}

/// Reconciles `entities` for the tenant in `ctx`.
pub fn execute<S, D, K>(
    driver: &SyncDriver<S, D, K>,
    ctx: &SyncRunContext,
    entities: &[EntityType],
    report_file: Option<&Path>,
) -> Result<CommandOutput, Box<dyn std::error::Error>>
where
    S: SourceTransport,
    D: DestinationTransport,
    K: CursorStore,
{
    let mut reports = Vec::new();
    let mut failures = Vec::new();
    for (entity, outcome) in driver.reconcile_entities(ctx, entities)? {
        match outcome {
            Ok(report) => reports.push(report),
            Err(e) => {
                warn!(tenant = ctx.tenant.id, entity = %entity, error = %e, "reconciliation failed");
                failures.push(EntityFailure {
                    entity: entity.as_str().to_owned(),
                    error: e.to_string(),
                });
            }
        }
    }

    if let Some(path) = report_file {
        append_reports(path, &reports)?;
    }

    let repaired: usize = reports.iter().map(|r| r.repaired).sum();
    let repair_failed = reports.iter().any(|r| r.repair_error.is_some());
    let success = failures.is_empty() && !repair_failed;
    let message = if success {
        format!(
            "reconciled {} type(s); repaired {repaired} record(s)",
            reports.len()
        )
    } else if let Some(first) = failures.first() {
        format!("{} reconciliation failed: {}", first.entity, first.error)
    } else {
        "repair did not complete".to_owned()
    };

    Ok(CommandOutput::new(success, message, repaired as u64)
        .with("reports", &reports)?
        .with("failures", &failures)?)
}

/// Appends one JSON line per report to `path`, creating it if needed.
pub fn append_reports(path: &Path, reports: &[ReconciliationReport]) -> Result<(), Box<dyn std::error::Error>> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for report in reports {
        writeln!(file, "{}", report.to_json_line()?)?;
    }
    Ok(())
}
