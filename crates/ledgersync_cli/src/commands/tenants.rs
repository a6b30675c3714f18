//! Tenants command implementation.

use crate::output::CommandOutput;
use ledgersync_engine::{
    SourceClient, SourceTransport, SyncConfig, TenantContextGuard, TenantPolicy, UreqClient,
};

/// Lists the tenants open in the configured source.
pub fn run(config: &SyncConfig) -> Result<CommandOutput, Box<dyn std::error::Error>> {
    let source = SourceClient::new(config, UreqClient::new());
    execute(&source)
}

/// Lists the tenants open in `source`.
pub fn execute<S: SourceTransport + ?Sized>(
    source: &S,
) -> Result<CommandOutput, Box<dyn std::error::Error>> {
    let tenants = TenantContextGuard::new(source, TenantPolicy::FailClosed).active_tenants()?;
    let count = tenants.len() as u64;
    Ok(CommandOutput::new(true, format!("{count} active tenant(s)"), count)
        .with("tenants", &tenants)?)
}
