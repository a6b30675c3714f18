//! LedgerSync CLI
//!
//! Command-line front end that syncs a ledger application with a remote store.
//!
//! # Commands
//!
//! - `sync` - Incremental sync of one or all entity types
//! - `reconcile` - Compare source and destination and repair gaps
//! - `tenants` - List tenants open in the source
//! - `version` - Show version information
//!
//! Every invocation prints exactly one JSON object on stdout; logs go to
//! stderr. A failed command exits with status 1.

mod commands;
mod output;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use commands::{parse_date, parse_entities, parse_tenant, Settings};
use ledgersync_engine::{Credentials, SyncConfig, TenantPolicy};
use output::CommandOutput;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Sync a ledger application with a remote store.
#[derive(Parser)]
#[command(name = "ledgersync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Host running the source application
    #[arg(global = true, long, default_value = "localhost")]
    source_host: String,

    /// Port of the source application
    #[arg(global = true, long, default_value_t = 9000)]
    source_port: u16,

    /// Base URL of the destination API
    #[arg(global = true, long, env = "LEDGERSYNC_DESTINATION_URL", default_value = "")]
    destination_url: String,

    /// Bearer token for the destination
    #[arg(global = true, long, env = "LEDGERSYNC_AUTH_TOKEN")]
    auth_token: Option<String>,

    /// Device token for the destination
    #[arg(global = true, long, env = "LEDGERSYNC_DEVICE_TOKEN")]
    device_token: Option<String>,

    /// Owning user id stamped on every record
    #[arg(global = true, long, default_value_t = 0)]
    user_id: u64,

    /// Behavior when the tenant list cannot be read (open, closed)
    #[arg(global = true, long, default_value = "open")]
    tenant_policy: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Incrementally sync records changed since the stored cursor
    Sync {
        /// Destination tenant id, or `all` for every imported tenant
        tenant: String,

        /// Entity type, or `all` for every type in dependency order
        #[arg(default_value = "all")]
        entity: String,

        /// Tenant name that must be open in the source
        #[arg(long)]
        tenant_name: Option<String>,

        /// Fetch from this revision instead of the stored cursor
        #[arg(long)]
        revision_floor: Option<u64>,

        /// Start of the voucher period (YYYY-MM-DD)
        #[arg(long, requires = "to_date")]
        from_date: Option<String>,

        /// End of the voucher period (YYYY-MM-DD)
        #[arg(long, requires = "from_date")]
        to_date: Option<String>,
    },

    /// Compare source and destination and re-send missing or stale records
    Reconcile {
        /// Destination tenant id
        tenant: u64,

        /// Entity type, or `all`
        #[arg(default_value = "all")]
        entity: String,

        /// Tenant name that must be open in the source
        #[arg(long)]
        tenant_name: Option<String>,

        /// Append one JSON line per report to this file
        #[arg(long)]
        report_file: Option<PathBuf>,
    },

    /// List tenants open in the source
    Tenants,

    /// Show version information
    Version,
}

fn main() {
    let cli = match parse_args(std::env::args_os()) {
        Ok(cli) => cli,
        Err(output) => emit(&output),
    };

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let output = execute(cli).unwrap_or_else(|e| {
        tracing::error!(error = %e, "command failed");
        CommandOutput::failure(e.to_string())
    });
    emit(&output)
}

/// Parses the command line. Help and version requests print and exit;
/// any other parse error becomes a failed [`CommandOutput`].
fn parse_args<I, T>(args: I) -> Result<Cli, CommandOutput>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args).map_err(|e| match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
        _ => CommandOutput::failure(e.to_string().trim_end()),
    })
}

fn emit(output: &CommandOutput) -> ! {
    if let Err(e) = output.write_to(std::io::stdout().lock()) {
        eprintln!("failed to write output: {e}");
        std::process::exit(1);
    }
    std::process::exit(output.exit_code())
}

fn execute(cli: Cli) -> Result<CommandOutput, Box<dyn std::error::Error>> {
    let policy: TenantPolicy = cli.tenant_policy.parse()?;
    let config = SyncConfig::new(cli.destination_url)
        .with_source(cli.source_host, cli.source_port)
        .with_tenant_policy(policy);
    let settings = Settings {
        config,
        credentials: Credentials::new(cli.auth_token, cli.device_token),
        user_id: cli.user_id,
    };

    match cli.command {
        Commands::Sync {
            tenant,
            entity,
            tenant_name,
            revision_floor,
            from_date,
            to_date,
        } => {
            let date_range = match (from_date, to_date) {
                (Some(from), Some(to)) => Some((parse_date(&from)?, parse_date(&to)?)),
                _ => None,
            };
            let args = commands::sync::SyncArgs {
                tenant: parse_tenant(&tenant)?,
                tenant_name,
                entities: parse_entities(&entity)?,
                revision_floor,
                date_range,
            };
            commands::sync::run(&settings, args)
        }
        Commands::Reconcile {
            tenant,
            entity,
            tenant_name,
            report_file,
        } => commands::reconcile::run(
            &settings,
            tenant,
            tenant_name.as_deref(),
            &parse_entities(&entity)?,
            report_file.as_deref(),
        ),
        Commands::Tenants => commands::tenants::run(&settings.config),
        Commands::Version => Ok(CommandOutput::new(
            true,
            format!("LedgerSync CLI v{}", env!("CARGO_PKG_VERSION")),
            0,
        )),
    }
}
