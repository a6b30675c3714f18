//! Configuration for the sync engine.

use crate::error::SyncError;
use ledgersync_codec::EntityType;
use std::str::FromStr;
use std::time::Duration;

/// What to do when the source cannot tell us which tenant is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TenantPolicy {
    /// Proceed with a warning.
    #[default]
    FailOpen,
    /// Abort the run.
    FailClosed,
}

impl FromStr for TenantPolicy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" | "fail-open" => Ok(TenantPolicy::FailOpen),
            "closed" | "fail-closed" => Ok(TenantPolicy::FailClosed),
            other => Err(SyncError::Config(format!("unknown tenant policy '{other}'"))),
        }
    }
}

/// Batch sizes and pauses used while transmitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingConfig {
    /// Records per batch for master types.
    pub master_batch_size: usize,
    /// Records per batch for transactions.
    pub voucher_batch_size: usize,
    /// Pause between master batches.
    pub master_batch_delay: Duration,
    /// Pause between transaction batches.
    pub voucher_batch_delay: Duration,
    /// Pause between entity types in a multi-entity run.
    pub entity_delay: Duration,
}

impl PacingConfig {
    /// Creates the default pacing.
    pub fn new() -> Self {
        Self {
            master_batch_size: EntityType::Group.default_batch_size(),
            voucher_batch_size: EntityType::Voucher.default_batch_size(),
            master_batch_delay: EntityType::Group.default_batch_delay(),
            voucher_batch_delay: EntityType::Voucher.default_batch_delay(),
            entity_delay: Duration::from_millis(300),
        }
    }

    /// Pacing with no pauses at all.
    pub fn no_delay() -> Self {
        Self {
            master_batch_delay: Duration::ZERO,
            voucher_batch_delay: Duration::ZERO,
            entity_delay: Duration::ZERO,
            ..Self::new()
        }
    }

    /// Sets the batch size for master types.
    pub fn with_master_batch_size(mut self, size: usize) -> Self {
        self.master_batch_size = size;
        self
    }

    /// Sets the batch size for transactions.
    pub fn with_voucher_batch_size(mut self, size: usize) -> Self {
        self.voucher_batch_size = size;
        self
    }

    /// Sets the pause between entity types.
    pub fn with_entity_delay(mut self, delay: Duration) -> Self {
        self.entity_delay = delay;
        self
    }

    /// Batch size for `entity`, never zero.
    pub fn batch_size(&self, entity: EntityType) -> usize {
        let size = if entity.is_transaction() {
            self.voucher_batch_size
        } else {
            self.master_batch_size
        };
        size.max(1)
    }

    /// Pause between batches of `entity`.
    pub fn batch_delay(&self, entity: EntityType) -> Duration {
        if entity.is_transaction() {
            self.voucher_batch_delay
        } else {
            self.master_batch_delay
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Host running the source application.
    pub source_host: String,
    /// Port of the source's query endpoint.
    pub source_port: u16,
    /// Base URL of the destination API.
    pub destination_url: String,
    /// Source timeout for master queries.
    pub source_master_timeout: Duration,
    /// Source timeout for transaction queries.
    pub source_voucher_timeout: Duration,
    /// Timeout for batch uploads and record listings.
    pub destination_timeout: Duration,
    /// Timeout for cursor, tenant and status calls.
    pub control_timeout: Duration,
    /// Tenant check policy.
    pub tenant_policy: TenantPolicy,
    /// Records listed per category in reconciliation reports.
    pub sample_limit: usize,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(destination_url: impl Into<String>) -> Self {
        let destination_url: String = destination_url.into();
        Self {
            source_host: "localhost".into(),
            source_port: 9000,
            destination_url: destination_url.trim_end_matches('/').to_owned(),
            source_master_timeout: EntityType::Group.source_timeout(),
            source_voucher_timeout: EntityType::Voucher.source_timeout(),
            destination_timeout: Duration::from_secs(30),
            control_timeout: Duration::from_secs(10),
            tenant_policy: TenantPolicy::default(),
            sample_limit: ledgersync_protocol::SAMPLE_LIMIT,
        }
    }

    /// Sets the source address.
    pub fn with_source(mut self, host: impl Into<String>, port: u16) -> Self {
        self.source_host = host.into();
        self.source_port = port;
        self
    }

    /// Sets the destination timeout.
    pub fn with_destination_timeout(mut self, timeout: Duration) -> Self {
        self.destination_timeout = timeout;
        self
    }

    /// Sets the cursor, tenant and status call timeout.
    pub fn with_control_timeout(mut self, timeout: Duration) -> Self {
        self.control_timeout = timeout;
        self
    }

    /// Sets the tenant policy.
    pub fn with_tenant_policy(mut self, policy: TenantPolicy) -> Self {
        self.tenant_policy = policy;
        self
    }

    /// Sets the reconciliation sample limit.
    pub fn with_sample_limit(mut self, limit: usize) -> Self {
        self.sample_limit = limit;
        self
    }

    /// URL of the source's query endpoint.
    pub fn source_url(&self) -> String {
        format!("http://{}:{}", self.source_host, self.source_port)
    }

    /// Source timeout for queries of `entity`.
    pub fn source_timeout(&self, entity: EntityType) -> Duration {
        if entity.is_transaction() {
            self.source_voucher_timeout
        } else {
            self.source_master_timeout
        }
    }

    /// Checks the configuration is usable.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.destination_url.is_empty() {
            return Err(SyncError::Config("destination URL is required".into()));
        }
        if !self.destination_url.starts_with("http://")
            && !self.destination_url.starts_with("https://")
        {
            return Err(SyncError::Config(format!(
                "destination URL '{}' must start with http:// or https://",
                self.destination_url
            )));
        }
        if self.source_host.trim().is_empty() {
            return Err(SyncError::Config("source host is required".into()));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new("https://api.example.com/")
            .with_source("10.0.0.5", 9100)
            .with_tenant_policy(TenantPolicy::FailClosed)
            .with_sample_limit(5);

        assert_eq!(config.destination_url, "https://api.example.com");
        assert_eq!(config.source_url(), "http://10.0.0.5:9100");
        assert_eq!(config.tenant_policy, TenantPolicy::FailClosed);
        assert_eq!(config.sample_limit, 5);
        assert_eq!(SyncConfig::default().sample_limit, 10);
        assert_eq!(
            config.source_timeout(EntityType::Voucher),
            Duration::from_secs(120)
        );
        assert_eq!(
            config.source_timeout(EntityType::Ledger),
            Duration::from_secs(30)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validation_rejects_missing_destination() {
        assert!(SyncConfig::default().validate().is_err());
        assert!(SyncConfig::new("ftp://x").validate().is_err());
    }

    #[test]
    fn pacing_defaults_by_entity() {
        let pacing = PacingConfig::new();
        assert_eq!(pacing.batch_size(EntityType::Voucher), 50);
        assert_eq!(pacing.batch_size(EntityType::StockItem), 500);
        assert_eq!(
            pacing.batch_delay(EntityType::Voucher),
            Duration::from_millis(300)
        );

        let none = PacingConfig::no_delay().with_master_batch_size(0);
        assert_eq!(none.batch_size(EntityType::Group), 1);
        assert_eq!(none.batch_delay(EntityType::Group), Duration::ZERO);
    }

    #[test]
    fn tenant_policy_parsing() {
        assert_eq!("open".parse::<TenantPolicy>().unwrap(), TenantPolicy::FailOpen);
        assert_eq!(
            "Closed".parse::<TenantPolicy>().unwrap(),
            TenantPolicy::FailClosed
        );
        assert!("maybe".parse::<TenantPolicy>().is_err());
    }
}
