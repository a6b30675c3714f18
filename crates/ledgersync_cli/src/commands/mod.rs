//! CLI command implementations.

pub mod reconcile;
pub mod sync;
pub mod tenants;

use chrono::NaiveDate;
use ledgersync_codec::{CodecError, EntityType};
use ledgersync_engine::{
    Credentials, HttpCursorStore, HttpDestination, IncrementalSyncEngine, SourceClient,
    SyncConfig, SyncRunContext, UreqClient,
};
use std::sync::Arc;

/// HTTP client shared by every transport of one invocation.
pub type SharedClient = Arc<UreqClient>;

/// Engine wired to the real source and destination.
pub type HttpEngine = IncrementalSyncEngine<
    SourceClient<SharedClient>,
    HttpDestination<SharedClient>,
    HttpCursorStore<SharedClient>,
>;

/// Settings gathered from the global options.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Source and destination configuration.
    pub config: SyncConfig,
    /// Destination credentials.
    pub credentials: Credentials,
    /// Owning user id stamped on every record.
    pub user_id: u64,
}

impl Settings {
    /// Base context for `tenant_id`.
    pub fn context(&self, tenant_id: u64, tenant_name: Option<&str>) -> SyncRunContext {
        let ctx = SyncRunContext::new(tenant_id, self.user_id)
            .with_credentials(self.credentials.clone());
        match tenant_name {
            Some(name) => ctx.with_tenant_name(name),
            None => ctx,
        }
    }

    /// Builds the HTTP engine after validating the configuration.
    pub fn engine(&self) -> Result<HttpEngine, ledgersync_engine::SyncError> {
        self.config.validate()?;
        let client: SharedClient = Arc::new(UreqClient::new());
        let config = &self.config;
        Ok(IncrementalSyncEngine::new(
            config.clone(),
            Arc::new(SourceClient::new(config, Arc::clone(&client))),
            Arc::new(
                HttpDestination::new(config.destination_url.as_str(), Arc::clone(&client))
                    .with_timeout(config.destination_timeout)
                    .with_control_timeout(config.control_timeout),
            ),
            Arc::new(
                HttpCursorStore::new(config.destination_url.as_str(), client)
                    .with_timeout(config.control_timeout),
            ),
        ))
    }
}

/// Parses an entity argument; `all` expands to every type in sync order.
pub fn parse_entities(arg: &str) -> Result<Vec<EntityType>, CodecError> {
    if arg.eq_ignore_ascii_case("all") {
        Ok(EntityType::SYNC_ORDER.to_vec())
    } else {
        Ok(vec![arg.parse()?])
    }
}

/// Parses a tenant argument; `all` yields `None`.
pub fn parse_tenant(arg: &str) -> Result<Option<u64>, String> {
    if arg.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    arg.trim()
        .parse()
        .map(Some)
        .map_err(|_| format!("tenant must be a numeric id or 'all', got '{arg}'"))
}

/// Parses `YYYY-MM-DD` or `YYYYMMDD`.
pub fn parse_date(arg: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(arg, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(arg, "%Y%m%d"))
        .map_err(|_| format!("invalid date '{arg}', expected YYYY-MM-DD"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_arguments() {
        assert_eq!(parse_entities("all").unwrap().len(), EntityType::SYNC_ORDER.len());
        assert_eq!(parse_entities("stock-items").unwrap(), vec![EntityType::StockItem]);
        assert!(parse_entities("widgets").is_err());
    }

    #[test]
    fn tenant_arguments() {
        assert_eq!(parse_tenant("ALL").unwrap(), None);
        assert_eq!(parse_tenant("42").unwrap(), Some(42));
        assert!(parse_tenant("acme").is_err());
    }

    #[test]
    fn date_arguments() {
        let expected = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        assert_eq!(parse_date("2024-04-01").unwrap(), expected);
        assert_eq!(parse_date("20240401").unwrap(), expected);
        assert!(parse_date("01/04/2024").is_err());
    }

    #[test]
    fn engine_requires_destination() {
        let settings = Settings {
            config: SyncConfig::default(),
            credentials: Credentials::default(),
            user_id: 1,
        };
        assert!(settings.engine().is_err());
    }

    #[test]
    fn context_carries_tenant_and_user() {
        let settings = Settings {
            config: SyncConfig::new("https://api.example.com"),
            credentials: Credentials::new(Some("t".into()), None),
            user_id: 9,
        };
        let ctx = settings.context(4, Some("Acme"));
        assert_eq!(ctx.tenant.id, 4);
        assert_eq!(ctx.tenant.name.as_deref(), Some("Acme"));
        assert_eq!(ctx.user_id, 9);
        assert_eq!(ctx.credentials.headers().len(), 1);
    }
}
