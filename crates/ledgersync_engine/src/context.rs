//! Per-run context passed explicitly through every operation.

use crate::config::PacingConfig;
use crate::error::{SyncError, SyncResult};
use chrono::NaiveDate;
use ledgersync_codec::{EntityType, QueryDocument};
use ledgersync_protocol::TransformContext;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// The tenant a run targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantRef {
    /// Destination tenant id.
    pub id: u64,
    /// Tenant (company) name in the source, when known.
    pub name: Option<String>,
}

/// Destination credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Bearer token.
    pub auth_token: Option<String>,
    /// Device token.
    pub device_token: Option<String>,
}

impl Credentials {
    /// Creates credentials, ignoring blank values.
    pub fn new(auth_token: Option<String>, device_token: Option<String>) -> Self {
        let keep = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Self {
            auth_token: keep(auth_token),
            device_token: keep(device_token),
        }
    }

    /// Request headers carrying these credentials.
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::with_capacity(2);
        if let Some(token) = &self.auth_token {
            headers.push(("Authorization".to_owned(), format!("Bearer {token}")));
        }
        if let Some(device) = &self.device_token {
            headers.push(("X-Device-Token".to_owned(), device.clone()));
        }
        headers
    }
}

/// Everything one sync run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct SyncRunContext {
    /// Id used to correlate log lines of one run.
    pub run_id: Uuid,
    /// Target tenant.
    pub tenant: TenantRef,
    /// Owning user id.
    pub user_id: u64,
    /// Destination credentials.
    pub credentials: Credentials,
    /// Batch sizes and pauses.
    pub pacing: PacingConfig,
    /// Overrides the stored cursor when set.
    pub revision_floor: Option<u64>,
    /// Period for transaction queries.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    cancelled: Arc<AtomicBool>,
}

impl SyncRunContext {
    /// Creates a context for one tenant.
    pub fn new(tenant_id: u64, user_id: u64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            tenant: TenantRef {
                id: tenant_id,
                name: None,
            },
            user_id,
            credentials: Credentials::default(),
            pacing: PacingConfig::default(),
            revision_floor: None,
            date_range: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Sets the tenant name checked against the source.
    pub fn with_tenant_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.tenant.name = (!name.trim().is_empty()).then_some(name);
        self
    }

    /// Sets the destination credentials.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sets the pacing.
    pub fn with_pacing(mut self, pacing: PacingConfig) -> Self {
        self.pacing = pacing;
        self
    }

    /// Forces the revision floor instead of reading the cursor.
    pub fn with_revision_floor(mut self, floor: u64) -> Self {
        self.revision_floor = Some(floor);
        self
    }

    /// Limits transaction queries to a period.
    pub fn with_date_range(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.date_range = Some((from, to));
        self
    }

    /// Shares a cancellation flag owned by the caller.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    /// Derives a context for another tenant sharing credentials, pacing and
    /// cancellation.
    pub fn for_tenant(&self, tenant_id: u64, name: Option<String>) -> Self {
        let mut ctx = self.clone();
        ctx.run_id = Uuid::new_v4();
        ctx.tenant = TenantRef {
            id: tenant_id,
            name: name.filter(|n| !n.trim().is_empty()),
        };
        ctx
    }

    /// Returns the cancellation flag.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// True once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails with [`SyncError::Cancelled`] once cancellation was requested.
    pub fn check_cancelled(&self) -> SyncResult<()> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Source query for `entity` scoped to this run's tenant and period.
    ///
    /// A floor of 0 or `None` fetches everything.
    pub fn query(&self, entity: EntityType, floor: Option<u64>) -> QueryDocument {
        let mut query = QueryDocument::for_entity(entity);
        if let Some(floor) = floor.filter(|f| *f > 0) {
            query = query.with_revision_floor(floor);
        }
        if let Some(name) = &self.tenant.name {
            query = query.with_tenant(name.clone());
        }
        if let (true, Some((from, to))) = (entity.is_transaction(), self.date_range) {
            query = query.with_date_range(from, to);
        }
        query
    }

    /// Ids stamped on payloads of this run.
    pub fn transform_context(&self) -> TransformContext {
        TransformContext {
            tenant_id: self.tenant.id,
            user_id: self.user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_shared() {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = SyncRunContext::new(1, 2).with_cancel_flag(Arc::clone(&flag));
        let other = ctx.for_tenant(3, Some("Beta".into()));
        assert!(ctx.check_cancelled().is_ok());

        flag.store(true, Ordering::SeqCst);
        assert!(ctx.is_cancelled());
        assert!(matches!(other.check_cancelled(), Err(SyncError::Cancelled)));
        assert_ne!(ctx.run_id, other.run_id);
    }

    #[test]
    fn blank_tenant_name_is_dropped() {
        let ctx = SyncRunContext::new(1, 2).with_tenant_name("  ");
        assert_eq!(ctx.tenant.name, None);
        let ctx = ctx.with_tenant_name("Acme");
        assert_eq!(ctx.tenant.name.as_deref(), Some("Acme"));
    }

    #[test]
    fn credential_headers() {
        let creds = Credentials::new(Some("tok".into()), Some(" ".into()));
        assert_eq!(
            creds.headers(),
            vec![("Authorization".to_owned(), "Bearer tok".to_owned())]
        );
        assert!(Credentials::default().headers().is_empty());
    }

    #[test]
    fn query_scoping() {
        let ctx = SyncRunContext::new(1, 1).with_tenant_name("Acme");
        let query = ctx.query(EntityType::Ledger, Some(0));
        assert_eq!(query.revision_floor(), None);
        assert!(query.encode().unwrap().contains("Acme"));

        let query = ctx.query(EntityType::Voucher, Some(17));
        assert_eq!(query.revision_floor(), Some(17));
        assert_eq!(query.entity(), Some(EntityType::Voucher));
    }

    #[test]
    fn transform_context_carries_ids() {
        let ctx = SyncRunContext::new(7, 3);
        let t = ctx.transform_context();
        assert_eq!((t.tenant_id, t.user_id), (7, 3));
    }
}
