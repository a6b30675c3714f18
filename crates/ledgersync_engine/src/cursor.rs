//! Revision cursors, one per tenant and entity type.

use crate::context::SyncRunContext;
use crate::destination::send_checked;
use crate::error::{SyncError, SyncResult};
use crate::http::{HttpClient, HttpRequest};
use ledgersync_codec::EntityType;
use ledgersync_protocol::{
    decode_voucher_cursor, MasterCursorUpdate, MasterMapping, VoucherCursorUpdate,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;

/// Stores the highest revision known to be at the destination.
pub trait CursorStore: Send + Sync {
    /// Reads the cursor. `None` means the type was never synced.
    fn read(&self, ctx: &SyncRunContext, entity: EntityType) -> SyncResult<Option<u64>>;

    /// Persists a new cursor.
    fn write(&self, ctx: &SyncRunContext, entity: EntityType, floor: u64) -> SyncResult<()>;
}

/// Cursors kept by the destination API.
pub struct HttpCursorStore<C: HttpClient> {
    base_url: String,
    client: C,
    timeout: Duration,
}

impl<C: HttpClient> HttpCursorStore<C> {
    /// Creates a new cursor store.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client,
            timeout: Duration::from_secs(10),
        }
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, ctx: &SyncRunContext, route: &str) -> String {
        format!("{}/api/companies/{}/{route}", self.base_url, ctx.tenant.id)
    }

    fn request(&self, ctx: &SyncRunContext, request: HttpRequest) -> HttpRequest {
        request
            .with_header("Content-Type", "application/json")
            .with_headers(ctx.credentials.headers())
            .with_timeout(self.timeout)
    }
}

impl<C: HttpClient> CursorStore for HttpCursorStore<C> {
    fn read(&self, ctx: &SyncRunContext, entity: EntityType) -> SyncResult<Option<u64>> {
        let route = if entity.is_transaction() {
            "voucher-alter-id"
        } else {
            "master-mapping"
        };
        let request = self.request(ctx, HttpRequest::get(self.url(ctx, route)));
        let response = match send_checked(&self.client, &request) {
            Ok(response) => response,
            Err(SyncError::DestinationRejected { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        if entity.is_transaction() {
            decode_voucher_cursor(&response.body).map_err(SyncError::malformed)
        } else {
            MasterMapping::decode(&response.body)
                .map(|mapping| mapping.cursor(entity.cursor_key()))
                .map_err(SyncError::malformed)
        }
    }

    fn write(&self, ctx: &SyncRunContext, entity: EntityType, floor: u64) -> SyncResult<()> {
        let (route, body) = if entity.is_transaction() {
            ("voucher-alter-id", VoucherCursorUpdate::new(floor).encode()?)
        } else {
            (
                "last-alter-id",
                MasterCursorUpdate::new(entity.cursor_key(), floor).encode()?,
            )
        };
        let request = self.request(ctx, HttpRequest::post(self.url(ctx, route), body));
        send_checked(&self.client, &request)?;
        Ok(())
    }
}

/// An in-memory cursor store for testing.
///
/// Writes never lower a stored cursor.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursors: RwLock<HashMap<(u64, EntityType), u64>>,
    writes: RwLock<usize>,
}

impl MemoryCursorStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a cursor directly.
    pub fn get(&self, tenant_id: u64, entity: EntityType) -> Option<u64> {
        self.cursors.read().get(&(tenant_id, entity)).copied()
    }

    /// Sets a cursor directly.
    pub fn set(&self, tenant_id: u64, entity: EntityType, floor: u64) {
        self.cursors.write().insert((tenant_id, entity), floor);
    }

    /// Number of writes received through [`CursorStore::write`].
    pub fn writes(&self) -> usize {
        *self.writes.read()
    }
}

impl CursorStore for MemoryCursorStore {
    fn read(&self, ctx: &SyncRunContext, entity: EntityType) -> SyncResult<Option<u64>> {
        Ok(self.get(ctx.tenant.id, entity))
    }

    fn write(&self, ctx: &SyncRunContext, entity: EntityType, floor: u64) -> SyncResult<()> {
        *self.writes.write() += 1;
        let mut cursors = self.cursors.write();
        let current = cursors.entry((ctx.tenant.id, entity)).or_insert(floor);
        *current = (*current).max(floor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Method, MockHttpClient};
    use std::sync::Arc;

    fn ctx() -> SyncRunContext {
        SyncRunContext::new(12, 1)
    }

    #[test]
    fn http_reads_master_mapping() {
        let http = Arc::new(MockHttpClient::new());
        http.respond(
            Method::Get,
            "/api/companies/12/master-mapping",
            200,
            r#"{"masters":{"ledger":40,"costcenter":"7"}}"#,
        );
        let store = HttpCursorStore::new("https://api.example.com", Arc::clone(&http));

        assert_eq!(store.read(&ctx(), EntityType::Ledger).unwrap(), Some(40));
        assert_eq!(store.read(&ctx(), EntityType::CostCentre).unwrap(), Some(7));
        assert_eq!(store.read(&ctx(), EntityType::Group).unwrap(), None);
        assert_eq!(http.requests()[0].timeout, Duration::from_secs(10));
    }

    #[test]
    fn http_voucher_cursor_and_missing() {
        let http = MockHttpClient::new();
        http.respond(Method::Get, "/voucher-alter-id", 404, "not found");
        let store = HttpCursorStore::new("https://api.example.com", http);
        assert_eq!(store.read(&ctx(), EntityType::Voucher).unwrap(), None);

        let http = MockHttpClient::new();
        http.respond(Method::Get, "/voucher-alter-id", 500, "boom");
        let store = HttpCursorStore::new("https://api.example.com", http);
        assert!(store.read(&ctx(), EntityType::Voucher).is_err());

        let http = MockHttpClient::new();
        http.respond(Method::Get, "/voucher-alter-id", 200, "ok");
        let store = HttpCursorStore::new("https://api.example.com", http);
        assert!(matches!(
            store.read(&ctx(), EntityType::Voucher),
            Err(SyncError::MalformedResponse(_))
        ));
    }

    #[test]
    fn http_writes_use_per_kind_routes() {
        let http = Arc::new(MockHttpClient::new());
        http.respond(Method::Post, "/last-alter-id", 200, "{}");
        http.respond(Method::Post, "/voucher-alter-id", 200, "{}");
        let store = HttpCursorStore::new("https://api.example.com", Arc::clone(&http));

        store.write(&ctx(), EntityType::StockItem, 55).unwrap();
        store.write(&ctx(), EntityType::Voucher, 91).unwrap();

        let master: serde_json::Value =
            serde_json::from_slice(&http.requests_to("/last-alter-id")[0].body).unwrap();
        assert_eq!(master["lastAlterID"], 55);
        assert_eq!(master["entityType"], "stockitem");

        let voucher: serde_json::Value =
            serde_json::from_slice(&http.requests_to("/voucher-alter-id")[0].body).unwrap();
        assert_eq!(voucher["lastVoucherAlterID"], 91);
    }

    #[test]
    fn memory_cursor_is_monotonic() {
        let store = MemoryCursorStore::new();
        assert_eq!(store.read(&ctx(), EntityType::Unit).unwrap(), None);
        store.write(&ctx(), EntityType::Unit, 10).unwrap();
        store.write(&ctx(), EntityType::Unit, 4).unwrap();
        assert_eq!(store.get(12, EntityType::Unit), Some(10));
        assert_eq!(store.writes(), 2);
    }
}
