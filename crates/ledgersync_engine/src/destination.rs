//! Transport to the destination API.

use crate::context::SyncRunContext;
use crate::error::{SyncError, SyncResult};
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use ledgersync_codec::{EntityType, NaturalKey};
use ledgersync_protocol::{
    encode_batch, DestinationRecord, RecordPayload, SyncBatchResponse, SyncStatusUpdate,
    TenantSummary,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const TARGET: &str = "destination";

/// Writes and lists records at the destination.
pub trait DestinationTransport: Send + Sync {
    /// Uploads one batch of records of `entity`.
    ///
    /// A rejected batch is either an `Err` (HTTP failure) or a response
    /// with `success == false`.
    fn send_batch(
        &self,
        ctx: &SyncRunContext,
        entity: EntityType,
        records: &[RecordPayload],
    ) -> SyncResult<SyncBatchResponse>;

    /// Lists what the destination holds for the run's tenant.
    fn list_records(
        &self,
        ctx: &SyncRunContext,
        entity: EntityType,
    ) -> SyncResult<Vec<DestinationRecord>>;

    /// Lists tenants registered at the destination.
    fn list_tenants(&self, ctx: &SyncRunContext) -> SyncResult<Vec<TenantSummary>>;

    /// Records the tenant's overall sync status.
    fn report_status(&self, ctx: &SyncRunContext, update: &SyncStatusUpdate) -> SyncResult<()>;
}

/// Sends a request and requires a 2xx response.
pub(crate) fn send_checked<C: HttpClient + ?Sized>(
    client: &C,
    request: &HttpRequest,
) -> SyncResult<HttpResponse> {
    let response = client
        .execute(request)
        .map_err(|f| SyncError::from_failure(TARGET, f))?;
    if !response.is_success() {
        return Err(SyncError::DestinationRejected {
            status: response.status,
            body: response.text(),
        });
    }
    Ok(response)
}

/// HTTP transport to the destination.
pub struct HttpDestination<C: HttpClient> {
    base_url: String,
    client: C,
    timeout: Duration,
    control_timeout: Duration,
}

impl<C: HttpClient> HttpDestination<C> {
    /// Creates a new destination transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            client,
            timeout: Duration::from_secs(30),
            control_timeout: Duration::from_secs(10),
        }
    }

    /// Sets the upload and listing timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the tenant and status call timeout.
    pub fn with_control_timeout(mut self, timeout: Duration) -> Self {
        self.control_timeout = timeout;
        self
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, ctx: &SyncRunContext, request: HttpRequest) -> HttpRequest {
        request
            .with_header("Content-Type", "application/json")
            .with_headers(ctx.credentials.headers())
    }
}

impl<C: HttpClient> DestinationTransport for HttpDestination<C> {
    fn send_batch(
        &self,
        ctx: &SyncRunContext,
        entity: EntityType,
        records: &[RecordPayload],
    ) -> SyncResult<SyncBatchResponse> {
        let url = format!("{}{}/sync", self.base_url, entity.endpoint());
        let request = self
            .authorized(ctx, HttpRequest::post(url, encode_batch(records)?))
            .with_timeout(self.timeout);
        let response = send_checked(&self.client, &request)?;
        SyncBatchResponse::decode(&response.body).map_err(SyncError::malformed)
    }

    fn list_records(
        &self,
        ctx: &SyncRunContext,
        entity: EntityType,
    ) -> SyncResult<Vec<DestinationRecord>> {
        let url = format!(
            "{}{}/company/{}",
            self.base_url,
            entity.endpoint(),
            ctx.tenant.id
        );
        let request = self
            .authorized(ctx, HttpRequest::get(url))
            .with_timeout(self.timeout);
        let response = send_checked(&self.client, &request)?;
        DestinationRecord::decode_list(&response.body).map_err(SyncError::malformed)
    }

    fn list_tenants(&self, ctx: &SyncRunContext) -> SyncResult<Vec<TenantSummary>> {
        let url = format!("{}/companies", self.base_url);
        let request = self
            .authorized(ctx, HttpRequest::get(url))
            .with_timeout(self.control_timeout);
        let response = send_checked(&self.client, &request)?;
        TenantSummary::decode_list(&response.body).map_err(SyncError::malformed)
    }

    fn report_status(&self, ctx: &SyncRunContext, update: &SyncStatusUpdate) -> SyncResult<()> {
        let url = format!("{}/companies/{}/sync-status", self.base_url, ctx.tenant.id);
        let request = self
            .authorized(ctx, HttpRequest::put(url, update.encode()?))
            .with_timeout(self.control_timeout);
        send_checked(&self.client, &request)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct StoredRecord {
    revision: u64,
    payload: Option<RecordPayload>,
}

type Table = BTreeMap<NaturalKey, StoredRecord>;

/// An in-memory destination for testing.
///
/// Upserts on the natural key, so sending the same batch twice leaves one
/// copy of each record.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    tables: RwLock<HashMap<(u64, EntityType), Table>>,
    tenants: RwLock<Vec<TenantSummary>>,
    statuses: RwLock<Vec<(u64, SyncStatusUpdate)>>,
    batches_received: AtomicUsize,
    fail_on_batch: Mutex<Option<usize>>,
}

impl MemoryDestination {
    /// Creates an empty destination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record key directly, as if synced earlier.
    pub fn seed(&self, tenant_id: u64, entity: EntityType, key: NaturalKey, revision: u64) {
        self.tables.write().entry((tenant_id, entity)).or_default().insert(
            key,
            StoredRecord {
                revision,
                payload: None,
            },
        );
    }

    /// Registers a tenant.
    pub fn add_tenant(&self, tenant: TenantSummary) {
        self.tenants.write().push(tenant);
    }

    /// Rejects the `n`th batch received (1-based) and every batch after it.
    pub fn fail_on_batch(&self, n: usize) {
        *self.fail_on_batch.lock() = Some(n);
    }

    /// Stops rejecting batches.
    pub fn clear_failure(&self) {
        *self.fail_on_batch.lock() = None;
    }

    /// Number of records held for `entity`.
    pub fn count(&self, tenant_id: u64, entity: EntityType) -> usize {
        self.tables
            .read()
            .get(&(tenant_id, entity))
            .map_or(0, BTreeMap::len)
    }

    /// Revision held for `key`.
    pub fn revision(&self, tenant_id: u64, entity: EntityType, key: &NaturalKey) -> Option<u64> {
        self.tables
            .read()
            .get(&(tenant_id, entity))
            .and_then(|t| t.get(key))
            .map(|r| r.revision)
    }

    /// Last payload stored for `key`.
    pub fn payload(
        &self,
        tenant_id: u64,
        entity: EntityType,
        key: &NaturalKey,
    ) -> Option<RecordPayload> {
        self.tables
            .read()
            .get(&(tenant_id, entity))
            .and_then(|t| t.get(key))
            .and_then(|r| r.payload.clone())
    }

    /// Batches received, including rejected ones.
    pub fn batches_received(&self) -> usize {
        self.batches_received.load(Ordering::SeqCst)
    }

    /// Status updates reported, oldest first.
    pub fn statuses(&self) -> Vec<(u64, SyncStatusUpdate)> {
        self.statuses.read().clone()
    }
}

impl DestinationTransport for MemoryDestination {
    fn send_batch(
        &self,
        ctx: &SyncRunContext,
        entity: EntityType,
        records: &[RecordPayload],
    ) -> SyncResult<SyncBatchResponse> {
        let n = self.batches_received.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_batch.lock().is_some_and(|fail| n >= fail) {
            return Err(SyncError::DestinationRejected {
                status: 500,
                body: format!("batch {n} rejected"),
            });
        }

        let mut tables = self.tables.write();
        let table = tables.entry((ctx.tenant.id, entity)).or_default();
        for record in records {
            table.insert(
                record.natural_key(),
                StoredRecord {
                    revision: record.revision(),
                    payload: Some(record.clone()),
                },
            );
        }
        Ok(SyncBatchResponse::success(records.len() as u64))
    }

    fn list_records(
        &self,
        ctx: &SyncRunContext,
        entity: EntityType,
    ) -> SyncResult<Vec<DestinationRecord>> {
        Ok(self
            .tables
            .read()
            .get(&(ctx.tenant.id, entity))
            .map(|table| {
                table
                    .iter()
                    .map(|(key, stored)| DestinationRecord {
                        key: key.clone(),
                        revision: stored.revision,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_tenants(&self, _ctx: &SyncRunContext) -> SyncResult<Vec<TenantSummary>> {
        Ok(self.tenants.read().clone())
    }

    fn report_status(&self, ctx: &SyncRunContext, update: &SyncStatusUpdate) -> SyncResult<()> {
        self.statuses.write().push((ctx.tenant.id, update.clone()));
        Ok(())
    }
}
