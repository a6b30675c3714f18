//! # LedgerSync Engine
//!
//! Incremental sync, reconciliation and batch transmission from a ledger
//! application to a remote store.
//!
//! This crate provides:
//! - Incremental sync state machine (tenant check → fetch → decode → transmit)
//! - Revision cursors, one per tenant and entity type
//! - Full reconciliation with repair of missing and stale records
//! - Paced batch transmission with cancellation between batches
//! - Source, destination and HTTP transport abstractions with test doubles
//!
//! ## Architecture
//!
//! Every run takes an explicit [`SyncRunContext`]; nothing is global. The
//! engines talk to the outside world only through [`SourceTransport`],
//! [`DestinationTransport`] and [`CursorStore`], whose HTTP implementations
//! share one [`HttpClient`].
//!
//! ## Key Invariants
//!
//! - A cursor never decreases
//! - A cursor advances only after the destination confirms every batch
//! - Records are identified by (master id, guid); uploads are upserts
//! - Reconciliation never deletes and never moves a cursor
//! - No write happens for a tenant the source does not have open

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod config;
mod context;
mod cursor;
mod destination;
mod driver;
mod error;
mod http;
mod incremental;
mod reconcile;
mod source;
mod tenant;

pub use batch::{BatchTransmitter, TransmitOutcome};
pub use config::{PacingConfig, SyncConfig, TenantPolicy};
pub use context::{Credentials, SyncRunContext, TenantRef};
pub use cursor::{CursorStore, HttpCursorStore, MemoryCursorStore};
pub use destination::{DestinationTransport, HttpDestination, MemoryDestination};
pub use driver::{DriverRunResult, SyncDriver};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpFailure, HttpRequest, HttpResponse, Method, MockHttpClient, UreqClient};
pub use incremental::{IncrementalSyncEngine, SyncRunResult, SyncState, SyncStats};
pub use reconcile::{classify, Classification, ReconciliationEngine};
pub use source::{MockSource, SourceClient, SourceTransport};
pub use tenant::{match_tenant, TenantCheck, TenantContextGuard, TenantMatch};
