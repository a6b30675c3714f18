//! # LedgerSync Protocol
//!
//! Destination wire types and record transformation for LedgerSync.
//!
//! This crate provides:
//! - Camel-case record payloads with their nested allocation rows
//! - `Transformer` mapping decoded source records onto payloads
//! - Cursor, batch response, record listing and tenant messages
//! - The reconciliation report shape
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod messages;
mod payload;
mod report;
mod transform;

pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    decode_voucher_cursor, loose_u64, DestinationRecord, MasterCursorUpdate, MasterMapping,
    SyncBatchResponse, SyncStatus, SyncStatusUpdate, TenantSummary, VoucherCursorUpdate,
};
pub use payload::{
    encode_batch, BatchAllocationPayload, BillAllocationPayload, CostCategoryAllocationPayload,
    CostCentreAllocationPayload, InventoryEntryPayload, LedgerEntryPayload, MasterPayload,
    RecordPayload, VoucherPayload, SYNCED,
};
pub use report::{ReconciliationReport, RecordSample, SAMPLE_LIMIT};
pub use transform::{TransformContext, Transformer};
