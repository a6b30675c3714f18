//! JSON shapes of records uploaded to the destination.
//!
//! Every nested row repeats the foreign keys it belongs under (`cmpId`,
//! `voucherGuid`, and `userId` where the destination stores one) so the
//! destination can insert child tables without walking the tree.

use chrono::NaiveDate;
use crate::error::{ProtocolError, ProtocolResult};
use ledgersync_codec::{BillType, DrCr, FieldValue, NaturalKey};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Status stamped on every uploaded record.
pub const SYNCED: &str = "synced";

/// A flat master record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterPayload {
    /// Destination tenant id.
    pub cmp_id: u64,
    /// Owning user id.
    pub user_id: u64,
    /// Source guid.
    pub guid: String,
    /// Source master id.
    pub master_id: u64,
    /// Source revision.
    pub alter_id: u64,
    /// Always true; deletions are not propagated.
    pub is_active: bool,
    /// Always [`SYNCED`].
    pub sync_status: &'static str,
    /// Name and schema fields under their destination keys.
    #[serde(flatten)]
    pub fields: BTreeMap<&'static str, FieldValue>,
}

/// A transaction with its nested rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoucherPayload {
    /// Destination tenant id.
    pub cmp_id: u64,
    /// Owning user id.
    pub user_id: u64,
    /// Source guid.
    pub guid: String,
    /// Source master id.
    pub master_id: u64,
    /// Source revision.
    pub alter_id: u64,
    /// Voucher number.
    pub voucher_number: String,
    /// Voucher type name.
    pub voucher_type: String,
    /// Voucher date.
    pub date: Option<NaiveDate>,
    /// Effective date.
    pub effective_date: Option<NaiveDate>,
    /// Party ledger.
    pub party_ledger_name: String,
    /// Reference.
    pub reference: String,
    /// Narration.
    pub narration: String,
    /// Optional voucher.
    pub is_optional: bool,
    /// Cancelled.
    pub is_cancelled: bool,
    /// Deleted.
    pub is_deleted: bool,
    /// Invoice mode.
    pub is_invoice: bool,
    /// Post-dated.
    pub is_post_dated: bool,
    /// Deemed positive.
    pub is_deemed_positive: bool,
    /// Sum of debits.
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    /// Always [`SYNCED`].
    pub sync_status: &'static str,
    /// Ledger rows.
    pub ledger_entries: Vec<LedgerEntryPayload>,
    /// Stock rows.
    pub inventory_entries: Vec<InventoryEntryPayload>,
}

/// A ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryPayload {
    /// Destination tenant id.
    pub cmp_id: u64,
    /// Owning user id.
    pub user_id: u64,
    /// Parent voucher guid.
    pub voucher_guid: String,
    /// Ledger name.
    pub ledger_name: String,
    /// Ledger guid.
    pub ledger_guid: Option<String>,
    /// Unsigned amount.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// `"DR"` or `"CR"`.
    pub amount_type: DrCr,
    /// Party ledger line.
    pub is_party_ledger: bool,
    /// Deemed positive.
    pub is_deemed_positive: bool,
    /// Bill rows.
    pub bill_allocations: Vec<BillAllocationPayload>,
    /// Cost category rows.
    pub cost_category_allocations: Vec<CostCategoryAllocationPayload>,
}

/// A bill row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillAllocationPayload {
    /// Destination tenant id.
    pub cmp_id: u64,
    /// Parent voucher guid.
    pub voucher_guid: String,
    /// Bill name.
    pub bill_name: String,
    /// Bill type.
    pub bill_type: BillType,
    /// Bill date.
    pub bill_date: Option<NaiveDate>,
    /// Raw credit period.
    pub bill_credit_period: String,
    /// Derived due date.
    pub due_date: Option<NaiveDate>,
    /// Unsigned amount.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

/// A cost category row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostCategoryAllocationPayload {
    /// Destination tenant id.
    pub cmp_id: u64,
    /// Parent voucher guid.
    pub voucher_guid: String,
    /// Category name.
    pub cost_category: String,
    /// Unsigned amount.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// Cost centre rows.
    pub cost_centre_allocations: Vec<CostCentreAllocationPayload>,
}

/// A cost centre row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostCentreAllocationPayload {
    /// Destination tenant id.
    pub cmp_id: u64,
    /// Parent voucher guid.
    pub voucher_guid: String,
    /// Cost centre name.
    pub cost_centre: String,
    /// Unsigned amount.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

/// A stock row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryEntryPayload {
    /// Destination tenant id.
    pub cmp_id: u64,
    /// Owning user id.
    pub user_id: u64,
    /// Parent voucher guid.
    pub voucher_guid: String,
    /// Stock item name.
    pub stock_item_name: String,
    /// Stock item guid.
    pub stock_item_guid: Option<String>,
    /// Signed recorded quantity.
    #[serde(with = "rust_decimal::serde::float")]
    pub actual_qty: Decimal,
    /// Billed quantity.
    #[serde(with = "rust_decimal::serde::float")]
    pub billed_qty: Decimal,
    /// Rate.
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    /// Unsigned amount.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// Unit of measure.
    pub uom: String,
    /// Godown.
    pub godown_name: String,
    /// Stock leaves the godown.
    pub is_outward: bool,
    /// Batch rows.
    pub batch_allocations: Vec<BatchAllocationPayload>,
}

/// A batch row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAllocationPayload {
    /// Destination tenant id.
    pub cmp_id: u64,
    /// Parent voucher guid.
    pub voucher_guid: String,
    /// Batch name.
    pub batch_name: String,
    /// Godown.
    pub godown_name: String,
    /// Transfer target godown.
    pub destination_godown_name: Option<String>,
    /// Quantity.
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    /// Rate.
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
    /// Unsigned amount.
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// Unit of measure.
    pub uom: String,
    /// Manufacturing date.
    pub mfg_date: Option<NaiveDate>,
    /// Expiry date.
    pub expiry_date: Option<NaiveDate>,
}

/// Any uploadable record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RecordPayload {
    /// Master record.
    Master(MasterPayload),
    /// Transaction.
    Voucher(VoucherPayload),
}

impl RecordPayload {
    /// Natural key of the record.
    pub fn natural_key(&self) -> NaturalKey {
        match self {
            RecordPayload::Master(m) => NaturalKey::new(m.master_id, m.guid.clone()),
            RecordPayload::Voucher(v) => NaturalKey::new(v.master_id, v.guid.clone()),
        }
    }

    /// Source revision carried by the record.
    pub fn revision(&self) -> u64 {
        match self {
            RecordPayload::Master(m) => m.alter_id,
            RecordPayload::Voucher(v) => v.alter_id,
        }
    }
}

/// Encodes a batch as the JSON array the sync route expects.
pub fn encode_batch(records: &[RecordPayload]) -> ProtocolResult<Vec<u8>> {
    serde_json::to_vec(records).map_err(|e| ProtocolError::encode("RecordBatch", e))
}
