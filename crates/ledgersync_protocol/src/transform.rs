//! Conversion of decoded records into destination payloads.

use crate::payload::{
    BatchAllocationPayload, BillAllocationPayload, CostCategoryAllocationPayload,
    CostCentreAllocationPayload, InventoryEntryPayload, LedgerEntryPayload, MasterPayload,
    RecordPayload, VoucherPayload, SYNCED,
};
use ledgersync_codec::schema::name_key;
use ledgersync_codec::{
    FieldValue, InventoryPosting, LedgerPosting, MasterRecord, SourceRecord, Voucher,
};

/// Ids stamped on every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformContext {
    /// Destination tenant id.
    pub tenant_id: u64,
    /// Owning user id.
    pub user_id: u64,
}

/// Pure mapping from [`SourceRecord`] to [`RecordPayload`].
#[derive(Debug, Clone, Copy)]
pub struct Transformer {
    ctx: TransformContext,
}

impl Transformer {
    /// Creates a transformer for one tenant.
    pub fn new(ctx: TransformContext) -> Self {
        Self { ctx }
    }

    /// Transforms one record.
    pub fn transform(&self, record: &SourceRecord) -> RecordPayload {
        match record {
            SourceRecord::Master(m) => RecordPayload::Master(self.master(m)),
            SourceRecord::Voucher(v) => RecordPayload::Voucher(self.voucher(v)),
        }
    }

    /// Transforms a slice of records, preserving order.
    pub fn transform_all(&self, records: &[SourceRecord]) -> Vec<RecordPayload> {
        records.iter().map(|r| self.transform(r)).collect()
    }

    fn master(&self, m: &MasterRecord) -> MasterPayload {
        let mut fields = m.fields.clone();
        fields.insert(name_key(m.entity), FieldValue::Text(m.name.clone()));
        MasterPayload {
            cmp_id: self.ctx.tenant_id,
            user_id: self.ctx.user_id,
            guid: m.identity.guid.clone(),
            master_id: m.identity.master_id,
            alter_id: m.identity.revision,
            is_active: true,
            sync_status: SYNCED,
            fields,
        }
    }

    fn voucher(&self, v: &Voucher) -> VoucherPayload {
        let guid = &v.identity.guid;
        VoucherPayload {
            cmp_id: self.ctx.tenant_id,
            user_id: self.ctx.user_id,
            guid: guid.clone(),
            master_id: v.identity.master_id,
            alter_id: v.identity.revision,
            voucher_number: v.voucher_number.clone(),
            voucher_type: v.voucher_type.clone(),
            date: v.date,
            effective_date: v.effective_date,
            party_ledger_name: v.party_name.clone(),
            reference: v.reference.clone(),
            narration: v.narration.clone(),
            is_optional: v.is_optional,
            is_cancelled: v.is_cancelled,
            is_deleted: v.is_deleted,
            is_invoice: v.is_invoice,
            is_post_dated: v.is_post_dated,
            is_deemed_positive: v.is_deemed_positive,
            total_amount: v.total,
            sync_status: SYNCED,
            ledger_entries: v
                .ledger_postings
                .iter()
                .map(|p| self.ledger_entry(p, guid))
                .collect(),
            inventory_entries: v
                .inventory_postings
                .iter()
                .map(|p| self.inventory_entry(p, guid))
                .collect(),
        }
    }

    fn ledger_entry(&self, p: &LedgerPosting, voucher_guid: &str) -> LedgerEntryPayload {
        let cmp_id = self.ctx.tenant_id;
        LedgerEntryPayload {
            cmp_id,
            user_id: self.ctx.user_id,
            voucher_guid: voucher_guid.to_owned(),
            ledger_name: p.ledger_name.clone(),
            ledger_guid: p.ledger_guid.clone(),
            amount: p.amount,
            amount_type: p.dr_cr,
            is_party_ledger: p.is_party_ledger,
            is_deemed_positive: p.is_deemed_positive,
            bill_allocations: p
                .bills
                .iter()
                .map(|b| BillAllocationPayload {
                    cmp_id,
                    voucher_guid: voucher_guid.to_owned(),
                    bill_name: b.name.clone(),
                    bill_type: b.bill_type.clone(),
                    bill_date: b.bill_date,
                    bill_credit_period: b.credit_period.clone(),
                    due_date: b.due_date,
                    amount: b.amount,
                })
                .collect(),
            cost_category_allocations: p
                .cost_allocations
                .iter()
                .map(|c| CostCategoryAllocationPayload {
                    cmp_id,
                    voucher_guid: voucher_guid.to_owned(),
                    cost_category: c.category.clone(),
                    amount: c.amount,
                    cost_centre_allocations: c
                        .centres
                        .iter()
                        .map(|cc| CostCentreAllocationPayload {
                            cmp_id,
                            voucher_guid: voucher_guid.to_owned(),
                            cost_centre: cc.name.clone(),
                            amount: cc.amount,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    fn inventory_entry(&self, p: &InventoryPosting, voucher_guid: &str) -> InventoryEntryPayload {
        let cmp_id = self.ctx.tenant_id;
        InventoryEntryPayload {
            cmp_id,
            user_id: self.ctx.user_id,
            voucher_guid: voucher_guid.to_owned(),
            stock_item_name: p.item_name.clone(),
            stock_item_guid: p.item_guid.clone(),
            actual_qty: p.actual_quantity,
            billed_qty: p.billed_quantity,
            rate: p.rate,
            amount: p.amount,
            uom: p.uom.clone(),
            godown_name: p.godown.clone(),
            is_outward: p.is_outward,
            batch_allocations: p
                .batches
                .iter()
                .map(|b| BatchAllocationPayload {
                    cmp_id,
                    voucher_guid: voucher_guid.to_owned(),
                    batch_name: b.batch_name.clone(),
                    godown_name: b.godown.clone(),
                    destination_godown_name: b.destination_godown.clone(),
                    quantity: b.quantity,
                    rate: b.rate,
                    amount: b.amount,
                    uom: b.uom.clone(),
                    mfg_date: b.mfg_date,
                    expiry_date: b.expiry_date,
                })
                .collect(),
        }
    }
}
