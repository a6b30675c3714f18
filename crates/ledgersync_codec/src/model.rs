//! Typed records decoded from source documents.

use crate::entity::EntityType;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Identity carried by every source record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordIdentity {
    /// Stable numeric id assigned by the source.
    pub master_id: u64,
    /// Globally unique id assigned by the source.
    pub guid: String,
    /// Change counter; bumped on every edit. Zero marks system records.
    pub revision: u64,
}

impl RecordIdentity {
    /// The key both sides agree on for upserts and reconciliation.
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            master_id: self.master_id,
            guid: self.guid.clone(),
        }
    }
}

/// Natural key of a record: `(master_id, guid)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NaturalKey {
    /// Source master id.
    pub master_id: u64,
    /// Source guid.
    pub guid: String,
}

impl NaturalKey {
    /// Creates a natural key.
    pub fn new(master_id: u64, guid: impl Into<String>) -> Self {
        Self {
            master_id,
            guid: guid.into(),
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.master_id, self.guid)
    }
}

/// Debit/credit tag of a posting. Serialized as `"DR"` / `"CR"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DrCr {
    /// Debit.
    #[serde(rename = "DR")]
    Debit,
    /// Credit.
    #[serde(rename = "CR")]
    Credit,
}

impl DrCr {
    /// Splits a raw signed amount into its tag and magnitude.
    ///
    /// The source writes debits as negative amounts.
    pub fn from_signed(raw: Decimal) -> (DrCr, Decimal) {
        if raw.is_sign_negative() && !raw.is_zero() {
            (DrCr::Debit, raw.abs())
        } else {
            (DrCr::Credit, raw.abs())
        }
    }

    /// `"DR"` or `"CR"`.
    pub fn as_str(self) -> &'static str {
        match self {
            DrCr::Debit => "DR",
            DrCr::Credit => "CR",
        }
    }
}

/// A scalar field of a master record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Free text.
    Text(String),
    /// Yes/No flag.
    Flag(bool),
    /// Numeric value (amounts, quantities, counts).
    Number(#[serde(with = "rust_decimal::serde::float")] Decimal),
}

/// A flat master record (group, ledger, unit, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct MasterRecord {
    /// Entity type.
    pub entity: EntityType,
    /// Identity.
    pub identity: RecordIdentity,
    /// Display name.
    pub name: String,
    /// Fields keyed by their destination name.
    pub fields: BTreeMap<&'static str, FieldValue>,
}

/// Kind of a bill reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillType {
    /// A new bill.
    NewRef,
    /// Settles an existing bill.
    AgainstRef,
    /// Advance payment.
    Advance,
    /// Unallocated payment.
    OnAccount,
    /// Anything else, verbatim.
    Other(String),
}

impl BillType {
    /// Parses the source's bill type text.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "new ref" => BillType::NewRef,
            "agst ref" | "against ref" => BillType::AgainstRef,
            "advance" => BillType::Advance,
            "on account" => BillType::OnAccount,
            _ => BillType::Other(raw.trim().to_owned()),
        }
    }

    /// Text form, as the source writes it.
    pub fn as_str(&self) -> &str {
        match self {
            BillType::NewRef => "New Ref",
            BillType::AgainstRef => "Agst Ref",
            BillType::Advance => "Advance",
            BillType::OnAccount => "On Account",
            BillType::Other(s) => s,
        }
    }
}

impl Serialize for BillType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A bill reference under a ledger posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillAllocation {
    /// Bill type.
    pub bill_type: BillType,
    /// Bill name / number.
    pub name: String,
    /// Bill date (the voucher date when the source omits it).
    pub bill_date: Option<NaiveDate>,
    /// Raw credit period text.
    pub credit_period: String,
    /// Derived due date.
    pub due_date: Option<NaiveDate>,
    /// Unsigned amount.
    pub amount: Decimal,
}

/// Cost centre share of a cost category allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostCentreAllocation {
    /// Cost centre name.
    pub name: String,
    /// Unsigned amount.
    pub amount: Decimal,
}

/// Cost category allocation under a ledger posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostAllocation {
    /// Cost category name.
    pub category: String,
    /// Unsigned amount.
    pub amount: Decimal,
    /// Per-centre split.
    pub centres: Vec<CostCentreAllocation>,
}

impl CostAllocation {
    /// Returns true when the centres add up to the category amount.
    pub fn centres_balance(&self) -> bool {
        self.centres.is_empty()
            || self.centres.iter().map(|c| c.amount).sum::<Decimal>() == self.amount
    }
}

/// One ledger line of a voucher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerPosting {
    /// Ledger name.
    pub ledger_name: String,
    /// Ledger guid, when the source provides it.
    pub ledger_guid: Option<String>,
    /// Unsigned amount.
    pub amount: Decimal,
    /// Debit or credit.
    pub dr_cr: DrCr,
    /// Whether this line is the party's ledger.
    pub is_party_ledger: bool,
    /// Source deemed-positive flag.
    pub is_deemed_positive: bool,
    /// Bill references.
    pub bills: Vec<BillAllocation>,
    /// Cost allocations.
    pub cost_allocations: Vec<CostAllocation>,
}

impl LedgerPosting {
    /// Amount with debits negative, the way the source writes it.
    pub fn signed_amount(&self) -> Decimal {
        match self.dr_cr {
            DrCr::Debit => -self.amount,
            DrCr::Credit => self.amount,
        }
    }
}

/// Batch split of an inventory line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchAllocation {
    /// Batch name.
    pub batch_name: String,
    /// Godown the batch sits in.
    pub godown: String,
    /// Target godown for transfers.
    pub destination_godown: Option<String>,
    /// Derived quantity (always non-negative).
    pub quantity: Decimal,
    /// Rate.
    pub rate: Decimal,
    /// Unsigned amount.
    pub amount: Decimal,
    /// Unit of measure.
    pub uom: String,
    /// Manufacturing date.
    pub mfg_date: Option<NaiveDate>,
    /// Expiry date.
    pub expiry_date: Option<NaiveDate>,
}

/// One stock line of a voucher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryPosting {
    /// Stock item name.
    pub item_name: String,
    /// Stock item guid, when the source provides it.
    pub item_guid: Option<String>,
    /// Signed quantity as recorded.
    pub actual_quantity: Decimal,
    /// Billed quantity (derived when absent).
    pub billed_quantity: Decimal,
    /// Rate (derived when absent).
    pub rate: Decimal,
    /// Unsigned amount.
    pub amount: Decimal,
    /// Unit of measure.
    pub uom: String,
    /// Godown.
    pub godown: String,
    /// Stock leaves the godown.
    pub is_outward: bool,
    /// Batch splits.
    pub batches: Vec<BatchAllocation>,
}

/// A transaction with its nested postings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voucher {
    /// Identity.
    pub identity: RecordIdentity,
    /// Voucher number.
    pub voucher_number: String,
    /// Voucher type name.
    pub voucher_type: String,
    /// Voucher date.
    pub date: Option<NaiveDate>,
    /// Effective date.
    pub effective_date: Option<NaiveDate>,
    /// Party ledger name.
    pub party_name: String,
    /// Reference text.
    pub reference: String,
    /// Narration.
    pub narration: String,
    /// Optional (memorandum) voucher.
    pub is_optional: bool,
    /// Cancelled voucher.
    pub is_cancelled: bool,
    /// Deleted voucher.
    pub is_deleted: bool,
    /// Invoice mode.
    pub is_invoice: bool,
    /// Post-dated voucher.
    pub is_post_dated: bool,
    /// Source deemed-positive flag.
    pub is_deemed_positive: bool,
    /// Sum of the debit postings.
    pub total: Decimal,
    /// Ledger lines.
    pub ledger_postings: Vec<LedgerPosting>,
    /// Stock lines.
    pub inventory_postings: Vec<InventoryPosting>,
}

impl Voucher {
    /// Returns true when the signed ledger postings net to zero.
    ///
    /// This is checked, not enforced; the source occasionally exports
    /// unbalanced vouchers and they are still synced.
    pub fn is_balanced(&self) -> bool {
        self.ledger_postings
            .iter()
            .map(LedgerPosting::signed_amount)
            .sum::<Decimal>()
            .is_zero()
    }
}

/// A decoded record of any type.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRecord {
    /// Master record.
    Master(MasterRecord),
    /// Transaction.
    Voucher(Voucher),
}

impl SourceRecord {
    /// Identity of the record.
    pub fn identity(&self) -> &RecordIdentity {
        match self {
            SourceRecord::Master(m) => &m.identity,
            SourceRecord::Voucher(v) => &v.identity,
        }
    }

    /// Entity type of the record.
    pub fn entity(&self) -> EntityType {
        match self {
            SourceRecord::Master(m) => m.entity,
            SourceRecord::Voucher(_) => EntityType::Voucher,
        }
    }

    /// Human-readable label (name or voucher number).
    pub fn label(&self) -> &str {
        match self {
            SourceRecord::Master(m) => &m.name,
            SourceRecord::Voucher(v) => &v.voucher_number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn posting(raw: &str) -> LedgerPosting {
        let (dr_cr, amount) = DrCr::from_signed(dec(raw));
        LedgerPosting {
            ledger_name: "Cash".into(),
            ledger_guid: None,
            amount,
            dr_cr,
            is_party_ledger: false,
            is_deemed_positive: false,
            bills: vec![],
            cost_allocations: vec![],
        }
    }

    #[test]
    fn negative_amounts_are_debits() {
        assert_eq!(DrCr::from_signed(dec("-1500.00")), (DrCr::Debit, dec("1500.00")));
        assert_eq!(DrCr::from_signed(dec("750.00")), (DrCr::Credit, dec("750.00")));
        assert_eq!(DrCr::from_signed(Decimal::ZERO).0, DrCr::Credit);
    }

    #[test]
    fn signed_amount_restores_source_sign() {
        assert_eq!(posting("-20").signed_amount(), dec("-20"));
        assert_eq!(posting("20").signed_amount(), dec("20"));
    }

    #[test]
    fn bill_type_parsing() {
        assert_eq!(BillType::parse("New Ref"), BillType::NewRef);
        assert_eq!(BillType::parse("agst ref"), BillType::AgainstRef);
        assert_eq!(BillType::parse(" On Account "), BillType::OnAccount);
        assert_eq!(BillType::parse("Custom").as_str(), "Custom");
    }

    #[test]
    fn cost_centres_must_add_up() {
        let mut alloc = CostAllocation {
            category: "Primary".into(),
            amount: dec("100"),
            centres: vec![
                CostCentreAllocation {
                    name: "A".into(),
                    amount: dec("60"),
                },
                CostCentreAllocation {
                    name: "B".into(),
                    amount: dec("40"),
                },
            ],
        };
        assert!(alloc.centres_balance());
        alloc.centres.pop();
        assert!(!alloc.centres_balance());
    }

    #[test]
    fn natural_key_display() {
        let key = NaturalKey::new(42, "abc");
        assert_eq!(key.to_string(), "42_abc");
    }
}
