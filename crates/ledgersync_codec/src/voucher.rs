//! Decoding of voucher elements and their nested postings.

use crate::element::Element;
use crate::error::{CodecError, CodecResult};
use crate::model::{
    BatchAllocation, BillAllocation, BillType, CostAllocation, CostCentreAllocation, DrCr,
    InventoryPosting, LedgerPosting, RecordIdentity, Voucher,
};
use crate::numeric::{due_date, parse_amount, parse_date, parse_quantity};
use crate::schema::parse_flag;
use chrono::NaiveDate;
use rust_decimal::Decimal;

const ELEMENT: &str = "VOUCHER";
const DEFAULT_BATCH_UOM: &str = "Pcs";

/// Fills in billed quantity and rate when the source leaves them zero.
///
/// Returns `(billed, rate)` with billed unsigned. `amount` is expected to
/// be unsigned.
pub fn derive_inventory(
    actual: Decimal,
    billed: Decimal,
    rate: Decimal,
    amount: Decimal,
) -> (Decimal, Decimal) {
    let mut billed = billed.abs();
    let mut rate = rate;

    if billed.is_zero() && !rate.is_zero() && !amount.is_zero() {
        billed = amount.checked_div(rate).map(|q| q.abs()).unwrap_or(Decimal::ZERO);
    } else if billed.is_zero() {
        billed = actual.abs();
    }

    if rate.is_zero() && !actual.is_zero() && !amount.is_zero() {
        rate = amount.checked_div(actual.abs()).unwrap_or(Decimal::ZERO);
    }

    (billed, rate)
}

/// Quantity of one batch under an inventory line.
///
/// A lone batch takes the whole line; otherwise the batch's own amount and
/// rate decide, falling back to the line quantity.
pub fn batch_quantity(
    batch_count: usize,
    parent_actual: Decimal,
    amount: Decimal,
    rate: Decimal,
) -> Decimal {
    if batch_count == 1 {
        return parent_actual.abs();
    }
    if !rate.is_zero() {
        if let Some(q) = amount.checked_div(rate) {
            return q.abs();
        }
    }
    parent_actual.abs()
}

/// Decodes one voucher element.
///
/// Returns `Ok(None)` for revision-0 vouchers.
pub(crate) fn decode_voucher(el: &Element) -> CodecResult<Option<Voucher>> {
    let identity = identity(el, ELEMENT)?;
    if identity.revision == 0 {
        return Ok(None);
    }

    let date = el.field("DATE").and_then(parse_date);
    let ledger_postings: Vec<LedgerPosting> = el
        .outermost(&["ALLLEDGERENTRIES.LIST", "LEDGERENTRIES.LIST"])
        .into_iter()
        .filter_map(|c| ledger_posting(c, date))
        .collect();
    let inventory_postings = el
        .outermost(&["ALLINVENTORYENTRIES.LIST", "INVENTORYENTRIES.LIST"])
        .into_iter()
        .filter_map(inventory_posting)
        .collect();

    let total = ledger_postings
        .iter()
        .filter(|p| p.dr_cr == DrCr::Debit)
        .map(|p| p.amount)
        .sum();

    Ok(Some(Voucher {
        identity,
        voucher_number: text(el, "VOUCHERNUMBER"),
        voucher_type: text(el, "VOUCHERTYPENAME"),
        date,
        effective_date: el.field("EFFECTIVEDATE").and_then(parse_date),
        party_name: el
            .field("PARTYLEDGERNAME")
            .or_else(|| el.field("PARTYNAME"))
            .unwrap_or_default()
            .to_owned(),
        reference: text(el, "REFERENCE"),
        narration: text(el, "NARRATION"),
        is_optional: flag(el, "ISOPTIONAL"),
        is_cancelled: flag(el, "ISCANCELLED"),
        is_deleted: flag(el, "ISDELETED"),
        is_invoice: flag(el, "ISINVOICE"),
        is_post_dated: flag(el, "ISPOSTDATED"),
        is_deemed_positive: flag(el, "ISDEEMEDPOSITIVE"),
        total,
        ledger_postings,
        inventory_postings,
    }))
}

/// Reads `GUID`, `MASTERID` and `ALTERID` from a record element.
pub(crate) fn identity(el: &Element, element: &str) -> CodecResult<RecordIdentity> {
    let guid = el
        .field("GUID")
        .ok_or_else(|| CodecError::missing_field(element, "GUID"))?;
    Ok(RecordIdentity {
        master_id: number_field(el, element, "MASTERID")?,
        guid: guid.to_owned(),
        revision: number_field(el, element, "ALTERID")?,
    })
}

fn number_field(el: &Element, element: &str, field: &str) -> CodecResult<u64> {
    let raw = el
        .field(field)
        .ok_or_else(|| CodecError::missing_field(element, field))?;
    raw.trim()
        .parse()
        .map_err(|_| CodecError::invalid_field(element, field, raw))
}

fn text(el: &Element, field: &str) -> String {
    el.field(field).unwrap_or_default().to_owned()
}

fn flag(el: &Element, field: &str) -> bool {
    el.field(field).and_then(parse_flag).unwrap_or(false)
}

fn ledger_posting(el: &Element, voucher_date: Option<NaiveDate>) -> Option<LedgerPosting> {
    let ledger_name = el.field("LEDGERNAME")?.to_owned();
    let (dr_cr, amount) = DrCr::from_signed(parse_amount(el.field("AMOUNT").unwrap_or_default()));

    let bills = el
        .children_named("BILLALLOCATIONS.LIST")
        .filter_map(|b| bill_allocation(b, voucher_date))
        .collect();
    let cost_allocations = el
        .children_named("CATEGORYALLOCATIONS.LIST")
        .filter_map(cost_allocation)
        .collect();

    Some(LedgerPosting {
        ledger_name,
        ledger_guid: el.field("LEDGERGUID").map(str::to_owned),
        amount,
        dr_cr,
        is_party_ledger: flag(el, "ISPARTYLEDGER"),
        is_deemed_positive: flag(el, "ISDEEMEDPOSITIVE"),
        bills,
        cost_allocations,
    })
}

fn bill_allocation(el: &Element, voucher_date: Option<NaiveDate>) -> Option<BillAllocation> {
    let name = el.field("NAME")?.to_owned();
    let bill_date = el.field("BILLDATE").and_then(parse_date).or(voucher_date);
    let credit_period = el
        .field("BILLCREDITPERIOD")
        .or_else(|| el.child("BILLCREDITPERIOD").and_then(|p| p.attr("P")))
        .unwrap_or_default()
        .to_owned();

    Some(BillAllocation {
        bill_type: BillType::parse(el.field("BILLTYPE").unwrap_or_default()),
        name,
        bill_date,
        due_date: bill_date.map(|d| due_date(d, &credit_period)),
        credit_period,
        amount: parse_amount(el.field("AMOUNT").unwrap_or_default()).abs(),
    })
}

fn cost_allocation(el: &Element) -> Option<CostAllocation> {
    let category = el.field("CATEGORY")?.to_owned();
    let centres = el
        .children_named("COSTCENTREALLOCATIONS.LIST")
        .filter_map(|c| {
            let name = c.field("COSTCENTRENAME").or_else(|| c.field("NAME"))?;
            Some(CostCentreAllocation {
                name: name.to_owned(),
                amount: parse_amount(c.field("AMOUNT").unwrap_or_default()).abs(),
            })
        })
        .collect();

    Some(CostAllocation {
        category,
        amount: parse_amount(el.field("AMOUNT").unwrap_or_default()).abs(),
        centres,
    })
}

fn inventory_posting(el: &Element) -> Option<InventoryPosting> {
    let item_name = el.field("STOCKITEMNAME")?.to_owned();
    let actual_raw = el.field("ACTUALQTY").unwrap_or_default();
    let actual = parse_quantity(actual_raw);
    let amount = parse_amount(el.field("AMOUNT").unwrap_or_default()).abs();
    let (billed, rate) = derive_inventory(
        actual,
        parse_quantity(el.field("BILLEDQTY").unwrap_or_default()),
        parse_quantity(el.field("RATE").unwrap_or_default()),
        amount,
    );

    let uom = el
        .field("UOM")
        .map(str::to_owned)
        .unwrap_or_else(|| unit_suffix(actual_raw));
    let godown = text(el, "GODOWNNAME");
    let is_outward = el
        .field("ISDEEMEDPOSITIVE")
        .and_then(parse_flag)
        .map(|positive| !positive)
        .unwrap_or(actual.is_sign_negative() && !actual.is_zero());

    let batch_elements: Vec<&Element> = el.children_named("BATCHALLOCATIONS.LIST").collect();
    let batch_count = batch_elements.len();
    let batch_uom = if uom.is_empty() {
        DEFAULT_BATCH_UOM.to_owned()
    } else {
        uom.clone()
    };
    let batches = batch_elements
        .into_iter()
        .map(|b| {
            let batch_amount = parse_amount(b.field("AMOUNT").unwrap_or_default()).abs();
            let batch_rate = parse_quantity(b.field("RATE").unwrap_or_default());
            BatchAllocation {
                batch_name: text(b, "BATCHNAME"),
                godown: b
                    .field("GODOWNNAME")
                    .map(str::to_owned)
                    .unwrap_or_else(|| godown.clone()),
                destination_godown: b.field("DESTINATIONGODOWNNAME").map(str::to_owned),
                quantity: batch_quantity(batch_count, actual, batch_amount, batch_rate),
                rate: batch_rate,
                amount: batch_amount,
                uom: batch_uom.clone(),
                mfg_date: b.field("MFGDATE").and_then(parse_date),
                expiry_date: b.field("EXPIRYDATE").and_then(parse_date),
            }
        })
        .collect();

    Some(InventoryPosting {
        item_name,
        item_guid: el.field("STOCKITEMGUID").map(str::to_owned),
        actual_quantity: actual,
        billed_quantity: billed,
        rate,
        amount,
        uom,
        godown,
        is_outward,
        batches,
    })
}

/// Unit written after a quantity (`"10 Nos"` gives `"Nos"`).
fn unit_suffix(raw: &str) -> String {
    raw.trim()
        .trim_start_matches(|c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | ','))
        .trim()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn voucher(xml: &str) -> Option<Voucher> {
        let doc = parse_document(xml).unwrap();
        decode_voucher(doc.descendants("VOUCHER")[0]).unwrap()
    }

    #[test]
    fn billed_quantity_from_amount_and_rate() {
        let (billed, rate) = derive_inventory(Decimal::ZERO, Decimal::ZERO, dec("10"), dec("50"));
        assert_eq!(billed, dec("5"));
        assert_eq!(rate, dec("10"));
    }

    #[test]
    fn billed_quantity_falls_back_to_actual() {
        let (billed, _) = derive_inventory(dec("-4"), Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        assert_eq!(billed, dec("4"));
    }

    #[test]
    fn billed_quantity_is_unsigned() {
        let (billed, rate) = derive_inventory(dec("-4"), dec("-4"), dec("25"), dec("100"));
        assert_eq!(billed, dec("4"));
        assert_eq!(rate, dec("25"));
    }

    #[test]
    fn rate_from_amount_and_actual() {
        let (billed, rate) = derive_inventory(dec("-4"), dec("4"), Decimal::ZERO, dec("100"));
        assert_eq!(billed, dec("4"));
        assert_eq!(rate, dec("25"));
    }

    #[test]
    fn single_batch_takes_parent_quantity() {
        assert_eq!(batch_quantity(1, dec("-12"), dec("99"), dec("3")), dec("12"));
    }

    #[test]
    fn multiple_batches_use_own_rate() {
        assert_eq!(batch_quantity(2, dec("-12"), dec("30"), dec("10")), dec("3"));
        assert_eq!(batch_quantity(2, dec("-12"), dec("30"), Decimal::ZERO), dec("12"));
    }

    #[test]
    fn decodes_nested_voucher() {
        let v = voucher(
            r#"<ENVELOPE><VOUCHER>
                <GUID>v-1</GUID><MASTERID>77</MASTERID><ALTERID>301</ALTERID>
                <DATE>20240101</DATE><VOUCHERTYPENAME>Sales</VOUCHERTYPENAME>
                <VOUCHERNUMBER>S/1</VOUCHERNUMBER><PARTYLEDGERNAME>Acme</PARTYLEDGERNAME>
                <ISINVOICE>Yes</ISINVOICE>
                <ALLLEDGERENTRIES.LIST>
                  <LEDGERNAME>Acme</LEDGERNAME><AMOUNT>-1500.00</AMOUNT>
                  <ISPARTYLEDGER>Yes</ISPARTYLEDGER>
                  <BILLALLOCATIONS.LIST>
                    <NAME>INV-1</NAME><BILLTYPE>New Ref</BILLTYPE>
                    <BILLCREDITPERIOD>30 Days</BILLCREDITPERIOD><AMOUNT>-1500.00</AMOUNT>
                  </BILLALLOCATIONS.LIST>
                </ALLLEDGERENTRIES.LIST>
                <ALLLEDGERENTRIES.LIST>
                  <LEDGERNAME>Sales</LEDGERNAME><AMOUNT>1500.00</AMOUNT>
                  <CATEGORYALLOCATIONS.LIST>
                    <CATEGORY>Primary</CATEGORY><AMOUNT>1500</AMOUNT>
                    <COSTCENTREALLOCATIONS.LIST><NAME>North</NAME><AMOUNT>1500</AMOUNT></COSTCENTREALLOCATIONS.LIST>
                  </CATEGORYALLOCATIONS.LIST>
                </ALLLEDGERENTRIES.LIST>
                <ALLLEDGERENTRIES.LIST><AMOUNT>10</AMOUNT></ALLLEDGERENTRIES.LIST>
                <ALLINVENTORYENTRIES.LIST>
                  <STOCKITEMNAME>Widget</STOCKITEMNAME><ACTUALQTY>-12 Nos</ACTUALQTY>
                  <RATE>125/Nos</RATE><AMOUNT>1500</AMOUNT>
                  <BATCHALLOCATIONS.LIST><BATCHNAME>B1</BATCHNAME><GODOWNNAME>Main</GODOWNNAME></BATCHALLOCATIONS.LIST>
                </ALLINVENTORYENTRIES.LIST>
              </VOUCHER></ENVELOPE>"#,
        )
        .unwrap();

        assert_eq!(v.identity.master_id, 77);
        assert_eq!(v.identity.revision, 301);
        assert_eq!(v.date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert!(v.is_invoice);
        assert_eq!(v.ledger_postings.len(), 2, "nameless posting is skipped");
        assert!(v.is_balanced());
        assert_eq!(v.total, dec("1500.00"));

        let party = &v.ledger_postings[0];
        assert_eq!(party.dr_cr, DrCr::Debit);
        assert_eq!(party.amount, dec("1500.00"));
        let bill = &party.bills[0];
        assert_eq!(bill.bill_type, BillType::NewRef);
        assert_eq!(bill.amount, dec("1500.00"));
        assert_eq!(bill.bill_date, v.date);
        assert_eq!(bill.due_date, NaiveDate::from_ymd_opt(2024, 1, 31));

        let sales = &v.ledger_postings[1];
        assert_eq!(sales.dr_cr, DrCr::Credit);
        assert!(sales.cost_allocations[0].centres_balance());

        let line = &v.inventory_postings[0];
        assert_eq!(line.billed_quantity, dec("12"));
        assert_eq!(line.uom, "Nos");
        assert!(line.is_outward);
        assert_eq!(line.batches[0].quantity, dec("12"));
        assert_eq!(line.batches[0].godown, "Main");
    }

    #[test]
    fn postings_inside_wrapper_elements_are_found() {
        let v = voucher(
            r#"<VOUCHER>
                <GUID>v-2</GUID><MASTERID>5</MASTERID><ALTERID>9</ALTERID>
                <LEDGERENTRIES>
                  <LEDGERENTRIES.LIST><LEDGERNAME>Cash</LEDGERNAME><AMOUNT>-40</AMOUNT></LEDGERENTRIES.LIST>
                </LEDGERENTRIES>
                <ALLLEDGERENTRIES.LIST><LEDGERNAME>Sales</LEDGERNAME><AMOUNT>40</AMOUNT></ALLLEDGERENTRIES.LIST>
                <INVENTORY>
                  <INVENTORYENTRIES.LIST>
                    <STOCKITEMNAME>Bolt</STOCKITEMNAME><ACTUALQTY>4 Nos</ACTUALQTY>
                    <BILLEDQTY>-4 Nos</BILLEDQTY><AMOUNT>40</AMOUNT>
                  </INVENTORYENTRIES.LIST>
                </INVENTORY>
              </VOUCHER>"#,
        )
        .unwrap();

        let names: Vec<&str> = v.ledger_postings.iter().map(|p| p.ledger_name.as_str()).collect();
        assert_eq!(names, vec!["Cash", "Sales"]);
        assert!(v.is_balanced());
        assert_eq!(v.inventory_postings.len(), 1);
        assert_eq!(v.inventory_postings[0].billed_quantity, dec("4"));
        assert_eq!(v.inventory_postings[0].rate, dec("10"));
    }

    #[test]
    fn revision_zero_voucher_is_dropped() {
        let v = voucher("<VOUCHER><GUID>v</GUID><MASTERID>1</MASTERID><ALTERID>0</ALTERID></VOUCHER>");
        assert!(v.is_none());
    }

    #[test]
    fn missing_guid_is_typed_error() {
        let doc = parse_document("<VOUCHER><MASTERID>1</MASTERID><ALTERID>2</ALTERID></VOUCHER>").unwrap();
        let err = decode_voucher(doc.descendants("VOUCHER")[0]).unwrap_err();
        assert_eq!(err, CodecError::missing_field("VOUCHER", "GUID"));
    }

    #[test]
    fn unit_suffix_reads_trailing_unit() {
        assert_eq!(unit_suffix("-12 Nos"), "Nos");
        assert_eq!(unit_suffix("1,000.5 Kgs"), "Kgs");
        assert_eq!(unit_suffix("5"), "");
    }
}
