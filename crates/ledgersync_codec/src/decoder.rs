//! Response decoding.
//!
//! [`decode`] turns a raw response into typed records. The document as a
//! whole either parses or fails; individual records that lack identity
//! fields are logged and skipped so one bad element cannot hold up the rest.

use crate::element::Element;
use crate::entity::EntityType;
use crate::error::{CodecError, CodecResult};
use crate::model::{FieldValue, MasterRecord, SourceRecord};
use crate::numeric::{parse_amount, parse_quantity};
use crate::parser::parse_document;
use crate::sanitize::sanitize;
use crate::schema::{self, parse_flag, FieldKind};
use crate::voucher::{decode_voucher, identity};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Decodes a response for `entity`.
///
/// Records with revision 0 (system/template records) are dropped.
pub fn decode(document: &str, entity: EntityType) -> CodecResult<Vec<SourceRecord>> {
    let root = parse_response(document)?;

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for el in root.descendants(entity.element_name()) {
        let decoded = if entity.is_transaction() {
            decode_voucher(el).map(|v| v.map(SourceRecord::Voucher))
        } else {
            decode_master(el, entity).map(|m| m.map(SourceRecord::Master))
        };

        match decoded {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(e) if e.is_per_record() => {
                warn!(entity = %entity, error = %e, "skipping undecodable record");
                skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    debug!(entity = %entity, decoded = records.len(), skipped, "decoded response");
    Ok(records)
}

/// Decodes the tenant-list response into tenant names, in document order.
pub fn decode_tenants(document: &str) -> CodecResult<Vec<String>> {
    let root = parse_response(document)?;
    let mut names: Vec<String> = Vec::new();
    for company in root.descendants("COMPANY") {
        if let Some(name) = company.field("NAME") {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_owned());
            }
        }
    }
    Ok(names)
}

fn parse_response(document: &str) -> CodecResult<Element> {
    let cleaned = sanitize(document)?;
    let root = parse_document(&cleaned)?;

    if let Some(message) = root
        .descendants("LINEERROR")
        .into_iter()
        .map(|e| e.text.trim())
        .find(|t| !t.is_empty())
    {
        return Err(CodecError::SourceError {
            message: message.to_owned(),
        });
    }
    Ok(root)
}

fn decode_master(el: &Element, entity: EntityType) -> CodecResult<Option<MasterRecord>> {
    // Elements without a name are collection wrappers, not records.
    let Some(name) = el.field("NAME") else {
        return Ok(None);
    };

    let identity = identity(el, entity.element_name())?;
    if identity.revision == 0 {
        return Ok(None);
    }

    let mut fields = BTreeMap::new();
    for spec in schema::fields(entity) {
        let Some(raw) = el.field(spec.tag) else {
            continue;
        };
        let value = match spec.kind {
            FieldKind::Text => Some(FieldValue::Text(raw.to_owned())),
            FieldKind::Flag => parse_flag(raw).map(FieldValue::Flag),
            FieldKind::Amount => Some(FieldValue::Number(parse_amount(raw))),
            FieldKind::Quantity => Some(FieldValue::Number(parse_quantity(raw))),
        };
        if let Some(value) = value {
            fields.insert(spec.key, value);
        }
    }

    Ok(Some(MasterRecord {
        entity,
        identity,
        name: name.to_owned(),
        fields,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    const GROUPS: &str = r#"<ENVELOPE><BODY><DATA><COLLECTION>
        <GROUP NAME="Sundry Debtors" RESERVEDNAME="Sundry Debtors">
          <GUID>g-1</GUID><MASTERID>10</MASTERID><ALTERID>5</ALTERID>
          <PARENT>Current Assets</PARENT><ISREVENUE>No</ISREVENUE>
        </GROUP>
        <GROUP NAME="Primary"><GUID>g-0</GUID><MASTERID>1</MASTERID><ALTERID>0</ALTERID></GROUP>
        <GROUP NAME="Broken"><MASTERID>2</MASTERID><ALTERID>3</ALTERID></GROUP>
        <GROUP><GUID>container</GUID></GROUP>
      </COLLECTION></DATA></BODY></ENVELOPE>"#;

    #[test]
    fn decodes_masters_and_filters_revision_zero() {
        let records = decode(GROUPS, EntityType::Group).unwrap();
        assert_eq!(records.len(), 1);

        let SourceRecord::Master(group) = &records[0] else {
            panic!("expected a master record");
        };
        assert_eq!(group.name, "Sundry Debtors");
        assert_eq!(group.identity.guid, "g-1");
        assert_eq!(group.identity.revision, 5);
        assert_eq!(
            group.fields.get("grpParent"),
            Some(&FieldValue::Text("Current Assets".into()))
        );
        assert_eq!(group.fields.get("isRevenue"), Some(&FieldValue::Flag(false)));
        assert_eq!(
            group.fields.get("reservedName"),
            Some(&FieldValue::Text("Sundry Debtors".into()))
        );
    }

    #[test]
    fn numeric_master_fields() {
        let doc = r#"<ENVELOPE><LEDGER NAME="Acme">
            <GUID>l-1</GUID><MASTERID>9</MASTERID><ALTERID>2</ALTERID>
            <OPENINGBALANCE>-2,500.00</OPENINGBALANCE><ISBILLWISEON>Yes</ISBILLWISEON>
          </LEDGER></ENVELOPE>"#;
        let records = decode(doc, EntityType::Ledger).unwrap();
        let SourceRecord::Master(ledger) = &records[0] else {
            panic!("expected a master record");
        };
        assert_eq!(
            ledger.fields.get("ledOpeningBalance"),
            Some(&FieldValue::Number(Decimal::new(-250000, 2)))
        );
        assert_eq!(ledger.fields.get("ledBillwiseOn"), Some(&FieldValue::Flag(true)));
    }

    #[test]
    fn source_error_envelope() {
        let doc = "<RESPONSE><LINEERROR>Could not set 'SVCurrentCompany' to 'Nope'</LINEERROR></RESPONSE>";
        let err = decode(doc, EntityType::Ledger).unwrap_err();
        assert!(matches!(err, CodecError::SourceError { .. }));
    }

    #[test]
    fn malformed_document_fails_whole_fetch() {
        assert!(matches!(
            decode("<ENVELOPE><LEDGER NAME=\"x\">", EntityType::Ledger),
            Err(CodecError::MalformedDocument { .. })
        ));
        assert!(matches!(
            decode("", EntityType::Ledger),
            Err(CodecError::Sanitize { .. })
        ));
    }

    #[test]
    fn empty_collection_decodes_to_nothing() {
        let records = decode("<ENVELOPE><BODY/></ENVELOPE>", EntityType::Voucher).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn tenant_names() {
        let doc = r#"<ENVELOPE>
            <COMPANY NAME="Acme Traders"><GUID>c1</GUID></COMPANY>
            <COMPANY><NAME>Beta Corp</NAME></COMPANY>
            <COMPANY NAME="Acme Traders"/>
          </ENVELOPE>"#;
        assert_eq!(decode_tenants(doc).unwrap(), vec!["Acme Traders", "Beta Corp"]);
    }
}
