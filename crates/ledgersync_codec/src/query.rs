//! Export query documents.
//!
//! A query asks the source for one collection: the record type, the fields
//! to fetch, and optionally a revision predicate (`$AlterId > N`) and a
//! tenant to scope to. Without a floor the query is a full fetch.

use crate::entity::EntityType;
use crate::error::{CodecError, CodecResult};
use crate::schema::{self, IDENTITY_TAGS};
use chrono::NaiveDate;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

const FILTER_NAME: &str = "AlterIdFilter";
const TENANT_COLLECTION: &str = "All Companies";
const SOURCE_DATE_FORMAT: &str = "%d-%b-%Y";

/// Voucher header fields.
const VOUCHER_FETCH: &[&str] = &[
    "GUID",
    "MASTERID",
    "ALTERID",
    "DATE",
    "EFFECTIVEDATE",
    "VOUCHERTYPENAME",
    "VOUCHERNUMBER",
    "PARTYLEDGERNAME",
    "PARTYNAME",
    "REFERENCE",
    "NARRATION",
    "ISOPTIONAL",
    "ISDELETED",
    "ISCANCELLED",
    "ISPOSTDATED",
    "ISINVOICE",
    "ISDEEMEDPOSITIVE",
    "ALLLEDGERENTRIES.LIST",
    "ALLINVENTORYENTRIES.LIST",
];

/// Nested voucher collections: (name, type path, fetch list).
const VOUCHER_SUBCOLLECTIONS: &[(&str, &str, &str)] = &[
    (
        "AllLedgerEntries",
        "Voucher : AllLedgerEntries",
        "LEDGERNAME, LEDGERGUID, AMOUNT, ISDEEMEDPOSITIVE, ISPARTYLEDGER, BILLALLOCATIONS.LIST, CATEGORYALLOCATIONS.LIST",
    ),
    (
        "BillAllocations",
        "Voucher : AllLedgerEntries : BillAllocations",
        "NAME, BILLTYPE, AMOUNT, BILLDATE, BILLCREDITPERIOD",
    ),
    (
        "CategoryAllocations",
        "Voucher : AllLedgerEntries : CategoryAllocations",
        "CATEGORY, AMOUNT, COSTCENTREALLOCATIONS.LIST",
    ),
    (
        "CostCentreAllocations",
        "Voucher : AllLedgerEntries : CategoryAllocations : CostCentreAllocations",
        "COSTCENTRENAME, AMOUNT",
    ),
    (
        "AllInventoryEntries",
        "Voucher : AllInventoryEntries",
        "STOCKITEMNAME, STOCKITEMGUID, ACTUALQTY, BILLEDQTY, RATE, AMOUNT, UOM, GODOWNNAME, ISDEEMEDPOSITIVE, BATCHALLOCATIONS.LIST",
    ),
    (
        "BatchAllocations",
        "Voucher : AllInventoryEntries : BatchAllocations",
        "BATCHNAME, GODOWNNAME, AMOUNT, RATE, MFGDATE, EXPIRYDATE, DESTINATIONGODOWNNAME",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryKind {
    Entity(EntityType),
    ActiveTenants,
}

/// A query to be posted to the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDocument {
    kind: QueryKind,
    revision_floor: Option<u64>,
    tenant: Option<String>,
    date_range: Option<(NaiveDate, NaiveDate)>,
}

impl QueryDocument {
    /// Full fetch of one entity type.
    pub fn for_entity(entity: EntityType) -> Self {
        Self {
            kind: QueryKind::Entity(entity),
            revision_floor: None,
            tenant: None,
            date_range: None,
        }
    }

    /// Lists the tenants currently open in the source.
    pub fn active_tenants() -> Self {
        Self {
            kind: QueryKind::ActiveTenants,
            revision_floor: None,
            tenant: None,
            date_range: None,
        }
    }

    /// Restricts the fetch to records with revision strictly above `floor`.
    pub fn with_revision_floor(mut self, floor: u64) -> Self {
        self.revision_floor = Some(floor);
        self
    }

    /// Scopes the query to a named tenant.
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        let tenant = tenant.into();
        if !tenant.trim().is_empty() {
            self.tenant = Some(tenant);
        }
        self
    }

    /// Sets the period for transaction queries.
    pub fn with_date_range(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.date_range = Some((from, to));
        self
    }

    /// The revision floor, if any.
    pub fn revision_floor(&self) -> Option<u64> {
        self.revision_floor
    }

    /// The tenant the query is scoped to, if any.
    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    /// The entity type queried, if this is an entity query.
    pub fn entity(&self) -> Option<EntityType> {
        match self.kind {
            QueryKind::Entity(entity) => Some(entity),
            QueryKind::ActiveTenants => None,
        }
    }

    /// Writes the query document.
    pub fn encode(&self) -> CodecResult<String> {
        let mut wr = Writer::new_with_indent(Vec::new(), b' ', 2);
        match self.kind {
            QueryKind::Entity(entity) => self.write_entity(&mut wr, entity)?,
            QueryKind::ActiveTenants => write_tenants(&mut wr)?,
        }
        String::from_utf8(wr.into_inner()).map_err(xml)
    }

    fn write_entity<W: Write>(&self, wr: &mut Writer<W>, entity: EntityType) -> CodecResult<()> {
        let collection = entity.collection_name();

        start(wr, "ENVELOPE")?;
        write_header(wr, &collection)?;
        start(wr, "BODY")?;
        start(wr, "DESC")?;

        start(wr, "STATICVARIABLES")?;
        let (from, to) = self.period(entity);
        write_date(wr, "SVFROMDATE", &from)?;
        write_date(wr, "SVTODATE", &to)?;
        leaf(wr, "SVEXPORTFORMAT", "$$SysName:XML")?;
        if let Some(tenant) = &self.tenant {
            leaf(wr, "SVCURRENTCOMPANY", tenant)?;
        }
        end(wr, "STATICVARIABLES")?;

        start(wr, "TDL")?;
        start(wr, "TDLMESSAGE")?;

        wr.write_event(Event::Start(
            BytesStart::new("COLLECTION")
                .with_attributes([("NAME", collection.as_str()), ("ISMODIFY", "No")]),
        ))
        .map_err(xml)?;
        leaf(wr, "TYPE", entity.source_type())?;
        leaf(wr, "FETCH", &fetch_list(entity))?;
        if self.revision_floor.is_some() {
            leaf(wr, "FILTERS", FILTER_NAME)?;
        }
        end(wr, "COLLECTION")?;

        if entity.is_transaction() {
            for (name, path, fetch) in VOUCHER_SUBCOLLECTIONS {
                wr.write_event(Event::Start(
                    BytesStart::new("COLLECTION").with_attributes([("NAME", *name)]),
                ))
                .map_err(xml)?;
                leaf(wr, "TYPE", path)?;
                leaf(wr, "FETCH", fetch)?;
                end(wr, "COLLECTION")?;
            }
        }

        if let Some(floor) = self.revision_floor {
            wr.write_event(Event::Start(
                BytesStart::new("SYSTEM").with_attributes([("TYPE", "Formulae"), ("NAME", FILTER_NAME)]),
            ))
            .map_err(xml)?;
            wr.write_event(Event::Text(BytesText::new(&format!("$AlterId > {floor}"))))
                .map_err(xml)?;
            end(wr, "SYSTEM")?;
        }

        end(wr, "TDLMESSAGE")?;
        end(wr, "TDL")?;
        end(wr, "DESC")?;
        end(wr, "BODY")?;
        end(wr, "ENVELOPE")
    }

    fn period(&self, entity: EntityType) -> (String, String) {
        let epoch = || NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
        match (self.date_range, entity.is_transaction()) {
            (Some((from, to)), _) => (format_date(from), format_date(to)),
            // Transactions are period-scoped by the source; default to all of them.
            (None, true) => (
                format_date(epoch()),
                format_date(NaiveDate::from_ymd_opt(2099, 12, 31).unwrap_or_default()),
            ),
            (None, false) => (format_date(epoch()), format_date(epoch())),
        }
    }
}

/// Builds the export query for `entity`.
///
/// With a `revision_floor` only records whose revision is strictly greater
/// are requested; without one the query is a full fetch.
pub fn build_query(
    entity: EntityType,
    revision_floor: Option<u64>,
    tenant: Option<&str>,
) -> CodecResult<String> {
    let mut query = QueryDocument::for_entity(entity);
    if let Some(floor) = revision_floor {
        query = query.with_revision_floor(floor);
    }
    if let Some(tenant) = tenant {
        query = query.with_tenant(tenant);
    }
    query.encode()
}

/// Formats a date the way the source's static variables expect it.
pub fn format_date(date: NaiveDate) -> String {
    date.format(SOURCE_DATE_FORMAT).to_string()
}

fn fetch_list(entity: EntityType) -> String {
    if entity.is_transaction() {
        return VOUCHER_FETCH.join(", ");
    }
    IDENTITY_TAGS
        .iter()
        .copied()
        .chain(std::iter::once("NAME"))
        .chain(schema::fields(entity).iter().map(|spec| spec.tag))
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_tenants<W: Write>(wr: &mut Writer<W>) -> CodecResult<()> {
    start(wr, "ENVELOPE")?;
    write_header(wr, TENANT_COLLECTION)?;
    start(wr, "BODY")?;
    start(wr, "DESC")?;
    start(wr, "STATICVARIABLES")?;
    leaf(wr, "SVEXPORTFORMAT", "$$SysName:XML")?;
    end(wr, "STATICVARIABLES")?;
    start(wr, "TDL")?;
    start(wr, "TDLMESSAGE")?;
    wr.write_event(Event::Start(
        BytesStart::new("COLLECTION").with_attributes([("NAME", TENANT_COLLECTION)]),
    ))
    .map_err(xml)?;
    leaf(wr, "TYPE", "Company")?;
    leaf(wr, "FETCH", "NAME, GUID")?;
    end(wr, "COLLECTION")?;
    end(wr, "TDLMESSAGE")?;
    end(wr, "TDL")?;
    end(wr, "DESC")?;
    end(wr, "BODY")?;
    end(wr, "ENVELOPE")
}

fn write_header<W: Write>(wr: &mut Writer<W>, id: &str) -> CodecResult<()> {
    start(wr, "HEADER")?;
    leaf(wr, "VERSION", "1")?;
    leaf(wr, "TALLYREQUEST", "Export")?;
    leaf(wr, "TYPE", "Collection")?;
    leaf(wr, "ID", id)?;
    end(wr, "HEADER")
}

fn write_date<W: Write>(wr: &mut Writer<W>, name: &str, value: &str) -> CodecResult<()> {
    wr.write_event(Event::Start(
        BytesStart::new(name).with_attributes([("TYPE", "Date")]),
    ))
    .map_err(xml)?;
    wr.write_event(Event::Text(BytesText::new(value)))
        .map_err(xml)?;
    end(wr, name)
}

fn start<W: Write>(wr: &mut Writer<W>, name: &str) -> CodecResult<()> {
    wr.write_event(Event::Start(BytesStart::new(name)))
        .map_err(xml)
}

fn end<W: Write>(wr: &mut Writer<W>, name: &str) -> CodecResult<()> {
    wr.write_event(Event::End(BytesStart::new(name).to_end()))
        .map_err(xml)
}

fn leaf<W: Write>(wr: &mut Writer<W>, name: &str, text: &str) -> CodecResult<()> {
    start(wr, name)?;
    wr.write_event(Event::Text(BytesText::new(text)))
        .map_err(xml)?;
    end(wr, name)
}

fn xml<E: std::fmt::Display>(e: E) -> CodecError {
    CodecError::encoding_failed(e.to_string())
}
