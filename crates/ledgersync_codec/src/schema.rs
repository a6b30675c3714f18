//! Field schemas for the flat master types.
//!
//! Each master type lists the source tags it fetches and the destination
//! key each one lands under. The same table drives the query's `FETCH`
//! list and the decoder, so the two cannot drift apart.

use crate::entity::EntityType;

/// How a field's raw text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Kept as trimmed text.
    Text,
    /// `Yes` / `No`.
    Flag,
    /// Parsed with [`crate::numeric::parse_amount`].
    Amount,
    /// Parsed with [`crate::numeric::parse_quantity`].
    Quantity,
}

/// One schema entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Source tag (child element or attribute).
    pub tag: &'static str,
    /// Destination key.
    pub key: &'static str,
    /// Interpretation.
    pub kind: FieldKind,
}

const fn text(tag: &'static str, key: &'static str) -> FieldSpec {
    FieldSpec {
        tag,
        key,
        kind: FieldKind::Text,
    }
}

const fn flag(tag: &'static str, key: &'static str) -> FieldSpec {
    FieldSpec {
        tag,
        key,
        kind: FieldKind::Flag,
    }
}

const fn amount(tag: &'static str, key: &'static str) -> FieldSpec {
    FieldSpec {
        tag,
        key,
        kind: FieldKind::Amount,
    }
}

const fn quantity(tag: &'static str, key: &'static str) -> FieldSpec {
    FieldSpec {
        tag,
        key,
        kind: FieldKind::Quantity,
    }
}

/// Identity tags fetched for every type.
pub const IDENTITY_TAGS: [&str; 3] = ["GUID", "MASTERID", "ALTERID"];

const GROUP: &[FieldSpec] = &[
    text("ALIAS", "grpAlias"),
    text("PARENT", "grpParent"),
    text("NATURE", "grpNature"),
    flag("ISREVENUE", "isRevenue"),
    text("RESERVEDNAME", "reservedName"),
];

const CURRENCY: &[FieldSpec] = &[
    text("SYMBOL", "symbol"),
    text("FORMALNAME", "formalName"),
    quantity("DECIMALPLACES", "decimalPlaces"),
    text("DECIMALSYMBOL", "decimalSymbol"),
];

const UNIT: &[FieldSpec] = &[
    text("ALIAS", "alias"),
    text("ORIGINALNAME", "originalName"),
    flag("ISSIMPLEUNIT", "simpleUnit"),
    quantity("DECIMALPLACES", "decimalPlaces"),
];

const STOCK_GROUP: &[FieldSpec] = &[
    text("ALIAS", "alias"),
    text("PARENT", "parent"),
    text("BASEUNITS", "baseUnits"),
    text("ADDITIONALUNITS", "additionalUnits"),
];

const STOCK_CATEGORY: &[FieldSpec] = &[text("ALIAS", "alias"), text("PARENT", "parent")];

const COST_CATEGORY: &[FieldSpec] = &[
    text("ALIAS", "alias"),
    flag("ALLOCATEREVENUE", "allocateRevenue"),
    flag("ALLOCATENONREVENUE", "allocateNonRevenue"),
];

const COST_CENTRE: &[FieldSpec] = &[
    text("ALIAS", "alias"),
    text("PARENT", "parent"),
    text("CATEGORY", "category"),
];

const GODOWN: &[FieldSpec] = &[
    text("ALIAS", "alias"),
    text("PARENT", "parent"),
    text("ADDRESS", "address"),
];

const VOUCHER_TYPE: &[FieldSpec] = &[
    text("ALIAS", "alias"),
    text("PARENT", "parent"),
    text("NUMBERINGMETHOD", "numberingMethod"),
    flag("ISDEEMEDPOSITIVE", "isDeemedPositive"),
];

const TAX_UNIT: &[FieldSpec] = &[text("ALIAS", "alias"), text("ORIGINALNAME", "originalName")];

const LEDGER: &[FieldSpec] = &[
    text("ONLYALIAS", "ledAlias"),
    text("PARENT", "ledParent"),
    flag("ISREVENUE", "isRevenue"),
    text("DESCRIPTION", "ledDescription"),
    text("NARRATION", "narration"),
    flag("ISBILLWISEON", "ledBillwiseOn"),
    flag("ISCOSTCENTRESON", "ledIsCostcentreOn"),
    amount("OPENINGBALANCE", "ledOpeningBalance"),
    text("LEDGERPHONE", "ledPhone"),
    text("LEDGERMOBILE", "ledMobile"),
    text("EMAIL", "ledEmail"),
    text("WEBSITE", "ledWebsite"),
    text("CURRENCYNAME", "currencyName"),
    text("INCOMETAXNUMBER", "incomeTaxNumber"),
    text("VATDEALERTYPE", "vatDealerType"),
    text("VATTINNUMBER", "vatTinNumber"),
];

const STOCK_ITEM: &[FieldSpec] = &[
    text("PARENT", "parent"),
    text("CATEGORY", "category"),
    text("DESCRIPTION", "description"),
    text("BASEUNITS", "baseUnits"),
    text("ADDITIONALUNITS", "additionalUnits"),
    quantity("OPENINGBALANCE", "openingBalance"),
    amount("OPENINGVALUE", "openingValue"),
    quantity("OPENINGRATE", "openingRate"),
    text("HSNCODE", "hsnCode"),
    text("COSTINGMETHOD", "costingMethod"),
    text("VALUATIONMETHOD", "valuationMethod"),
    text("GSTTYPEOFSUPPLY", "gstTypeOfSupply"),
    flag("ISBATCHWISEON", "isBatchWiseOn"),
    flag("ISCOSTCENTRESON", "isCostCentresOn"),
];

/// Field schema of a master type. Vouchers have no flat schema.
pub fn fields(entity: EntityType) -> &'static [FieldSpec] {
    match entity {
        EntityType::Group => GROUP,
        EntityType::Currency => CURRENCY,
        EntityType::Unit => UNIT,
        EntityType::StockGroup => STOCK_GROUP,
        EntityType::StockCategory => STOCK_CATEGORY,
        EntityType::CostCategory => COST_CATEGORY,
        EntityType::CostCentre => COST_CENTRE,
        EntityType::Godown => GODOWN,
        EntityType::VoucherType => VOUCHER_TYPE,
        EntityType::TaxUnit => TAX_UNIT,
        EntityType::Ledger => LEDGER,
        EntityType::StockItem => STOCK_ITEM,
        EntityType::Voucher => &[],
    }
}

/// Destination key that holds a master's name.
pub fn name_key(entity: EntityType) -> &'static str {
    match entity {
        EntityType::Group => "grpName",
        EntityType::Unit => "unitName",
        EntityType::Ledger => "ledName",
        _ => "name",
    }
}

/// Parses a source `Yes`/`No` flag.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_master_has_a_schema() {
        for entity in EntityType::SYNC_ORDER {
            assert_eq!(fields(entity).is_empty(), entity.is_transaction(), "{entity}");
        }
    }

    #[test]
    fn destination_keys_are_unique_per_type() {
        for entity in EntityType::SYNC_ORDER {
            let mut keys = HashSet::new();
            keys.insert(name_key(entity));
            for spec in fields(entity) {
                assert!(keys.insert(spec.key), "{entity}: duplicate {}", spec.key);
            }
        }
    }

    #[test]
    fn flags() {
        assert_eq!(parse_flag("Yes"), Some(true));
        assert_eq!(parse_flag(" no "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
