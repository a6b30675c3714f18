//! The catalogue of entity types the source exports.

use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// An exportable entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    /// Account groups.
    Group,
    /// Currencies.
    Currency,
    /// Units of measure.
    Unit,
    /// Stock groups.
    StockGroup,
    /// Stock categories.
    StockCategory,
    /// Cost categories.
    CostCategory,
    /// Cost centres.
    CostCentre,
    /// Godowns (warehouses).
    Godown,
    /// Voucher types.
    VoucherType,
    /// Tax units.
    TaxUnit,
    /// Ledgers.
    Ledger,
    /// Stock items.
    StockItem,
    /// Vouchers (transactions).
    Voucher,
}

impl EntityType {
    /// Every entity type in dependency order: a type never refers to a type
    /// that appears after it.
    pub const SYNC_ORDER: [EntityType; 13] = [
        EntityType::Group,
        EntityType::Currency,
        EntityType::Unit,
        EntityType::StockGroup,
        EntityType::StockCategory,
        EntityType::CostCategory,
        EntityType::CostCentre,
        EntityType::Godown,
        EntityType::VoucherType,
        EntityType::TaxUnit,
        EntityType::Ledger,
        EntityType::StockItem,
        EntityType::Voucher,
    ];

    /// Type name used in the query's `TYPE` element.
    pub fn source_type(self) -> &'static str {
        match self {
            EntityType::Group => "Group",
            EntityType::Currency => "Currency",
            EntityType::Unit => "Unit",
            EntityType::StockGroup => "StockGroup",
            EntityType::StockCategory => "StockCategory",
            EntityType::CostCategory => "CostCategory",
            EntityType::CostCentre => "CostCentre",
            EntityType::Godown => "Godown",
            EntityType::VoucherType => "VoucherType",
            EntityType::TaxUnit => "TaxUnit",
            EntityType::Ledger => "Ledger",
            EntityType::StockItem => "StockItem",
            EntityType::Voucher => "Voucher",
        }
    }

    /// Tag of one record in the response document.
    pub fn element_name(self) -> &'static str {
        match self {
            EntityType::Group => "GROUP",
            EntityType::Currency => "CURRENCY",
            EntityType::Unit => "UNIT",
            EntityType::StockGroup => "STOCKGROUP",
            EntityType::StockCategory => "STOCKCATEGORY",
            EntityType::CostCategory => "COSTCATEGORY",
            EntityType::CostCentre => "COSTCENTRE",
            EntityType::Godown => "GODOWN",
            EntityType::VoucherType => "VOUCHERTYPE",
            EntityType::TaxUnit => "TAXUNIT",
            EntityType::Ledger => "LEDGER",
            EntityType::StockItem => "STOCKITEM",
            EntityType::Voucher => "VOUCHER",
        }
    }

    /// Collection name declared in the query.
    pub fn collection_name(self) -> String {
        format!("Collection of {}s", self.source_type())
    }

    /// Destination route prefix for this type.
    pub fn endpoint(self) -> &'static str {
        match self {
            EntityType::Group => "/groups",
            EntityType::Currency => "/currencies",
            EntityType::Unit => "/units",
            EntityType::StockGroup => "/stock-groups",
            EntityType::StockCategory => "/stock-categories",
            EntityType::CostCategory => "/cost-categories",
            EntityType::CostCentre => "/cost-centers",
            EntityType::Godown => "/godowns",
            EntityType::VoucherType => "/voucher-types",
            EntityType::TaxUnit => "/tax-units",
            EntityType::Ledger => "/ledgers",
            EntityType::StockItem => "/stock-items",
            EntityType::Voucher => "/vouchers",
        }
    }

    /// Key of this type's cursor in the destination's cursor map.
    pub fn cursor_key(self) -> &'static str {
        match self {
            EntityType::Group => "group",
            EntityType::Currency => "currency",
            EntityType::Unit => "units",
            EntityType::StockGroup => "stockgroup",
            EntityType::StockCategory => "stockcategory",
            EntityType::CostCategory => "costcategory",
            EntityType::CostCentre => "costcenter",
            EntityType::Godown => "godown",
            EntityType::VoucherType => "vouchertype",
            EntityType::TaxUnit => "taxunit",
            EntityType::Ledger => "ledger",
            EntityType::StockItem => "stockitem",
            EntityType::Voucher => "voucher",
        }
    }

    /// Returns true for transaction types (nested records, smaller batches).
    pub fn is_transaction(self) -> bool {
        matches!(self, EntityType::Voucher)
    }

    /// Default number of records per destination batch.
    pub fn default_batch_size(self) -> usize {
        if self.is_transaction() {
            50
        } else {
            500
        }
    }

    /// Default pause between destination batches.
    pub fn default_batch_delay(self) -> Duration {
        if self.is_transaction() {
            Duration::from_millis(300)
        } else {
            Duration::from_millis(100)
        }
    }

    /// Default timeout for one source request of this type.
    pub fn source_timeout(self) -> Duration {
        if self.is_transaction() {
            Duration::from_secs(120)
        } else {
            Duration::from_secs(30)
        }
    }

    /// Short lower-case name used on the command line and in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Group => "group",
            EntityType::Currency => "currency",
            EntityType::Unit => "unit",
            EntityType::StockGroup => "stockgroup",
            EntityType::StockCategory => "stockcategory",
            EntityType::CostCategory => "costcategory",
            EntityType::CostCentre => "costcentre",
            EntityType::Godown => "godown",
            EntityType::VoucherType => "vouchertype",
            EntityType::TaxUnit => "taxunit",
            EntityType::Ledger => "ledger",
            EntityType::StockItem => "stockitem",
            EntityType::Voucher => "voucher",
        }
    }

    fn from_normalized(name: &str) -> Option<Self> {
        let entity = match name {
            "group" => EntityType::Group,
            "currency" => EntityType::Currency,
            "unit" => EntityType::Unit,
            "stockgroup" => EntityType::StockGroup,
            "stockcategory" => EntityType::StockCategory,
            "costcategory" => EntityType::CostCategory,
            "costcentre" | "costcenter" => EntityType::CostCentre,
            "godown" => EntityType::Godown,
            "vouchertype" => EntityType::VoucherType,
            "taxunit" => EntityType::TaxUnit,
            "ledger" => EntityType::Ledger,
            "stockitem" => EntityType::StockItem,
            "voucher" => EntityType::Voucher,
            _ => return None,
        };
        Some(entity)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = CodecError;

    /// Accepts any casing, with or without `-`/`_` separators, singular or
    /// plural (`stock-items`, `StockItem`, `costcenter`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        Self::from_normalized(&normalized)
            .or_else(|| {
                let singular = normalized
                    .strip_suffix("ies")
                    .map(|stem| format!("{stem}y"))
                    .or_else(|| normalized.strip_suffix('s').map(str::to_owned))?;
                Self::from_normalized(&singular)
            })
            .ok_or_else(|| CodecError::UnknownEntity { name: s.to_owned() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_order_puts_dependencies_first() {
        let pos = |e| EntityType::SYNC_ORDER.iter().position(|x| *x == e).unwrap();
        assert!(pos(EntityType::Group) < pos(EntityType::Ledger));
        assert!(pos(EntityType::Unit) < pos(EntityType::StockItem));
        assert!(pos(EntityType::CostCategory) < pos(EntityType::CostCentre));
        assert_eq!(EntityType::SYNC_ORDER.last(), Some(&EntityType::Voucher));
    }

    #[test]
    fn parses_loose_names() {
        assert_eq!("CostCenter".parse::<EntityType>().unwrap(), EntityType::CostCentre);
        assert_eq!("cost-centre".parse::<EntityType>().unwrap(), EntityType::CostCentre);
        assert_eq!("stock_items".parse::<EntityType>().unwrap(), EntityType::StockItem);
        assert_eq!("currencies".parse::<EntityType>().unwrap(), EntityType::Currency);
        assert_eq!("VOUCHERS".parse::<EntityType>().unwrap(), EntityType::Voucher);
        assert!("invoice".parse::<EntityType>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for entity in EntityType::SYNC_ORDER {
            assert_eq!(entity.to_string().parse::<EntityType>().unwrap(), entity);
        }
    }

    #[test]
    fn transaction_defaults() {
        assert_eq!(EntityType::Voucher.default_batch_size(), 50);
        assert_eq!(EntityType::Ledger.default_batch_size(), 500);
        assert_eq!(EntityType::Voucher.source_timeout(), Duration::from_secs(120));
        assert_eq!(EntityType::CostCentre.element_name(), "COSTCENTRE");
        assert_eq!(EntityType::CostCentre.endpoint(), "/cost-centers");
    }
}
