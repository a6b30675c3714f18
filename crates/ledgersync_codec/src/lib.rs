//! # LedgerSync Codec
//!
//! Query building and response decoding for the ledger export protocol.
//!
//! The source speaks a request/response document protocol: a caller posts
//! a query naming a collection and the fields to fetch, and receives a
//! hierarchical document back. This crate handles both directions:
//!
//! - [`QueryDocument`] / [`build_query`] write export queries, optionally
//!   filtered by a revision floor and scoped to a tenant
//! - [`sanitize`] repairs the characters and namespace prefixes the source
//!   emits that a strict parser rejects
//! - [`decode`] turns a response into typed [`SourceRecord`]s, including the
//!   nested postings of vouchers and their derived fields
//!
//! ## Invariants
//!
//! - Records with revision 0 never leave the decoder
//! - Posting amounts are unsigned; direction is carried by [`DrCr`]
//! - A document that fails to sanitize or parse yields no records at all
//!
//! ## Usage
//!
//! ```
//! use ledgersync_codec::{build_query, decode, EntityType};
//!
//! let query = build_query(EntityType::Ledger, Some(42), Some("Acme Traders")).unwrap();
//! assert!(query.contains("$AlterId &gt; 42"));
//!
//! let response = r#"<ENVELOPE><LEDGER NAME="Cash">
//!     <GUID>l-1</GUID><MASTERID>3</MASTERID><ALTERID>43</ALTERID>
//! </LEDGER></ENVELOPE>"#;
//! let records = decode(response, EntityType::Ledger).unwrap();
//! assert_eq!(records[0].identity().revision, 43);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod element;
mod entity;
mod error;
mod model;
pub mod numeric;
mod parser;
mod query;
mod sanitize;
pub mod schema;
mod voucher;

pub use decoder::{decode, decode_tenants};
pub use element::Element;
pub use entity::EntityType;
pub use error::{CodecError, CodecResult};
pub use model::{
    BatchAllocation, BillAllocation, BillType, CostAllocation, CostCentreAllocation, DrCr,
    FieldValue, InventoryPosting, LedgerPosting, MasterRecord, NaturalKey, RecordIdentity,
    SourceRecord, Voucher,
};
pub use parser::parse_document;
pub use query::{build_query, format_date, QueryDocument};
pub use sanitize::sanitize;
pub use voucher::{batch_quantity, derive_inventory};
