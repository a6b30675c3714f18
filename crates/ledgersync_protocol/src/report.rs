//! Reconciliation report shape.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Default maximum of records listed per category in a report.
pub const SAMPLE_LIMIT: usize = 10;

/// One record named in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSample {
    /// Source master id.
    pub master_id: u64,
    /// Source guid.
    pub guid: String,
    /// Record label, when the source side is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Revision held by the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_revision: Option<u64>,
    /// Revision held by the destination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_revision: Option<u64>,
}

/// Outcome of comparing one entity type between source and destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    /// Destination tenant id.
    pub tenant_id: u64,
    /// Entity type compared.
    pub entity: String,
    /// Records held by the source.
    pub source_count: usize,
    /// Records held by the destination.
    pub destination_count: usize,
    /// Keys present on both sides with equal revisions.
    pub matched: usize,
    /// Keys only the source holds.
    pub missing: usize,
    /// Keys whose destination revision lags the source.
    pub stale: usize,
    /// Keys only the destination holds.
    pub extra: usize,
    /// Sample of missing records.
    pub missing_sample: Vec<RecordSample>,
    /// Sample of stale records.
    pub stale_sample: Vec<RecordSample>,
    /// Sample of extra records.
    pub extra_sample: Vec<RecordSample>,
    /// Records re-sent to repair the destination.
    pub repaired: usize,
    /// Error that stopped the repair, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repair_error: Option<String>,
    /// When the report was produced.
    pub generated_at: DateTime<Utc>,
}

impl ReconciliationReport {
    /// Creates an empty report.
    pub fn new(tenant_id: u64, entity: impl Into<String>) -> Self {
        Self {
            tenant_id,
            entity: entity.into(),
            source_count: 0,
            destination_count: 0,
            matched: 0,
            missing: 0,
            stale: 0,
            extra: 0,
            missing_sample: Vec::new(),
            stale_sample: Vec::new(),
            extra_sample: Vec::new(),
            repaired: 0,
            repair_error: None,
            generated_at: Utc::now(),
        }
    }

    /// True when the destination needs no repair.
    ///
    /// Extra records do not make a report inconsistent; they are reported
    /// but never deleted.
    pub fn is_consistent(&self) -> bool {
        self.missing == 0 && self.stale == 0
    }

    /// Serializes the report as one JSON line.
    pub fn to_json_line(&self) -> crate::ProtocolResult<String> {
        serde_json::to_string(self)
            .map_err(|e| crate::ProtocolError::encode("ReconciliationReport", e))
    }
}
