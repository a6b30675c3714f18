//! Request and response bodies exchanged with the destination.

use crate::error::{ProtocolError, ProtocolResult};
use chrono::{DateTime, Utc};
use ledgersync_codec::NaturalKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_true() -> bool {
    true
}

/// Response to a batch upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncBatchResponse {
    /// Whether the destination accepted the batch. Absent means accepted.
    #[serde(default = "default_true")]
    pub success: bool,
    /// Records the destination received.
    #[serde(default)]
    pub total_received: Option<u64>,
    /// Records the destination stored.
    #[serde(default)]
    pub total_processed: Option<u64>,
    /// Stored count, as reported by the transaction route.
    #[serde(default)]
    pub saved_count: Option<u64>,
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,
}

impl SyncBatchResponse {
    /// A response acknowledging `count` records.
    pub fn success(count: u64) -> Self {
        Self {
            success: true,
            total_received: Some(count),
            total_processed: Some(count),
            saved_count: None,
            message: None,
        }
    }

    /// A rejection.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            total_received: None,
            total_processed: None,
            saved_count: None,
            message: Some(message.into()),
        }
    }

    /// Number of records to count as committed for a batch of `sent`.
    pub fn committed(&self, sent: usize) -> u64 {
        self.total_processed
            .or(self.saved_count)
            .unwrap_or(sent as u64)
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::encode("SyncBatchResponse", e))
    }

    /// Decodes from JSON. An empty body counts as an acknowledgement.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self {
                success: true,
                total_received: None,
                total_processed: None,
                saved_count: None,
                message: None,
            });
        }
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::decode("SyncBatchResponse", e))
    }
}

/// Body that records a master type's new cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterCursorUpdate {
    /// New revision floor.
    #[serde(rename = "lastAlterID")]
    pub last_alter_id: u64,
    /// Cursor key of the entity type.
    #[serde(rename = "entityType")]
    pub entity_type: String,
    /// When the cursor was written.
    #[serde(rename = "lastSyncTime")]
    pub last_sync_time: DateTime<Utc>,
}

impl MasterCursorUpdate {
    /// Creates an update stamped with the current time.
    pub fn new(entity_type: impl Into<String>, last_alter_id: u64) -> Self {
        Self {
            last_alter_id,
            entity_type: entity_type.into(),
            last_sync_time: Utc::now(),
        }
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::encode("MasterCursorUpdate", e))
    }
}

/// Body that records the transaction cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherCursorUpdate {
    /// New revision floor.
    #[serde(rename = "lastVoucherAlterID")]
    pub last_voucher_alter_id: u64,
    /// When the cursor was written.
    #[serde(rename = "lastSyncTime")]
    pub last_sync_time: DateTime<Utc>,
}

impl VoucherCursorUpdate {
    /// Creates an update stamped with the current time.
    pub fn new(last_voucher_alter_id: u64) -> Self {
        Self {
            last_voucher_alter_id,
            last_sync_time: Utc::now(),
        }
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::encode("VoucherCursorUpdate", e))
    }
}

/// Reads an unsigned integer that may be sent as a number or a string.
pub fn loose_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// The destination's per-type cursor map for one tenant.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MasterMapping {
    /// Cursor values keyed by cursor key.
    #[serde(default)]
    pub masters: serde_json::Map<String, Value>,
}

impl MasterMapping {
    /// Decodes from JSON. The map may be top-level or under `data`.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| ProtocolError::decode("MasterMapping", e))?;
        let body = value.get("data").filter(|d| d.is_object()).unwrap_or(&value);
        serde_json::from_value(body.clone()).map_err(|e| ProtocolError::decode("MasterMapping", e))
    }

    /// Cursor for `key`, if the destination has one.
    pub fn cursor(&self, key: &str) -> Option<u64> {
        self.masters.get(key).and_then(loose_u64)
    }
}

/// Reads the transaction cursor from its response body.
pub fn decode_voucher_cursor(bytes: &[u8]) -> ProtocolResult<Option<u64>> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::decode("VoucherCursor", e))?;
    let field = |v: &Value| v.get("lastVoucherAlterID").and_then(loose_u64);
    Ok(field(&value).or_else(|| value.get("data").and_then(field)))
}

/// A record as the destination currently holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationRecord {
    /// Natural key.
    pub key: NaturalKey,
    /// Revision the destination last stored.
    pub revision: u64,
}

impl DestinationRecord {
    /// Reads one listed record. Returns `None` when it has no usable key.
    pub fn from_json(value: &Value) -> Option<Self> {
        let pick = |names: &[&str]| names.iter().find_map(|n| value.get(*n));
        let master_id = pick(&["masterId", "masterID"]).and_then(loose_u64)?;
        let guid = value.get("guid").and_then(Value::as_str)?.trim();
        if guid.is_empty() {
            return None;
        }
        let revision = pick(&["alterId", "alterID"])
            .and_then(loose_u64)
            .unwrap_or(0);
        Some(Self {
            key: NaturalKey::new(master_id, guid),
            revision,
        })
    }

    /// Decodes a record listing (a bare array or `{ "data": [...] }`).
    ///
    /// Rows without a master id or guid are dropped.
    pub fn decode_list(bytes: &[u8]) -> ProtocolResult<Vec<Self>> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| ProtocolError::decode("DestinationRecord list", e))?;
        let rows = match &value {
            Value::Array(rows) => rows.as_slice(),
            Value::Object(_) => value
                .get("data")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            _ => {
                return Err(ProtocolError::decode(
                    "DestinationRecord list",
                    "expected an array or an object with data",
                ))
            }
        };
        Ok(rows.iter().filter_map(Self::from_json).collect())
    }
}

/// A tenant registered at the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantSummary {
    /// Destination tenant id.
    pub id: u64,
    /// Tenant (company) name as known to the source.
    pub name: String,
    /// Registration status.
    #[serde(default)]
    pub status: Option<String>,
}

impl TenantSummary {
    /// A tenant whose import has finished.
    pub fn imported(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: Some("imported".into()),
        }
    }

    /// Only imported tenants take part in syncs.
    pub fn is_imported(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("imported"))
    }

    /// Decodes a tenant listing (a bare array or `{ "data": [...] }`).
    pub fn decode_list(bytes: &[u8]) -> ProtocolResult<Vec<Self>> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| ProtocolError::decode("TenantSummary", e))?;
        let rows = value.get("data").cloned().unwrap_or(value);
        serde_json::from_value(rows).map_err(|e| ProtocolError::decode("TenantSummary", e))
    }
}

/// Tenant-level sync status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Every entity type synced.
    Synced,
    /// At least one entity type failed.
    Failed,
}

/// Body that reports a tenant's overall sync status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusUpdate {
    /// Outcome.
    pub sync_status: SyncStatus,
    /// Time of the last successful sync; cleared on failure.
    pub last_sync_date: Option<DateTime<Utc>>,
    /// Time of this update.
    pub updated_at: DateTime<Utc>,
}

impl SyncStatusUpdate {
    /// Creates an update for the given outcome, stamped now.
    pub fn new(success: bool) -> Self {
        let now = Utc::now();
        Self {
            sync_status: if success {
                SyncStatus::Synced
            } else {
                SyncStatus::Failed
            },
            last_sync_date: success.then_some(now),
            updated_at: now,
        }
    }

    /// Encodes to JSON.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::encode("SyncStatusUpdate", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_response_counts() {
        let resp = SyncBatchResponse::decode(
            br#"{"success":true,"totalReceived":3,"totalProcessed":2,"message":"ok"}"#,
        )
        .unwrap();
        assert!(resp.success);
        assert_eq!(resp.committed(3), 2);

        let resp = SyncBatchResponse::decode(br#"{"success":true,"savedCount":4}"#).unwrap();
        assert_eq!(resp.committed(5), 4);

        let resp = SyncBatchResponse::decode(b"").unwrap();
        assert_eq!(resp.committed(7), 7);

        let resp = SyncBatchResponse::decode(br#"{"success":false,"message":"dup"}"#).unwrap();
        assert!(!resp.success);
    }

    #[test]
    fn batch_response_rejects_garbage() {
        assert!(SyncBatchResponse::decode(b"<html>").is_err());
    }

    #[test]
    fn master_cursor_body_uses_destination_names() {
        let body = MasterCursorUpdate::new("ledger", 42).encode().unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["lastAlterID"], 42);
        assert_eq!(value["entityType"], "ledger");
        assert!(value["lastSyncTime"].is_string());
    }

    #[test]
    fn master_mapping_lookup() {
        let mapping = MasterMapping::decode(
            br#"{"masters":{"group":12,"ledger":"30","units":null}}"#,
        )
        .unwrap();
        assert_eq!(mapping.cursor("group"), Some(12));
        assert_eq!(mapping.cursor("ledger"), Some(30));
        assert_eq!(mapping.cursor("units"), None);
        assert_eq!(mapping.cursor("godown"), None);

        let nested = MasterMapping::decode(br#"{"data":{"masters":{"group":1}}}"#).unwrap();
        assert_eq!(nested.cursor("group"), Some(1));
    }

    #[test]
    fn voucher_cursor_lookup() {
        assert_eq!(
            decode_voucher_cursor(br#"{"lastVoucherAlterID":88}"#).unwrap(),
            Some(88)
        );
        assert_eq!(
            decode_voucher_cursor(br#"{"data":{"lastVoucherAlterID":"9"}}"#).unwrap(),
            Some(9)
        );
        assert_eq!(decode_voucher_cursor(b"{}").unwrap(), None);
    }

    #[test]
    fn destination_listing_accepts_both_spellings() {
        let rows = DestinationRecord::decode_list(
            br#"{"data":[
                {"masterId":1,"guid":"a","alterId":5},
                {"masterID":"2","guid":"b","alterID":3},
                {"guid":"no-master-id","alterId":1},
                {"masterId":4,"guid":"  ","alterId":1}
            ]}"#,
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].key, NaturalKey::new(2, "b"));
        assert_eq!(rows[1].revision, 3);

        let bare = DestinationRecord::decode_list(br#"[{"masterId":1,"guid":"a"}]"#).unwrap();
        assert_eq!(bare[0].revision, 0);
    }

    #[test]
    fn tenant_listing_filters_on_status() {
        let tenants = TenantSummary::decode_list(
            br#"{"data":[{"id":1,"name":"Acme","status":"imported"},{"id":2,"name":"Beta","status":"pending"}]}"#,
        )
        .unwrap();
        let imported: Vec<_> = tenants.iter().filter(|t| t.is_imported()).collect();
        assert_eq!(imported.len(), 1);
        assert_eq!(imported[0].name, "Acme");
    }

    #[test]
    fn sync_status_body() {
        let ok = SyncStatusUpdate::new(true);
        assert_eq!(ok.sync_status, SyncStatus::Synced);
        assert!(ok.last_sync_date.is_some());

        let failed: Value = serde_json::from_slice(&SyncStatusUpdate::new(false).encode().unwrap()).unwrap();
        assert_eq!(failed["syncStatus"], "failed");
        assert!(failed["lastSyncDate"].is_null());
    }
}
